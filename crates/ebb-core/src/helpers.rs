//! Numeric conversion helpers for decoding board replies.
//!
//! The EBB reports analog readings as raw 10-bit ADC counts and packs status
//! flags into single bytes. These helpers turn those raw values into volts
//! and booleans.

/// Full-scale count of the board's 10-bit ADC.
pub const ADC_MAX: u16 = 1023;

/// ADC reference voltage on the EBB.
pub const ADC_REFERENCE_VOLTS: f64 = 3.3;

/// Convert a raw 10-bit ADC count into volts at the ADC pin.
///
/// # Example
///
/// ```
/// use ebb_core::adc_to_volts;
///
/// assert_eq!(adc_to_volts(0), 0.0);
/// assert!((adc_to_volts(1023) - 3.3).abs() < 1e-9);
/// ```
pub fn adc_to_volts(raw: u16) -> f64 {
    ADC_REFERENCE_VOLTS * f64::from(raw) / f64::from(ADC_MAX)
}

/// Return whether bit `position` (0 = least significant) of `value` is set.
///
/// # Example
///
/// ```
/// use ebb_core::bit_is_set;
///
/// assert!(bit_is_set(0x3E, 5));
/// assert!(!bit_is_set(0x3E, 0));
/// ```
pub fn bit_is_set(value: u8, position: u8) -> bool {
    position < 8 && value & (1 << position) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_midscale() {
        let v = adc_to_volts(512);
        assert!((v - 1.651_613).abs() < 1e-5, "got {v}");
    }

    #[test]
    fn adc_full_scale() {
        assert!((adc_to_volts(ADC_MAX) - ADC_REFERENCE_VOLTS).abs() < 1e-12);
    }

    #[test]
    fn bit_positions() {
        let value = 0b1000_0001;
        assert!(bit_is_set(value, 0));
        assert!(bit_is_set(value, 7));
        for pos in 1..7 {
            assert!(!bit_is_set(value, pos));
        }
    }

    #[test]
    fn bit_out_of_range_is_clear() {
        assert!(!bit_is_set(0xFF, 8));
    }
}
