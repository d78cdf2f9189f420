/*!
Display units for currents.
*/

/// Pick the unit a femto-amp value reads best in.
///
/// Returns the factor to multiply the femto-amp value by and the unit label.
pub fn scale_current(femto_amps: f64) -> (f64, &'static str) {
    if femto_amps < 1e3 {
        (1.0, "fA")
    } else if femto_amps < 1e6 {
        (1e-3, "pA")
    } else if femto_amps < 1e9 {
        (1e-6, "nA")
    } else {
        (1e-9, "µA")
    }
}

/// Format a femto-amp value with two decimals in its display unit
pub fn format_current(femto_amps: f64) -> String {
    let (scale, unit) = scale_current(femto_amps);
    format!("{:.2} {}", femto_amps * scale, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_selection() {
        assert_eq!(scale_current(500.0), (1.0, "fA"));
        assert_eq!(scale_current(1500.0), (1e-3, "pA"));
        assert_eq!(scale_current(2_000_000.0), (1e-6, "nA"));
        assert_eq!(scale_current(5e9), (1e-9, "µA"));
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(scale_current(999.99).1, "fA");
        assert_eq!(scale_current(1e3).1, "pA");
        assert_eq!(scale_current(1e6).1, "nA");
        assert_eq!(scale_current(1e9).1, "µA");
        assert_eq!(scale_current(0.0).1, "fA");
    }

    #[test]
    fn test_format_current() {
        assert_eq!(format_current(393.39), "393.39 fA");
        assert_eq!(format_current(1500.0), "1.50 pA");
    }
}
