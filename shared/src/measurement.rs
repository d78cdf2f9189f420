/*!
Conversion of decoded fields into physical quantities.

Charge is integrated over one sampling period and reported as a current in
femto-amps. Temperature and humidity use the SHT41 datasheet formulas.
*/

use crate::frame::DecodedFields;
use crate::protocol::{
    DEFAULT_LSB_CHARGE_AC, DEFAULT_SAMPLING_PERIOD_MS, FIELD_CHARGE, FIELD_HUMIDITY,
    FIELD_TEMPERATURE, SHT41_FULL_SCALE,
};
use serde::{Deserialize, Serialize};

/// Calibration constants of the charge measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Integration period in milliseconds
    pub sampling_period_ms: f64,
    /// Charge of one LSB in atto-coulombs
    pub lsb_charge_ac: f64,
}

impl Calibration {
    pub fn new(sampling_period_ms: f64, lsb_charge_ac: f64) -> Self {
        Self {
            sampling_period_ms,
            lsb_charge_ac,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLING_PERIOD_MS, DEFAULT_LSB_CHARGE_AC)
    }
}

/// One measurement in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Integrated charge in atto-coulombs
    pub charge_ac: f64,
    /// Current in femto-amps
    pub current_fa: f64,
    /// Temperature in °C, when the frame carries it
    pub temperature_c: Option<f64>,
    /// Relative humidity in %, clamped to [0, 100], when the frame carries it
    pub humidity_pct: Option<f64>,
}

impl Measurement {
    /// Convert decoded fields using `calibration`.
    ///
    /// Never fails: a missing charge field counts as zero and any raw value
    /// produces some number, physically meaningful or not.
    pub fn from_fields(fields: &DecodedFields, calibration: &Calibration) -> Self {
        let raw_charge = fields.get(FIELD_CHARGE).unwrap_or(0);
        let charge_ac = raw_charge as f64 * calibration.lsb_charge_ac;
        let current_aa = charge_ac / (calibration.sampling_period_ms * 1e-3);

        Self {
            charge_ac,
            current_fa: current_aa * 1e-3,
            temperature_c: fields.get(FIELD_TEMPERATURE).map(temperature_celsius),
            humidity_pct: fields.get(FIELD_HUMIDITY).map(relative_humidity),
        }
    }
}

/// SHT41 temperature conversion
pub fn temperature_celsius(raw: u64) -> f64 {
    -45.0 + 175.0 * raw as f64 / SHT41_FULL_SCALE
}

/// SHT41 humidity conversion, cropped to the physical range
pub fn relative_humidity(raw: u64) -> f64 {
    (-6.0 + 125.0 * raw as f64 / SHT41_FULL_SCALE).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[(&str, u64)]) -> DecodedFields {
        let mut fields = DecodedFields::new();
        for (name, value) in values {
            fields.push(*name, *value);
        }
        fields
    }

    #[test]
    fn test_temperature_bounds() {
        assert!((temperature_celsius(0) - -45.0).abs() < 1e-9);
        assert!((temperature_celsius(65535) - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_humidity_is_clamped() {
        // -6 + 125 = 119 before clamping
        assert_eq!(relative_humidity(65535), 100.0);
        assert_eq!(relative_humidity(0), 0.0);
        assert_eq!(relative_humidity(u64::MAX), 100.0);

        let mid = relative_humidity(32768);
        assert!(mid > 56.4 && mid < 56.6);
    }

    #[test]
    fn test_current_from_charge() {
        let calibration = Calibration::new(100.0, 39.339);
        let m = Measurement::from_fields(&fields(&[("charge", 1000)]), &calibration);

        // 1000 * 39.339 aC over 0.1 s = 393390 aA = 393.39 fA
        assert!((m.charge_ac - 39339.0).abs() < 1e-6);
        assert!((m.current_fa - 393.39).abs() < 1e-6);
        assert_eq!(m.temperature_c, None);
        assert_eq!(m.humidity_pct, None);
    }

    #[test]
    fn test_calibrations_coexist() {
        let input = fields(&[("charge", 10)]);
        let fast = Measurement::from_fields(&input, &Calibration::new(10.0, 1.0));
        let slow = Measurement::from_fields(&input, &Calibration::new(1000.0, 1.0));

        assert!((fast.current_fa - 1.0).abs() < 1e-9);
        assert!((slow.current_fa - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_environment_fields() {
        let m = Measurement::from_fields(
            &fields(&[("charge", 0), ("temperature", 0), ("humidity", 65535)]),
            &Calibration::default(),
        );
        assert_eq!(m.current_fa, 0.0);
        assert!((m.temperature_c.unwrap() - -45.0).abs() < 1e-9);
        assert_eq!(m.humidity_pct, Some(100.0));
    }

    #[test]
    fn test_missing_charge_counts_as_zero() {
        let m = Measurement::from_fields(&DecodedFields::new(), &Calibration::default());
        assert_eq!(m.charge_ac, 0.0);
        assert_eq!(m.current_fa, 0.0);
    }

    #[test]
    fn test_serializes_to_json() {
        let m = Measurement::from_fields(&fields(&[("charge", 1)]), &Calibration::new(1000.0, 1000.0));
        let json = serde_json::to_value(m).unwrap();
        assert!((json["current_fa"].as_f64().unwrap() - 1.0).abs() < 1e-9);
        assert!(json["humidity_pct"].is_null());
    }
}
