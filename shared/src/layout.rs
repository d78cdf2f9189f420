/*!
Frame layout descriptors.

A layout names the header byte that starts a frame and the ordered list of
fixed-width fields that follow it. The two firmware variants of the board are
available as presets; anything else can be described field by field.
*/

use crate::error::{Result, SharedError};
use crate::protocol::{
    FIELD_CHARGE, FIELD_HUMIDITY, FIELD_TEMPERATURE, HEADER_BASIC, HEADER_EXTENDED,
    MAX_FIELD_WIDTH,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// One named little-endian field of the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Width in bytes
    pub width: usize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Header byte plus ordered payload fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub header: u8,
    pub fields: Vec<FieldSpec>,
}

impl FrameLayout {
    /// Create a layout, checking its invariants
    pub fn new(header: u8, fields: Vec<FieldSpec>) -> Result<Self> {
        let layout = Self { header, fields };
        layout.validate()?;
        Ok(layout)
    }

    /// Basic firmware: `0xAB` followed by 5 bytes of charge
    pub fn basic() -> Self {
        Self {
            header: HEADER_BASIC,
            fields: vec![FieldSpec::new(FIELD_CHARGE, 5)],
        }
    }

    /// Extended firmware: `0xDD` followed by 30 bytes of charge, charge pump
    /// counters, interval counters and SHT41 readings
    pub fn extended() -> Self {
        Self {
            header: HEADER_EXTENDED,
            fields: vec![
                FieldSpec::new(FIELD_CHARGE, 6),
                FieldSpec::new("cp1_count", 4),
                FieldSpec::new("cp2_count", 4),
                FieldSpec::new("cp3_count", 4),
                FieldSpec::new("cp1_start_interval", 4),
                FieldSpec::new("cp1_end_interval", 4),
                FieldSpec::new(FIELD_TEMPERATURE, 2),
                FieldSpec::new(FIELD_HUMIDITY, 2),
            ],
        }
    }

    /// Check the layout invariants: non-empty, widths within `1..=8`,
    /// unique non-empty names
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SharedError::invalid_layout("layout has no fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SharedError::invalid_layout("field name is empty"));
            }
            if field.width == 0 || field.width > MAX_FIELD_WIDTH {
                return Err(SharedError::invalid_layout(format!(
                    "field '{}' has width {}, expected 1..={}",
                    field.name, field.width, MAX_FIELD_WIDTH
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SharedError::invalid_layout(format!(
                    "field '{}' appears more than once",
                    field.name
                )));
            }
        }

        Ok(())
    }

    /// Number of payload bytes following the header
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Header plus payload
    pub fn frame_len(&self) -> usize {
        1 + self.payload_len()
    }

    /// Whether a field with this name exists
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Fail with [`SharedError::MissingField`] if the field is absent
    pub fn require_field(&self, name: &str) -> Result<()> {
        if self.has_field(name) {
            Ok(())
        } else {
            Err(SharedError::MissingField(name.to_string()))
        }
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::extended()
    }
}

/// Named built-in layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPreset {
    Basic,
    Extended,
}

impl LayoutPreset {
    pub fn layout(self) -> FrameLayout {
        match self {
            Self::Basic => FrameLayout::basic(),
            Self::Extended => FrameLayout::extended(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Extended => "extended",
        }
    }
}

impl FromStr for LayoutPreset {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "extended" => Ok(Self::Extended),
            other => Err(SharedError::config(format!(
                "unknown layout '{}', expected 'basic' or 'extended'",
                other
            ))),
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_sizes() {
        let basic = FrameLayout::basic();
        assert_eq!(basic.header, 0xAB);
        assert_eq!(basic.payload_len(), 5);
        assert_eq!(basic.frame_len(), 6);

        let extended = FrameLayout::extended();
        assert_eq!(extended.header, 0xDD);
        assert_eq!(extended.payload_len(), 30);
        assert_eq!(extended.frame_len(), 31);
        assert!(extended.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_layouts() {
        assert!(matches!(
            FrameLayout::new(0xAB, vec![]),
            Err(SharedError::InvalidLayout(_))
        ));
        assert!(FrameLayout::new(0xAB, vec![FieldSpec::new("charge", 0)]).is_err());
        assert!(FrameLayout::new(0xAB, vec![FieldSpec::new("charge", 9)]).is_err());
        assert!(FrameLayout::new(0xAB, vec![FieldSpec::new(" ", 2)]).is_err());
        assert!(FrameLayout::new(
            0xAB,
            vec![FieldSpec::new("charge", 2), FieldSpec::new("charge", 2)]
        )
        .is_err());
    }

    #[test]
    fn test_require_field() {
        let layout = FrameLayout::basic();
        assert!(layout.require_field("charge").is_ok());
        assert!(matches!(
            layout.require_field("humidity"),
            Err(SharedError::MissingField(name)) if name == "humidity"
        ));
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("basic".parse::<LayoutPreset>().unwrap(), LayoutPreset::Basic);
        assert_eq!("Extended".parse::<LayoutPreset>().unwrap(), LayoutPreset::Extended);
        assert!("compact".parse::<LayoutPreset>().is_err());
        assert_eq!(LayoutPreset::Basic.layout(), FrameLayout::basic());
    }
}
