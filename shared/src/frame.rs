/*!
Raw frames and field decoding.

This module turns the payload of a synchronized frame into named unsigned
integers, least-significant byte first, following a [`FrameLayout`].
*/

use crate::error::{Result, SharedError};
use crate::layout::FrameLayout;
use bytes::{Buf, BufMut};

/// Bytes of one frame, header included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn new(header: u8, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Header followed by payload, as received on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.payload.len());
        bytes.push(self.header);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode the payload according to `layout`
    pub fn decode(&self, layout: &FrameLayout) -> Result<DecodedFields> {
        decode_payload(layout, &self.payload)
    }
}

/// Field values of one frame, in layout order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFields {
    values: Vec<(String, u64)>,
}

impl DecodedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: u64) {
        self.values.push((name.into(), value));
    }

    /// Value of the named field
    pub fn get(&self, name: &str) -> Option<u64> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize the values back into a payload for `layout`.
    ///
    /// Values wider than their field are truncated to the field width.
    pub fn encode(&self, layout: &FrameLayout) -> Vec<u8> {
        let mut payload = Vec::with_capacity(layout.payload_len());
        for field in &layout.fields {
            let value = self.get(&field.name).unwrap_or(0);
            let mask = if field.width >= 8 {
                u64::MAX
            } else {
                (1u64 << (field.width * 8)) - 1
            };
            payload.put_uint_le(value & mask, field.width);
        }
        payload
    }
}

/// Split a payload into little-endian unsigned fields.
///
/// The payload must be exactly `layout.payload_len()` bytes long; its content
/// is not validated.
pub fn decode_payload(layout: &FrameLayout, payload: &[u8]) -> Result<DecodedFields> {
    let expected = layout.payload_len();
    if payload.len() != expected {
        return Err(SharedError::invalid_layout(format!(
            "payload is {} bytes, layout expects {}",
            payload.len(),
            expected
        )));
    }

    let mut buf = payload;
    let mut fields = DecodedFields::new();
    for field in &layout.fields {
        fields.push(field.name.clone(), buf.get_uint_le(field.width));
    }

    Ok(fields)
}
