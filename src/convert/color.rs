//! Color channel depth handling

use serde::{Deserialize, Serialize};

use crate::cloud::DimensionDescriptor;

/// How remote color channels are reduced to 8 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorDepth {
    /// Decide per dimension from its declared width: 1-byte channels are
    /// already 8-bit, wider channels are treated as 16-bit.
    #[default]
    Auto,
    /// Always treat channels as 16-bit and shift right by 8.
    Bits16,
    /// Always treat channels as 8-bit and clamp.
    Bits8,
}

impl ColorDepth {
    /// Whether a channel declared by `dim` needs the 16 to 8 bit downshift.
    pub fn needs_downshift(self, dim: &DimensionDescriptor) -> bool {
        match self {
            ColorDepth::Auto => dim.size > 1,
            ColorDepth::Bits16 => true,
            ColorDepth::Bits8 => false,
        }
    }
}

impl std::str::FromStr for ColorDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorDepth::Auto),
            "16" | "bits16" => Ok(ColorDepth::Bits16),
            "8" | "bits8" => Ok(ColorDepth::Bits8),
            _ => Err(format!("unknown color depth: {}", s)),
        }
    }
}

/// Reduce a 16-bit channel value to 8 bits.
pub fn downshift_16(value: u16) -> u8 {
    (value >> 8) as u8
}

/// Reduce a channel value to 8 bits, with or without the downshift.
pub fn to_8bit(value: u16, downshift: bool) -> u8 {
    if downshift {
        downshift_16(value)
    } else {
        value.min(u8::MAX as u16) as u8
    }
}
