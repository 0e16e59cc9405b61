//! Display colors and their packed 64-bit storage form.
//!
//! A color is stored as a signed 64-bit integer: the four 8-bit ARGB
//! channels occupy the upper 32 bits and the lower 32 bits hold the color
//! space id, which is always zero (sRGB) for values produced here.

use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An sRGB color with alpha.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const RED: Color = Color::from_argb(0xFFFF_0000);
    pub const WHITE: Color = Color::from_argb(0xFFFF_FFFF);
    pub const BLACK: Color = Color::from_argb(0xFF00_0000);

    pub const fn new(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self {
            alpha,
            red,
            green,
            blue,
        }
    }

    pub const fn from_argb(argb: u32) -> Self {
        Self {
            alpha: (argb >> 24) as u8,
            red: (argb >> 16) as u8,
            green: (argb >> 8) as u8,
            blue: argb as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        (self.alpha as u32) << 24 | (self.red as u32) << 16 | (self.green as u32) << 8 | self.blue as u32
    }

    /// Pack into the stored representation.
    pub fn encode(self) -> PackedColor {
        PackedColor((u64::from(self.to_argb()) << 32) as i64)
    }

    /// Unpack a stored value. Fails if the color space bits are not sRGB.
    pub fn decode(packed: PackedColor) -> Result<Self> {
        let bits = packed.0 as u64;
        if bits & 0xFFFF_FFFF != 0 {
            return Err(WalletError::InvalidColor(packed.0));
        }
        Ok(Color::from_argb((bits >> 32) as u32))
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color(#{:08X})", self.to_argb())
    }
}

/// A color as persisted in account and record documents.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedColor(pub i64);

impl PackedColor {
    pub fn decode(self) -> Result<Color> {
        Color::decode(self)
    }
}

impl From<Color> for PackedColor {
    fn from(color: Color) -> Self {
        color.encode()
    }
}

impl fmt::Debug for PackedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedColor({:#018x})", self.0 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_opaque_red_layout() {
        let packed = Color::RED.encode();
        assert_eq!(packed.0 as u64, 0xFFFF_0000_0000_0000);
        // Opaque colors have the sign bit set.
        assert!(packed.0 < 0);
    }

    #[test]
    fn test_rejects_foreign_color_space() {
        let packed = PackedColor(0x3F80_0000_0000_0011);
        assert!(matches!(
            Color::decode(packed),
            Err(WalletError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_zero_is_transparent_black() {
        assert_eq!(Color::decode(PackedColor::default()).unwrap(), Color::new(0, 0, 0, 0));
    }

    proptest! {
        #[test]
        fn prop_color_round_trip(a in any::<u8>(), r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let color = Color::new(a, r, g, b);
            prop_assert_eq!(Color::decode(color.encode()).unwrap(), color);
        }
    }
}
