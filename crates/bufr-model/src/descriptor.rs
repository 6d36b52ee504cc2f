//! FXY descriptor keys.
//!
//! A BUFR descriptor is the triple (F, X, Y): F selects the descriptor class
//! (element, replication, operator, sequence), X a category within the class,
//! Y the entry number. The triple packs into 16 bits as
//! `(f << 14) | (x << 8) | y`, which is exactly the wire layout, so a raw
//! big-endian short read from a data description section is already a key.

use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Packed FXY descriptor key.
///
/// Ordering follows the packed value, which sorts keys by (f, x, y).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey(u16);

impl DescriptorKey {
    /// Build a key from the three fields, validating ranges
    /// (f 0..=3, x 0..=63, y 0..=255).
    pub fn new(f: u32, x: u32, y: u32) -> ModelResult<Self> {
        if f > 3 || x > 63 || y > 255 {
            return Err(ModelError::FieldRange { f, x, y });
        }
        Ok(Self(((f as u16) << 14) | ((x as u16) << 8) | y as u16))
    }

    /// Reinterpret a raw 16-bit value as a key. Every bit pattern maps to a
    /// structurally valid (f, x, y) triple, so this cannot fail.
    pub const fn from_packed(raw: u16) -> Self {
        Self(raw)
    }

    /// Parse dash notation, e.g. `0-01-001` or `3-1-1`. Field widths are
    /// lenient; field ranges are not.
    pub fn from_dash_notation(text: &str) -> ModelResult<Self> {
        let mut parts = text.trim().splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(f), Some(x), Some(y)) => {
                Self::new(parse_field(text, f)?, parse_field(text, x)?, parse_field(text, y)?)
            }
            _ => Err(ModelError::MalformedDescriptor {
                text: text.to_string(),
                reason: "expected F-XX-YYY".to_string(),
            }),
        }
    }

    /// Parse the six-digit combined decimal form `FXXYYY`, e.g. `301001`.
    pub fn from_combined_digits(text: &str) -> ModelResult<Self> {
        let digits = text.trim();
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModelError::MalformedDescriptor {
                text: text.to_string(),
                reason: "expected exactly six digits".to_string(),
            });
        }
        let value = digits.parse::<u32>().map_err(|_| ModelError::MalformedDescriptor {
            text: text.to_string(),
            reason: "not a decimal number".to_string(),
        })?;
        Self::from_combined(value)
    }

    /// Split a combined decimal `FXXYYY` value arithmetically:
    /// `f = v / 100000`, `x = (v / 1000) % 100`, `y = v % 1000`.
    pub fn from_combined(value: u32) -> ModelResult<Self> {
        let (x, y) = Self::split_combined(value);
        Self::new(value / 100_000, x, y)
    }

    /// Split a combined decimal into its `(x, y)` fields, ignoring any class
    /// prefix: `x = (v / 1000) % 100`, `y = v % 1000`. The caller supplies F
    /// from dialect context.
    pub const fn split_combined(value: u32) -> (u32, u32) {
        ((value / 1000) % 100, value % 1000)
    }

    pub const fn packed(self) -> u16 {
        self.0
    }

    pub const fn f(self) -> u16 {
        self.0 >> 14
    }

    pub const fn x(self) -> u16 {
        (self.0 >> 8) & 0x3f
    }

    pub const fn y(self) -> u16 {
        self.0 & 0xff
    }

    /// True when the key lies in the WMO-reserved range. Categories 48 and
    /// above and entry numbers 192 and above are set aside for local use.
    pub const fn is_wmo_range(self) -> bool {
        self.x() < 48 && self.y() < 192
    }

    pub const fn is_element(self) -> bool {
        self.f() == 0
    }

    pub const fn is_replication(self) -> bool {
        self.f() == 1
    }

    pub const fn is_operator(self) -> bool {
        self.f() == 2
    }

    pub const fn is_sequence(self) -> bool {
        self.f() == 3
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}-{:03}", self.f(), self.x(), self.y())
    }
}

fn parse_field(text: &str, field: &str) -> ModelResult<u32> {
    field.trim().parse::<u32>().map_err(|_| ModelError::MalformedDescriptor {
        text: text.to_string(),
        reason: format!("'{}' is not a number", field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let key = DescriptorKey::new(3, 1, 1).unwrap();
        assert_eq!(key.packed(), (3 << 14) | (1 << 8) | 1);
        assert_eq!(key.f(), 3);
        assert_eq!(key.x(), 1);
        assert_eq!(key.y(), 1);
    }

    #[test]
    fn test_field_ranges_rejected() {
        assert!(DescriptorKey::new(4, 0, 0).is_err());
        assert!(DescriptorKey::new(0, 64, 0).is_err());
        assert!(DescriptorKey::new(0, 0, 256).is_err());
        assert!(DescriptorKey::new(3, 63, 255).is_ok());
    }

    #[test]
    fn test_dash_notation_lenient_widths() {
        let canonical = DescriptorKey::from_dash_notation("0-01-001").unwrap();
        let short = DescriptorKey::from_dash_notation("0-1-1").unwrap();
        assert_eq!(canonical, short);
        assert_eq!(canonical.to_string(), "0-01-001");
    }

    #[test]
    fn test_dash_notation_malformed() {
        assert!(DescriptorKey::from_dash_notation("0-01").is_err());
        assert!(DescriptorKey::from_dash_notation("a-01-001").is_err());
        assert!(DescriptorKey::from_dash_notation("").is_err());
    }

    #[test]
    fn test_combined_digits_strict_length() {
        let key = DescriptorKey::from_combined_digits("301001").unwrap();
        assert_eq!((key.f(), key.x(), key.y()), (3, 1, 1));
        assert!(DescriptorKey::from_combined_digits("31001").is_err());
        assert!(DescriptorKey::from_combined_digits("0301001").is_err());
        assert!(DescriptorKey::from_combined_digits("3O1001").is_err());
    }

    #[test]
    fn test_combined_arithmetic_split() {
        let key = DescriptorKey::from_combined(301_001).unwrap();
        assert_eq!((key.f(), key.x(), key.y()), (3, 1, 1));
        let elem = DescriptorKey::from_combined(1_001).unwrap();
        assert_eq!((elem.f(), elem.x(), elem.y()), (0, 1, 1));
    }

    #[test]
    fn test_split_combined_drops_class_prefix() {
        assert_eq!(DescriptorKey::split_combined(12_101), (12, 101));
        assert_eq!(DescriptorKey::split_combined(300_002), (0, 2));
        let key = {
            let (x, y) = DescriptorKey::split_combined(300_002);
            DescriptorKey::new(3, x, y).unwrap()
        };
        assert_eq!(key, DescriptorKey::new(3, 0, 2).unwrap());
    }

    #[test]
    fn test_wmo_range_boundaries() {
        assert!(DescriptorKey::new(0, 47, 191).unwrap().is_wmo_range());
        assert!(!DescriptorKey::new(0, 48, 0).unwrap().is_wmo_range());
        assert!(!DescriptorKey::new(0, 0, 192).unwrap().is_wmo_range());
    }

    #[test]
    fn test_class_predicates() {
        assert!(DescriptorKey::new(0, 1, 1).unwrap().is_element());
        assert!(DescriptorKey::new(1, 1, 0).unwrap().is_replication());
        assert!(DescriptorKey::new(2, 5, 1).unwrap().is_operator());
        assert!(DescriptorKey::new(3, 1, 1).unwrap().is_sequence());
    }
}
