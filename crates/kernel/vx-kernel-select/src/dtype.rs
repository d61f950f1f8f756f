//! Tensor element kinds
//!
//! The numeric codes are the ones packed into variant keys and must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Element representation of a bound tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementKind {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    I64 = 3,
    U8 = 4,
    U16 = 5,
    U32 = 6,
    U64 = 7,
    F16 = 8,
    F32 = 9,
    F64 = 10,
    BF16 = 11,
    Bool8 = 12,
    I4 = 13,
    U4 = 14,
}

impl ElementKind {
    pub const ALL: [ElementKind; 15] = [
        ElementKind::I8,
        ElementKind::I16,
        ElementKind::I32,
        ElementKind::I64,
        ElementKind::U8,
        ElementKind::U16,
        ElementKind::U32,
        ElementKind::U64,
        ElementKind::F16,
        ElementKind::F32,
        ElementKind::F64,
        ElementKind::BF16,
        ElementKind::Bool8,
        ElementKind::I4,
        ElementKind::U4,
    ];

    /// Code packed into variant keys.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Short name used inside kernel names, e.g. `U8` or `F32`.
    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::I8 => "I8",
            ElementKind::I16 => "I16",
            ElementKind::I32 => "I32",
            ElementKind::I64 => "I64",
            ElementKind::U8 => "U8",
            ElementKind::U16 => "U16",
            ElementKind::U32 => "U32",
            ElementKind::U64 => "U64",
            ElementKind::F16 => "F16",
            ElementKind::F32 => "F32",
            ElementKind::F64 => "F64",
            ElementKind::BF16 => "BF16",
            ElementKind::Bool8 => "BOOL8",
            ElementKind::I4 => "I4",
            ElementKind::U4 => "U4",
        }
    }

    pub const fn bit_width(self) -> u32 {
        match self {
            ElementKind::I4 | ElementKind::U4 => 4,
            ElementKind::I8 | ElementKind::U8 | ElementKind::Bool8 => 8,
            ElementKind::I16 | ElementKind::U16 | ElementKind::F16 | ElementKind::BF16 => 16,
            ElementKind::I32 | ElementKind::U32 | ElementKind::F32 => 32,
            ElementKind::I64 | ElementKind::U64 | ElementKind::F64 => 64,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            ElementKind::F16 | ElementKind::F32 | ElementKind::F64 | ElementKind::BF16
        )
    }

    pub const fn is_integer(self) -> bool {
        !self.is_float() && !matches!(self, ElementKind::Bool8)
    }

    /// Default canonical class used when building lookup keys.
    ///
    /// Tables only list canonical classes; narrow kinds are widened first.
    /// Families whose tables are keyed on storage kinds override this with
    /// `widen_f16`; the copy-like families go through `widen_to_word`.
    pub const fn canonical(self) -> Self {
        match self {
            ElementKind::I8 | ElementKind::I16 | ElementKind::I4 => ElementKind::I32,
            ElementKind::F16 | ElementKind::BF16 => ElementKind::F32,
            ElementKind::U16 => ElementKind::U32,
            ElementKind::U4 => ElementKind::U8,
            other => other,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == upper)
            .ok_or_else(|| format!("unknown element kind '{}'", s))
    }
}

// ============================================================================
// Normalization helpers shared by the family tables
// ============================================================================

/// `F16 -> F32`, everything else unchanged.
pub(crate) fn widen_f16(kind: ElementKind) -> ElementKind {
    match kind {
        ElementKind::F16 => ElementKind::F32,
        other => other,
    }
}

/// Word classes used by the copy-like kernels (tile, crop_and_resize,
/// col2im): the canonical class, with `U8` also moved up to `U32`.
pub(crate) fn widen_to_word(kind: ElementKind) -> ElementKind {
    match kind {
        ElementKind::U8 => ElementKind::U32,
        other => other.canonical(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ElementKind::from_code(15), None);
    }

    #[test]
    fn test_codes_match_key_layout() {
        assert_eq!(ElementKind::I8.code(), 0);
        assert_eq!(ElementKind::U8.code(), 4);
        assert_eq!(ElementKind::F16.code(), 8);
        assert_eq!(ElementKind::F32.code(), 9);
        assert_eq!(ElementKind::Bool8.code(), 12);
    }

    #[test]
    fn test_canonical_classes() {
        assert_eq!(ElementKind::I8.canonical(), ElementKind::I32);
        assert_eq!(ElementKind::I16.canonical(), ElementKind::I32);
        assert_eq!(ElementKind::F16.canonical(), ElementKind::F32);
        assert_eq!(ElementKind::BF16.canonical(), ElementKind::F32);
        assert_eq!(ElementKind::U4.canonical(), ElementKind::U8);
        assert_eq!(ElementKind::U8.canonical(), ElementKind::U8);
        assert_eq!(ElementKind::Bool8.canonical(), ElementKind::Bool8);
    }

    #[test]
    fn test_word_classes_follow_canonical() {
        assert_eq!(widen_to_word(ElementKind::I8), ElementKind::I32);
        assert_eq!(widen_to_word(ElementKind::I16), ElementKind::I32);
        assert_eq!(widen_to_word(ElementKind::F16), ElementKind::F32);
        assert_eq!(widen_to_word(ElementKind::BF16), ElementKind::F32);
        assert_eq!(widen_to_word(ElementKind::U16), ElementKind::U32);
        assert_eq!(widen_to_word(ElementKind::U8), ElementKind::U32);
        assert_eq!(widen_to_word(ElementKind::U4), ElementKind::U8);
        assert_eq!(widen_f16(ElementKind::I8), ElementKind::I8);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("u8".parse::<ElementKind>().unwrap(), ElementKind::U8);
        assert_eq!("BOOL8".parse::<ElementKind>().unwrap(), ElementKind::Bool8);
        assert!("q7".parse::<ElementKind>().is_err());
    }

    #[test]
    fn test_kind_classes() {
        assert!(ElementKind::BF16.is_float());
        assert!(ElementKind::U4.is_integer());
        assert!(!ElementKind::Bool8.is_integer());
        assert_eq!(ElementKind::I4.bit_width(), 4);
    }
}
