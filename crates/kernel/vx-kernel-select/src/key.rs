//! Variant keys and their bit-field layouts
//!
//! Every family packs its lookup key from a fixed list of named fields. The
//! layout is plain data, so the same description is used both when the static
//! tables are built and when a request is resolved.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Packed lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey(pub u64);

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One named field of a key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
    pub name: &'static str,
    pub shift: u32,
    pub width: u32,
}

impl KeyField {
    pub const fn new(name: &'static str, shift: u32, width: u32) -> Self {
        Self { name, shift, width }
    }

    fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    fn end(&self) -> u32 {
        self.shift + self.width
    }
}

/// Key packing failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    #[error("expected {expected} key fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },
    #[error("value {value} does not fit the {width}-bit field '{field}'")]
    Overflow {
        field: &'static str,
        value: u64,
        width: u32,
    },
    #[error("key fields '{first}' and '{second}' overlap")]
    Overlap {
        first: &'static str,
        second: &'static str,
    },
    #[error("key field '{0}' does not fit in 64 bits")]
    OutOfRange(&'static str),
}

/// Ordered bit-field layout of one family's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    fields: &'static [KeyField],
}

impl KeyLayout {
    /// Validate a field list: non-empty widths, inside 64 bits, no overlap.
    pub fn new(fields: &'static [KeyField]) -> Result<Self, KeyError> {
        for (i, field) in fields.iter().enumerate() {
            if field.width == 0 || field.end() > 64 {
                return Err(KeyError::OutOfRange(field.name));
            }
            for other in &fields[i + 1..] {
                if field.shift < other.end() && other.shift < field.end() {
                    return Err(KeyError::Overlap {
                        first: field.name,
                        second: other.name,
                    });
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &'static [KeyField] {
        self.fields
    }

    /// Pack one value per field, in layout order.
    pub fn pack(&self, values: &[u64]) -> Result<VariantKey, KeyError> {
        if values.len() != self.fields.len() {
            return Err(KeyError::FieldCount {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }

        let mut key = 0u64;
        for (field, &value) in self.fields.iter().zip(values) {
            if value & !field.mask() != 0 {
                return Err(KeyError::Overflow {
                    field: field.name,
                    value,
                    width: field.width,
                });
            }
            key = utils::insert_bits(key, value, field.shift, field.width);
        }
        Ok(VariantKey(key))
    }

    pub fn unpack(&self, key: VariantKey) -> Vec<u64> {
        self.fields
            .iter()
            .map(|f| utils::extract_bits(key.0, f.shift, f.width))
            .collect()
    }

    /// `name=value` pairs, for log and error messages.
    pub fn describe(&self, values: &[u64]) -> String {
        self.fields
            .iter()
            .zip(values)
            .map(|(f, v)| format!("{}={}", f.name, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Bit and alignment helpers.
pub mod utils {
    /// Extract `count` bits of `value` starting at bit `start`.
    pub fn extract_bits(value: u64, start: u32, count: u32) -> u64 {
        if count == 0 {
            return 0;
        }
        let shifted = value.checked_shr(start).unwrap_or(0);
        if count >= 64 {
            shifted
        } else {
            shifted & ((1u64 << count) - 1)
        }
    }

    /// Replace `count` bits of `target` starting at `start` with `value`.
    pub fn insert_bits(target: u64, value: u64, start: u32, count: u32) -> u64 {
        if count == 0 || start >= 64 {
            return target;
        }
        let mask = if count >= 64 {
            u64::MAX
        } else {
            (1u64 << count) - 1
        };
        let mask = mask << start;
        (target & !mask) | ((value << start) & mask)
    }

    /// Round `value` up to a multiple of `alignment` (a power of two).
    pub fn align_up(value: usize, alignment: usize) -> usize {
        debug_assert!(alignment.is_power_of_two());
        (value + alignment - 1) & !(alignment - 1)
    }

    pub fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }
}
