//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The barcode was not 13 ASCII digits.
    #[error("barcode must be 13 digits, got {value:?}")]
    BarcodeFormat { value: String },

    /// The barcode's check digit did not match its payload.
    #[error("barcode {value} has an invalid check digit")]
    BarcodeChecksum { value: String },
}

/// An EAN-13 barcode, the only symbology the scanner accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Barcode(String);

impl Barcode {
    /// Length of an EAN-13 code including the check digit.
    pub const LEN: usize = 13;

    /// Creates a barcode after validating length, digits and check digit.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "barcode" });
        }
        if trimmed.len() != Self::LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::BarcodeFormat { value });
        }

        let digits: Vec<u32> = trimmed.bytes().map(|b| u32::from(b - b'0')).collect();
        let weighted: u32 = digits[..Self::LEN - 1]
            .iter()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
            .sum();
        let expected = (10 - weighted % 10) % 10;
        if digits[Self::LEN - 1] != expected {
            return Err(ValidationError::BarcodeChecksum {
                value: trimmed.to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the barcode digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Barcode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Barcode> for String {
    fn from(barcode: Barcode) -> Self {
        barcode.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates a sequential numeric ID newtype.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw identifier.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier.
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the identifier that follows this one.
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

define_numeric_id!(
    /// Identifies one scan session. A fresh ID is minted on every `start`.
    ScanId, "scan"
);

define_numeric_id!(
    /// Opaque handle to a live camera stream, issued by the camera device.
    StreamHandle, "stream"
);

define_numeric_id!(
    /// Identifies one issued search query.
    ///
    /// Tickets only ever increase, so a response can be checked for staleness
    /// by comparing its ticket against the newest one issued.
    SearchTicket, "search"
);
