//! Type-safe identifier wrappers around [`ObjectId`].
//!
//! Every document has a strongly-typed ID to prevent accidental mixing of
//! identifiers at compile time. The underlying value is a BSON object id
//! (4 bytes of unix seconds, 5 random bytes, 3 counter bytes), generated
//! app-side.
//!
//! Externally an id is always a 24-character lowercase hex string. Parsing
//! accepts upper-case digits as well; anything else is an [`IdError`].

pub use bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of an object id in bytes.
pub const OBJECT_ID_LEN: usize = 12;

/// Length of the hex representation of an object id.
pub const OBJECT_ID_HEX_LEN: usize = 24;

/// Errors produced when decoding an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The hex string does not have exactly 24 characters.
    #[error("identifier must be {OBJECT_ID_HEX_LEN} hex characters, got {0}")]
    InvalidLength(usize),

    /// The hex string contains a character outside `[0-9a-fA-F]`.
    #[error("identifier contains non-hex character {0:?}")]
    InvalidCharacter(char),

    /// A raw byte slice does not have exactly 12 bytes.
    #[error("identifier must be {OBJECT_ID_LEN} bytes, got {0}")]
    InvalidByteLength(usize),
}

/// Parse a 24-character hex string into an [`ObjectId`].
///
/// # Errors
///
/// Returns [`IdError::InvalidLength`] or [`IdError::InvalidCharacter`].
pub fn parse_object_id(input: &str) -> Result<ObjectId, IdError> {
    ObjectId::parse_str(input).map_err(|err| match err {
        bson::oid::Error::InvalidHexStringCharacter { c, .. } => IdError::InvalidCharacter(c),
        _ => IdError::InvalidLength(input.chars().count()),
    })
}

/// Decode an [`ObjectId`] from raw bytes, as stored in a `BYTEA` column.
///
/// # Errors
///
/// Returns [`IdError::InvalidByteLength`] unless the slice is 12 bytes.
pub fn object_id_from_slice(bytes: &[u8]) -> Result<ObjectId, IdError> {
    <[u8; OBJECT_ID_LEN]>::try_from(bytes)
        .ok()
        .map(ObjectId::from_bytes)
        .ok_or(IdError::InvalidByteLength(bytes.len()))
}

/// Generates a newtype wrapper around [`ObjectId`] with standard derives.
///
/// Serde uses the bare hex string, not `ObjectId`'s `{"$oid": ...}` map.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub ObjectId);

        impl $name {
            /// Create a new identifier.
            pub fn new() -> Self {
                Self(ObjectId::new())
            }

            /// Parse an identifier from its hex representation.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`] if the input is not 24 hex characters.
            pub fn parse(input: &str) -> Result<Self, IdError> {
                parse_object_id(input).map(Self)
            }

            /// Return the inner [`ObjectId`] value.
            pub const fn into_inner(self) -> ObjectId {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0.to_hex())
            }
        }

        impl core::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }

        impl From<ObjectId> for $name {
            fn from(id: ObjectId) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ObjectId {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an event.
    EventId
}

define_id! {
    /// Unique identifier for a ticket (distinct from its seat label).
    TicketId
}

define_id! {
    /// Unique identifier for a reservation.
    ReservationId
}
