//! Status enumerations for tickets and reservations.
//!
//! Both enums serialize to the lowercase strings that are also persisted in
//! the `status` columns, so the wire format and the storage format agree.

use serde::{Deserialize, Serialize};

/// Error returned when a persisted status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status: {value:?}")]
pub struct UnknownStatus {
    /// Which status enum was being decoded.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

/// Whether a ticket can still be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// No active reservation holds this ticket.
    Available,
    /// Claimed by exactly one reservation.
    Reserved,
}

impl TicketStatus {
    /// The persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
        }
    }
}

impl core::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            other => Err(UnknownStatus {
                kind: "ticket",
                value: other.to_owned(),
            }),
        }
    }
}

/// Lifecycle state of a reservation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// The reservation currently holds its ticket.
    Active,
    /// The reservation no longer holds its ticket.
    Cancelled,
}

impl ReservationStatus {
    /// The persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus {
                kind: "reservation",
                value: other.to_owned(),
            }),
        }
    }
}
