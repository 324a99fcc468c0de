//! DNS record and query types.
//!
//! [`RecordType`] is the closed set of kinds the record table can hold.
//! [`QueryType`] is what a question may ask for, which additionally covers
//! transfer and meta types that are recognized only to be refused.

use crate::error::Error;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record kind that can be stored and served.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
pub enum RecordType {
    /// IPv4 address - RFC 1035
    A = 1,

    /// Authoritative name server - RFC 1035
    NS = 2,

    /// Canonical name (alias) - RFC 1035
    CNAME = 5,

    /// Start of authority - RFC 1035
    SOA = 6,

    /// Mail exchange - RFC 1035
    MX = 15,

    /// Text strings - RFC 1035
    TXT = 16,

    /// IPv6 address - RFC 3596
    AAAA = 28,

    /// Server selection - RFC 2782
    SRV = 33,

    /// Certification authority authorization - RFC 8659
    CAA = 257,
}

impl RecordType {
    /// Every servable kind, in type-code order.
    pub const ALL: [RecordType; 9] = [
        Self::A,
        Self::NS,
        Self::CNAME,
        Self::SOA,
        Self::MX,
        Self::TXT,
        Self::AAAA,
        Self::SRV,
        Self::CAA,
    ];

    /// Kinds whose target hostname gets glue in the additional section.
    pub const GLUE: [RecordType; 3] = [Self::A, Self::AAAA, Self::CNAME];

    /// Returns the numeric type code.
    #[inline]
    pub fn to_u16(self) -> u16 {
        self.into()
    }

    /// Looks up a kind by its numeric type code.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns the mnemonic as stored in the `type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::SOA => "SOA",
            Self::MX => "MX",
            Self::TXT => "TXT",
            Self::AAAA => "AAAA",
            Self::SRV => "SRV",
            Self::CAA => "CAA",
        }
    }

    /// Returns true for the address kinds that trigger CNAME indirection.
    #[inline]
    pub const fn is_address(self) -> bool {
        matches!(self, Self::A | Self::AAAA)
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::UnknownType(s.to_string()))
    }
}

impl Default for RecordType {
    fn default() -> Self {
        Self::A
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type asked for by a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    /// One of the servable record kinds.
    Record(RecordType),

    /// Incremental zone transfer - RFC 1995
    Ixfr,

    /// Full zone transfer - RFC 5936
    Axfr,

    /// All records - RFC 1035
    Any,

    /// Any other type code.
    Other(u16),
}

impl QueryType {
    /// Returns the numeric type code.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Record(t) => t.to_u16(),
            Self::Ixfr => 251,
            Self::Axfr => 252,
            Self::Any => 255,
            Self::Other(code) => code,
        }
    }

    /// Classifies a numeric type code.
    pub fn from_u16(value: u16) -> Self {
        match value {
            251 => Self::Ixfr,
            252 => Self::Axfr,
            255 => Self::Any,
            _ => RecordType::from_u16(value).map_or(Self::Other(value), Self::Record),
        }
    }

    /// Returns the record kind if this question can be answered from the table.
    pub const fn record_type(self) -> Option<RecordType> {
        match self {
            Self::Record(t) => Some(t),
            _ => None,
        }
    }
}

impl From<RecordType> for QueryType {
    fn from(t: RecordType) -> Self {
        Self::Record(t)
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "AXFR" => Ok(Self::Axfr),
            "IXFR" => Ok(Self::Ixfr),
            "ANY" | "*" => Ok(Self::Any),
            upper => {
                if let Some(code) = upper.strip_prefix("TYPE") {
                    return code
                        .parse::<u16>()
                        .map(Self::from_u16)
                        .map_err(|_| Error::UnknownType(trimmed.to_string()));
                }
                RecordType::from_str(upper).map(Self::Record)
            }
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(t) => write!(f, "{t}"),
            Self::Ixfr => f.write_str("IXFR"),
            Self::Axfr => f.write_str("AXFR"),
            Self::Any => f.write_str("ANY"),
            Self::Other(code) => write!(f, "TYPE{code}"),
        }
    }
}
