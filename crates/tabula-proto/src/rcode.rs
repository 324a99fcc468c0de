//! DNS response codes (RCODEs).
//!
//! Only the codes an authoritative table-backed server can produce are
//! modelled; the wire layer maps them onto the header field.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS response code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
pub enum ResponseCode {
    /// No error condition - RFC 1035
    NoError = 0,

    /// Server failure - RFC 1035
    ///
    /// The name server was unable to process the query due to
    /// a problem with the name server.
    ServFail = 2,

    /// Not implemented - RFC 1035
    ///
    /// The name server does not support the requested kind of query.
    NotImp = 4,
}

impl ResponseCode {
    /// Returns the mnemonic used in presentation output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::ServFail => "SERVFAIL",
            Self::NotImp => "NOTIMP",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
