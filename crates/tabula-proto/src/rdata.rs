//! Typed resource records.
//!
//! [`RData`] is a closed sum over the nine kinds Tabula serves, so every
//! match on record data is exhaustive. A [`Record`] pairs record data with its
//! owner name and resolved TTL; the class is always IN.

use crate::name::Name;
use crate::rtype::RecordType;
use crate::MAX_CHARACTER_STRING;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// TXT record - Text (RFC 1035).
///
/// Holds one or more character-strings of at most 255 bytes each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TXT {
    strings: SmallVec<[Vec<u8>; 2]>,
}

impl TXT {
    /// Splits `text` into consecutive character-strings of at most 255 bytes.
    ///
    /// Returns `None` for empty text. Splitting is byte-wise, so a multi-byte
    /// UTF-8 sequence may straddle two strings; concatenating the strings
    /// always restores the input.
    pub fn from_text(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        Some(Self {
            strings: text
                .as_bytes()
                .chunks(MAX_CHARACTER_STRING)
                .map(<[u8]>::to_vec)
                .collect(),
        })
    }

    /// Returns the character-strings in order.
    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    /// Returns all strings concatenated.
    pub fn data(&self) -> Vec<u8> {
        self.strings.concat()
    }
}

impl fmt::Display for TXT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.strings.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str("\"")?;
            for &byte in s {
                if byte == b'"' || byte == b'\\' {
                    write!(f, "\\{}", byte as char)?;
                } else if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "{}", byte as char)?;
                } else {
                    write!(f, "\\{byte:03}")?;
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

/// MX record - Mail exchange (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MX {
    preference: u16,
    exchange: Name,
}

impl MX {
    /// Creates a new MX record.
    pub fn new(preference: u16, exchange: Name) -> Self {
        Self {
            preference,
            exchange,
        }
    }

    /// Returns the preference (lower is preferred).
    #[inline]
    pub const fn preference(&self) -> u16 {
        self.preference
    }

    /// Returns the mail exchanger host.
    #[inline]
    pub fn exchange(&self) -> &Name {
        &self.exchange
    }
}

/// SRV record - Service location (RFC 2782).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SRV {
    priority: u16,
    weight: u16,
    port: u16,
    target: Name,
}

impl SRV {
    /// Creates a new SRV record.
    pub fn new(priority: u16, weight: u16, port: u16, target: Name) -> Self {
        Self {
            priority,
            weight,
            port,
            target,
        }
    }

    /// Returns the priority.
    #[inline]
    pub const fn priority(&self) -> u16 {
        self.priority
    }

    /// Returns the weight.
    #[inline]
    pub const fn weight(&self) -> u16 {
        self.weight
    }

    /// Returns the port.
    #[inline]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the target host.
    #[inline]
    pub fn target(&self) -> &Name {
        &self.target
    }
}

/// SOA record - Start of Authority (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SOA {
    /// Primary name server for the zone.
    mname: Name,
    /// Mailbox of the responsible person (@ replaced with .).
    rname: Name,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    /// Minimum TTL / negative caching TTL (seconds).
    minimum: u32,
}

impl SOA {
    /// Creates a new SOA record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        Self {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// Returns the primary name server.
    #[inline]
    pub fn mname(&self) -> &Name {
        &self.mname
    }

    /// Returns the responsible mailbox.
    #[inline]
    pub fn rname(&self) -> &Name {
        &self.rname
    }

    /// Returns the serial number.
    #[inline]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Returns the refresh interval.
    #[inline]
    pub const fn refresh(&self) -> u32 {
        self.refresh
    }

    /// Returns the retry interval.
    #[inline]
    pub const fn retry(&self) -> u32 {
        self.retry
    }

    /// Returns the expire time.
    #[inline]
    pub const fn expire(&self) -> u32 {
        self.expire
    }

    /// Returns the minimum TTL.
    #[inline]
    pub const fn minimum(&self) -> u32 {
        self.minimum
    }
}

impl fmt::Display for SOA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname, self.rname, self.serial, self.refresh, self.retry, self.expire, self.minimum
        )
    }
}

/// CAA record - Certification Authority Authorization (RFC 8659).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CAA {
    flags: u8,
    tag: String,
    value: String,
}

impl CAA {
    /// Creates a new CAA record.
    pub fn new(flags: u8, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flags,
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// Returns the raw flags octet.
    #[inline]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns true if the issuer-critical bit is set.
    #[inline]
    pub const fn is_critical(&self) -> bool {
        self.flags & 0x80 != 0
    }

    /// Returns the property tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the property value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Record data for one of the servable kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RData {
    /// IPv4 address
    A(Ipv4Addr),
    /// IPv6 address
    AAAA(Ipv6Addr),
    /// Canonical name target
    CNAME(Name),
    /// Name server host
    NS(Name),
    /// Text strings
    TXT(TXT),
    /// Mail exchange
    MX(MX),
    /// Service location
    SRV(SRV),
    /// Start of authority
    SOA(SOA),
    /// Certification authority authorization
    CAA(CAA),
}

impl RData {
    /// Returns the record kind of this data.
    pub const fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::AAAA(_) => RecordType::AAAA,
            Self::CNAME(_) => RecordType::CNAME,
            Self::NS(_) => RecordType::NS,
            Self::TXT(_) => RecordType::TXT,
            Self::MX(_) => RecordType::MX,
            Self::SRV(_) => RecordType::SRV,
            Self::SOA(_) => RecordType::SOA,
            Self::CAA(_) => RecordType::CAA,
        }
    }

    /// Returns the host whose addresses belong in the additional section.
    ///
    /// Only NS, MX and SRV records reference such a host.
    pub fn glue_target(&self) -> Option<&Name> {
        match self {
            Self::NS(host) => Some(host),
            Self::MX(mx) => Some(mx.exchange()),
            Self::SRV(srv) => Some(srv.target()),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(addr) => write!(f, "{addr}"),
            Self::AAAA(addr) => write!(f, "{addr}"),
            Self::CNAME(name) | Self::NS(name) => write!(f, "{name}"),
            Self::TXT(txt) => write!(f, "{txt}"),
            Self::MX(mx) => write!(f, "{} {}", mx.preference, mx.exchange),
            Self::SRV(srv) => write!(
                f,
                "{} {} {} {}",
                srv.priority, srv.weight, srv.port, srv.target
            ),
            Self::SOA(soa) => write!(f, "{soa}"),
            Self::CAA(caa) => write!(f, "{} {} \"{}\"", caa.flags, caa.tag, caa.value),
        }
    }
}

/// A materialized resource record of class IN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    name: Name,
    ttl: u32,
    data: RData,
}

impl Record {
    /// Creates a new record.
    pub fn new(name: Name, ttl: u32, data: RData) -> Self {
        Self { name, ttl, data }
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the record data.
    #[inline]
    pub fn data(&self) -> &RData {
        &self.data
    }

    /// Returns the record kind.
    #[inline]
    pub const fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    /// Returns a copy of this record under a different owner name.
    pub fn with_name(&self, name: Name) -> Self {
        Self {
            name,
            ttl: self.ttl,
            data: self.data.clone(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\tIN\t{}\t{}",
            self.name,
            self.ttl,
            self.record_type(),
            self.data
        )
    }
}
