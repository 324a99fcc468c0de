//! Conversion of stored rows into typed records.
//!
//! Each kind has its own validation rule. A row that breaks its rule is
//! [`Dropped`] rather than failing the query, so one bad row cannot blind
//! the rest of a zone.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use tabula_proto::{Name, RData, Record, RecordType, CAA, MX, SOA, SRV, TXT};
use tabula_store::RawRecord;
use thiserror::Error;

use crate::DEFAULT_TTL;

/// SOA refresh interval used when the row names no primary server.
pub const SOA_REFRESH: u32 = 86400;

/// SOA retry interval used when the row names no primary server.
pub const SOA_RETRY: u32 = 7200;

/// SOA expire time used when the row names no primary server.
pub const SOA_EXPIRE: u32 = 3600;

/// Why a row produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Dropped {
    /// A required column is empty.
    #[error("{field} is empty")]
    Empty {
        /// Column name.
        field: &'static str,
    },

    /// A column does not parse for the row's kind.
    #[error("{field} is not valid: {value:?}")]
    Invalid {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl Dropped {
    fn invalid(field: &'static str, value: &str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
        }
    }
}

/// Turns [`RawRecord`] rows into [`Record`]s.
#[derive(Debug, Clone, Copy)]
pub struct Materializer {
    default_ttl: u32,
}

impl Materializer {
    /// Creates a materializer applying `default_ttl` to rows stored with TTL 0.
    pub const fn new(default_ttl: u32) -> Self {
        Self { default_ttl }
    }

    /// Returns the default TTL.
    #[inline]
    pub const fn default_ttl(&self) -> u32 {
        self.default_ttl
    }

    /// Returns the TTL a row is served with.
    #[inline]
    pub const fn ttl(&self, row: &RawRecord) -> u32 {
        if row.ttl == 0 {
            self.default_ttl
        } else {
            row.ttl
        }
    }

    /// Converts one row.
    pub fn materialize(&self, row: &RawRecord) -> Result<Record, Dropped> {
        let owner = row.fqdn().map_err(|_| Dropped::invalid("host", &row.host))?;
        let ttl = self.ttl(row);

        let data = match row.rtype {
            RecordType::A => RData::A(address::<Ipv4Addr>(&row.data)?),
            RecordType::AAAA => RData::AAAA(address::<Ipv6Addr>(&row.data)?),
            RecordType::CNAME => RData::CNAME(hostname("data", &row.data)?),
            RecordType::NS => RData::NS(hostname("data", &row.data)?),
            RecordType::TXT => {
                RData::TXT(TXT::from_text(&row.data).ok_or(Dropped::Empty { field: "data" })?)
            }
            RecordType::MX => RData::MX(MX::new(row.priority, hostname("data", &row.data)?)),
            RecordType::SRV => RData::SRV(SRV::new(
                row.priority,
                row.weight,
                row.port,
                hostname("target", &row.target)?,
            )),
            RecordType::SOA => RData::SOA(soa(row, &owner, ttl)?),
            RecordType::CAA => RData::CAA(caa(row)?),
        };

        Ok(Record::new(owner, ttl, data))
    }
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn address<T: FromStr>(data: &str) -> Result<T, Dropped> {
    let data = data.trim();
    if data.is_empty() {
        return Err(Dropped::Empty { field: "data" });
    }
    data.parse().map_err(|_| Dropped::invalid("data", data))
}

fn hostname(field: &'static str, value: &str) -> Result<Name, Dropped> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Dropped::Empty { field });
    }
    Name::from_str(value).map_err(|_| Dropped::invalid(field, value))
}

/// Mailbox names may be stored as `user@domain`; the first `@` becomes a label separator.
fn mailbox(value: &str) -> Result<Name, Dropped> {
    hostname("resp_person", &value.trim().replacen('@', ".", 1))
}

fn soa(row: &RawRecord, owner: &Name, ttl: u32) -> Result<SOA, Dropped> {
    let serial = if row.serial == 0 { clock_serial() } else { row.serial };

    if row.primary_ns.trim().is_empty() {
        let mname = Name::from_relative("ns1", owner).map_err(|_| Dropped::invalid("host", &row.host))?;
        let rname =
            Name::from_relative("hostmaster", owner).map_err(|_| Dropped::invalid("host", &row.host))?;
        return Ok(SOA::new(mname, rname, serial, SOA_REFRESH, SOA_RETRY, SOA_EXPIRE, ttl));
    }

    let mname = hostname("primary_ns", &row.primary_ns)?;
    let rname = if row.resp_person.trim().is_empty() {
        Name::from_relative("hostmaster", owner).map_err(|_| Dropped::invalid("host", &row.host))?
    } else {
        mailbox(&row.resp_person)?
    };
    Ok(SOA::new(
        mname,
        rname,
        serial,
        row.refresh,
        row.retry,
        row.expire,
        row.minimum,
    ))
}

fn caa(row: &RawRecord) -> Result<CAA, Dropped> {
    let tag = row.tag.trim();
    if tag.is_empty() {
        return Err(Dropped::Empty { field: "tag" });
    }
    if row.data.is_empty() {
        return Err(Dropped::Empty { field: "data" });
    }
    Ok(CAA::new(row.flag, tag, row.data.as_str()))
}

/// Seconds since the epoch, for rows without a stored serial.
///
/// Not monotonic across clock changes; zones that are transferred should
/// store their own serial.
fn clock_serial() -> u32 {
    u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX)
}
