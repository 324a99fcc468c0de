//! # Tabula DNS Protocol Types
//!
//! The protocol vocabulary shared by every Tabula crate:
//!
//! - **Names**: normalized, fully-qualified domain names with label-boundary
//!   suffix matching
//! - **Types**: the nine record kinds Tabula serves plus the query types it
//!   must recognize in order to refuse them
//! - **Record data**: validated, typed resource records ready for wire assembly
//!
//! Wire encoding is deliberately absent; the surrounding server runtime owns it.
//!
//! ## Example
//!
//! ```rust
//! use tabula_proto::{Name, RecordType};
//! use std::str::FromStr;
//!
//! let zone = Name::from_str("Example.COM").unwrap();
//! let name = Name::from_str("www.example.com.").unwrap();
//! assert!(name.is_subdomain_of(&zone));
//! assert_eq!(name.relative_to(&zone).as_deref(), Some("www"));
//! assert_eq!(RecordType::from_str("aaaa").unwrap(), RecordType::AAAA);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod name;
pub mod rcode;
pub mod rdata;
pub mod rtype;

pub use error::{Error, Result};
pub use name::{Name, APEX, WILDCARD};
pub use rcode::ResponseCode;
pub use rdata::{RData, Record, CAA, MX, SOA, SRV, TXT};
pub use rtype::{QueryType, RecordType};

/// Maximum length of a DNS label (63 bytes per RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a domain name in presentation form, without the trailing dot.
pub const MAX_NAME_LENGTH: usize = 253;

/// Maximum length of a single TXT character-string (RFC 1035 section 3.3).
pub const MAX_CHARACTER_STRING: usize = 255;
