//! DNS domain name representation and operations.
//!
//! Names are held in presentation form, lowercased and fully qualified
//! (trailing dot), so equality and hashing are plain string operations and
//! follow the case-insensitive comparison rules of RFC 1035.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host marker used by the record table for the zone apex.
pub const APEX: &str = "@";

/// Leftmost label of a wildcard owner name.
pub const WILDCARD: &str = "*";

/// A fully-qualified DNS domain name.
///
/// # Example
///
/// ```rust
/// use tabula_proto::name::Name;
/// use std::str::FromStr;
///
/// let name = Name::from_str("WWW.Example.com").unwrap();
/// assert_eq!(name.as_str(), "www.example.com.");
/// assert_eq!(name.label_count(), 3);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(CompactString);

impl Name {
    /// Returns the root name (`.`).
    pub fn root() -> Self {
        Self(CompactString::const_new("."))
    }

    /// Builds the owner name of a stored row from its host and zone columns.
    ///
    /// The apex marker `@` (or an empty host) yields the zone itself,
    /// anything else is prefixed to the zone.
    pub fn from_relative(host: &str, zone: &Name) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() || host == APEX {
            return Ok(zone.clone());
        }
        if zone.is_root() {
            return host.parse();
        }
        format!("{}.{}", host.trim_end_matches('.'), zone.as_str()).parse()
    }

    /// Returns the presentation form, always ending in a dot.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root name.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// Returns the number of labels, not counting the root.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Iterates the labels from left to right, not including the root.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.0
            .trim_end_matches('.')
            .split('.')
            .filter(|label| !label.is_empty())
    }

    /// Returns the leftmost label, or `None` for the root.
    pub fn first_label(&self) -> Option<&str> {
        self.labels().next()
    }

    /// Returns true if the leftmost label is `*`.
    pub fn is_wildcard(&self) -> bool {
        self.first_label() == Some(WILDCARD)
    }

    /// Returns the parent domain (removes the leftmost label).
    ///
    /// Returns `None` for the root domain.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.find('.') {
            Some(dot) if dot + 1 < self.0.len() => Some(Self(CompactString::from(&self.0[dot + 1..]))),
            _ => Some(Self::root()),
        }
    }

    /// Returns `*.<self>`.
    pub fn to_wildcard(&self) -> Result<Self> {
        if self.is_root() {
            return WILDCARD.parse();
        }
        format!("{}.{}", WILDCARD, self.as_str()).parse()
    }

    /// Returns true if this name equals `zone` or lies beneath it at a label
    /// boundary (`badexample.com.` is not under `example.com.`).
    pub fn is_subdomain_of(&self, zone: &Name) -> bool {
        if zone.is_root() || self == zone {
            return true;
        }
        self.0
            .strip_suffix(zone.as_str())
            .map_or(false, |prefix| prefix.ends_with('.'))
    }

    /// Returns this name relative to `zone` in the form the record table stores
    /// hosts: `@` for the apex, otherwise the leading labels without the
    /// separating dot. Returns `None` when the name is outside the zone.
    pub fn relative_to(&self, zone: &Name) -> Option<String> {
        if self == zone {
            return Some(APEX.to_string());
        }
        if !self.is_subdomain_of(zone) {
            return None;
        }
        if zone.is_root() {
            return Some(self.0.trim_end_matches('.').to_string());
        }
        self.0
            .strip_suffix(zone.as_str())
            .map(|prefix| prefix.trim_end_matches('.').to_string())
    }

    fn validate(input: &str) -> Result<()> {
        let trimmed = input.trim_end_matches('.');
        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong {
                length: trimmed.len(),
            });
        }
        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(Error::EmptyLabel {
                    name: input.to_string(),
                });
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong {
                    length: label.len(),
                });
            }
        }
        if let Some(ch) = input
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::InvalidCharacter {
                ch,
                name: input.to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::EmptyName);
        }
        if s == "." {
            return Ok(Self::root());
        }
        if s.ends_with("..") {
            return Err(Error::EmptyLabel {
                name: s.to_string(),
            });
        }

        Self::validate(s)?;

        let mut normalized = CompactString::with_capacity(s.len() + 1);
        normalized.push_str(&s.to_ascii_lowercase());
        if !normalized.ends_with('.') {
            normalized.push('.');
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0.into()
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}
