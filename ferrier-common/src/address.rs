//! Mailbox address model.
//!
//! A mailbox is a `local_part@domain` pair. Parsing here is deliberately
//! minimal: the delivery engine only needs the domain for routing, so the
//! rules are "exactly one `@`, nothing empty on either side". Full RFC 5322
//! address grammar is out of scope.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing a mailbox address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address contains no `@` separator.
    #[error("address has no '@' separator: {0}")]
    MissingSeparator(String),

    /// The local part (before `@`) is empty.
    #[error("address has an empty local part: {0}")]
    EmptyLocalPart(String),

    /// The domain (after `@`) is empty.
    #[error("address has an empty domain: {0}")]
    EmptyDomain(String),
}

/// A parsed `local_part@domain` mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mailbox {
    local_part: String,
    domain: String,
}

impl Mailbox {
    /// Parse a textual mailbox address.
    ///
    /// # Errors
    /// Returns an `AddressError` if the address has no `@`, or either side
    /// of the `@` is empty.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        let Some((local_part, domain)) = address.rsplit_once('@') else {
            return Err(AddressError::MissingSeparator(address.to_string()));
        };

        if local_part.is_empty() {
            return Err(AddressError::EmptyLocalPart(address.to_string()));
        }
        if domain.is_empty() {
            return Err(AddressError::EmptyDomain(address.to_string()));
        }

        Ok(Self {
            local_part: local_part.to_string(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    /// The part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// The routing domain (after the `@`), lowercased.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl FromStr for Mailbox {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}
