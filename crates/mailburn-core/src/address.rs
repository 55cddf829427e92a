//! Temporary mailbox addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A routable mailbox address of the form `login@domain`.
///
/// Parsing only checks the shape the mailbox service needs to split the
/// address into its query parameters; it is not an RFC 5322 validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemporaryAddress {
    raw: String,
    at: usize,
}

impl TemporaryAddress {
    /// Parses an address, requiring exactly one `@` with text on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let mut positions = address.match_indices('@').map(|(i, _)| i);
        let (Some(at), None) = (positions.next(), positions.next()) else {
            return Err(Error::InvalidAddress(address.to_string()));
        };
        if at == 0 || at + 1 == address.len() {
            return Err(Error::InvalidAddress(address.to_string()));
        }
        Ok(Self {
            raw: address.to_string(),
            at,
        })
    }

    /// Part before the `@`.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.raw[..self.at]
    }

    /// Part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.raw[self.at + 1..]
    }

    /// Full address text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for TemporaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TemporaryAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TemporaryAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TemporaryAddress> for String {
    fn from(address: TemporaryAddress) -> Self {
        address.raw
    }
}

impl AsRef<str> for TemporaryAddress {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
