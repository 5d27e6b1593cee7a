//! Onion address validation.
//!
//! This module wraps the service locator handed back by the onion service
//! once it is reachable. The address is treated as opaque: no assumptions
//! are made about its suffix, length, or character set beyond it being a
//! single non-empty token.
//!
//! ## Example
//!
//! ```rust,ignore
//! use veildrop_core::address::OnionAddress;
//!
//! let addr = OnionAddress::parse("openpravyvc6spbd4flzn4g2iqu4sxzsizbtb5aqec25t76dnoo5w7yd.onion")?;
//! println!("reachable at {addr}");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A validated onion service address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnionAddress {
    address: String,
}

impl OnionAddress {
    /// Parse and validate an onion address from a string.
    ///
    /// Leading and trailing whitespace is trimmed. The address must be
    /// non-empty and must not contain interior whitespace; it is otherwise
    /// opaque.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty or contains whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(Error::InvalidOnionAddress("address is empty".to_string()));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::InvalidOnionAddress(format!(
                "address '{trimmed}' contains whitespace"
            )));
        }

        Ok(Self {
            address: trimmed.to_string(),
        })
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Display for OnionAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
