//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated application API key.
///
/// This newtype ensures the API key is non-empty and provides type safety
/// to prevent accidental misuse of raw strings.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated application API secret key.
///
/// This newtype ensures the secret key is non-empty and masks its value
/// in debug output to prevent accidental exposure in logs.
///
/// # Security
///
/// The `Debug` implementation masks the secret value, displaying only
/// `ApiSecretKey(*****)` instead of the actual key.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::ApiSecretKey;
///
/// let secret = ApiSecretKey::new("my-secret").unwrap();
/// assert_eq!(format!("{:?}", secret), "ApiSecretKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecretKey(String);

impl ApiSecretKey {
    /// Creates a new validated API secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiSecretKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiSecretKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiSecretKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecretKey(*****)")
    }
}

/// A validated, canonical shop domain.
///
/// Shop domains are the natural key relating sessions to shops, so every
/// value is normalized to a canonical lowercase host string on construction.
/// Two textual spellings of the same host (`My-Shop.Example.COM`,
/// `my-shop.example.com/`) always produce the same `ShopDomain`.
///
/// # Accepted Formats
///
/// Any syntactically valid host name: dot-separated labels of lowercase
/// letters, digits, and hyphens, where no label starts or ends with a hyphen.
/// Trailing slashes and surrounding whitespace are stripped; uppercase is
/// folded to lowercase.
///
/// Use [`ShopDomain::from_url`] to extract the host from a full destination
/// URL such as the `dest` claim of a session token.
///
/// # Serialization
///
/// `ShopDomain` serializes to and deserializes from the canonical host string:
///
/// ```rust
/// use shopify_app_auth::ShopDomain;
///
/// let domain = ShopDomain::new("my-shop.example.com").unwrap();
/// let json = serde_json::to_string(&domain).unwrap();
/// assert_eq!(json, r#""my-shop.example.com""#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Creates a new validated shop domain from a host string.
    ///
    /// The input is trimmed, stripped of trailing slashes, and lowercased
    /// before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if the host is empty or
    /// contains characters outside `[a-z0-9.-]`.
    pub fn new(domain: impl Into<String>) -> Result<Self, ConfigError> {
        let domain = domain.into();
        let domain = domain.trim().trim_end_matches('/').to_lowercase();

        if !Self::is_valid_host(&domain) {
            return Err(ConfigError::InvalidShopDomain { domain });
        }

        Ok(Self(domain))
    }

    /// Creates a shop domain from a URL, keeping only the host portion.
    ///
    /// The scheme, port, path, query, and fragment are all discarded:
    /// `https://my-shop.example.com/admin` yields `my-shop.example.com`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if no valid host can be
    /// extracted from the URL.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let rest = url.trim();
        let rest = rest.find("://").map_or(rest, |i| &rest[i + 3..]);

        // Host ends at port, path, query, or fragment
        let host_end = rest.find([':', '/', '?', '#']).unwrap_or(rest.len());

        Self::new(&rest[..host_end])
    }

    fn is_valid_host(host: &str) -> bool {
        if host.is_empty() {
            return false;
        }

        host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ShopDomain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ShopDomain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}
