//! Validated identifiers for users and sessions.

use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Shape an identifier must have before it reaches a store or a log line.
struct IdRules {
    kind: &'static str,
    max_len: usize,
    punctuation: &'static [char],
}

impl IdRules {
    fn check(&self, raw: &str) -> Result<String> {
        let value = raw.trim();
        let kind = self.kind;
        if value.is_empty() {
            return Err(Error::InvalidId(format!("{kind} must not be empty")));
        }
        if value.len() > self.max_len {
            return Err(Error::InvalidId(format!(
                "{kind} is {} bytes, limit is {}",
                value.len(),
                self.max_len
            )));
        }
        if let Some(bad) = value
            .chars()
            .find(|ch| !ch.is_ascii_alphanumeric() && !self.punctuation.contains(ch))
        {
            return Err(Error::InvalidId(format!("{kind} contains {bad:?}")));
        }
        Ok(value.to_owned())
    }
}

const USER_ID: IdRules = IdRules {
    kind: "user id",
    max_len: 128,
    punctuation: &[':', '_', '-', '.'],
};

const SESSION_ID: IdRules = IdRules {
    kind: "session id",
    max_len: 128,
    punctuation: &[':', '_', '-', '.'],
};

/// Opaque user identifier, the key of the profile store.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct UserId(String);

/// Real-time session identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct SessionId(String);

impl UserId {
    /// Trims and validates `value`.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        USER_ID.check(value.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SessionId {
    /// Trims and validates `value`.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        SESSION_ID.check(value.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Conversions shared by both identifiers; all of them go through `new`.
macro_rules! id_conversions {
    ($($name:ident),+) => {$(
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    )+};
}

id_conversions!(UserId, SessionId);
