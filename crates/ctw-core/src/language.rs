use crate::error::{CoreError, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static LANGCODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,8})*$").expect("langcode pattern is valid")
});

/// A language code such as `en`, `fr` or `pt-br`.
///
/// Codes are normalized to lowercase on parse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Langcode(String);

impl Langcode {
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let normalized = code.as_ref().trim().to_ascii_lowercase();
        if !LANGCODE_PATTERN.is_match(&normalized) {
            return Err(CoreError::invalid_langcode(code.as_ref()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Langcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Langcode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Langcode::new(s)
    }
}

impl AsRef<str> for Langcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Langcode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Langcode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Langcode::new(&s).map_err(serde::de::Error::custom)
    }
}
