use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Messaging platform whose attachment mechanism stores the chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    Discord,
    Telegram,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Discord => "discord",
            Provider::Telegram => "telegram",
            Provider::Other(name) => name,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "discord" => Provider::Discord,
            "telegram" => Provider::Telegram,
            other => Provider::Other(other.to_string()),
        })
    }
}

impl From<&str> for Provider {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(provider) => provider,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Provider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Provider::from(raw.as_str()))
    }
}
