use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Provider;

/// Opaque handle a relay returns for one stored chunk.
///
/// `via` is only set when the chunk landed on a relay other than the
/// record's provider (a fallback upload); such locators serialize as
/// `{"link": .., "provider": ..}`, all others as a bare string so the
/// stored link list stays a plain JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub link: String,
    pub via: Option<Provider>,
}

impl Locator {
    pub fn new(link: impl Into<String>) -> Self {
        Self { link: link.into(), via: None }
    }

    pub fn via(link: impl Into<String>, provider: Provider) -> Self {
        Self { link: link.into(), via: Some(provider) }
    }

    /// Provider to ask the proxy for, given the record's own provider.
    pub fn provider<'a>(&'a self, record_provider: &'a Provider) -> &'a Provider {
        self.via.as_ref().unwrap_or(record_provider)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Bare(String),
    Routed { link: String, provider: Provider },
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match &self.via {
            None => LocatorRepr::Bare(self.link.clone()),
            Some(provider) => LocatorRepr::Routed {
                link: self.link.clone(),
                provider: provider.clone(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match LocatorRepr::deserialize(deserializer)? {
            LocatorRepr::Bare(link) => Locator::new(link),
            LocatorRepr::Routed { link, provider } => Locator::via(link, provider),
        })
    }
}
