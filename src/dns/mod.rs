//! DNS record automation for delegated zones.
//!
//! Two implementations of [`DnsProvider`] are provided, [`cloudflare::Cloudflare`] which talks
//! to the Cloudflare v4 API, and [`memory::InMemoryDns`] which keeps zones in process memory.

use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

pub mod cloudflare;
pub mod memory;

pub use cloudflare::Cloudflare;
pub use memory::InMemoryDns;

/// TTL value meaning "let the provider decide".
pub const AUTOMATIC_TTL: u32 = 1;

/// `DynDnsProvider` is a type alias for a [`DnsProvider`] shared between request workers.
#[allow(clippy::module_name_repetitions)]
pub type DynDnsProvider = Arc<dyn DnsProvider + Send + Sync>;

/// A record to create in a zone.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub kind: String,
    /// Record name, relative to the zone (`svc1`) or fully qualified.
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl DnsRecord {
    /// An address record pointing `name` at the proxy host, routed through the provider's proxy.
    #[must_use]
    pub fn proxied_address(name: &str, node_ip: IpAddr) -> Self {
        let kind = match node_ip {
            IpAddr::V4(_) => "A",
            IpAddr::V6(_) => "AAAA",
        };
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            content: node_ip.to_string(),
            ttl: AUTOMATIC_TTL,
            proxied: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCreation {
    Created,
    /// The provider already holds a record with this name.
    AlreadyExists,
}

#[async_trait::async_trait]
#[allow(clippy::module_name_repetitions)]
pub trait DnsProvider {
    /// The distinct labels directly below `root_domain` that have a record of their own in the
    /// zone, lowercased. `api.example.com` contributes `api`, `x.api.example.com` contributes
    /// nothing.
    async fn list_subdomains(
        &self,
        root_domain: &str,
        zone_id: &str,
    ) -> Result<BTreeSet<String>, Error>;

    /// Create `record` in the zone.
    async fn create_record(&self, zone_id: &str, record: &DnsRecord)
        -> Result<RecordCreation, Error>;

    /// Delete the first record named `full_name`. Deleting a name with no records succeeds.
    async fn delete_record(&self, zone_id: &str, full_name: &str) -> Result<(), Error>;
}

/// Collect the label of every name in `names` that is a direct child of `root_domain`.
/// Deeper names are skipped.
pub(crate) fn child_labels<'a>(
    root_domain: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    let suffix = format!(".{}", root_domain.to_ascii_lowercase());
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.to_ascii_lowercase();
            let label = name.strip_suffix(&suffix)?;
            (!label.is_empty() && !label.contains('.')).then(|| label.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_labels() {
        let labels = child_labels(
            "example.com",
            [
                "example.com",
                "api.example.com",
                "x.API.example.com",
                "_acme-challenge.svc1.example.com",
                "www.example.com",
                "www.example.org",
                "notexample.com",
            ],
        );
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec!["api".to_string(), "www".to_string()]
        );
    }

    #[test]
    fn test_proxied_address() {
        let v4 = DnsRecord::proxied_address("svc1", "203.0.113.7".parse().unwrap());
        assert_eq!(v4.kind, "A");
        assert_eq!(v4.content, "203.0.113.7");
        assert_eq!(v4.ttl, AUTOMATIC_TTL);
        assert!(v4.proxied);

        let v6 = DnsRecord::proxied_address("svc1", "2001:db8::1".parse().unwrap());
        assert_eq!(v6.kind, "AAAA");
    }

    #[test]
    fn test_record_serializes_as_provider_payload() {
        let record = DnsRecord::proxied_address("svc1", "203.0.113.7".parse().unwrap());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "type": "A",
                "name": "svc1",
                "content": "203.0.113.7",
                "ttl": 1,
                "proxied": true
            })
        );
    }
}
