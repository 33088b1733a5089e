use crate::dns::{child_labels, DnsProvider, DnsRecord, RecordCreation};
use crate::error::Error;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Zones held in process memory, keyed by zone id. Record names are stored fully qualified.
///
/// Failures can be injected per operation with [`InMemoryDns::fail_create`] and
/// [`InMemoryDns::fail_delete`].
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryDns {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    zone_names: HashMap<String, String>,
    records: HashMap<String, Vec<DnsRecord>>,
    fail_create: bool,
    fail_delete: bool,
}

impl InMemoryDns {
    /// Create an empty store serving the given `zone id -> zone name` mapping.
    #[must_use]
    pub fn new<'a>(zones: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let dns = Self::default();
        dns.lock().zone_names = zones
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_ascii_lowercase()))
            .collect();
        dns
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    /// The records currently held for `zone_id`.
    #[must_use]
    pub fn records(&self, zone_id: &str) -> Vec<DnsRecord> {
        self.lock()
            .records
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unknown_zone(zone_id: &str) -> Error {
        Error::Cloudflare {
            messages: vec![format!("unknown zone {zone_id}")],
        }
    }
}

impl State {
    fn qualify(&self, zone_id: &str, name: &str) -> Option<String> {
        let zone = self.zone_names.get(zone_id)?;
        let name = name.to_ascii_lowercase();
        if name == *zone || name.ends_with(&format!(".{zone}")) {
            Some(name)
        } else {
            Some(format!("{name}.{zone}"))
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for InMemoryDns {
    async fn list_subdomains(
        &self,
        root_domain: &str,
        zone_id: &str,
    ) -> Result<BTreeSet<String>, Error> {
        let state = self.lock();
        if !state.zone_names.contains_key(zone_id) {
            return Err(Self::unknown_zone(zone_id));
        }
        let records = state.records.get(zone_id).map_or(&[][..], Vec::as_slice);
        Ok(child_labels(
            root_domain,
            records.iter().map(|r| r.name.as_str()),
        ))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
    ) -> Result<RecordCreation, Error> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(Error::Cloudflare {
                messages: vec!["record creation refused".to_string()],
            });
        }
        let name = state
            .qualify(zone_id, &record.name)
            .ok_or_else(|| Self::unknown_zone(zone_id))?;
        let records = state.records.entry(zone_id.to_string()).or_default();
        if records.iter().any(|r| r.name == name) {
            return Ok(RecordCreation::AlreadyExists);
        }
        records.push(DnsRecord {
            name,
            ..record.clone()
        });
        Ok(RecordCreation::Created)
    }

    async fn delete_record(&self, zone_id: &str, full_name: &str) -> Result<(), Error> {
        let mut state = self.lock();
        if state.fail_delete {
            return Err(Error::Cloudflare {
                messages: vec!["record deletion refused".to_string()],
            });
        }
        let full_name = full_name.to_ascii_lowercase();
        if let Some(records) = state.records.get_mut(zone_id) {
            if let Some(pos) = records.iter().position(|r| r.name == full_name) {
                records.remove(pos);
            }
        }
        Ok(())
    }
}
