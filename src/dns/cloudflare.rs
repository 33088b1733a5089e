//! A [`DnsProvider`][super::DnsProvider] backed by the [Cloudflare v4 API][api].
//!
//! [api]: https://developers.cloudflare.com/api/operations/dns-records-for-a-zone-list-dns-records
use crate::config::CloudflareConfig;
use crate::dns::{child_labels, DnsProvider, DnsRecord, RecordCreation};
use crate::error::Error;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Instant;

/// Error codes Cloudflare uses for "an identical record already exists" and
/// "a record with that host already exists".
const RECORD_EXISTS_CODES: [u64; 2] = [81057, 81058];

const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Cloudflare {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    code: u64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct Record {
    id: String,
    name: String,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, Error> {
        match (self.success, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Cloudflare {
                messages: self
                    .errors
                    .iter()
                    .map(|e| format!("{} ({})", e.message, e.code))
                    .collect(),
            }),
        }
    }

    fn record_exists(&self) -> bool {
        self.errors
            .iter()
            .any(|e| RECORD_EXISTS_CODES.contains(&e.code))
    }
}

impl Cloudflare {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client can't be constructed.
    pub fn new(config: &CloudflareConfig) -> Result<Self, Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{zone_id}/dns_records", self.api_base)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, Error> {
        let request = request.bearer_auth(&self.token).build()?;
        let (method, url) = (request.method().clone(), request.url().clone());
        let start = Instant::now();
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%method, %url, elapsed = ?start.elapsed(), "cloudflare request failed: {err}");
                return Err(err.into());
            }
        };
        tracing::info!(%method, %url, status = %response.status(), elapsed = ?start.elapsed(), "cloudflare request");
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait::async_trait]
impl DnsProvider for Cloudflare {
    async fn list_subdomains(
        &self,
        root_domain: &str,
        zone_id: &str,
    ) -> Result<BTreeSet<String>, Error> {
        let request = self
            .client
            .get(self.records_url(zone_id))
            .query(&[("per_page", LIST_PAGE_SIZE)]);
        let records: Vec<Record> = self.send(request).await?.into_result()?;
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
        let request = self.client.post(self.records_url(zone_id)).json(record);
        let response: ApiResponse<serde_json::Value> = self.send(request).await?;
        if response.record_exists() {
            return Ok(RecordCreation::AlreadyExists);
        }
        response.into_result()?;
        Ok(RecordCreation::Created)
    }

    async fn delete_record(&self, zone_id: &str, full_name: &str) -> Result<(), Error> {
        let request = self
            .client
            .get(self.records_url(zone_id))
            .query(&[("name", full_name)]);
        let records: Vec<Record> = self.send(request).await?.into_result()?;
        let Some(record) = records.first() else {
            tracing::debug!("no DNS record named \"{full_name}\" in zone {zone_id}");
            return Ok(());
        };

        tracing::debug!("deleting DNS record {} (\"{}\")", record.id, record.name);
        let request = self
            .client
            .delete(format!("{}/{}", self.records_url(zone_id), record.id));
        self.send::<serde_json::Value>(request)
            .await?
            .into_result()?;
        Ok(())
    }
}
