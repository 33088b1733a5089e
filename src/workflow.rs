//! Route provisioning.
//!
//! [`Provisioner::add_route`] and [`Provisioner::remove_route`] sequence the
//! [certificate][crate::cert], [DNS][crate::dns] and [proxy config][crate::proxy]
//! collaborators. None of them share a transaction, so nothing is rolled back: existence and
//! conflict checks run before the first mutation, and every failure names the [`Stage`] that
//! was reached so the whole (idempotent) operation can be retried.
//!
//! # Adding a route
//!
//! A *delegated* domain (covered by a managed zone) needs the zone certificate to exist
//! already, then gets a proxied address record created at the DNS provider. A *manual* domain
//! gets its own certificate issued. Both then have their site config rendered, enabled and the
//! proxy reloaded.
//!
//! # Removing a route
//!
//! The site config is removed and the proxy reloaded first, since that is what stops traffic
//! from being routed. Afterwards a delegated domain's DNS record is deleted (failures are only
//! logged unless [`DnsCleanup::Strict`] is configured) and a manual domain's certificate is
//! deleted (failures are reported).
//!
//! Operations on the same domain are serialized by [`DomainLocks`]; operations on different
//! domains run concurrently.

use crate::cert::DynCertificateAuthority;
use crate::config::{Config, DnsCleanup};
use crate::dns::{DnsRecord, DynDnsProvider, RecordCreation};
use crate::error::Error;
use crate::proxy::DynProxyConfigWriter;
use crate::route::Route;
use crate::validate::{normalize, validate_domain, validate_target};
use crate::zones::{ZoneMatch, ZoneTable};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The step of a workflow run a failure happened in.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Validation,
    CertificateLookup,
    CertificateMissing,
    CertificateIssue,
    DnsLookup,
    DnsCreate,
    ConfigWrite,
    ConfigEnable,
    ConfigRemove,
    Reload,
    DnsDelete,
    CertificateDelete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::CertificateLookup => "certificate-lookup",
            Stage::CertificateMissing => "certificate-missing",
            Stage::CertificateIssue => "certificate-issue",
            Stage::DnsLookup => "dns-lookup",
            Stage::DnsCreate => "dns-create",
            Stage::ConfigWrite => "config-write",
            Stage::ConfigEnable => "config-enable",
            Stage::ConfigRemove => "config-remove",
            Stage::Reload => "reload",
            Stage::DnsDelete => "dns-delete",
            Stage::CertificateDelete => "certificate-delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The DNS zone already holds a record for the requested domain.
    SubdomainTaken,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::SubdomainTaken => f.write_str("subdomain already taken"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Created(Route),
    /// The route (or something else owning its name) is already provisioned.
    Conflict(ConflictReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Deleted,
    /// The route is gone from the proxy, but its DNS record could not be deleted.
    DeletedWithStaleRecord { cause: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    /// Malformed input. No external system was contacted.
    #[error("{field} {value:?} is invalid")]
    Validation { field: &'static str, value: String },

    /// The shared certificate of a managed zone hasn't been provisioned.
    #[error("no certificate for managed zone \"{zone}\"")]
    CertificateMissing { zone: String },

    /// An external system failed. Nothing after `stage` was attempted.
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: Error,
    },

    /// The site config on disk changed but the running proxy didn't pick it up.
    #[error("{stage} failed after the site config changed: {source}")]
    PartialState {
        stage: Stage,
        #[source]
        source: Error,
    },
}

impl ProvisionError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            ProvisionError::Validation { .. } => Stage::Validation,
            ProvisionError::CertificateMissing { .. } => Stage::CertificateMissing,
            ProvisionError::Collaborator { stage, .. }
            | ProvisionError::PartialState { stage, .. } => *stage,
        }
    }

    fn at(stage: Stage) -> impl FnOnce(Error) -> Self {
        move |source| ProvisionError::Collaborator { stage, source }
    }
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per normalized domain. A domain's entry only lives while someone holds or
/// waits for its lock.
#[derive(Debug, Clone, Default)]
pub struct DomainLocks {
    locks: Arc<LockMap>,
}

/// Holds a domain's lock. Dropping it releases the lock and forgets the domain once nobody
/// else is waiting for it.
#[derive(Debug)]
pub struct DomainGuard {
    domain: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DomainGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the mutex under the shard lock, so a count of one means only the map
        // still refers to it.
        self.locks
            .remove_if(&self.domain, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl DomainLocks {
    /// Wait until no other holder has `domain` locked.
    pub async fn lock(&self, domain: &str) -> DomainGuard {
        let mutex = Arc::clone(self.locks.entry(domain.to_string()).or_default().value());
        let guard = mutex.lock_owned().await;
        DomainGuard {
            domain: domain.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Whether no domain is currently locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// The external systems a [`Provisioner`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub certificates: DynCertificateAuthority,
    pub dns: DynDnsProvider,
    pub proxy: DynProxyConfigWriter,
}

/// Process wide settings a [`Provisioner`] reads.
#[derive(Debug, Clone)]
pub struct Settings {
    pub email: String,
    pub node_ip: IpAddr,
    pub dns_cleanup: DnsCleanup,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            email: config.email.clone(),
            node_ip: config.node_ip,
            dns_cleanup: config.dns_cleanup,
        }
    }
}

/// Adds and removes routes. Cheap to clone; clones share their collaborators and locks.
#[derive(Clone)]
pub struct Provisioner {
    zones: Arc<ZoneTable>,
    settings: Arc<Settings>,
    collaborators: Collaborators,
    locks: DomainLocks,
}

impl Provisioner {
    #[must_use]
    pub fn new(zones: ZoneTable, settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            zones: Arc::new(zones),
            settings: Arc::new(settings),
            collaborators,
            locks: DomainLocks::default(),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configured zone table is invalid.
    pub fn from_config(config: &Config, collaborators: Collaborators) -> Result<Self, Error> {
        Ok(Self::new(
            config.zone_table()?,
            Settings::from(config),
            collaborators,
        ))
    }

    /// Provision a route from `domain` to `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionError`] naming the stage that failed. Conflicts are not errors,
    /// they are reported as [`AddOutcome::Conflict`].
    pub async fn add_route(
        &self,
        domain: &str,
        target: &str,
    ) -> Result<AddOutcome, ProvisionError> {
        if !validate_domain(domain) {
            return Err(ProvisionError::Validation {
                field: "domain",
                value: domain.to_string(),
            });
        }
        if !validate_target(target) {
            return Err(ProvisionError::Validation {
                field: "target",
                value: target.to_string(),
            });
        }
        let domain = normalize(domain);
        let target = normalize(target);

        let _guard = self.locks.lock(&domain).await;

        let cert_domain = match self.zones.match_zone(&domain) {
            Some(zone) => match self.register_delegated(&domain, &zone).await? {
                Some(conflict) => return Ok(AddOutcome::Conflict(conflict)),
                None => zone.parent_domain().to_string(),
            },
            None => {
                self.issue_manual(&domain).await?;
                domain.clone()
            }
        };

        let route = Route {
            domain,
            target,
            cert_domain,
        };
        self.write_config(&route).await?;
        tracing::info!(
            "route \"{}\" -> {} created (certificate \"{}\")",
            route.domain,
            route.target,
            route.cert_domain
        );
        Ok(AddOutcome::Created(route))
    }

    /// Deprovision the route for `domain`. Removing a route that doesn't exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionError`] naming the stage that failed.
    pub async fn remove_route(&self, domain: &str) -> Result<RemoveOutcome, ProvisionError> {
        if !validate_domain(domain) {
            return Err(ProvisionError::Validation {
                field: "domain",
                value: domain.to_string(),
            });
        }
        let domain = normalize(domain);
        let proxy = &self.collaborators.proxy;

        let _guard = self.locks.lock(&domain).await;

        proxy
            .disable(&domain)
            .await
            .map_err(ProvisionError::at(Stage::ConfigRemove))?;
        proxy
            .reload()
            .await
            .map_err(|source| ProvisionError::PartialState {
                stage: Stage::Reload,
                source,
            })?;
        tracing::info!("site for \"{domain}\" removed");

        match self.zones.match_zone(&domain) {
            Some(zone) => self.delete_record(&domain, &zone).await,
            None => {
                self.collaborators
                    .certificates
                    .delete(&domain)
                    .await
                    .map_err(ProvisionError::at(Stage::CertificateDelete))?;
                tracing::info!("certificate \"{domain}\" deleted");
                Ok(RemoveOutcome::Deleted)
            }
        }
    }

    /// Check the zone certificate and create the DNS record for a delegated domain. Returns
    /// the conflict, if the name is already taken in the zone.
    async fn register_delegated(
        &self,
        domain: &str,
        zone: &ZoneMatch<'_>,
    ) -> Result<Option<ConflictReason>, ProvisionError> {
        let Collaborators {
            certificates, dns, ..
        } = &self.collaborators;

        let zone_cert = certificates
            .exists(zone.parent_domain())
            .await
            .map_err(ProvisionError::at(Stage::CertificateLookup))?;
        if !zone_cert {
            tracing::warn!(
                "certificate for zone \"{}\" not found, refusing \"{domain}\"",
                zone.parent_domain()
            );
            return Err(ProvisionError::CertificateMissing {
                zone: zone.parent_domain().to_string(),
            });
        }

        let taken = dns
            .list_subdomains(zone.parent_domain(), zone.zone_id())
            .await
            .map_err(ProvisionError::at(Stage::DnsLookup))?;
        if taken.contains(&zone.subdomain) {
            tracing::info!("\"{domain}\" already has a DNS record");
            return Ok(Some(ConflictReason::SubdomainTaken));
        }

        let record = DnsRecord::proxied_address(zone.record_name(), self.settings.node_ip);
        match dns
            .create_record(zone.zone_id(), &record)
            .await
            .map_err(ProvisionError::at(Stage::DnsCreate))?
        {
            RecordCreation::AlreadyExists => {
                tracing::info!("DNS provider reports \"{domain}\" already exists");
                Ok(Some(ConflictReason::SubdomainTaken))
            }
            RecordCreation::Created => {
                tracing::info!(
                    "DNS record \"{}\" created in zone {}",
                    record.name,
                    zone.zone_id()
                );
                Ok(None)
            }
        }
    }

    async fn issue_manual(&self, domain: &str) -> Result<(), ProvisionError> {
        self.collaborators
            .certificates
            .issue(domain, &self.settings.email)
            .await
            .map_err(ProvisionError::at(Stage::CertificateIssue))?;
        tracing::info!("certificate \"{domain}\" issued");
        Ok(())
    }

    async fn write_config(&self, route: &Route) -> Result<(), ProvisionError> {
        let proxy = &self.collaborators.proxy;
        proxy
            .render(route)
            .await
            .map_err(ProvisionError::at(Stage::ConfigWrite))?;
        proxy
            .enable(&route.domain)
            .await
            .map_err(ProvisionError::at(Stage::ConfigEnable))?;
        proxy
            .reload()
            .await
            .map_err(|source| ProvisionError::PartialState {
                stage: Stage::Reload,
                source,
            })
    }

    async fn delete_record(
        &self,
        domain: &str,
        zone: &ZoneMatch<'_>,
    ) -> Result<RemoveOutcome, ProvisionError> {
        match self
            .collaborators
            .dns
            .delete_record(zone.zone_id(), domain)
            .await
        {
            Ok(()) => {
                tracing::info!("DNS record \"{domain}\" deleted from zone {}", zone.zone_id());
                Ok(RemoveOutcome::Deleted)
            }
            Err(source) if self.settings.dns_cleanup == DnsCleanup::Strict => {
                Err(ProvisionError::Collaborator {
                    stage: Stage::DnsDelete,
                    source,
                })
            }
            Err(err) => {
                tracing::error!("failed to delete DNS record \"{domain}\": {err}");
                Ok(RemoveOutcome::DeletedWithStaleRecord {
                    cause: err.to_string(),
                })
            }
        }
    }
}
