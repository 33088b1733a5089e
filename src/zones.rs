//! Managed zone lookup.
//!
//! A requested domain is *delegated* when it equals, or is a subdomain of, one of the
//! configured parent domains. Delegated domains get their DNS record created through the
//! [DNS provider][crate::dns] and reuse the zone's certificate. Every other domain is *manual*.
//!
//! Parent domains are kept sorted by descending label count so that nested zones
//! (`example.com` and `dev.example.com`) resolve deterministically to the longest match.

use crate::error::Error;
use crate::validate::{normalize, validate_domain};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedZone {
    pub parent_domain: String,
    pub zone_id: String,
}

impl ManagedZone {
    fn label_count(&self) -> usize {
        self.parent_domain.split('.').count()
    }

    fn covers(&self, domain: &str) -> bool {
        domain == self.parent_domain
            || domain
                .strip_suffix(self.parent_domain.as_str())
                .map_or(false, |head| head.ends_with('.'))
    }
}

/// The result of matching a domain against the [`ZoneTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneMatch<'a> {
    pub zone: &'a ManagedZone,
    /// The part of the domain below the parent, e.g. `svc1` for `svc1.example.com`.
    /// Empty when the domain is the zone apex.
    pub subdomain: String,
}

impl ZoneMatch<'_> {
    #[must_use]
    pub fn parent_domain(&self) -> &str {
        &self.zone.parent_domain
    }

    #[must_use]
    pub fn zone_id(&self) -> &str {
        &self.zone.zone_id
    }

    /// The record name to register with the DNS provider. The apex is addressed by the zone
    /// name itself.
    #[must_use]
    pub fn record_name(&self) -> &str {
        if self.subdomain.is_empty() {
            &self.zone.parent_domain
        } else {
            &self.subdomain
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    zones: Vec<ManagedZone>,
}

impl ZoneTable {
    /// Build a table from a `parent domain -> zone id` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a parent domain isn't a valid domain name, or if two
    /// parent domains only differ by case.
    pub fn try_new(zones: &HashMap<String, String>) -> Result<Self, Error> {
        let mut sorted: Vec<ManagedZone> = Vec::with_capacity(zones.len());
        for (parent, zone_id) in zones {
            if !validate_domain(parent) {
                return Err(Error::InvalidConfig(format!(
                    "managed zone \"{parent}\" is not a valid domain"
                )));
            }
            let parent_domain = normalize(parent);
            if sorted.iter().any(|z| z.parent_domain == parent_domain) {
                return Err(Error::InvalidConfig(format!(
                    "managed zone \"{parent_domain}\" is configured more than once"
                )));
            }
            sorted.push(ManagedZone {
                parent_domain,
                zone_id: zone_id.clone(),
            });
        }
        sorted.sort_by(|a, b| {
            b.label_count()
                .cmp(&a.label_count())
                .then_with(|| a.parent_domain.cmp(&b.parent_domain))
        });

        for (i, inner) in sorted.iter().enumerate() {
            for outer in &sorted[i + 1..] {
                if outer.covers(&inner.parent_domain) {
                    tracing::warn!(
                        "managed zone \"{}\" is nested in \"{}\", the longer zone wins",
                        inner.parent_domain,
                        outer.parent_domain
                    );
                }
            }
        }
        Ok(Self { zones: sorted })
    }

    /// Find the managed zone covering `domain`, preferring the zone with the most labels.
    /// `None` means the domain is manual.
    #[must_use]
    pub fn match_zone(&self, domain: &str) -> Option<ZoneMatch<'_>> {
        let domain = normalize(domain);
        self.zones.iter().find(|z| z.covers(&domain)).map(|zone| {
            let subdomain = domain
                .strip_suffix(zone.parent_domain.as_str())
                .unwrap_or_default()
                .trim_end_matches('.')
                .to_string();
            ZoneMatch { zone, subdomain }
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedZone> {
        self.zones.iter()
    }
}
