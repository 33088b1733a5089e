//! RouteCrab
//!
//! Provisions and deprovisions reverse proxy routes on a single host. Given a public domain
//! and an internal `host:port` target RouteCrab makes sure a TLS certificate exists, registers
//! a DNS record when the domain lies in a managed zone, writes and enables an nginx site and
//! reloads nginx. Removing a route reverses those steps.
//!
//! * [`workflow`] sequences the steps and classifies their failures.
//! * [`cert`], [`dns`] and [`proxy`] hold the external systems behind traits, with `certbot`,
//!   Cloudflare and nginx implementations.
//! * [`api`] exposes the workflow over HTTP to an allow-list of callers.
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod cert;
pub mod command;
pub mod config;
pub mod dns;
pub mod error;
pub mod proxy;
pub mod route;
pub mod validate;
pub mod workflow;
pub mod zones;

use std::sync::Arc;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use error::Error;
pub use route::Route;
pub use workflow::{AddOutcome, Collaborators, ProvisionError, Provisioner, RemoveOutcome};

/// Build the production collaborators described by `config`: `certbot`, the Cloudflare API
/// and nginx.
///
/// # Errors
///
/// Returns [`Error::IO`] or [`Error::Template`] if the site template can't be loaded, and
/// [`Error::Http`] if the Cloudflare client can't be constructed.
pub fn collaborators(config: &Config) -> Result<Collaborators, Error> {
    Ok(Collaborators {
        certificates: Arc::new(cert::Certbot::new(&config.certbot)),
        dns: Arc::new(dns::Cloudflare::new(&config.cloudflare)?),
        proxy: Arc::new(proxy::Nginx::new(&config.nginx, config.template()?)),
    })
}
