//! TLS certificate management.
//!
//! Delegated zones share a single certificate that is provisioned out-of-band once per zone,
//! RouteCrab only checks that it [exists][CertificateAuthority::exists]. Manual domains get a
//! certificate [issued][CertificateAuthority::issue] when their route is added and
//! [deleted][CertificateAuthority::delete] when it is removed.
//!
//! Two implementations are provided, [`certbot::Certbot`] which drives the `certbot` CLI, and
//! [`memory::InMemoryCertificates`] which keeps certificate names in process memory.

use crate::error::Error;
use std::sync::Arc;

pub mod certbot;
pub mod memory;

pub use certbot::Certbot;
pub use memory::InMemoryCertificates;

/// `DynCertificateAuthority` is a type alias for a [`CertificateAuthority`] shared between
/// request workers.
pub type DynCertificateAuthority = Arc<dyn CertificateAuthority + Send + Sync>;

#[async_trait::async_trait]
pub trait CertificateAuthority {
    /// Whether a certificate named `name` is present in the local certificate store.
    async fn exists(&self, name: &str) -> Result<bool, Error>;

    /// Obtain a certificate for `name`, registering `contact_email` with the authority.
    async fn issue(&self, name: &str, contact_email: &str) -> Result<(), Error>;

    /// Delete the certificate named `name`. Deleting a certificate that doesn't exist succeeds.
    async fn delete(&self, name: &str) -> Result<(), Error>;
}
