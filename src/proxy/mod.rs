//! Reverse proxy site configuration.
//!
//! [`ProxyConfigWriter`] is the seam between the [provisioning workflow][crate::workflow] and
//! the proxy server. [`nginx::Nginx`] implements it for nginx's `sites-available` /
//! `sites-enabled` layout.

use crate::error::Error;
use crate::route::Route;
use std::path::PathBuf;
use std::sync::Arc;

pub mod nginx;
pub mod site;
pub mod template;

pub use nginx::Nginx;
pub use site::{Site, SiteDirs, SiteState};
pub use template::Template;

/// `DynProxyConfigWriter` is a type alias for a [`ProxyConfigWriter`] shared between request
/// workers.
pub type DynProxyConfigWriter = Arc<dyn ProxyConfigWriter + Send + Sync>;

#[async_trait::async_trait]
pub trait ProxyConfigWriter {
    /// Render the site config for `route` and make it available, returning its path.
    async fn render(&self, route: &Route) -> Result<PathBuf, Error>;

    /// Enable the available site for `domain`. Enabling an enabled site is a no-op.
    async fn enable(&self, domain: &str) -> Result<(), Error>;

    /// Remove the site for `domain` from both the enabled and available sets. Missing files
    /// are not errors.
    async fn disable(&self, domain: &str) -> Result<(), Error>;

    /// Validate the full configuration, then apply it. A configuration that fails validation
    /// is never applied, so the running proxy keeps serving its previous configuration.
    async fn reload(&self) -> Result<(), Error>;
}
