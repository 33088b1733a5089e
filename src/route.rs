use serde::Serialize;

/// A public domain routed through the proxy to an internal target.
///
/// Routes are never stored by RouteCrab: the enabled proxy configs, the DNS zone and the
/// certificate store are the source of truth.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub domain: String,
    pub target: String,
    /// The certificate name the proxy config references. Equal to `domain` for manual
    /// routes and to the parent zone for delegated routes.
    pub cert_domain: String,
}
