//! Error types.

use std::net::IpAddr;
use std::time::Duration;

/// Error enumerates the infrastructure and collaborator failures RouteCrab can encounter.
///
/// Workflow level classification (which stage failed, whether the host was left in a
/// partial state) is layered on top of these by
/// [`ProvisionError`][crate::workflow::ProvisionError].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a caller's source IP address isn't inside any
    /// [`Config::acl`][`crate::config::Config::acl`] network.
    #[error("IP {0} is not authorized")]
    Forbidden(IpAddr),

    /// Returned when [`Config::access_token`][`crate::config::Config::access_token`] is set and
    /// the caller didn't present it as a bearer token.
    #[error("missing or invalid bearer token")]
    Unauthorized,

    /// Returned when the config file is well formed JSON but describes an unusable setup.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Returned when the proxy configuration template references an unknown placeholder.
    #[error("template error: {0}")]
    Template(String),

    /// Returned when an external program exits unsuccessfully.
    #[error("{program} exited with {status}: {output}")]
    CommandFailed {
        program: String,
        status: String,
        output: String,
    },

    /// Returned when an external program doesn't finish within its configured timeout.
    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    CommandTimeout { program: String, timeout: Duration },

    /// Returned when the Cloudflare API answers with `"success": false`.
    #[error("cloudflare API error: {}", .messages.join("; "))]
    Cloudflare { messages: Vec<String> },

    /// Returned when an HTTP request to the DNS provider can't be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred: {0}")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON (the config file, or a DNS provider response body) fails.
    #[error("invalid JSON: {0}")]
    InvalidJSON(#[from] serde_json::Error),
}
