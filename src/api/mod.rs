//! HTTP API for adding and removing proxy routes.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.
//!   This is the only endpoint callers outside the [ACL][crate::config::Config::acl] can reach.
//!
//! ## `/add-proxy` (POST)
//!
//!   Expects a JSON request body of the form:
//!
//!   ```json
//!   { "domain": "svc1.example.com", "target": "10.0.0.2:9000" }
//!   ```
//!
//!   Returns HTTP 201 (Created) once the certificate, DNS record (for domains in a managed zone)
//!   and proxy site are in place:
//!
//!   ```json
//!   { "status": "created", "cert_domain": "example.com" }
//!   ```
//!
//!   Returns HTTP 409 (Conflict) with `{"error":"subdomain already taken"}` when the managed
//!   zone already has a record for the domain.
//!
//! ## `/remove-proxy` (POST)
//!
//!   Expects a JSON request body of the form:
//!
//!   ```json
//!   { "domain": "svc1.example.com" }
//!   ```
//!
//!   Returns HTTP 200 (OK) and `{"status":"deleted"}` once the proxy site is gone. When the
//!   DNS record of a managed domain couldn't be deleted the body also carries a `warning`.
//!   Removing a domain that isn't routed succeeds.
//!
//! # Errors
//!
//! Failed requests return a JSON body with an `error` message. Failures of the provisioning
//! workflow also name the `stage` that failed, e.g.
//!
//! ```json
//! { "error": "certificate-delete failed: ...", "stage": "certificate-delete" }
//! ```
//!
//! Invalid input is HTTP 400, certificate authority and DNS provider failures are HTTP 502 and
//! local proxy configuration failures are HTTP 500. Callers outside the ACL get HTTP 403, and
//! callers missing the configured bearer token get HTTP 401.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use routes::new as router;
pub use server::{new, AppState};
