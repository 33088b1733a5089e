//! Syntactic checks applied to caller input before any external system is contacted.

use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

const LABEL: &str = r"[a-z0-9](?:[a-z0-9-]*[a-z0-9])?";

lazy_static! {
    static ref DOMAIN_RE: Regex = Regex::new(&format!(r"^{LABEL}(?:\.{LABEL})*$")).unwrap();
    static ref TARGET_HOST_RE: Regex = Regex::new(&format!(r"^{LABEL}(?:\.{LABEL}){{1,2}}$")).unwrap();
    static ref PORT_RE: Regex = Regex::new(r"^[1-9][0-9]{0,4}$").unwrap();
}

/// Lowercase a caller supplied name. Both validators and the
/// [`ZoneTable`][crate::zones::ZoneTable] operate on the normalized form.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Returns true iff `s` is one or more dot separated labels, each an alphanumeric run
/// optionally containing inner hyphens. Case is ignored.
#[must_use]
pub fn validate_domain(s: &str) -> bool {
    DOMAIN_RE.is_match(&normalize(s))
}

/// Returns true iff `s` is `host:port` where `host` is either a two or three label hostname
/// or a dotted IPv4 address, and `port` is in `1..=65535` without leading zeros.
#[must_use]
pub fn validate_target(s: &str) -> bool {
    let Some((host, port)) = s.rsplit_once(':') else {
        return false;
    };
    let host = normalize(host);
    let host_ok = TARGET_HOST_RE.is_match(&host) || host.parse::<Ipv4Addr>().is_ok();
    host_ok && valid_port(port)
}

fn valid_port(port: &str) -> bool {
    PORT_RE.is_match(port) && port.parse::<u32>().map_or(false, |p| p <= u32::from(u16::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain_accepts() {
        for d in [
            "api.example.com",
            "example.com",
            "localhost",
            "a.b.c.d.example.com",
            "x-1.example.com",
            "API.Example.COM",
            "0.example.com",
        ] {
            assert!(validate_domain(d), "{d} should be valid");
        }
    }

    #[test]
    fn test_validate_domain_rejects() {
        for d in [
            "-bad.example.com",
            "bad-.example.com",
            "exa mple.com",
            "",
            ".example.com",
            "example.com.",
            "api..example.com",
            "under_score.example.com",
            "*.example.com",
        ] {
            assert!(!validate_domain(d), "{d:?} should be invalid");
        }
    }

    #[test]
    fn test_validate_target_accepts() {
        for t in [
            "10.0.0.5:8080",
            "svc.internal:3000",
            "a.b.internal:1",
            "svc.internal:65535",
            "Svc.Internal:443",
            "127.0.0.1:9",
        ] {
            assert!(validate_target(t), "{t} should be valid");
        }
    }

    #[test]
    fn test_validate_target_rejects() {
        for t in [
            "host:70000",
            "host:0",
            "host",
            "svc.internal:0",
            "svc.internal:65536",
            "svc.internal:070",
            "svc.internal:",
            "svc.internal:80a",
            "a.b.c.internal:80",
            "localhost:8080",
            "-svc.internal:80",
            "svc.internal:-1",
            "",
        ] {
            assert!(!validate_target(t), "{t:?} should be invalid");
        }
    }
}
