use crate::error::Error;
use crate::proxy::Template;
use crate::validate::validate_domain;
use crate::zones::ZoneTable;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

const PLACEHOLDER_TOKEN: &str = "your_cloudflare_api_token";
const PLACEHOLDER_EMAIL: &str = "admin@example.com";

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub api_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub api_timeout: Duration,
    /// Contact address registered with the certificate authority.
    pub email: String,
    /// Public address of this host. Content of the DNS records created for delegated domains.
    pub node_ip: IpAddr,
    /// Managed zones, `parent domain -> zone id`.
    #[serde(default)]
    pub zones: HashMap<String, String>,
    pub cloudflare: CloudflareConfig,
    #[serde(default)]
    pub certbot: CertbotConfig,
    pub nginx: NginxConfig,
    /// Networks callers must connect from.
    pub acl: Vec<IpNetwork>,
    /// When set, callers must also present `Authorization: Bearer <access_token>`.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Origins allowed to call the API from a browser.
    #[serde(default)]
    pub origins: Vec<String>,
    #[serde(default)]
    pub dns_cleanup: DnsCleanup,
    /// When set, log lines are appended to this file as well as stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct CloudflareConfig {
    pub token: String,
    #[serde(default = "default_cloudflare_api_base")]
    pub api_base: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_cloudflare_timeout")]
    pub timeout: Duration,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct CertbotConfig {
    #[serde(default = "default_certbot_bin")]
    pub bin: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_certbot_timeout")]
    pub timeout: Duration,
}

impl Default for CertbotConfig {
    fn default() -> Self {
        Self {
            bin: default_certbot_bin(),
            timeout: default_certbot_timeout(),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct NginxConfig {
    #[serde(default = "default_nginx_bin")]
    pub bin: String,
    #[serde(default = "default_sites_available")]
    pub sites_available: PathBuf,
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: PathBuf,
    pub template_path: PathBuf,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_nginx_timeout")]
    pub timeout: Duration,
}

/// What a route removal reports when the DNS record of a delegated domain can't be deleted.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DnsCleanup {
    /// Log the failure and report the route as deleted. The proxy path is already gone, a
    /// stale record only makes traffic fail to route.
    #[default]
    BestEffort,
    /// Report the failure to the caller.
    Strict,
}

fn default_cloudflare_api_base() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_cloudflare_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_certbot_bin() -> String {
    "certbot".to_string()
}

fn default_certbot_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_nginx_bin() -> String {
    "nginx".to_string()
}

fn default_sites_available() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-available")
}

fn default_sites_enabled() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-enabled")
}

fn default_nginx_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    /// Load and check a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it can't be
    /// deserialized and [`Error::InvalidConfig`] if it still holds placeholder values or
    /// names an invalid managed zone.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.check()?;
        Ok(conf)
    }

    /// The managed zone table described by [`Config::zones`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a parent domain is invalid or duplicated.
    pub fn zone_table(&self) -> Result<ZoneTable, Error> {
        ZoneTable::try_new(&self.zones)
    }

    /// Load the site template named by [`NginxConfig::template_path`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read or [`Error::Template`] if it uses an
    /// unknown placeholder.
    pub fn template(&self) -> Result<Template, Error> {
        Template::try_from_file(&self.nginx.template_path)
    }

    /// Whether a caller connecting from `source_ip` may use the API.
    #[must_use]
    pub fn caller_permitted(&self, source_ip: IpAddr) -> bool {
        self.acl.iter().any(|network| network.contains(source_ip))
    }

    fn check(&self) -> Result<(), Error> {
        if self.cloudflare.token == PLACEHOLDER_TOKEN || self.node_ip.is_unspecified() {
            return Err(Error::InvalidConfig(
                "cloudflare.token and node_ip must be configured".to_string(),
            ));
        }
        if self.email == PLACEHOLDER_EMAIL || !self.email.contains('@') {
            return Err(Error::InvalidConfig(format!(
                "email \"{}\" must be a real contact address",
                self.email
            )));
        }
        if let Some(bad) = self.zones.keys().find(|parent| !validate_domain(parent)) {
            return Err(Error::InvalidConfig(format!(
                "managed zone \"{bad}\" is not a valid domain"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> Result<Config, Error> {
        let conf: Config = serde_json::from_value(value)?;
        conf.check()?;
        Ok(conf)
    }

    fn base() -> serde_json::Value {
        json!({
            "api_bind_addr": "127.0.0.1:8080",
            "api_timeout": 60,
            "email": "ops@example.net",
            "node_ip": "203.0.113.7",
            "zones": { "example.com": "zoneA" },
            "cloudflare": { "token": "cf-token" },
            "nginx": { "template_path": "/etc/routecrab/site.conf" },
            "acl": ["10.0.0.0/8", "127.0.0.1/32"],
        })
    }

    #[test]
    fn test_defaults() {
        let conf = config(base()).unwrap();
        assert_eq!(conf.api_timeout, Duration::from_secs(60));
        assert_eq!(conf.certbot.bin, "certbot");
        assert_eq!(conf.nginx.bin, "nginx");
        assert_eq!(
            conf.nginx.sites_available,
            PathBuf::from("/etc/nginx/sites-available")
        );
        assert_eq!(conf.cloudflare.api_base, "https://api.cloudflare.com/client/v4");
        assert_eq!(conf.cloudflare.timeout, Duration::from_secs(15));
        assert_eq!(conf.dns_cleanup, DnsCleanup::BestEffort);
        assert!(conf.access_token.is_none());
        assert!(conf.zone_table().unwrap().match_zone("a.example.com").is_some());
    }

    #[test]
    fn test_dns_cleanup_strict() {
        let mut value = base();
        value["dns_cleanup"] = json!("strict");
        assert_eq!(config(value).unwrap().dns_cleanup, DnsCleanup::Strict);
    }

    #[test]
    fn test_caller_permitted() {
        let conf = config(base()).unwrap();
        assert!(conf.caller_permitted("10.1.2.3".parse().unwrap()));
        assert!(conf.caller_permitted("127.0.0.1".parse().unwrap()));
        assert!(!conf.caller_permitted("127.0.0.2".parse().unwrap()));
        assert!(!conf.caller_permitted("192.0.2.1".parse().unwrap()));
    }

    #[test]
    fn test_placeholders_rejected() {
        let mut value = base();
        value["cloudflare"]["token"] = json!(PLACEHOLDER_TOKEN);
        assert!(matches!(config(value), Err(Error::InvalidConfig(_))));

        let mut value = base();
        value["node_ip"] = json!("0.0.0.0");
        assert!(matches!(config(value), Err(Error::InvalidConfig(_))));

        let mut value = base();
        value["email"] = json!(PLACEHOLDER_EMAIL);
        assert!(matches!(config(value), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_acl_loads() {
        let mut value = base();
        value["acl"] = json!([]);
        let conf = config(value).unwrap();
        assert!(!conf.caller_permitted("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_zone_rejected() {
        let mut value = base();
        value["zones"] = json!({ "bad_zone.com": "z" });
        assert!(matches!(config(value), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_try_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, base().to_string()).unwrap();
        assert!(Config::try_from_file(&path).is_ok());

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            Config::try_from_file(&path),
            Err(Error::InvalidJSON(_))
        ));
    }
}
