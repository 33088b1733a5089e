//! End-to-end provisioning scenarios, driven through the public API with in-memory certificate
//! and DNS backends and a real site directory. nginx is stood in for by `true`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use routecrab::cert::InMemoryCertificates;
use routecrab::config::{DnsCleanup, NginxConfig};
use routecrab::dns::InMemoryDns;
use routecrab::proxy::{Nginx, SiteState, Template};
use routecrab::workflow::{ConflictReason, Settings, Stage};
use routecrab::zones::ZoneTable;
use routecrab::{AddOutcome, Collaborators, ProvisionError, Provisioner, RemoveOutcome};
use tempfile::TempDir;

const TEMPLATE: &str = "\
server {
    server_name {{.Domain}};
    ssl_certificate /etc/letsencrypt/live/{{.CertDomain}}/fullchain.pem;
    location / { proxy_pass http://{{.Target}}; }
}
";

struct Host {
    _root: TempDir,
    nginx: Arc<Nginx>,
    certs: Arc<InMemoryCertificates>,
    dns: Arc<InMemoryDns>,
    provisioner: Provisioner,
}

impl Host {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = NginxConfig {
            bin: "true".to_string(),
            sites_available: root.path().join("sites-available"),
            sites_enabled: root.path().join("sites-enabled"),
            template_path: root.path().join("site.conf"),
            timeout: Duration::from_secs(5),
        };
        std::fs::create_dir_all(&config.sites_available).unwrap();
        std::fs::create_dir_all(&config.sites_enabled).unwrap();

        let nginx = Arc::new(Nginx::new(&config, Template::parse(TEMPLATE).unwrap()));
        let certs = Arc::new(InMemoryCertificates::with_certificates(["example.com"]));
        let dns = Arc::new(InMemoryDns::new([("zoneA", "example.com")]));
        let zones = ZoneTable::try_new(&HashMap::from([(
            "example.com".to_string(),
            "zoneA".to_string(),
        )]))
        .unwrap();
        let provisioner = Provisioner::new(
            zones,
            Settings {
                email: "ops@example.net".to_string(),
                node_ip: "203.0.113.7".parse().unwrap(),
                dns_cleanup: DnsCleanup::BestEffort,
            },
            Collaborators {
                certificates: certs.clone(),
                dns: dns.clone(),
                proxy: nginx.clone(),
            },
        );
        Self {
            _root: root,
            nginx,
            certs,
            dns,
            provisioner,
        }
    }

    fn enabled_site(&self, domain: &str) -> PathBuf {
        self.nginx.dirs().site(domain).enabled_path().to_path_buf()
    }

    async fn state(&self, domain: &str) -> SiteState {
        self.nginx.dirs().site(domain).state().await.unwrap()
    }
}

#[tokio::test]
async fn delegated_domain_gets_dns_record_and_zone_certificate() {
    let host = Host::new();

    let outcome = host
        .provisioner
        .add_route("svc1.example.com", "10.0.0.2:9000")
        .await
        .unwrap();
    let route = match outcome {
        AddOutcome::Created(route) => route,
        other => panic!("expected Created, got {other:?}"),
    };
    assert_eq!(route.cert_domain, "example.com");

    let records = host.dns.records("zoneA");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "svc1.example.com");
    assert_eq!(records[0].kind, "A");

    let site = std::fs::read_to_string(host.enabled_site("svc1.example.com")).unwrap();
    assert!(site.contains("server_name svc1.example.com;"));
    assert!(site.contains("/etc/letsencrypt/live/example.com/fullchain.pem"));
    assert!(site.contains("proxy_pass http://10.0.0.2:9000;"));

    assert!(host.certs.issued().is_empty());
}

#[tokio::test]
async fn delegated_domain_added_twice_conflicts() {
    let host = Host::new();
    let first = host
        .provisioner
        .add_route("svc1.example.com", "10.0.0.2:9000")
        .await
        .unwrap();
    let second = host
        .provisioner
        .add_route("svc1.example.com", "10.0.0.2:9000")
        .await
        .unwrap();
    assert!(matches!(first, AddOutcome::Created(_)));
    assert_eq!(second, AddOutcome::Conflict(ConflictReason::SubdomainTaken));
    assert_eq!(host.dns.records("zoneA").len(), 1);
    assert_eq!(host.state("svc1.example.com").await, SiteState::Enabled);
}

#[tokio::test]
async fn manual_domain_gets_its_own_certificate() {
    let host = Host::new();

    let outcome = host
        .provisioner
        .add_route("standalone.other.net", "10.0.0.3:9001")
        .await
        .unwrap();
    let route = match outcome {
        AddOutcome::Created(route) => route,
        other => panic!("expected Created, got {other:?}"),
    };
    assert_eq!(route.cert_domain, "standalone.other.net");
    assert_eq!(host.certs.issued(), vec!["standalone.other.net".to_string()]);
    assert!(host.dns.records("zoneA").is_empty());

    let site = std::fs::read_to_string(host.enabled_site("standalone.other.net")).unwrap();
    assert!(site.contains("/etc/letsencrypt/live/standalone.other.net/fullchain.pem"));
}

#[tokio::test]
async fn certificate_delete_failure_is_reported_after_site_removal() {
    let host = Host::new();
    host.provisioner
        .add_route("standalone.other.net", "10.0.0.3:9001")
        .await
        .unwrap();
    host.certs.fail_delete(true);

    let err = host
        .provisioner
        .remove_route("standalone.other.net")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Collaborator {
            stage: Stage::CertificateDelete,
            ..
        }
    ));
    assert_eq!(host.state("standalone.other.net").await, SiteState::Absent);
    assert!(host.certs.contains("standalone.other.net"));
}

#[tokio::test]
async fn remove_is_idempotent() {
    let host = Host::new();
    host.provisioner
        .add_route("svc1.example.com", "10.0.0.2:9000")
        .await
        .unwrap();

    for _ in 0..2 {
        assert_eq!(
            host.provisioner
                .remove_route("svc1.example.com")
                .await
                .unwrap(),
            RemoveOutcome::Deleted
        );
    }
    assert_eq!(host.state("svc1.example.com").await, SiteState::Absent);
    assert!(host.dns.records("zoneA").is_empty());
    assert!(host.certs.contains("example.com"));
}

#[tokio::test]
async fn different_domains_provision_concurrently() {
    let host = Host::new();
    let domains: Vec<String> = (0..8).map(|i| format!("svc{i}.example.com")).collect();
    let runs = domains.iter().map(|d| {
        let provisioner = host.provisioner.clone();
        let domain = d.clone();
        tokio::spawn(async move { provisioner.add_route(&domain, "10.0.0.2:9000").await })
    });
    for run in runs.collect::<Vec<_>>() {
        assert!(matches!(run.await.unwrap().unwrap(), AddOutcome::Created(_)));
    }
    assert_eq!(host.dns.records("zoneA").len(), domains.len());
    for domain in &domains {
        assert_eq!(host.state(domain).await, SiteState::Enabled);
    }
}
