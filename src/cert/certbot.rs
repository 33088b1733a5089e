//! A [`CertificateAuthority`][super::CertificateAuthority] backed by the `certbot` CLI.
use crate::cert::CertificateAuthority;
use crate::command;
use crate::config::CertbotConfig;
use crate::error::Error;
use std::time::Duration;

const CERT_NAME_PREFIX: &str = "Certificate Name:";

#[derive(Debug, Clone)]
pub struct Certbot {
    bin: String,
    timeout: Duration,
}

impl Certbot {
    #[must_use]
    pub fn new(config: &CertbotConfig) -> Self {
        Self {
            bin: config.bin.clone(),
            timeout: config.timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, Error> {
        command::run(&self.bin, args, self.timeout).await
    }
}

/// Extract the certificate names from `certbot certificates` output.
fn certificate_names(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(CERT_NAME_PREFIX))
        .map(str::trim)
}

#[async_trait::async_trait]
impl CertificateAuthority for Certbot {
    async fn exists(&self, name: &str) -> Result<bool, Error> {
        let output = self.run(&["certificates"]).await?;
        let found = certificate_names(&output).any(|n| n.eq_ignore_ascii_case(name));
        Ok(found)
    }

    async fn issue(&self, name: &str, contact_email: &str) -> Result<(), Error> {
        tracing::info!("requesting certificate for \"{name}\"");
        self.run(&[
            "certonly",
            "--nginx",
            "-d",
            name,
            "--agree-tos",
            "--non-interactive",
            "-m",
            contact_email,
        ])
        .await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        if !self.exists(name).await? {
            tracing::debug!("certificate \"{name}\" already absent");
            return Ok(());
        }
        tracing::info!("deleting certificate \"{name}\"");
        self.run(&["delete", "--cert-name", name, "--non-interactive"])
            .await?;
        Ok(())
    }
}
