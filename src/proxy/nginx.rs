use crate::command;
use crate::config::NginxConfig;
use crate::error::Error;
use crate::proxy::{ProxyConfigWriter, SiteDirs, Template};
use crate::route::Route;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Nginx {
    dirs: SiteDirs,
    template: Template,
    bin: String,
    timeout: Duration,
}

impl Nginx {
    #[must_use]
    pub fn new(config: &NginxConfig, template: Template) -> Self {
        Self {
            dirs: SiteDirs {
                available: config.sites_available.clone(),
                enabled: config.sites_enabled.clone(),
            },
            template,
            bin: config.bin.clone(),
            timeout: config.timeout,
        }
    }

    #[must_use]
    pub fn dirs(&self) -> &SiteDirs {
        &self.dirs
    }
}

#[async_trait::async_trait]
impl ProxyConfigWriter for Nginx {
    async fn render(&self, route: &Route) -> Result<PathBuf, Error> {
        let site = self.dirs.site(&route.domain);
        site.write_available(&self.template.render(route)).await?;
        tracing::debug!("wrote {}", site.available_path().display());
        Ok(site.available_path().to_path_buf())
    }

    async fn enable(&self, domain: &str) -> Result<(), Error> {
        self.dirs.site(domain).enable().await?;
        tracing::debug!("site for \"{domain}\" enabled");
        Ok(())
    }

    async fn disable(&self, domain: &str) -> Result<(), Error> {
        let site = self.dirs.site(domain);
        let before = site.state().await?;
        site.disable().await?;
        tracing::debug!("site for \"{domain}\" disabled (was {before:?})");
        Ok(())
    }

    async fn reload(&self) -> Result<(), Error> {
        command::run(&self.bin, &["-t"], self.timeout).await?;
        command::run(&self.bin, &["-s", "reload"], self.timeout).await?;
        tracing::info!("nginx reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::SiteState;
    use tempfile::TempDir;

    fn nginx(bin: &str) -> (TempDir, Nginx) {
        let root = tempfile::tempdir().unwrap();
        let config = NginxConfig {
            bin: bin.to_string(),
            sites_available: root.path().join("available"),
            sites_enabled: root.path().join("enabled"),
            template_path: root.path().join("site.conf"),
            timeout: Duration::from_secs(5),
        };
        std::fs::create_dir_all(&config.sites_available).unwrap();
        std::fs::create_dir_all(&config.sites_enabled).unwrap();
        let template = Template::parse("server_name {{.Domain}}; # {{.CertDomain}} -> {{.Target}}").unwrap();
        (root, Nginx::new(&config, template))
    }

    fn route() -> Route {
        Route {
            domain: "svc1.example.com".to_string(),
            target: "10.0.0.2:9000".to_string(),
            cert_domain: "example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_render_enable_disable() {
        let (_root, nginx) = nginx("true");
        let path = nginx.render(&route()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "server_name svc1.example.com; # example.com -> 10.0.0.2:9000"
        );

        nginx.enable("svc1.example.com").await.unwrap();
        nginx.enable("svc1.example.com").await.unwrap();
        let site = nginx.dirs().site("svc1.example.com");
        assert_eq!(site.state().await.unwrap(), SiteState::Enabled);

        nginx.reload().await.unwrap();

        nginx.disable("svc1.example.com").await.unwrap();
        nginx.disable("svc1.example.com").await.unwrap();
        assert_eq!(site.state().await.unwrap(), SiteState::Absent);
    }

    #[tokio::test]
    async fn test_reload_failure() {
        let (_root, nginx) = nginx("false");
        assert!(matches!(
            nginx.reload().await,
            Err(Error::CommandFailed { .. })
        ));
    }
}
