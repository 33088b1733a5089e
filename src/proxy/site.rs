//! The two phase lifecycle of a proxy site file.
//!
//! A site is *available* once its config file is written to the available directory, and
//! *enabled* once a symlink to that file exists in the enabled directory, which is the only
//! directory the proxy server reads. Every transition is idempotent.

use crate::error::Error;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Absent,
    Available,
    Enabled,
}

/// The available/enabled directory pair a proxy server is configured with.
#[derive(Debug, Clone)]
pub struct SiteDirs {
    pub available: PathBuf,
    pub enabled: PathBuf,
}

impl SiteDirs {
    #[must_use]
    pub fn site(&self, domain: &str) -> Site {
        let file_name = format!("{domain}.conf");
        Site {
            available: self.available.join(&file_name),
            enabled: self.enabled.join(&file_name),
            staging: self.available.join(format!(".{file_name}.tmp")),
        }
    }
}

/// The files backing a single domain's site.
#[derive(Debug, Clone)]
pub struct Site {
    available: PathBuf,
    enabled: PathBuf,
    staging: PathBuf,
}

async fn exists(p: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(p).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

async fn remove_if_present(p: &Path) -> io::Result<()> {
    match fs::remove_file(p).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

impl Site {
    #[must_use]
    pub fn available_path(&self) -> &Path {
        &self.available
    }

    #[must_use]
    pub fn enabled_path(&self) -> &Path {
        &self.enabled
    }

    /// Inspect the filesystem. An enabled symlink whose file is gone counts as
    /// [`SiteState::Absent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if either path can't be inspected.
    pub async fn state(&self) -> Result<SiteState, Error> {
        if !exists(&self.available).await? {
            return Ok(SiteState::Absent);
        }
        if exists(&self.enabled).await? {
            Ok(SiteState::Enabled)
        } else {
            Ok(SiteState::Available)
        }
    }

    /// Make `contents` available, replacing any previous file. The content is staged beside
    /// the final path and renamed over it, so readers never see a partial file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the staging file can't be written or renamed.
    pub async fn write_available(&self, contents: &str) -> Result<(), Error> {
        fs::write(&self.staging, contents).await?;
        if let Err(err) = fs::rename(&self.staging, &self.available).await {
            let _ = fs::remove_file(&self.staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Transition `Available -> Enabled`. A site that is already enabled is left as is, unless
    /// its symlink points somewhere else, in which case the link is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] with [`ErrorKind::NotFound`] if the site isn't available, or if
    /// the symlink can't be created.
    pub async fn enable(&self) -> Result<SiteState, Error> {
        match self.state().await? {
            SiteState::Absent => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{} is not available", self.available.display()),
            )
            .into()),
            SiteState::Enabled if self.links_to_available().await => Ok(SiteState::Enabled),
            SiteState::Enabled => {
                tracing::warn!(
                    "replacing foreign symlink {}",
                    self.enabled.display()
                );
                fs::remove_file(&self.enabled).await?;
                fs::symlink(&self.available, &self.enabled).await?;
                Ok(SiteState::Enabled)
            }
            SiteState::Available => {
                fs::symlink(&self.available, &self.enabled).await?;
                Ok(SiteState::Enabled)
            }
        }
    }

    /// Transition any state to `Absent`: the enabled symlink is removed first, then the
    /// available file. Missing files are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if a present file can't be removed.
    pub async fn disable(&self) -> Result<SiteState, Error> {
        remove_if_present(&self.enabled).await?;
        remove_if_present(&self.available).await?;
        remove_if_present(&self.staging).await?;
        Ok(SiteState::Absent)
    }

    async fn links_to_available(&self) -> bool {
        fs::read_link(&self.enabled)
            .await
            .map_or(false, |target| target == self.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, SiteDirs) {
        let root = tempfile::tempdir().unwrap();
        let available = root.path().join("sites-available");
        let enabled = root.path().join("sites-enabled");
        std::fs::create_dir_all(&available).unwrap();
        std::fs::create_dir_all(&enabled).unwrap();
        (root, SiteDirs { available, enabled })
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (_root, dirs) = dirs();
        let site = dirs.site("svc1.example.com");
        assert_eq!(site.state().await.unwrap(), SiteState::Absent);

        site.write_available("server {}").await.unwrap();
        assert_eq!(site.state().await.unwrap(), SiteState::Available);
        assert_eq!(
            std::fs::read_to_string(site.available_path()).unwrap(),
            "server {}"
        );

        assert_eq!(site.enable().await.unwrap(), SiteState::Enabled);
        assert_eq!(site.enable().await.unwrap(), SiteState::Enabled);
        assert_eq!(
            std::fs::read_link(site.enabled_path()).unwrap(),
            site.available_path()
        );

        assert_eq!(site.disable().await.unwrap(), SiteState::Absent);
        assert_eq!(site.disable().await.unwrap(), SiteState::Absent);
        assert!(!site.available_path().exists());
        assert!(std::fs::symlink_metadata(site.enabled_path()).is_err());
    }

    #[tokio::test]
    async fn test_rewrite_keeps_link() {
        let (_root, dirs) = dirs();
        let site = dirs.site("svc1.example.com");
        site.write_available("one").await.unwrap();
        site.enable().await.unwrap();
        site.write_available("two").await.unwrap();
        assert_eq!(site.state().await.unwrap(), SiteState::Enabled);
        assert_eq!(std::fs::read_to_string(site.enabled_path()).unwrap(), "two");
        assert_eq!(std::fs::read_dir(&dirs.available).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_enable_absent_fails() {
        let (_root, dirs) = dirs();
        let site = dirs.site("svc1.example.com");
        match site.enable().await {
            Err(Error::IO(err)) => assert_eq!(err.kind(), ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enable_replaces_foreign_link() {
        let (root, dirs) = dirs();
        let site = dirs.site("svc1.example.com");
        let elsewhere = root.path().join("elsewhere.conf");
        std::fs::write(&elsewhere, "old").unwrap();
        std::os::unix::fs::symlink(&elsewhere, site.enabled_path()).unwrap();
        site.write_available("new").await.unwrap();

        site.enable().await.unwrap();
        assert_eq!(std::fs::read_to_string(site.enabled_path()).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let dirs = SiteDirs {
            available: root.path().join("missing"),
            enabled: root.path().join("also-missing"),
        };
        assert!(matches!(
            dirs.site("a.example.com").write_available("x").await,
            Err(Error::IO(_))
        ));
    }
}
