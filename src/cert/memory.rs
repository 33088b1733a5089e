use crate::cert::CertificateAuthority;
use crate::error::Error;
use std::collections::HashSet;
use std::sync::Mutex;

/// Certificate names held in process memory. Nothing is issued; useful for local development
/// and tests.
///
/// Failures can be injected per operation with [`InMemoryCertificates::fail_issue`] and
/// [`InMemoryCertificates::fail_delete`].
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryCertificates {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    names: HashSet<String>,
    fail_issue: bool,
    fail_delete: bool,
    issued: Vec<String>,
}

impl InMemoryCertificates {
    #[must_use]
    pub fn with_certificates<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::default();
        store.lock().names = names.into_iter().map(str::to_string).collect();
        store
    }

    pub fn fail_issue(&self, fail: bool) {
        self.lock().fail_issue = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().names.contains(name)
    }

    /// Names passed to successful [`CertificateAuthority::issue`] calls, in order.
    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        self.lock().issued.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl CertificateAuthority for InMemoryCertificates {
    async fn exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.contains(name))
    }

    async fn issue(&self, name: &str, _contact_email: &str) -> Result<(), Error> {
        let mut state = self.lock();
        if state.fail_issue {
            return Err(Error::CommandFailed {
                program: "memory".to_string(),
                status: "exit status: 1".to_string(),
                output: format!("issuing {name} refused"),
            });
        }
        state.names.insert(name.to_string());
        state.issued.push(name.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        let mut state = self.lock();
        if state.fail_delete {
            return Err(Error::CommandFailed {
                program: "memory".to_string(),
                status: "exit status: 1".to_string(),
                output: format!("deleting {name} refused"),
            });
        }
        state.names.remove(name);
        Ok(())
    }
}
