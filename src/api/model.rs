use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct AddProxyRequest {
    pub domain: String,
    pub target: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct RemoveProxyRequest {
    pub domain: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct ProxyResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ProxyResult {
    pub fn created(cert_domain: String) -> Self {
        Self {
            status: "created",
            cert_domain: Some(cert_domain),
            warning: None,
        }
    }

    pub fn deleted(warning: Option<String>) -> Self {
        Self {
            status: "deleted",
            cert_domain: None,
            warning,
        }
    }
}
