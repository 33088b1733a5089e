use crate::error::Error;
use crate::workflow::{ProvisionError, Stage};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub(crate) struct APIError(anyhow::Error);

fn provision_status(err: &ProvisionError) -> StatusCode {
    match err {
        ProvisionError::Validation { .. } => StatusCode::BAD_REQUEST,
        ProvisionError::Collaborator { stage, .. } => match stage {
            Stage::CertificateLookup
            | Stage::CertificateIssue
            | Stage::CertificateDelete
            | Stage::DnsLookup
            | Stage::DnsCreate
            | Stage::DnsDelete => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ProvisionError::CertificateMissing { .. } | ProvisionError::PartialState { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn rejection_status(err: &JsonRejection) -> StatusCode {
    match err {
        JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let any_err = self.0;
        if let Some(err) = any_err.downcast_ref::<ProvisionError>() {
            let body = Json(json!({
                "error": format!("{err}"),
                "stage": err.stage(),
            }));
            return (provision_status(err), body).into_response();
        }

        let status = match any_err.downcast_ref::<Error>() {
            Some(Error::Forbidden(_)) => StatusCode::FORBIDDEN,
            Some(Error::Unauthorized) => StatusCode::UNAUTHORIZED,
            _ => any_err
                .downcast_ref::<JsonRejection>()
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, rejection_status),
        };
        let body = Json(json!({
            "error": format!("{any_err}"),
        }));
        (status, body).into_response()
    }
}

impl<E> From<E> for APIError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
