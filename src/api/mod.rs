pub mod rest;
pub mod websocket;

use axum::http::StatusCode;
use crate::dashboard::DashboardHandle;
use crate::error::Error;

pub use rest::create_router;

pub struct ApiState {
    pub dashboard: DashboardHandle,
}

pub(crate) fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidAlert(_) | Error::SettingsImportError(_) => StatusCode::BAD_REQUEST,
        Error::ProviderUnavailable { .. }
        | Error::MalformedResponse { .. }
        | Error::AllSourcesUnavailable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
