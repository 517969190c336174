use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced by the softphone core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoftphoneError {
    #[error("Error fetching token: {0}")]
    TokenRequest(String),

    #[error("Device operation failed: {0}")]
    DeviceOperation(String),

    #[error("Could not start the call")]
    DialFailed,

    #[error("Invalid destination")]
    InvalidDestination,

    #[error("Device not initialized")]
    NotRegistered,

    #[error("Call error: {0}")]
    CallRuntime(String),
}

impl From<ApiError> for SoftphoneError {
    fn from(err: ApiError) -> Self {
        SoftphoneError::TokenRequest(err.to_string())
    }
}
