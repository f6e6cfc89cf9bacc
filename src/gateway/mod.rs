//! Request gateway: one asynchronous request per call, one outcome per request.

mod http;

use crate::model::{
    ConfigMapping, ConfigValue, LogSnapshot, OperationOutcome, ProgramId, StateReport,
    UpdateReport,
};
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpGateway;

/// Server endpoints the panel talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Execute,
    UpdateConfig,
    UpdateConfigValue,
    GetLog,
}

impl Operation {
    pub fn endpoint(self) -> &'static str {
        match self {
            Operation::Execute => "execute",
            Operation::UpdateConfig => "updateConfig",
            Operation::UpdateConfigValue => "updateConfigValue",
            Operation::GetLog => "getLog",
        }
    }
}

/// Reasons a request produced no usable payload. All of them surface as
/// `OperationOutcome::Failure`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("could not encode request config: {0}")]
    Encode(serde_json::Error),
}

#[async_trait]
pub trait RequestGateway: Send + Sync {
    /// Start or stop a program with the given configuration.
    async fn execute(
        &self,
        program: &ProgramId,
        config: &ConfigMapping,
    ) -> OperationOutcome<StateReport>;

    /// Push the full configuration of a program.
    async fn update_config(
        &self,
        program: &ProgramId,
        config: &ConfigMapping,
    ) -> OperationOutcome<UpdateReport>;

    /// Push a single configuration value.
    async fn update_config_value(
        &self,
        program: &ProgramId,
        field: &str,
        value: &ConfigValue,
    ) -> OperationOutcome<UpdateReport>;

    async fn get_log(&self) -> OperationOutcome<LogSnapshot>;
}
