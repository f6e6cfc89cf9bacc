use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Settings shared by the gateway and the poller, built from CLI arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    pub base_url: String,
    /// Prefix placed between the origin and the operation name, e.g. `commands/`.
    pub base_path: String,
    pub endpoint_suffix: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub log_interval: Duration,
    pub user_agent: String,
}

/// Opaque name of a managed program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Value of one form field: checkboxes carry their checked-state, everything else text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Flag(bool),
    Text(String),
}

impl ConfigValue {
    /// Render the value the way it travels in a form-encoded body.
    pub fn to_form_value(&self) -> String {
        match self {
            ConfigValue::Flag(b) => b.to_string(),
            ConfigValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_form_value())
    }
}

/// Field name to value, rebuilt from live form state on every operation.
pub type ConfigMapping = BTreeMap<String, ConfigValue>;

/// Which indicator the server asks the panel to show after a start/stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowStatus {
    Success,
    Fail,
    #[default]
    None,
}

impl<'de> Deserialize<'de> for ShowStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Anything unrecognised hides both indicators.
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "success" => ShowStatus::Success,
            "fail" => ShowStatus::Fail,
            _ => ShowStatus::None,
        })
    }
}

/// Response body of the `execute` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    #[serde(rename = "stateSwitchText")]
    pub state_switch_label: String,
    #[serde(rename = "stateText")]
    pub state_label: String,
    #[serde(rename = "additionalControls", default)]
    pub additional_controls: String,
    #[serde(rename = "showStatus", default)]
    pub status: ShowStatus,
}

/// Response body of the `updateConfig` and `updateConfigValue` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    #[serde(deserialize_with = "stringified_bool")]
    pub success: bool,
}

/// Response body of the `getLog` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSnapshot {
    #[serde(rename = "logText")]
    pub text: String,
}

fn stringified_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Text(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected \"true\" or \"false\", got {other:?}"
            ))),
        },
    }
}

/// Result of one gateway request. Transport and protocol errors carry no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome<T> {
    Success(T),
    Failure,
}

impl<T> OperationOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success(_))
    }
}

impl<T, E> From<Result<T, E>> for OperationOutcome<T> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => OperationOutcome::Success(v),
            Err(_) => OperationOutcome::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_mapping_serializes_flat() {
        let mut config = ConfigMapping::new();
        config.insert("port".into(), ConfigValue::Text("8080".into()));
        config.insert("verbose".into(), ConfigValue::Flag(true));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"port":"8080","verbose":true}"#);
    }

    #[test]
    fn state_report_reads_server_field_names() {
        let report: StateReport = serde_json::from_str(
            r#"{"stateSwitchText":"Stop","stateText":"running","additionalControls":"","showStatus":"success"}"#,
        )
        .unwrap();
        assert_eq!(report.state_switch_label, "Stop");
        assert_eq!(report.state_label, "running");
        assert_eq!(report.status, ShowStatus::Success);
    }

    #[test]
    fn unknown_show_status_hides_both_indicators() {
        let report: StateReport = serde_json::from_str(
            r#"{"stateSwitchText":"Start","stateText":"not running","additionalControls":"","showStatus":"weird"}"#,
        )
        .unwrap();
        assert_eq!(report.status, ShowStatus::None);
    }

    #[test]
    fn update_report_accepts_string_and_bool() {
        let a: UpdateReport = serde_json::from_str(r#"{"success":"true"}"#).unwrap();
        let b: UpdateReport = serde_json::from_str(r#"{"success":"false"}"#).unwrap();
        let c: UpdateReport = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(a.success);
        assert!(!b.success);
        assert!(c.success);
        assert!(serde_json::from_str::<UpdateReport>(r#"{"success":"yes"}"#).is_err());
        assert!(serde_json::from_str::<UpdateReport>(r#"{}"#).is_err());
    }

    #[test]
    fn checkbox_values_travel_as_true_false() {
        assert_eq!(ConfigValue::Flag(false).to_form_value(), "false");
        assert_eq!(ConfigValue::Text("x y".into()).to_form_value(), "x y");
    }

    #[test]
    fn settings_read_human_durations() {
        let settings: PanelSettings = serde_json::from_str(
            r#"{"base_url":"http://robot:8000","base_path":"commands/","endpoint_suffix":".esp",
                "request_timeout":"10s","log_interval":"1500ms","user_agent":"t"}"#,
        )
        .unwrap();
        assert_eq!(settings.log_interval, Duration::from_millis(1500));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }
}
