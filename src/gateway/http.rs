use super::{GatewayError, Operation, RequestGateway};
use crate::model::{
    ConfigMapping, ConfigValue, LogSnapshot, OperationOutcome, PanelSettings, ProgramId,
    StateReport, UpdateReport,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Gateway that POSTs form-encoded bodies and reads JSON answers.
pub struct HttpGateway {
    http: Client,
    base: Url,
    endpoint_suffix: String,
}

impl HttpGateway {
    pub fn new(settings: &PanelSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base: request_base(&settings.base_url, &settings.base_path)?,
            endpoint_suffix: settings.endpoint_suffix.clone(),
        })
    }

    pub fn endpoint_url(&self, op: Operation) -> Result<Url, url::ParseError> {
        self.base
            .join(&format!("{}{}", op.endpoint(), self.endpoint_suffix))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        op: Operation,
        form: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = self.endpoint_url(op)?;
        debug!(endpoint = op.endpoint(), %url, "sending request");
        let resp = self.http.post(url).form(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_config<T: DeserializeOwned>(
        &self,
        op: Operation,
        program: &ProgramId,
        config: &ConfigMapping,
    ) -> Result<T, GatewayError> {
        let config = serde_json::to_string(config).map_err(GatewayError::Encode)?;
        self.post_form(op, &[("name", program.to_string()), ("config", config)])
            .await
    }
}

/// Collapse a request result into an outcome, logging why it failed.
fn settle<T>(
    op: Operation,
    program: Option<&ProgramId>,
    res: Result<T, GatewayError>,
) -> OperationOutcome<T> {
    if let Err(e) = &res {
        match program {
            Some(p) => warn!(endpoint = op.endpoint(), program = %p, error = %e, "request failed"),
            None => warn!(endpoint = op.endpoint(), error = %e, "request failed"),
        }
    }
    res.into()
}

/// Join the origin and the request base path into a directory-like URL.
fn request_base(base_url: &str, base_path: &str) -> Result<Url> {
    let mut origin = base_url.trim().to_string();
    if !origin.ends_with('/') {
        origin.push('/');
    }
    let origin = Url::parse(&origin).with_context(|| format!("invalid base url {base_url:?}"))?;

    let mut path = base_path.trim().trim_start_matches('/').to_string();
    if !path.is_empty() && !path.ends_with('/') {
        path.push('/');
    }
    origin
        .join(&path)
        .with_context(|| format!("invalid base path {base_path:?}"))
}

#[async_trait]
impl RequestGateway for HttpGateway {
    async fn execute(
        &self,
        program: &ProgramId,
        config: &ConfigMapping,
    ) -> OperationOutcome<StateReport> {
        let res = self
            .post_config(Operation::Execute, program, config)
            .await;
        settle(Operation::Execute, Some(program), res)
    }

    async fn update_config(
        &self,
        program: &ProgramId,
        config: &ConfigMapping,
    ) -> OperationOutcome<UpdateReport> {
        let res = self
            .post_config(Operation::UpdateConfig, program, config)
            .await;
        settle(Operation::UpdateConfig, Some(program), res)
    }

    async fn update_config_value(
        &self,
        program: &ProgramId,
        field: &str,
        value: &ConfigValue,
    ) -> OperationOutcome<UpdateReport> {
        let res = self
            .post_form(
                Operation::UpdateConfigValue,
                &[
                    ("name", program.to_string()),
                    ("target", field.to_string()),
                    ("value", value.to_form_value()),
                ],
            )
            .await;
        settle(Operation::UpdateConfigValue, Some(program), res)
    }

    async fn get_log(&self) -> OperationOutcome<LogSnapshot> {
        let res = self.post_form(Operation::GetLog, &[]).await;
        settle(Operation::GetLog, None, res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShowStatus;
    use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    fn settings(base_url: String, base_path: &str) -> PanelSettings {
        PanelSettings {
            base_url,
            base_path: base_path.into(),
            endpoint_suffix: ".esp".into(),
            request_timeout: Duration::from_secs(5),
            log_interval: Duration::from_millis(1500),
            user_agent: "program-panel-test".into(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn request_base_accepts_both_layouts() {
        let bare = request_base("http://robot:8000", "").unwrap();
        assert_eq!(
            bare.join("execute.esp").unwrap().as_str(),
            "http://robot:8000/execute.esp"
        );
        let prefixed = request_base("http://robot:8000/", "/commands").unwrap();
        assert_eq!(
            prefixed.join("execute.esp").unwrap().as_str(),
            "http://robot:8000/commands/execute.esp"
        );
        let nested = request_base("http://robot:8000/panel", "commands/").unwrap();
        assert_eq!(nested.as_str(), "http://robot:8000/panel/commands/");
        assert!(request_base("not a url", "").is_err());
    }

    #[tokio::test]
    async fn execute_posts_form_and_reads_state() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/commands/execute.esp",
                post(
                    |State(seen): State<Seen>, Form(body): Form<HashMap<String, String>>| async move {
                        seen.lock().unwrap().push(body);
                        Json(serde_json::json!({
                            "stateText": "running",
                            "stateSwitchText": "Stop",
                            "additionalControls": "<button>turn</button>",
                            "showStatus": "none"
                        }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(router).await;
        let gateway = HttpGateway::new(&settings(base, "commands/")).unwrap();

        let mut config = ConfigMapping::new();
        config.insert("speed".into(), ConfigValue::Text("30".into()));
        config.insert("debug".into(), ConfigValue::Flag(true));
        let outcome = gateway.execute(&ProgramId::from("line_follow"), &config).await;

        assert_eq!(
            outcome,
            OperationOutcome::Success(StateReport {
                state_switch_label: "Stop".into(),
                state_label: "running".into(),
                additional_controls: "<button>turn</button>".into(),
                status: ShowStatus::None,
            })
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["name"], "line_follow");
        assert_eq!(seen[0]["config"], r#"{"debug":true,"speed":"30"}"#);
    }

    #[tokio::test]
    async fn update_config_value_sends_target_and_value() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/updateConfigValue.esp",
                post(
                    |State(seen): State<Seen>, Form(body): Form<HashMap<String, String>>| async move {
                        seen.lock().unwrap().push(body);
                        Json(serde_json::json!({ "success": "true" }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(router).await;
        let gateway = HttpGateway::new(&settings(base, "")).unwrap();

        let outcome = gateway
            .update_config_value(&ProgramId::from("p"), "verbose", &ConfigValue::Flag(false))
            .await;
        assert_eq!(outcome, OperationOutcome::Success(UpdateReport { success: true }));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["target"], "verbose");
        assert_eq!(seen[0]["value"], "false");
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let router = Router::new().route(
            "/updateConfig.esp",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;
        let gateway = HttpGateway::new(&settings(base, "")).unwrap();
        let outcome = gateway
            .update_config(&ProgramId::from("p"), &ConfigMapping::new())
            .await;
        assert_eq!(outcome, OperationOutcome::Failure);
    }

    #[tokio::test]
    async fn malformed_body_is_failure() {
        let router = Router::new()
            .route("/execute.esp", post(|| async { "<html>not json</html>" }))
            .route(
                "/getLog.esp",
                post(|| async { Json(serde_json::json!({ "text": "wrong key" })) }),
            );
        let base = serve(router).await;
        let gateway = HttpGateway::new(&settings(base, "")).unwrap();
        assert_eq!(
            gateway
                .execute(&ProgramId::from("p"), &ConfigMapping::new())
                .await,
            OperationOutcome::Failure
        );
        assert_eq!(gateway.get_log().await, OperationOutcome::Failure);
    }

    #[tokio::test]
    async fn unreachable_server_is_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let gateway = HttpGateway::new(&settings(format!("http://{addr}"), "")).unwrap();
        assert_eq!(gateway.get_log().await, OperationOutcome::Failure);
    }

    #[tokio::test]
    async fn get_log_reads_log_text() {
        let router = Router::new().route(
            "/commands/getLog.esp",
            post(|| async { Json(serde_json::json!({ "logText": "line 1\nline 2" })) }),
        );
        let base = serve(router).await;
        let gateway = HttpGateway::new(&settings(base, "commands")).unwrap();
        assert_eq!(
            gateway.get_log().await,
            OperationOutcome::Success(LogSnapshot {
                text: "line 1\nline 2".into()
            })
        );
    }
}
