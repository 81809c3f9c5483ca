//! Remediation through the cluster API server
//!
//! Issues a delete-collection request for pods, so no CLI binary needs to be
//! present in the runtime image and the outcome can be reported back.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::remediator::{RemediationError, RemediationReport, Remediator};
use crate::alerts::WorkloadTarget;

/// Client for the pod delete-collection endpoint
#[derive(Debug, Clone)]
pub struct KubeApiRemediator {
    server: String,
    token_file: PathBuf,
    http_client: reqwest::Client,
}

/// Connection settings for the API server
#[derive(Debug, Clone)]
pub struct KubeApiSettings {
    /// Base URL, e.g. `https://10.0.0.1:443`
    pub server: String,
    /// Bearer token file, re-read on every request
    pub token_file: PathBuf,
    /// PEM bundle used to verify the server certificate
    pub ca_file: Option<PathBuf>,
    /// Skip certificate verification
    pub insecure: bool,
    /// Whole-request timeout; None leaves requests unbounded
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodMetadata,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

/// Error body returned by the API server
#[derive(Debug, Deserialize)]
struct ApiStatus {
    message: Option<String>,
}

impl KubeApiRemediator {
    pub fn new(settings: KubeApiSettings) -> Result<Self, RemediationError> {
        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(settings.insecure);

        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(ca_file) = &settings.ca_file {
            let pem = std::fs::read(ca_file).map_err(RemediationError::CaFile)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            server: settings.server.trim_end_matches('/').to_string(),
            token_file: settings.token_file,
            http_client: builder.build()?,
        })
    }

    fn pods_url(&self, namespace: &str) -> String {
        format!("{}/api/v1/namespaces/{}/pods", self.server, namespace)
    }

    async fn read_token(&self) -> Result<String, RemediationError> {
        let token = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(RemediationError::Token)?;
        Ok(token.trim().to_string())
    }
}

#[async_trait]
impl Remediator for KubeApiRemediator {
    fn name(&self) -> &'static str {
        "api"
    }

    #[tracing::instrument(skip(self), fields(server = %self.server))]
    async fn remediate(&self, target: &WorkloadTarget) -> Result<RemediationReport, RemediationError> {
        let token = self.read_token().await?;

        let response = self
            .http_client
            .delete(self.pods_url(&target.namespace))
            .query(&[("labelSelector", target.selector.as_str())])
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiStatus>(&body)
                .ok()
                .and_then(|s| s.message)
                .unwrap_or(body);
            return Err(RemediationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let pods: PodList = serde_json::from_str(&body)?;
        let deleted: Vec<String> = pods.items.into_iter().map(|p| p.metadata.name).collect();
        let detail = format!("{} pod(s) deleted", deleted.len());

        Ok(RemediationReport::new(deleted, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::delete,
        Json, Router,
    };
    use std::collections::HashMap;
    use std::io::Write;
    use tokio::net::TcpListener;

    /// Minimal stand-in for the API server's pod collection endpoint
    async fn delete_pods(
        Path(namespace): Path<String>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret-token");

        if !authorized {
            return (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({
                    "kind": "Status",
                    "status": "Failure",
                    "message": "pods is forbidden",
                    "code": 403
                })),
            );
        }

        if namespace != "securebank" {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"message": format!("namespaces \"{}\" not found", namespace)})),
            );
        }

        let items = match params.get("labelSelector").map(String::as_str) {
            Some("app=backend") => vec![
                serde_json::json!({"metadata": {"name": "backend-1"}}),
                serde_json::json!({"metadata": {"name": "backend-2"}}),
            ],
            _ => vec![],
        };

        (
            StatusCode::OK,
            Json(serde_json::json!({"kind": "PodList", "items": items})),
        )
    }

    async fn spawn_api_server() -> String {
        let app = Router::new().route("/api/v1/namespaces/:namespace/pods", delete(delete_pods));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Self-signed CA certificate (P-256)
    const TEST_CA_PEM: &str = "\
-----BEGIN CERTIFICATE-----
MIIBiDCCAS2gAwIBAgIURHIuElYbUQxYoCRjW96e/0vOqI0wCgYIKoZIzj0EAwIw
GDEWMBQGA1UEAwwNbWVkaWMtdGVzdC1jYTAgFw0yNjEwMTgxMzE3MzhaGA8yMTI2
MDkyNDEzMTczOFowGDEWMBQGA1UEAwwNbWVkaWMtdGVzdC1jYTBZMBMGByqGSM49
AgEGCCqGSM49AwEHA0IABNE1/15cxd3JUqAusjNM3tmUEh7Ut865TCwG/LaBetnJ
HV20K32HPjQmqUqreo9047I46n983SYFp3WtguKOYH6jUzBRMB0GA1UdDgQWBBRm
0ed/PievvTIBKFSYe/5VZpJa3DAfBgNVHSMEGDAWgBRm0ed/PievvTIBKFSYe/5V
ZpJa3DAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49BAMCA0kAMEYCIQCdawy/EVOA
or57ZIFH0kYAo5GZgAvbD4vtkdSuwTbZmgIhAIqLBqHkPvGuA3Sl8yutEZ2CE8zE
vmORjYN0aTqdxBPh
-----END CERTIFICATE-----
";

    fn settings_with_ca(
        server: String,
        token: &tempfile::NamedTempFile,
        ca_file: PathBuf,
    ) -> KubeApiSettings {
        KubeApiSettings {
            server,
            token_file: token.path().to_path_buf(),
            ca_file: Some(ca_file),
            insecure: false,
            timeout: Some(Duration::from_secs(5)),
        }
    }

    fn token_file(token: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", token).unwrap();
        file
    }

    fn remediator(server: String, token_file: &tempfile::NamedTempFile) -> KubeApiRemediator {
        KubeApiRemediator::new(KubeApiSettings {
            server,
            token_file: token_file.path().to_path_buf(),
            ca_file: None,
            insecure: false,
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let server = spawn_api_server().await;
        let token = token_file("secret-token");

        let report = remediator(server, &token)
            .remediate(&WorkloadTarget::default())
            .await
            .unwrap();

        assert_eq!(report.deleted, vec!["backend-1", "backend-2"]);
        assert_eq!(report.detail, "2 pod(s) deleted");
    }

    #[tokio::test]
    async fn test_api_error_uses_status_message() {
        let server = spawn_api_server().await;
        let token = token_file("wrong-token");

        let err = remediator(server, &token)
            .remediate(&WorkloadTarget::default())
            .await
            .unwrap_err();

        match err {
            RemediationError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "pods is forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_token_file() {
        let server = spawn_api_server().await;
        let api = KubeApiRemediator::new(KubeApiSettings {
            server,
            token_file: PathBuf::from("/nonexistent/medic/token"),
            ca_file: None,
            insecure: false,
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();

        let err = api.remediate(&WorkloadTarget::default()).await.unwrap_err();
        assert!(matches!(err, RemediationError::Token(_)));
    }

    #[tokio::test]
    async fn test_ca_bundle_is_loaded() {
        let server = spawn_api_server().await;
        let token = token_file("secret-token");
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(TEST_CA_PEM.as_bytes()).unwrap();

        let settings = settings_with_ca(server, &token, ca.path().to_path_buf());
        let api = KubeApiRemediator::new(settings).unwrap();
        let report = api.remediate(&WorkloadTarget::default()).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
    }

    #[test]
    fn test_unreadable_ca_file() {
        let token = token_file("t");
        let err = KubeApiRemediator::new(settings_with_ca(
            "https://10.0.0.1:443".to_string(),
            &token,
            PathBuf::from("/nonexistent/medic/ca.crt"),
        ))
        .unwrap_err();

        assert!(matches!(err, RemediationError::CaFile(_)));
        assert!(err.to_string().contains("CA"), "{err}");
    }

    #[test]
    fn test_corrupt_ca_bundle() {
        let token = token_file("t");
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(b"-----BEGIN CERTIFICATE-----\n%%%not base64%%%\n-----END CERTIFICATE-----\n")
            .unwrap();

        let err = KubeApiRemediator::new(settings_with_ca(
            "https://10.0.0.1:443".to_string(),
            &token,
            ca.path().to_path_buf(),
        ))
        .unwrap_err();

        assert!(matches!(err, RemediationError::Http(_)));
    }

    #[test]
    fn test_pods_url_trims_trailing_slash() {
        let token = token_file("t");
        let api = remediator("https://10.0.0.1:443/".to_string(), &token);
        assert_eq!(
            api.pods_url("securebank"),
            "https://10.0.0.1:443/api/v1/namespaces/securebank/pods"
        );
    }
}
