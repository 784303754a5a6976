// file: src/api/client.rs
// version: 1.0.0
// guid: d41e9a3c-27b8-4f65-8c0d-f9a6b2e1c754

//! HTTP client for the platform API

use super::{
    ApiConnector, BootstrapResponse, HostRecord, InstalledHost, PlatformApi, SetupOptions,
    BOOTSTRAP_PATH, HOSTS_PATH,
};
use crate::{error::InstallError, Result};
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest backed `PlatformApi`
pub struct PlatformClient {
    http: Client,
    base: Url,
    token: RwLock<Option<String>>,
}

impl PlatformClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| InstallError::config(format!("invalid API URL {}: {}", base_url, e)))?;
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base,
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: Option<&str>) -> Self {
        Self {
            token: RwLock::new(token.map(String::from)),
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| InstallError::config(format!("invalid API path {}: {}", path, e)))
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.header(AUTHORIZATION, format!("bearer {}", token)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(InstallError::ApiError {
                status,
                message: message.trim().to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl PlatformApi for PlatformClient {
    async fn bootstrap(&self, opts: &SetupOptions) -> Result<BootstrapResponse> {
        let url = self.endpoint(BOOTSTRAP_PATH)?;
        debug!("POST {}", url);

        let response: BootstrapResponse =
            self.send(self.http.post(url).json(opts)).await?.json().await?;
        *self.token.write().await = Some(response.token.clone());
        Ok(response)
    }

    async fn register_host(&self, record: &HostRecord) -> Result<()> {
        let url = self.endpoint(HOSTS_PATH)?;
        debug!("POST {} ({})", url, record.name);

        self.send(self.http.post(url).form(&record.form_fields()?))
            .await?;
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<InstalledHost>> {
        let url = self.endpoint(HOSTS_PATH)?;
        debug!("GET {}", url);

        let response = self.send(self.http.get(url)).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        Ok(response.json().await?)
    }

    async fn get_host(&self, name: &str) -> Result<InstalledHost> {
        let mut url = self.endpoint(HOSTS_PATH)?;
        url.path_segments_mut()
            .map_err(|_| InstallError::config(format!("API URL {} cannot hold a path", self.base)))?
            .push(name);
        debug!("GET {}", url);

        Ok(self.send(self.http.get(url)).await?.json().await?)
    }
}

/// Connects real `PlatformClient`s
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl ApiConnector for HttpConnector {
    fn connect(&self, base_url: &str, token: Option<&str>) -> Result<Arc<dyn PlatformApi>> {
        Ok(Arc::new(PlatformClient::new(base_url)?.with_token(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup() -> SetupOptions {
        SetupOptions {
            login: "admin@example.com".to_string(),
            password: "admin123".to_string(),
            target: String::new(),
            target_name: "paas".to_string(),
            nodes: vec!["192.168.0.1".to_string()],
        }
    }

    #[tokio::test]
    async fn test_bootstrap_then_authorized_calls() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.3/install/bootstrap"))
            .and(body_json(json!({
                "login": "admin@example.com",
                "password": "admin123",
                "targetName": "paas",
                "nodes": ["192.168.0.1"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.3/install/hosts"))
            .and(header("authorization", "bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "paas-1", "driverName": "virtualbox", "driver": {"IPAddress": "10.0.0.1"}, "sshPrivateKey": "KEY"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri())?;
        let response = client.bootstrap(&setup()).await?;
        assert_eq!(response.token, "abc");

        let hosts = client.list_hosts().await?;
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].driver_name, "virtualbox");
        assert_eq!(hosts[0].driver["IPAddress"], "10.0.0.1");
        Ok(())
    }

    #[tokio::test]
    async fn test_register_host_is_form_encoded() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.3/install/hosts"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("name=paas-1"))
            .and(body_string_contains("driverName=virtualbox"))
            .and(body_string_contains("sshPrivateKey=KEY"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri())?.with_token(Some("abc"));
        client
            .register_host(&HostRecord {
                name: "paas-1".to_string(),
                driver_name: "virtualbox".to_string(),
                driver: json!({}),
                ssh_private_key: "KEY".to_string(),
                ca_cert: String::new(),
                ca_private_key: String::new(),
            })
            .await
    }

    #[tokio::test]
    async fn test_get_host_by_name() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.3/install/hosts/paas-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "paas-2", "driverName": "amazonec2"})),
            )
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri())?;
        let host = client.get_host("paas-2").await?;
        assert_eq!(host.driver_name, "amazonec2");
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.3/install/hosts/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("host not found\n"))
            .mount(&server)
            .await;

        let client = PlatformClient::new(&server.uri())?;
        match client.get_host("missing").await {
            Err(InstallError::ApiError { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "host not found");
            }
            other => panic!("unexpected result: {:?}", other.map(|h| h.name)),
        }
        Ok(())
    }

    #[test]
    fn test_builder_errors_surface_as_http_error() {
        let err: InstallError = Client::new().get("not a url").build().unwrap_err().into();
        assert!(matches!(err, InstallError::HttpError(ref e) if e.is_builder()));
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            PlatformClient::new("not a url"),
            Err(InstallError::ConfigError(_))
        ));
    }
}
