//! Registrar Client
//!
//! The registrar makes data products discoverable. A product announces itself
//! by POSTing its flat field mapping (including its network address) to
//! `/api/registrar/products`.

use crate::models::Product;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const REGISTER_PRODUCT_PATH: &str = "/api/registrar/products";
pub const HEADER_USERNAME: &str = "OSC-DM-Username";
pub const HEADER_CORRELATION_ID: &str = "OSC-DM-Correlation-ID";
pub const USERNAME: &str = "guest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("Failed to reach registrar: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Registrar rejected registration: {status} {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// Register (or re-register) a product
    async fn register_product(&self, product: &Product) -> Result<(), RegistrarError>;

    /// Human-readable target for logs
    fn endpoint(&self) -> String;
}

/// Registrar reached over HTTP
pub struct HttpRegistrarClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistrarClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RegistrarClient for HttpRegistrarClient {
    async fn register_product(&self, product: &Product) -> Result<(), RegistrarError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "POST {} (correlation id {})",
            self.endpoint(),
            correlation_id
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(HEADER_USERNAME, USERNAME)
            .header(HEADER_CORRELATION_ID, &correlation_id)
            .timeout(REQUEST_TIMEOUT)
            .json(product)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Registrar accepted {}/{} (status {})",
            product.namespace, product.name, status
        );
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, REGISTER_PRODUCT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn product() -> Product {
        Product {
            uuid: Some(uuid::Uuid::new_v4()),
            namespace: "ns".to_string(),
            name: "n".to_string(),
            publisher: None,
            description: None,
            tags: vec![],
            address: Some("http://product-0:8000".to_string()),
            createtimestamp: None,
            updatetimestamp: None,
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = HttpRegistrarClient::new("http://registrar:8080/");
        assert_eq!(
            client.endpoint(),
            "http://registrar:8080/api/registrar/products"
        );
    }

    #[tokio::test]
    async fn test_register_product_success() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(REGISTER_PRODUCT_PATH)
                .header(HEADER_USERNAME, USERNAME)
                .header_exists(HEADER_CORRELATION_ID)
                .json_body_partial(
                    r#"{"namespace": "ns", "name": "n", "address": "http://product-0:8000"}"#,
                );
            then.status(200)
                .header("content-type", "application/json")
                .body("{}");
        });

        let client = HttpRegistrarClient::new(&server.base_url());
        let result = client.register_product(&product()).await;
        assert!(result.is_ok());
        mock.assert();
    }

    #[tokio::test]
    async fn test_register_product_rejected() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path(REGISTER_PRODUCT_PATH);
            then.status(500).body("registrar down");
        });

        let client = HttpRegistrarClient::new(&server.base_url());
        let err = client.register_product(&product()).await.unwrap_err();
        match err {
            RegistrarError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "registrar down");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_register_product_connection_error() {
        // Valid but likely-unused port
        let client = HttpRegistrarClient::new("http://127.0.0.1:65534");
        let err = client.register_product(&product()).await.unwrap_err();
        assert!(matches!(err, RegistrarError::Transport(_)));
        assert!(err.to_string().contains("Failed to reach registrar"));
    }
}
