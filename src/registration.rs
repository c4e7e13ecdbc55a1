//! Registration Coordinator
//!
//! Registration MUST succeed before the product can interact with the rest of
//! the system, so it is retried on a fixed interval until the registrar
//! accepts it. Each success overwrites a confirmation record in the metadata
//! directory for the product owner.

use crate::config::RegistrationConfig;
use crate::models::Product;
use crate::registrar::{RegistrarClient, RegistrarError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Address advertised to the registrar: `http://<host>:<port>`
///
/// The host is the configured override or this machine's hostname.
pub fn resolve_address(config: &RegistrationConfig) -> String {
    let host = config
        .advertise_host
        .clone()
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());
    format!("http://{}:{}", host, config.advertise_port)
}

/// What was registered, and when
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRecord {
    pub namespace: String,
    pub name: String,
    pub address: String,
    pub registered_at: DateTime<Local>,
}

impl RegistrationRecord {
    /// Confirmation file contents: a comment banner plus `address:`
    pub fn render(&self) -> String {
        let registered_on = self.registered_at.format("%d-%b-%Y %H:%M:%S");
        format!(
            "#####\n\
             #\n\
             # Data Product Address Registration\n\
             #\n\
             # Namespace: {}\n\
             # Name: {}\n\
             #\n\
             # -----\n\
             #\n\
             # Registered on: {}\n\
             #\n\
             #####\n\
             address: {}\n",
            self.namespace, self.name, registered_on, self.address
        )
    }

    pub async fn persist(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render()).await
    }
}

pub struct RegistrationCoordinator {
    client: Arc<dyn RegistrarClient>,
    address: String,
    record_path: PathBuf,
    retry_interval: Duration,
}

impl RegistrationCoordinator {
    pub fn new(
        client: Arc<dyn RegistrarClient>,
        address: String,
        record_path: PathBuf,
        retry_interval: Duration,
    ) -> Self {
        Self {
            client,
            address,
            record_path,
            retry_interval,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Register `product` at this instance's address, retrying forever
    pub async fn register(&self, product: &Product) -> RegistrationRecord {
        self.register_with(product, |_| {}, |_| {}).await
    }

    /// Same as `register`, calling `on_attempt` with the attempt number before
    /// every try and `on_failure` after every failed one
    pub async fn register_with<A, F>(
        &self,
        product: &Product,
        mut on_attempt: A,
        mut on_failure: F,
    ) -> RegistrationRecord
    where
        A: FnMut(u64) + Send,
        F: FnMut(&RegistrarError) + Send,
    {
        let mut product = product.clone();
        product.address = Some(self.address.clone());
        info!("Product address: {}", self.address);

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            info!(
                "Registering product {}/{} with registrar {} (attempt {})",
                product.namespace,
                product.name,
                self.client.endpoint(),
                attempt
            );
            on_attempt(attempt);

            match self.client.register_product(&product).await {
                Ok(()) => {
                    info!("Registration SUCCESS after {} attempt(s)", attempt);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Registration FAILED, retry in {}s: {}",
                        self.retry_interval.as_secs_f64(),
                        e
                    );
                    on_failure(&e);
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }

        let record = RegistrationRecord {
            namespace: product.namespace,
            name: product.name,
            address: self.address.clone(),
            registered_at: Local::now(),
        };

        // The registration itself succeeded; a missing record is only logged
        match record.persist(&self.record_path).await {
            Ok(()) => info!("Wrote registration record: {}", self.record_path.display()),
            Err(e) => error!(
                "Failed to write registration record {}: {}",
                self.record_path.display(),
                e
            ),
        }

        record
    }
}
