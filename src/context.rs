//! Application context shared by the reload worker and the HTTP handlers.

use crate::config::AppConfig;
use crate::metadata::Metadata;
use crate::registrar::HttpRegistrarClient;
use crate::registration::{resolve_address, RegistrationCoordinator};
use crate::reload::ReloadStatus;
use crate::store::MetadataStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct AppContext {
    pub metadata: Metadata,
    pub store: MetadataStore,
    pub registration: RegistrationCoordinator,
    pub status: ReloadStatus,
    /// Delay between failed metadata loads
    pub metadata_retry: Duration,
}

impl AppContext {
    pub fn new(
        metadata: Metadata,
        registration: RegistrationCoordinator,
        metadata_retry: Duration,
    ) -> Self {
        Self {
            metadata,
            store: MetadataStore::new(),
            registration,
            status: ReloadStatus::default(),
            metadata_retry,
        }
    }

    /// Wire up the HTTP registrar and metadata source from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let registrar = Arc::new(HttpRegistrarClient::new(&config.proxy.base_url()));
        let registration = RegistrationCoordinator::new(
            registrar,
            resolve_address(&config.registration),
            config.registration_file(),
            config.registration.retry_interval(),
        );
        let metadata = Metadata::new(config.metadata.kind, &config.metadata.directory);

        Self::new(metadata, registration, config.metadata.retry_interval())
    }

    pub fn registration_file(&self) -> &Path {
        self.registration.record_path()
    }
}
