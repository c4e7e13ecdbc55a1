//! Data Product Metadata Server
//!
//! Serves the metadata of one data product over HTTP and registers the
//! product's address with the registrar.
//!
//! ## Module Structure
//!
//! - `models`: Product, Artifact, Publisher and UUID mapping schema
//! - `metadata`: Loads and validates the metadata directory
//! - `store`: Holds the published snapshot
//! - `registrar`: Registrar HTTP client
//! - `registration`: Registration with unbounded retry
//! - `watcher`: Polling directory watcher
//! - `reload`: Load → register → publish cycles
//! - `context`: Application context shared by workers and handlers
//! - `config`: YAML configuration
//! - `api`: REST API

pub mod api;
pub mod config;
pub mod context;
pub mod metadata;
pub mod models;
pub mod registrar;
pub mod registration;
pub mod reload;
pub mod store;
pub mod watcher;

pub use config::{AppConfig, ConfigError};
pub use context::AppContext;
pub use metadata::{Metadata, MetadataError, MetadataKind, SimpleMetadata};
pub use models::{Artifact, FqProduct, Product, Publisher, SchemaError, UuidMapping};
pub use registrar::{HttpRegistrarClient, RegistrarClient, RegistrarError};
pub use registration::{RegistrationCoordinator, RegistrationRecord};
pub use reload::{ReloadOrchestrator, ReloadOutcome, ReloadState};
pub use store::MetadataStore;
pub use watcher::{ChangeEvent, ChangeKind, DirectoryWatcher};
