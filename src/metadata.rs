//! Metadata Loader
//!
//! Reads a data product directory and builds the fully-qualified product.
//!
//! Directory layout:
//! ```text
//! <directory>/
//!  ├── uuids.yaml          product_uuid + artifact_uuids
//!  ├── product.yaml        product: {...}
//!  ├── publisher.yaml      publisher: {...}
//!  └── **/*artifacts/      one artifact: {...} per .yaml/.yml file
//! ```
//!
//! Loading is all-or-nothing: any missing, malformed or invalid file fails the
//! whole load with a `MetadataError` naming that file.

use crate::models::{Artifact, FqProduct, Product, Publisher, SchemaError, Section, UuidMapping};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const UUIDS_FILE: &str = "uuids.yaml";
pub const PRODUCT_FILE: &str = "product.yaml";
pub const PUBLISHER_FILE: &str = "publisher.yaml";

/// Directories whose name ends with this suffix hold artifact files
const ARTIFACTS_DIR_SUFFIX: &str = "artifacts";

const ARTIFACT_EXTENSIONS: &[&str] = &["yaml", "yml"];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Schema validation failed for {}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("No UUID mapping for artifact '{artifact}' ({})", path.display())]
    Lookup { path: PathBuf, artifact: String },
}

impl MetadataError {
    /// File that caused the failure
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Schema { path, .. }
            | Self::Lookup { path, .. } => path,
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}

// ============================================================================
// METADATA KIND
// ============================================================================

/// Supported metadata source types (`metadata.type` in the configuration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum MetadataKind {
    /// YAML files in a fixed directory layout
    #[default]
    Simple,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown metadata type: {0}")]
pub struct UnknownMetadataType(pub String);

impl TryFrom<String> for MetadataKind {
    type Error = UnknownMetadataType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "simple" => Ok(Self::Simple),
            _ => Err(UnknownMetadataType(value)),
        }
    }
}

impl From<MetadataKind> for String {
    fn from(kind: MetadataKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
        }
    }
}

// ============================================================================
// METADATA SOURCE
// ============================================================================

/// Configured metadata source
#[derive(Debug, Clone)]
pub enum Metadata {
    Simple(SimpleMetadata),
}

impl Metadata {
    pub fn new(kind: MetadataKind, directory: impl Into<PathBuf>) -> Self {
        match kind {
            MetadataKind::Simple => Self::Simple(SimpleMetadata::new(directory)),
        }
    }

    pub fn directory(&self) -> &Path {
        match self {
            Self::Simple(simple) => simple.directory(),
        }
    }

    pub fn load(&self) -> Result<FqProduct, MetadataError> {
        match self {
            Self::Simple(simple) => simple.load(),
        }
    }
}

// ============================================================================
// SIMPLE METADATA
// ============================================================================

/// Loads metadata from YAML files under one directory
#[derive(Debug, Clone)]
pub struct SimpleMetadata {
    directory: PathBuf,
}

impl SimpleMetadata {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load and cross-link the product and its artifacts
    pub fn load(&self) -> Result<FqProduct, MetadataError> {
        info!("Loading metadata from {}", self.directory.display());

        let uuids = self.load_uuids()?;
        let artifact_uuids = uuids.artifact_index();
        debug!(
            "Using product UUID {} and {} artifact UUIDs",
            uuids.product_uuid,
            artifact_uuids.len()
        );

        let mut product = self.load_product()?;
        product.uuid = Some(uuids.product_uuid);

        let loaded_at = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        let mut artifacts = Vec::new();
        for (path, mut artifact) in self.load_artifacts()? {
            let uuid = artifact_uuids
                .get(&artifact.name)
                .copied()
                .ok_or_else(|| MetadataError::Lookup {
                    path: path.clone(),
                    artifact: artifact.name.clone(),
                })?;
            artifact.uuid = Some(uuid);
            artifact.productuuid = Some(uuids.product_uuid);
            artifact.productnamespace = Some(product.namespace.clone());
            artifact.productname = Some(product.name.clone());
            artifact.createtimestamp = Some(loaded_at.clone());
            artifact.updatetimestamp = Some(loaded_at.clone());
            artifacts.push(artifact);
        }

        info!(
            "Loaded product {}/{} ({}) with {} artifacts",
            product.namespace,
            product.name,
            uuids.product_uuid,
            artifacts.len()
        );

        Ok(FqProduct { product, artifacts })
    }

    pub fn load_uuids(&self) -> Result<UuidMapping, MetadataError> {
        let path = self.directory.join(UUIDS_FILE);
        info!("Loading uuids: {}", path.display());
        let doc = read_document(&path)?;
        UuidMapping::from_document(&doc).map_err(|source| MetadataError::Schema { path, source })
    }

    pub fn load_product(&self) -> Result<Product, MetadataError> {
        let path = self.directory.join(PRODUCT_FILE);
        info!("Loading product: {}", path.display());
        load_section(&path)
    }

    /// Load the owning publisher
    ///
    /// Not part of `load()`: the publisher is not attached to the product.
    pub fn load_publisher(&self) -> Result<Publisher, MetadataError> {
        let path = self.directory.join(PUBLISHER_FILE);
        info!("Loading publisher: {}", path.display());
        load_section(&path)
    }

    /// Every artifact file under any `*artifacts` directory, in path order
    pub fn load_artifacts(&self) -> Result<Vec<(PathBuf, Artifact)>, MetadataError> {
        let mut artifacts = Vec::new();
        let walker = WalkDir::new(&self.directory)
            .min_depth(2)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.directory.clone());
                MetadataError::Io {
                    path,
                    source: e.into(),
                }
            })?;

            if !entry.file_type().is_file() || !is_artifact_file(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            info!("Loading artifact: {}", path.display());
            let artifact = load_section::<Artifact>(&path)?;
            artifacts.push((path, artifact));
        }

        Ok(artifacts)
    }
}

fn is_artifact_file(path: &Path) -> bool {
    let in_artifacts_dir = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(ARTIFACTS_DIR_SUFFIX));

    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext));

    in_artifacts_dir && has_extension
}

fn read_document(path: &Path) -> Result<serde_yaml::Value, MetadataError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            MetadataError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            MetadataError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_yaml::from_str(&contents).map_err(|source| MetadataError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_section<T: Section>(path: &Path) -> Result<T, MetadataError> {
    let doc = read_document(path)?;
    T::from_document(&doc).map_err(|source| MetadataError::Schema {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    pub const PRODUCT_UUID: &str = "0b6f7c3e-9d1a-4c59-8f2e-5a4b3c2d1e01";
    pub const ARTIFACT_UUID: &str = "0b6f7c3e-9d1a-4c59-8f2e-5a4b3c2d1e02";

    /// Minimal valid directory: one product, one artifact named `a`
    pub fn write_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(UUIDS_FILE),
            format!("product_uuid: {PRODUCT_UUID}\nartifact_uuids:\n  - a: {ARTIFACT_UUID}\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join(PRODUCT_FILE),
            "product:\n  namespace: ns\n  name: n\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(PUBLISHER_FILE),
            "publisher:\n  name: Acme\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("artifacts")).unwrap();
        fs::write(
            dir.path().join("artifacts").join("a.yaml"),
            "artifact:\n  name: a\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_load_scenario() {
        let dir = write_fixture();
        let fq = SimpleMetadata::new(dir.path()).load().unwrap();

        assert_eq!(fq.product.uuid.unwrap().to_string(), PRODUCT_UUID);
        assert_eq!(fq.product.namespace, "ns");
        assert_eq!(fq.product.name, "n");
        assert!(fq.product.address.is_none());

        assert_eq!(fq.artifacts.len(), 1);
        let artifact = &fq.artifacts[0];
        assert_eq!(artifact.uuid.unwrap().to_string(), ARTIFACT_UUID);
        assert_eq!(artifact.productuuid.unwrap().to_string(), PRODUCT_UUID);
        assert_eq!(artifact.productnamespace.as_deref(), Some("ns"));
        assert_eq!(artifact.productname.as_deref(), Some("n"));
        assert!(artifact.createtimestamp.is_some());
        assert_eq!(artifact.createtimestamp, artifact.updatetimestamp);
    }

    #[test]
    fn test_load_nested_artifact_directories() {
        let dir = write_fixture();
        let nested = dir.path().join("sales").join("sales-artifacts");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.yml"), "artifact:\n  name: b\n").unwrap();
        fs::write(nested.join("notes.txt"), "not an artifact").unwrap();
        // Not an artifacts directory
        fs::create_dir(dir.path().join("samples")).unwrap();
        fs::write(dir.path().join("samples").join("c.yaml"), "artifact:\n  name: c\n").unwrap();

        fs::write(
            dir.path().join(UUIDS_FILE),
            format!(
                "product_uuid: {PRODUCT_UUID}\nartifact_uuids:\n  - a: {ARTIFACT_UUID}\n  - b: 0b6f7c3e-9d1a-4c59-8f2e-5a4b3c2d1e03\n"
            ),
        )
        .unwrap();

        let fq = SimpleMetadata::new(dir.path()).load().unwrap();
        let mut names: Vec<_> = fq.artifacts.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        for artifact in &fq.artifacts {
            assert_eq!(artifact.productuuid, fq.product.uuid);
        }
    }

    #[test]
    fn test_load_last_uuid_wins() {
        let dir = write_fixture();
        fs::write(
            dir.path().join(UUIDS_FILE),
            format!(
                "product_uuid: {PRODUCT_UUID}\nartifact_uuids:\n  - a: 0b6f7c3e-9d1a-4c59-8f2e-5a4b3c2d1eff\n  - a: {ARTIFACT_UUID}\n"
            ),
        )
        .unwrap();

        let fq = SimpleMetadata::new(dir.path()).load().unwrap();
        assert_eq!(fq.artifacts[0].uuid.unwrap().to_string(), ARTIFACT_UUID);
    }

    #[test]
    fn test_load_missing_uuids_file() {
        let dir = write_fixture();
        fs::remove_file(dir.path().join(UUIDS_FILE)).unwrap();

        let err = SimpleMetadata::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MetadataError::NotFound { .. }));
        assert_eq!(err.path(), dir.path().join(UUIDS_FILE));
    }

    #[test]
    fn test_load_malformed_product_yaml() {
        let dir = write_fixture();
        fs::write(dir.path().join(PRODUCT_FILE), "product: [unclosed\n").unwrap();

        let err = SimpleMetadata::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MetadataError::Parse { .. }));
        assert_eq!(err.path(), dir.path().join(PRODUCT_FILE));
    }

    #[test]
    fn test_load_product_schema_mismatch() {
        let dir = write_fixture();
        fs::write(dir.path().join(PRODUCT_FILE), "product:\n  name: n\n").unwrap();

        let err = SimpleMetadata::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MetadataError::Schema { .. }));
    }

    #[test]
    fn test_load_one_bad_artifact_fails_whole_load() {
        let dir = write_fixture();
        fs::write(
            dir.path().join("artifacts").join("broken.yaml"),
            "artifact:\n  description: no name\n",
        )
        .unwrap();

        let err = SimpleMetadata::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MetadataError::Schema { .. }));
        assert!(err.path().ends_with("broken.yaml"));
    }

    #[test]
    fn test_load_artifact_without_uuid_mapping() {
        let dir = write_fixture();
        fs::write(
            dir.path().join("artifacts").join("orphan.yaml"),
            "artifact:\n  name: orphan\n",
        )
        .unwrap();

        let err = SimpleMetadata::new(dir.path()).load().unwrap_err();
        assert!(err.is_lookup());
        assert!(err.to_string().contains("orphan"));
        assert!(err.path().ends_with("orphan.yaml"));
    }

    #[test]
    fn test_load_publisher() {
        let dir = write_fixture();
        let publisher = SimpleMetadata::new(dir.path()).load_publisher().unwrap();
        assert_eq!(publisher.name, "Acme");

        fs::remove_file(dir.path().join(PUBLISHER_FILE)).unwrap();
        // Publisher is not required by load()
        assert!(SimpleMetadata::new(dir.path()).load().is_ok());
        assert!(matches!(
            SimpleMetadata::new(dir.path()).load_publisher(),
            Err(MetadataError::NotFound { .. })
        ));
    }

    #[test]
    fn test_metadata_kind_parsing() {
        assert_eq!(
            MetadataKind::try_from("simple".to_string()),
            Ok(MetadataKind::Simple)
        );
        assert_eq!(
            MetadataKind::try_from("graph".to_string()),
            Err(UnknownMetadataType("graph".to_string()))
        );
        assert_eq!(MetadataKind::Simple.to_string(), "simple");
    }

    #[test]
    fn test_metadata_dispatch() {
        let dir = write_fixture();
        let metadata = Metadata::new(MetadataKind::Simple, dir.path());
        assert_eq!(metadata.directory(), dir.path());
        assert_eq!(metadata.load().unwrap().artifacts.len(), 1);
    }
}
