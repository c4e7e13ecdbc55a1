//! Data Product Schema
//!
//! Entities describing a single data product:
//! - `UuidMapping`: product and artifact identifiers (`uuids.yaml`)
//! - `Product`: the product itself (`product.yaml`)
//! - `Publisher`: owning organization (`publisher.yaml`)
//! - `Artifact`: one entry per file in an `*artifacts` directory
//! - `FqProduct`: product plus artifacts, the unit published to the store
//!
//! Each entity is decoded from a named top-level section of its YAML file and
//! then validated. Decoding and validation failures surface as `SchemaError`.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Missing section: {0}")]
    MissingSection(&'static str),
    #[error("Invalid document: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("Invalid field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Entities that are read from a named section of a YAML document
pub trait Section: DeserializeOwned {
    /// Top-level key holding the entity (e.g. `product`)
    const SECTION: &'static str;

    /// Field-level checks run after decoding
    fn validate(&self) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Decode and validate the entity from a parsed document
    fn from_document(doc: &serde_yaml::Value) -> Result<Self, SchemaError> {
        let section = doc
            .get(Self::SECTION)
            .filter(|v| !v.is_null())
            .ok_or(SchemaError::MissingSection(Self::SECTION))?;
        let entity: Self = serde_yaml::from_value(section.clone())?;
        entity.validate()?;
        Ok(entity)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// UUID MAPPING
// ============================================================================

/// Contents of `uuids.yaml`
///
/// `artifact_uuids` is a list of single-entry maps, e.g.
/// `[{orders: <uuid>}, {customers: <uuid>}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UuidMapping {
    pub product_uuid: Uuid,
    #[serde(default)]
    pub artifact_uuids: Vec<BTreeMap<String, Uuid>>,
}

impl UuidMapping {
    /// Parse the mapping from a whole document (no enclosing section)
    pub fn from_document(doc: &serde_yaml::Value) -> Result<Self, SchemaError> {
        let mapping: Self = serde_yaml::from_value(doc.clone())?;
        for name in mapping.artifact_uuids.iter().flat_map(|m| m.keys()) {
            require("artifact_uuids", name)?;
        }
        Ok(mapping)
    }

    /// Flatten the entry list into name -> uuid. Later entries win.
    pub fn artifact_index(&self) -> IndexMap<String, Uuid> {
        let mut index = IndexMap::new();
        for entry in &self.artifact_uuids {
            for (name, uuid) in entry {
                index.insert(name.clone(), *uuid);
            }
        }
        index
    }
}

// ============================================================================
// PUBLISHER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Organization that owns the product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

impl Section for Publisher {
    const SECTION: &'static str = "publisher";

    fn validate(&self) -> Result<(), SchemaError> {
        require("name", &self.name)
    }
}

// ============================================================================
// PRODUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Assigned from `uuids.yaml` after decoding
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Network address, assigned at registration
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub createtimestamp: Option<String>,
    #[serde(default)]
    pub updatetimestamp: Option<String>,
}

impl Section for Product {
    const SECTION: &'static str = "product";

    fn validate(&self) -> Result<(), SchemaError> {
        require("namespace", &self.namespace)?;
        require("name", &self.name)
    }
}

// ============================================================================
// ARTIFACT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub name: String,
    /// Back-reference to the owning product
    #[serde(default)]
    pub productuuid: Option<Uuid>,
    #[serde(default)]
    pub productnamespace: Option<String>,
    #[serde(default)]
    pub productname: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub securitypolicy: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Free-form artifact payload (schema, sample locations, ...)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub createtimestamp: Option<String>,
    #[serde(default)]
    pub updatetimestamp: Option<String>,
}

impl Section for Artifact {
    const SECTION: &'static str = "artifact";

    fn validate(&self) -> Result<(), SchemaError> {
        require("name", &self.name)
    }
}

// ============================================================================
// FULLY-QUALIFIED PRODUCT
// ============================================================================

/// A product together with all of its artifacts
///
/// Never mutated after publication; a reload builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FqProduct {
    pub product: Product,
    pub artifacts: Vec<Artifact>,
}

impl FqProduct {
    /// Check whether `uuid` identifies this product
    pub fn matches(&self, uuid: &str) -> bool {
        match (self.product.uuid, Uuid::parse_str(uuid)) {
            (Some(own), Ok(requested)) => own == requested,
            _ => false,
        }
    }

    /// Find an artifact by uuid
    pub fn artifact(&self, uuid: &str) -> Option<&Artifact> {
        let requested = Uuid::parse_str(uuid).ok()?;
        self.artifacts.iter().find(|a| a.uuid == Some(requested))
    }

    /// Copy of this product with the registered address applied
    pub fn with_address(&self, address: &str) -> Self {
        let mut next = self.clone();
        next.product.address = Some(address.to_string());
        next
    }
}
