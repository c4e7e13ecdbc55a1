//! Metadata Store
//!
//! Holds the currently published `FqProduct` snapshot. Readers get an `Arc`
//! to a complete snapshot; a reload swaps in a new one in a single step.

use crate::models::FqProduct;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MetadataStore {
    current: RwLock<Option<Arc<FqProduct>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` until the first load has been published
    pub fn get(&self) -> Option<Arc<FqProduct>> {
        self.current.read().clone()
    }

    /// Replace the snapshot
    pub fn set(&self, product: FqProduct) {
        let next = Arc::new(product);
        *self.current.write() = Some(next);
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}
