//! Persistence seam for materialized images.

use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::image::MaterializedImage;

/// Durable store that takes ownership of finished images.
pub trait Persistence {
    /// Error reported when an image cannot be stored.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stores `image` under `logical_path`.
    fn store(&mut self, image: MaterializedImage, logical_path: &str) -> Result<(), Self::Error>;
}

/// In-memory store keyed by logical path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: BTreeMap<String, MaterializedImage>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Image stored under `logical_path`.
    pub fn get(&self, logical_path: &str) -> Option<&MaterializedImage> {
        self.images.get(logical_path)
    }

    /// Removes and returns the image stored under `logical_path`.
    pub fn take(&mut self, logical_path: &str) -> Option<MaterializedImage> {
        self.images.remove(logical_path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Logical paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

impl Persistence for MemoryStore {
    type Error = Infallible;

    fn store(&mut self, image: MaterializedImage, logical_path: &str) -> Result<(), Infallible> {
        if self.images.insert(logical_path.to_owned(), image).is_some() {
            log::debug!("replaced stored image at {logical_path}");
        }
        Ok(())
    }
}
