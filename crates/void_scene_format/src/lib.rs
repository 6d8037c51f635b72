//! # Void Scene Format
//!
//! Binary scene asset format shared by the offline scene compiler and the
//! runtime loader:
//! - Hashed string and asset identifiers
//! - Version 1 scene records (header, nodes, item payloads)
//! - Material property records
//! - Compressed container framing
//! - Scene buffer reader
//!
//! ## Layout
//!
//! ```text
//! ContainerHeader ──► deflate( SceneHeader ─ Nodes ─ Node { ItemHeader + payload }* )
//! ```

pub mod container;
pub mod ids;
pub mod material;
pub mod reader;
pub mod v1;

pub use container::ContainerHeader;
pub use ids::{AssetId, MaterialPropertyId, MaterialTechniqueId, SceneItemTypeId, StringId};
pub use material::{
    MaterialProperty, MaterialPropertyRecord, MaterialPropertyValue, MaterialPropertyValueType, SortedPropertyVector,
};
pub use reader::{
    load_scene_bytes, load_scene_file, DecodedPayload, MaterialData, MeshData, SceneData, SceneItemRecord, SceneNode,
    SceneReader,
};
pub use v1::{FORMAT_TYPE, FORMAT_VERSION};

use thiserror::Error;

/// Errors from decoding scene buffers and containers
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Truncated data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Format type mismatch: expected {expected}, found {found}")]
    FormatTypeMismatch { expected: StringId, found: StringId },

    #[error("Format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("Data too large for the format: {0} bytes")]
    TooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
