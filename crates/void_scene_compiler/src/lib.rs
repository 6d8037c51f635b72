//! # Void Scene Compiler
//!
//! Offline compiler turning JSON scene descriptions into binary scene assets:
//! - Asset reference resolution through an [`AssetContext`]
//! - Typed property readers with unit and range validation
//! - Closed registry of scene item types
//! - Two-pass binary writer and compressed, atomically written artifacts
//! - Incremental build cache keyed on input content and RHI target
//!
//! ## Architecture
//!
//! ```text
//! scene.json ──► readers ──► items registry ──► SceneWriter ──► container ──► .scene
//!                   │                                                          ▲
//!                   └── AssetContext (catalog)          CacheManager gate ─────┘
//! ```

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod items;
pub mod output;
pub mod readers;
pub mod writer;

pub use batch::compile_batch;
pub use cache::{
    decide, ArtifactKey, BuildDecision, BuildRequest, CacheEntry, CacheError, CacheManager, Fingerprint, GateState,
    RecompileReason,
};
pub use catalog::{AssetCatalog, AssetContext, CatalogError};
pub use compiler::{CompileOutcome, SceneAssetCompiler};
pub use config::{CompilerConfig, ConfigError};
pub use document::{ItemEntries, SceneDocument, SourceNode};
pub use error::{CompileError, ErrorKind, FieldError, UnresolvedReference};
pub use items::{ItemPayload, SceneItemKind, SceneItemType, SCENE_ITEM_TYPES};
pub use writer::SceneWriter;
