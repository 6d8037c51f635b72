//! Asset catalog
//!
//! Maps human-readable asset references to the numeric [`AssetId`]s the
//! runtime understands, and serves the declared material property tables of
//! materials and material blueprints.
//!
//! # Catalog File
//!
//! ```json
//! {
//!   "Assets": {
//!     "Example/Mesh/Cube": {},
//!     "Example/Blueprint/Sky": {
//!       "Properties": { "Exposure": { "ValueType": "FLOAT", "Value": 1.0 } }
//!     },
//!     "Example/Material/Sky": {
//!       "Id": 1234,
//!       "MaterialBlueprint": "Example/Blueprint/Sky",
//!       "Properties": { "Tint": { "ValueType": "FLOAT_3", "Value": [1, 1, 1] } }
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use void_scene_format::{
    AssetId, MaterialProperty, MaterialPropertyValue, MaterialPropertyValueType, SortedPropertyVector, StringId,
};

use crate::error::{FieldError, UnresolvedReference};
use crate::readers;

/// Build context consumed by the scene compiler
pub trait AssetContext: Send + Sync {
    /// Resolve a reference; the empty string resolves to [`AssetId::INVALID`]
    fn resolve(&self, reference: &str) -> Result<AssetId, UnresolvedReference>;

    /// Declared property table of a material or material blueprint, sorted by
    /// property ID
    fn declared_properties(&self, id: AssetId) -> Option<SortedPropertyVector>;

    /// Files this context was loaded from, tracked by the build cache
    fn dependencies(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Errors from loading an asset catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Assets \"{first}\" and \"{second}\" share asset ID {id}")]
    DuplicateId { first: String, second: String, id: AssetId },

    #[error("Asset \"{asset}\", property \"{property}\": {source}")]
    Property {
        asset: String,
        property: String,
        #[source]
        source: FieldError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogFile {
    assets: BTreeMap<String, CatalogFileEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CatalogFileEntry {
    id: Option<u32>,
    material_blueprint: Option<String>,
    properties: BTreeMap<String, PropertyDeclaration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PropertyDeclaration {
    value_type: String,
    value: serde_json::Value,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    reference: String,
    material_blueprint: Option<String>,
    properties: SortedPropertyVector,
}

/// In-memory asset catalog
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    ids: HashMap<String, AssetId>,
    entries: HashMap<AssetId, CatalogEntry>,
    source_path: Option<PathBuf>,
}

impl AssetCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset whose ID is derived from its reference
    pub fn with_asset(mut self, reference: &str) -> Self {
        self.insert(reference, AssetId::from_reference(reference));
        self
    }

    /// Add an asset with an explicit ID
    pub fn with_asset_id(mut self, reference: &str, id: AssetId) -> Self {
        self.insert(reference, id);
        self
    }

    /// Add a material or blueprint with its declared properties
    ///
    /// Unknown `blueprint` references are ignored when the table is built.
    pub fn with_material(
        mut self,
        reference: &str,
        blueprint: Option<&str>,
        properties: impl IntoIterator<Item = (&'static str, MaterialPropertyValue)>,
    ) -> Self {
        let id = self.insert(reference, AssetId::from_reference(reference));
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.material_blueprint = blueprint.map(str::to_string);
            entry.properties = sorted(
                properties
                    .into_iter()
                    .map(|(name, value)| MaterialProperty::new(StringId::new(name), value))
                    .collect(),
            );
        }
        self
    }

    /// Insert or replace an asset, returning its ID
    pub fn insert(&mut self, reference: &str, id: AssetId) -> AssetId {
        if let Some(previous) = self.ids.insert(reference.to_string(), id) {
            self.entries.remove(&previous);
        }
        self.entries.insert(
            id,
            CatalogEntry {
                reference: reference.to_string(),
                material_blueprint: None,
                properties: Vec::new(),
            },
        );
        id
    }

    /// Load a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog = Self::from_json(&content)?;
        catalog.source_path = Some(path.to_path_buf());
        log::info!("Loaded asset catalog {:?} ({} assets)", path, catalog.len());
        Ok(catalog)
    }

    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;

        // IDs first so texture properties can reference any asset
        let mut catalog = Self::new();
        for (reference, entry) in &file.assets {
            let id = entry.id.map(AssetId::from_raw).unwrap_or_else(|| AssetId::from_reference(reference));
            if let Some(existing) = catalog.entries.get(&id) {
                return Err(CatalogError::DuplicateId {
                    first: existing.reference.clone(),
                    second: reference.clone(),
                    id,
                });
            }
            catalog.insert(reference, id);
        }

        for (reference, entry) in file.assets {
            let mut properties = Vec::with_capacity(entry.properties.len());
            for (name, declaration) in &entry.properties {
                let value = catalog
                    .parse_declaration(name, declaration)
                    .map_err(|source| CatalogError::Property {
                        asset: reference.clone(),
                        property: name.clone(),
                        source,
                    })?;
                properties.push(MaterialProperty::new(StringId::new(name), value));
            }

            if let Some(catalog_entry) = catalog.ids.get(&reference).and_then(|id| catalog.entries.get_mut(id)) {
                catalog_entry.material_blueprint = entry.material_blueprint;
                catalog_entry.properties = sorted(properties);
            }
        }

        Ok(catalog)
    }

    fn parse_declaration(&self, name: &str, declaration: &PropertyDeclaration) -> Result<MaterialPropertyValue, FieldError> {
        let value_type = MaterialPropertyValueType::from_name(&declaration.value_type).ok_or_else(|| {
            FieldError::UnknownEnumValue {
                field: "ValueType".to_string(),
                value: declaration.value_type.clone(),
                accepted: MaterialPropertyValueType::NAMES.iter().map(|(n, _)| *n).collect(),
            }
        })?;
        readers::property_value(value_type, &declaration.value, name, |reference| {
            self.resolve(reference).map_err(|e| FieldError::UnresolvedReference {
                field: name.to_string(),
                reference: e.0,
            })
        })
    }

    /// Number of cataloged assets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File this catalog was loaded from
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

impl AssetContext for AssetCatalog {
    fn resolve(&self, reference: &str) -> Result<AssetId, UnresolvedReference> {
        if reference.is_empty() {
            return Ok(AssetId::INVALID);
        }
        self.ids
            .get(reference)
            .copied()
            .ok_or_else(|| UnresolvedReference(reference.to_string()))
    }

    fn declared_properties(&self, id: AssetId) -> Option<SortedPropertyVector> {
        let entry = self.entries.get(&id)?;

        // One level of blueprint inheritance, own declarations win
        let mut properties = entry
            .material_blueprint
            .as_deref()
            .and_then(|blueprint| self.ids.get(blueprint))
            .and_then(|blueprint_id| self.entries.get(blueprint_id))
            .map(|blueprint| blueprint.properties.clone())
            .unwrap_or_default();

        for property in &entry.properties {
            match properties.binary_search_by_key(&property.id, |p| p.id) {
                Ok(index) => properties[index] = *property,
                Err(index) => properties.insert(index, *property),
            }
        }
        Some(properties)
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        self.source_path.iter().cloned().collect()
    }
}

fn sorted(mut properties: SortedPropertyVector) -> SortedPropertyVector {
    properties.sort_by_key(|p| p.id);
    properties.dedup_by_key(|p| p.id);
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "Assets": {
            "Example/Mesh/Cube": {},
            "Example/Texture/Noise": { "Id": 77 },
            "Example/Blueprint/Sky": {
                "Properties": {
                    "Exposure": { "ValueType": "FLOAT", "Value": 1.0 },
                    "Tint": { "ValueType": "FLOAT_3", "Value": [1, 1, 1] }
                }
            },
            "Example/Material/Sky": {
                "Id": 1234,
                "MaterialBlueprint": "Example/Blueprint/Sky",
                "Properties": {
                    "Tint": { "ValueType": "FLOAT_3", "Value": "0.5 0.5 1" },
                    "NoiseMap": { "ValueType": "TEXTURE_ASSET_ID", "Value": "Example/Texture/Noise" }
                }
            }
        }
    }"#;

    #[test]
    fn test_resolve() {
        let catalog = AssetCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.resolve("").unwrap(), AssetId::INVALID);
        assert_eq!(
            catalog.resolve("Example/Mesh/Cube").unwrap(),
            AssetId::from_reference("Example/Mesh/Cube")
        );
        assert_eq!(catalog.resolve("Example/Material/Sky").unwrap(), AssetId::from_raw(1234));
        assert_eq!(
            catalog.resolve("Example/Mesh/Sphere"),
            Err(UnresolvedReference("Example/Mesh/Sphere".to_string()))
        );
    }

    #[test]
    fn test_blueprint_overlay() {
        let catalog = AssetCatalog::from_json(CATALOG).unwrap();
        let properties = catalog.declared_properties(AssetId::from_raw(1234)).unwrap();
        assert_eq!(properties.len(), 3);
        assert!(properties.windows(2).all(|w| w[0].id < w[1].id));

        let tint = properties.iter().find(|p| p.id == StringId::new("Tint")).unwrap();
        assert_eq!(tint.value, MaterialPropertyValue::Float3([0.5, 0.5, 1.0]));
        let noise = properties.iter().find(|p| p.id == StringId::new("NoiseMap")).unwrap();
        assert_eq!(noise.value, MaterialPropertyValue::TextureAssetId(AssetId::from_raw(77)));
        assert!(properties.iter().all(|p| !p.overwritten));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let json = r#"{ "Assets": { "A": { "Id": 5 }, "B": { "Id": 5 } } }"#;
        assert!(matches!(
            AssetCatalog::from_json(json),
            Err(CatalogError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_unknown_value_type_rejected() {
        let json = r#"{ "Assets": { "M": { "Properties": { "X": { "ValueType": "DOUBLE", "Value": 1 } } } } }"#;
        assert!(matches!(
            AssetCatalog::from_json(json),
            Err(CatalogError::Property { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let catalog = AssetCatalog::new()
            .with_asset("MatB")
            .with_asset_id("Mesh", AssetId::from_raw(3))
            .with_material("Sky", None, [("Exposure", MaterialPropertyValue::Float(2.0))]);
        assert_eq!(catalog.resolve("Mesh").unwrap(), AssetId::from_raw(3));
        let sky = catalog.resolve("Sky").unwrap();
        assert_eq!(catalog.declared_properties(sky).unwrap().len(), 1);
        assert!(catalog.dependencies().is_empty());
    }
}
