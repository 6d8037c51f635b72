//! Scene source documents
//!
//! Accepted forms:
//!
//! ```json
//! { "Format": { "Type": "SceneAsset", "Version": 1 }, "SceneAsset": { "Nodes": [ ... ] } }
//! { "Nodes": [ ... ] }
//! ```
//!
//! Item entries of a node are kept in declaration order, and an item type
//! declared twice in one node yields two items.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::CompileError;

/// Source format type name
pub const SOURCE_FORMAT_TYPE: &str = "SceneAsset";
/// Source format version understood by this compiler
pub const SOURCE_FORMAT_VERSION: u64 = 1;

/// Item entries of one node as `(type name, fields)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemEntries(pub Vec<(String, Value)>);

impl ItemEntries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, fields)| (name.as_str(), fields))
    }
}

impl<'de> Deserialize<'de> for ItemEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = ItemEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of scene item type name to item fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ItemEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(ItemEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// One authored node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceNode {
    /// Transform fields, validated by the writer
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub items: ItemEntries,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SceneBody {
    nodes: Option<Vec<SourceNode>>,
}

#[derive(Deserialize)]
struct SourceRoot {
    #[serde(rename = "Format")]
    format: Option<Value>,
    #[serde(rename = "SceneAsset")]
    scene_asset: Option<SceneBody>,
    #[serde(rename = "Nodes")]
    nodes: Option<Vec<SourceNode>>,
}

/// Parsed scene document, a non-empty list of nodes
#[derive(Debug, Clone)]
pub struct SceneDocument {
    pub nodes: Vec<SourceNode>,
}

impl SceneDocument {
    /// Parse and structurally validate a document
    pub fn parse(json: &str) -> Result<Self, CompileError> {
        let root: Value = serde_json::from_str(json)?;
        if !root.is_object() {
            return Err(CompileError::Schema("document root must be an object".into()));
        }

        // Second pass over the text keeps repeated item keys the Value tree merges.
        // The text is known to be valid JSON here, so any failure is a shape error.
        let root: SourceRoot = serde_json::from_str(json).map_err(|e| CompileError::Schema(e.to_string()))?;
        let nodes = match root.format {
            Some(format) => {
                check_format(&format)?;
                root.scene_asset
                    .ok_or_else(|| CompileError::Schema(format!("missing \"{}\" object", SOURCE_FORMAT_TYPE)))?
                    .nodes
            }
            None => root.nodes,
        };

        let nodes = nodes.ok_or_else(|| CompileError::Schema("missing \"Nodes\" array".into()))?;
        if nodes.is_empty() {
            return Err(CompileError::Schema("scene has no nodes".into()));
        }
        Ok(Self { nodes })
    }
}

fn check_format(format: &Value) -> Result<(), CompileError> {
    let format_type = format.get("Type").and_then(Value::as_str);
    if format_type != Some(SOURCE_FORMAT_TYPE) {
        return Err(CompileError::Schema(format!(
            "format type must be \"{}\", found {:?}",
            SOURCE_FORMAT_TYPE, format_type
        )));
    }

    // Versions are authored either as numbers or strings
    let version = match format.get("Version") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    if version != Some(SOURCE_FORMAT_VERSION) {
        return Err(CompileError::Schema(format!(
            "format version must be {}, found {:?}",
            SOURCE_FORMAT_VERSION,
            format.get("Version")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_wrapped_and_bare_forms() {
        let wrapped = r#"{ "Format": { "Type": "SceneAsset", "Version": "1" }, "SceneAsset": { "Nodes": [ {} ] } }"#;
        assert_eq!(SceneDocument::parse(wrapped).unwrap().nodes.len(), 1);

        let bare = r#"{ "Nodes": [ {}, { "Items": {} } ] }"#;
        let document = SceneDocument::parse(bare).unwrap();
        assert_eq!(document.nodes.len(), 2);
        assert!(document.nodes[1].items.is_empty());
    }

    #[test]
    fn test_repeated_item_keys_are_kept() {
        let json = r#"{ "Nodes": [ { "Items": {
            "LightSceneItem": { "Radius": 2 },
            "CameraSceneItem": {},
            "LightSceneItem": { "Radius": 9 }
        } } ] }"#;
        let document = SceneDocument::parse(json).unwrap();
        let items: Vec<_> = document.nodes[0].items.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].0, "LightSceneItem");
        assert_eq!(items[0].1["Radius"], 2);
        assert_eq!(items[1].0, "CameraSceneItem");
        assert_eq!(items[2].1["Radius"], 9);
    }

    #[test]
    fn test_schema_errors() {
        for json in [
            r#"[]"#,
            r#"{ "Nodes": [] }"#,
            r#"{ "Nodes": [ 1 ] }"#,
            r#"{ "Nodes": [ { "Items": [] } ] }"#,
            r#"{ "Scene": {} }"#,
            r#"{ "Format": { "Type": "MeshAsset", "Version": 1 }, "SceneAsset": { "Nodes": [ {} ] } }"#,
            r#"{ "Format": { "Type": "SceneAsset", "Version": 2 }, "SceneAsset": { "Nodes": [ {} ] } }"#,
        ] {
            let err = SceneDocument::parse(json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Schema, "{}", json);
        }
        assert!(matches!(SceneDocument::parse("{"), Err(CompileError::Json(_))));
    }
}
