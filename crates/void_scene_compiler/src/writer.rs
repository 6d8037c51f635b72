//! Binary scene writer
//!
//! Walks a validated document once and appends the version 1 records to a
//! linear buffer. Item headers precede their payloads, so every item is
//! extracted twice: once to learn its size and once to encode it.

use serde_json::Value;
use void_scene_format::v1::{ItemHeader, Node, Nodes, SceneHeader, Transform};
use void_scene_format::FormatError;

use crate::catalog::AssetContext;
use crate::document::{SceneDocument, SourceNode};
use crate::error::{CompileError, FieldError};
use crate::items::SceneItemType;
use crate::readers::{self, Object};

/// Serializes scene documents into decompressed scene buffers
pub struct SceneWriter<'a> {
    context: &'a dyn AssetContext,
}

impl<'a> SceneWriter<'a> {
    /// Create a writer resolving references through `context`
    pub fn new(context: &'a dyn AssetContext) -> Self {
        Self { context }
    }

    /// Serialize a whole document
    pub fn write(&self, document: &SceneDocument) -> Result<Vec<u8>, CompileError> {
        let mut buffer = Vec::new();
        push(&mut buffer, &SceneHeader::default());
        push(
            &mut buffer,
            &Nodes {
                number_of_nodes: count(document.nodes.len())?,
            },
        );

        let mut number_of_items = 0;
        for (index, node) in document.nodes.iter().enumerate() {
            number_of_items += self.write_node(&mut buffer, index, node)?;
        }

        log::debug!(
            "Wrote {} nodes with {} items ({} bytes)",
            document.nodes.len(),
            number_of_items,
            buffer.len()
        );
        Ok(buffer)
    }

    fn write_node(&self, buffer: &mut Vec<u8>, index: usize, node: &SourceNode) -> Result<usize, CompileError> {
        let node_error = |source| CompileError::Node { node: index, source };

        let transform = match &node.properties {
            None => Transform::IDENTITY,
            Some(Value::Object(properties)) => read_transform(properties).map_err(node_error)?,
            Some(_) => return Err(node_error(FieldError::invalid("Properties", "expected an object"))),
        };

        push(
            buffer,
            &Node {
                transform,
                number_of_items: count(node.items.len())?,
            },
        );

        for (name, fields) in node.items.iter() {
            let item_type = SceneItemType::by_name(name).ok_or_else(|| CompileError::UnknownItemType {
                node: index,
                name: name.to_string(),
            })?;
            let fields = fields.as_object().ok_or_else(|| CompileError::Item {
                node: index,
                item_type: item_type.name,
                source: FieldError::invalid(name, "expected an object"),
            })?;
            log::trace!("Node {}: writing {} ({:?})", index, item_type.name, item_type.kind);
            self.write_item(buffer, index, item_type, fields)?;
        }
        Ok(node.items.len())
    }

    fn write_item(
        &self,
        buffer: &mut Vec<u8>,
        node: usize,
        item_type: &SceneItemType,
        fields: &Object,
    ) -> Result<(), CompileError> {
        let extract = || {
            (item_type.extract)(fields, self.context).map_err(|source| CompileError::Item {
                node,
                item_type: item_type.name,
                source,
            })
        };

        // Size pass
        let declared = extract()?.encoded_size();
        push(
            buffer,
            &ItemHeader {
                type_id: item_type.type_id,
                number_of_bytes: count(declared)?,
            },
        );

        // Write pass
        let start = buffer.len();
        extract()?.encode(buffer);
        let written = buffer.len() - start;
        if written != declared {
            return Err(CompileError::PayloadSizeMismatch {
                item_type: item_type.name,
                declared,
                written,
            });
        }
        Ok(())
    }
}

fn read_transform(properties: &Object) -> Result<Transform, FieldError> {
    let identity = Transform::IDENTITY;
    Ok(Transform {
        position: readers::optional_vector::<3>(properties, "Position", identity.position)?,
        rotation: readers::optional_rotation(properties, "Rotation", identity.rotation)?,
        scale: readers::optional_factor::<3>(properties, "Scale", identity.scale)?,
    })
}

fn push<T: bytemuck::Pod>(buffer: &mut Vec<u8>, record: &T) {
    buffer.extend_from_slice(bytemuck::bytes_of(record));
}

fn count(len: usize) -> Result<u32, CompileError> {
    u32::try_from(len).map_err(|_| CompileError::Container(FormatError::TooLarge(len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetCatalog;
    use crate::error::ErrorKind;
    use void_scene_format::v1::type_ids;
    use void_scene_format::{DecodedPayload, SceneReader};

    fn write(json: &str) -> Result<Vec<u8>, CompileError> {
        let catalog = AssetCatalog::new().with_asset("Cube");
        SceneWriter::new(&catalog).write(&SceneDocument::parse(json)?)
    }

    #[test]
    fn test_items_keep_declaration_order() {
        let buffer = write(
            r#"{ "Nodes": [ { "Items": {
                "SunlightSceneItem": {},
                "CameraSceneItem": {},
                "MeshSceneItem": { "Mesh": "Cube" }
            } } ] }"#,
        )
        .unwrap();
        let scene = SceneReader::read(&buffer).unwrap();
        let ids: Vec<_> = scene.nodes[0].items.iter().map(|i| i.type_id).collect();
        assert_eq!(ids, vec![type_ids::SUNLIGHT, type_ids::CAMERA, type_ids::MESH]);
        assert_eq!(scene.nodes[0].items[1].payload, DecodedPayload::Camera);
    }

    #[test]
    fn test_repeated_item_type_writes_every_entry() {
        let buffer = write(
            r#"{ "Nodes": [ { "Items": {
                "LightSceneItem": { "Radius": 2 },
                "CameraSceneItem": {},
                "LightSceneItem": { "Radius": 9 }
            } } ] }"#,
        )
        .unwrap();
        let scene = SceneReader::read(&buffer).unwrap();
        let items = &scene.nodes[0].items;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].payload, DecodedPayload::Camera);
        match (&items[0].payload, &items[2].payload) {
            (DecodedPayload::Light(first), DecodedPayload::Light(last)) => {
                assert_eq!(first.radius, 2.0);
                assert_eq!(last.radius, 9.0);
            }
            other => panic!("unexpected payloads {:?}", other),
        }
    }

    #[test]
    fn test_node_transform() {
        let buffer = write(
            r#"{ "Nodes": [
                { "Properties": { "Position": [1, 2, 3], "Scale": [2, 2, 2] } },
                {}
            ] }"#,
        )
        .unwrap();
        let scene = SceneReader::read(&buffer).unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.nodes[0].transform.position, [1.0, 2.0, 3.0]);
        assert_eq!(scene.nodes[0].transform.scale, [2.0, 2.0, 2.0]);
        assert_eq!(scene.nodes[0].transform.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(scene.nodes[1].transform, Transform::IDENTITY);
        assert!(scene.nodes[1].items.is_empty());
    }

    #[test]
    fn test_errors_carry_context() {
        let err = write(r#"{ "Nodes": [ {}, { "Items": { "MeshSceneItem": {} } } ] }"#).unwrap_err();
        match &err {
            CompileError::Item { node, item_type, source } => {
                assert_eq!(*node, 1);
                assert_eq!(*item_type, "MeshSceneItem");
                assert!(matches!(source, FieldError::Missing { field } if field == "Mesh"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = write(r#"{ "Nodes": [ { "Properties": { "Position": [1, 2] } } ] }"#).unwrap_err();
        assert!(matches!(err, CompileError::Node { node: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::FieldValidation);
    }

    #[test]
    fn test_unknown_item_type() {
        let err = write(r#"{ "Nodes": [ { "Items": { "HologramSceneItem": {} } } ] }"#).unwrap_err();
        assert!(matches!(&err, CompileError::UnknownItemType { name, .. } if name == "HologramSceneItem"));
        assert_eq!(err.kind(), ErrorKind::UnknownItemType);
    }
}
