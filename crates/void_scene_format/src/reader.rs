//! Scene buffer reader
//!
//! Implements the runtime loader side of the format: read the scene header,
//! then each node with its transform and item records. Every item record is
//! self-delimiting through its header, so item types this reader does not
//! know are skipped rather than rejected.

use std::path::Path;

use bytemuck::Pod;

use crate::container;
use crate::ids::{AssetId, MaterialTechniqueId, SceneItemTypeId};
use crate::material::{MaterialProperty, MaterialPropertyRecord};
use crate::v1::{
    self, type_ids, ItemHeader, LightItem, MaterialItem, MeshItem, Node, Nodes, SceneHeader,
    SkeletonMeshItem, SunlightItem, Transform,
};
use crate::FormatError;

/// Cursor over a byte slice reading unaligned POD records
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Read one record
    pub fn read<T: Pod>(&mut self) -> Result<T, FormatError> {
        let bytes = self.read_bytes(core::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Read `count` consecutive records
    pub fn read_many<T: Pod>(&mut self, count: usize) -> Result<Vec<T>, FormatError> {
        let size = core::mem::size_of::<T>();
        let total = count.checked_mul(size).ok_or(FormatError::TooLarge(usize::MAX))?;
        let bytes = self.read_bytes(total)?;
        Ok(bytes.chunks_exact(size).map(bytemuck::pod_read_unaligned).collect())
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let available = self.remaining();
        if len > available {
            return Err(FormatError::Truncated { needed: len, available });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Current offset from the start
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Capacity for `count` records of `T`, bounded by the bytes left to read
    pub fn capacity_for<T>(&self, count: u32) -> usize {
        let size = core::mem::size_of::<T>().max(1);
        (count as usize).min(self.remaining() / size)
    }
}

/// Mesh payload with its sub-mesh material overrides
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub mesh_asset_id: AssetId,
    /// Invalid entries keep the sub-mesh's original material
    pub sub_mesh_material_asset_ids: Vec<AssetId>,
}

/// Material item payload with its property overrides
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub material_asset_id: AssetId,
    pub material_technique_id: MaterialTechniqueId,
    pub material_blueprint_asset_id: AssetId,
    pub properties: Vec<MaterialProperty>,
}

/// Decoded item payload
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedPayload {
    Camera,
    Light(LightItem),
    Sunlight(SunlightItem),
    Mesh(MeshData),
    SkeletonMesh {
        skeleton: SkeletonMeshItem,
        mesh: MeshData,
    },
    /// Sky, volume, grass, terrain and particles items
    Material(MaterialData),
    /// Item type this reader does not know, raw payload kept
    Unknown(Vec<u8>),
}

/// One item record of a node
#[derive(Clone, Debug, PartialEq)]
pub struct SceneItemRecord {
    pub type_id: SceneItemTypeId,
    pub payload: DecodedPayload,
}

/// One node with its transform and items
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub transform: Transform,
    pub items: Vec<SceneItemRecord>,
}

/// Fully decoded scene buffer
#[derive(Clone, Debug, PartialEq)]
pub struct SceneData {
    pub header: SceneHeader,
    pub nodes: Vec<SceneNode>,
}

impl SceneData {
    /// Total number of items over all nodes
    pub fn item_count(&self) -> usize {
        self.nodes.iter().map(|n| n.items.len()).sum()
    }
}

/// Reader for decompressed scene buffers
pub struct SceneReader;

impl SceneReader {
    /// Parse a decompressed scene buffer
    pub fn read(buffer: &[u8]) -> Result<SceneData, FormatError> {
        let mut reader = ByteReader::new(buffer);

        let header: SceneHeader = reader.read()?;
        let nodes_header: Nodes = reader.read()?;

        let mut nodes = Vec::with_capacity(reader.capacity_for::<Node>(nodes_header.number_of_nodes));
        for _ in 0..nodes_header.number_of_nodes {
            let node: Node = reader.read()?;
            let mut items = Vec::with_capacity(reader.capacity_for::<ItemHeader>(node.number_of_items));
            for _ in 0..node.number_of_items {
                let item_header: ItemHeader = reader.read()?;
                let payload = reader.read_bytes(item_header.number_of_bytes as usize)?;
                items.push(SceneItemRecord {
                    type_id: item_header.type_id,
                    payload: decode_payload(item_header.type_id, payload)?,
                });
            }
            nodes.push(SceneNode {
                transform: node.transform,
                items,
            });
        }

        if reader.remaining() != 0 {
            return Err(FormatError::InvalidRecord(format!(
                "{} trailing bytes after the last node",
                reader.remaining()
            )));
        }

        Ok(SceneData { header, nodes })
    }
}

/// Decode one item payload; unknown type IDs are kept raw
pub fn decode_payload(type_id: SceneItemTypeId, bytes: &[u8]) -> Result<DecodedPayload, FormatError> {
    let mut reader = ByteReader::new(bytes);

    let payload = if type_id == type_ids::CAMERA {
        DecodedPayload::Camera
    } else if type_id == type_ids::LIGHT {
        let light: LightItem = reader.read()?;
        if light.light_type().is_none() {
            return Err(FormatError::InvalidRecord(format!("unknown light type {}", light.light_type)));
        }
        DecodedPayload::Light(light)
    } else if type_id == type_ids::SUNLIGHT {
        DecodedPayload::Sunlight(reader.read()?)
    } else if type_id == type_ids::MESH {
        DecodedPayload::Mesh(read_mesh(&mut reader)?)
    } else if type_id == type_ids::SKELETON_MESH {
        let skeleton: SkeletonMeshItem = reader.read()?;
        DecodedPayload::SkeletonMesh {
            skeleton,
            mesh: read_mesh(&mut reader)?,
        }
    } else if type_ids::is_material_item(type_id) {
        DecodedPayload::Material(read_material(&mut reader)?)
    } else {
        log::debug!("Skipping unknown scene item type {} ({} bytes)", type_id, bytes.len());
        return Ok(DecodedPayload::Unknown(bytes.to_vec()));
    };

    if reader.remaining() != 0 {
        return Err(FormatError::SizeMismatch {
            expected: reader.offset(),
            found: bytes.len(),
        });
    }
    Ok(payload)
}

fn read_mesh(reader: &mut ByteReader<'_>) -> Result<MeshData, FormatError> {
    let mesh: MeshItem = reader.read()?;
    let sub_mesh_material_asset_ids = reader.read_many::<AssetId>(mesh.number_of_sub_mesh_material_asset_ids as usize)?;
    Ok(MeshData {
        mesh_asset_id: mesh.mesh_asset_id,
        sub_mesh_material_asset_ids,
    })
}

fn read_material(reader: &mut ByteReader<'_>) -> Result<MaterialData, FormatError> {
    let item: MaterialItem = reader.read()?;
    let records = reader.read_many::<MaterialPropertyRecord>(item.number_of_material_properties as usize)?;
    let properties = records
        .iter()
        .map(|record| {
            MaterialProperty::from_record(record).ok_or_else(|| {
                FormatError::InvalidRecord(format!("unknown material property value type {}", record.value_type))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MaterialData {
        material_asset_id: item.material_asset_id,
        material_technique_id: item.material_technique_id,
        material_blueprint_asset_id: item.material_blueprint_asset_id,
        properties,
    })
}

/// Decompress and parse a compiled scene artifact held in memory
pub fn load_scene_bytes(bytes: &[u8]) -> Result<SceneData, FormatError> {
    let buffer = container::decompress(bytes, v1::FORMAT_TYPE, v1::FORMAT_VERSION)?;
    SceneReader::read(&buffer)
}

/// Read, decompress and parse a compiled scene artifact
pub fn load_scene_file(path: impl AsRef<Path>) -> Result<SceneData, FormatError> {
    let bytes = std::fs::read(path.as_ref())?;
    load_scene_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StringId;

    fn push<T: Pod>(buffer: &mut Vec<u8>, record: &T) {
        buffer.extend_from_slice(bytemuck::bytes_of(record));
    }

    fn scene_with_items(items: &[(SceneItemTypeId, Vec<u8>)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        push(&mut buffer, &SceneHeader::default());
        push(&mut buffer, &Nodes { number_of_nodes: 1 });
        push(
            &mut buffer,
            &Node {
                transform: Transform::IDENTITY,
                number_of_items: items.len() as u32,
            },
        );
        for (type_id, payload) in items {
            push(
                &mut buffer,
                &ItemHeader {
                    type_id: *type_id,
                    number_of_bytes: payload.len() as u32,
                },
            );
            buffer.extend_from_slice(payload);
        }
        buffer
    }

    #[test]
    fn test_read_camera_and_light() {
        let light = LightItem {
            radius: 5.0,
            ..LightItem::default()
        };
        let buffer = scene_with_items(&[
            (type_ids::CAMERA, Vec::new()),
            (type_ids::LIGHT, bytemuck::bytes_of(&light).to_vec()),
        ]);

        let scene = SceneReader::read(&buffer).unwrap();
        assert_eq!(scene.header.unused, SceneHeader::UNUSED);
        assert_eq!(scene.nodes.len(), 1);
        assert_eq!(scene.item_count(), 2);
        assert_eq!(scene.nodes[0].items[0].payload, DecodedPayload::Camera);
        assert_eq!(scene.nodes[0].items[1].payload, DecodedPayload::Light(light));
    }

    #[test]
    fn test_unknown_item_type_is_skipped() {
        let future_type = StringId::new("HologramSceneItem");
        let light = LightItem::default();
        let buffer = scene_with_items(&[
            (future_type, vec![1, 2, 3, 4, 5]),
            (type_ids::LIGHT, bytemuck::bytes_of(&light).to_vec()),
        ]);

        let scene = SceneReader::read(&buffer).unwrap();
        let items = &scene.nodes[0].items;
        assert_eq!(items[0].type_id, future_type);
        assert_eq!(items[0].payload, DecodedPayload::Unknown(vec![1, 2, 3, 4, 5]));
        assert_eq!(items[1].payload, DecodedPayload::Light(light));
    }

    #[test]
    fn test_mesh_trailer() {
        let mut payload = Vec::new();
        push(
            &mut payload,
            &MeshItem {
                mesh_asset_id: AssetId::from_raw(10),
                number_of_sub_mesh_material_asset_ids: 2,
            },
        );
        push(&mut payload, &AssetId::INVALID);
        push(&mut payload, &AssetId::from_raw(11));

        let decoded = decode_payload(type_ids::MESH, &payload).unwrap();
        assert_eq!(
            decoded,
            DecodedPayload::Mesh(MeshData {
                mesh_asset_id: AssetId::from_raw(10),
                sub_mesh_material_asset_ids: vec![AssetId::INVALID, AssetId::from_raw(11)],
            })
        );
    }

    #[test]
    fn test_payload_size_mismatch_rejected() {
        let mut payload = bytemuck::bytes_of(&SunlightItem::default()).to_vec();
        payload.push(0);
        assert!(matches!(
            decode_payload(type_ids::SUNLIGHT, &payload),
            Err(FormatError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_load_scene_file() {
        let buffer = scene_with_items(&[(type_ids::CAMERA, Vec::new())]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.scene");

        let artifact = container::compress(v1::FORMAT_TYPE, v1::FORMAT_VERSION, &buffer).unwrap();
        std::fs::write(&path, &artifact).unwrap();
        assert_eq!(load_scene_file(&path).unwrap().item_count(), 1);

        let future = container::compress(v1::FORMAT_TYPE, v1::FORMAT_VERSION + 1, &buffer).unwrap();
        std::fs::write(&path, &future).unwrap();
        assert!(matches!(load_scene_file(&path), Err(FormatError::VersionMismatch { .. })));
        assert!(matches!(load_scene_file(dir.path().join("missing.scene")), Err(FormatError::Io(_))));
    }

    #[test]
    fn test_truncated_buffer() {
        let buffer = scene_with_items(&[(type_ids::CAMERA, Vec::new())]);
        let result = SceneReader::read(&buffer[..buffer.len() - 2]);
        assert!(matches!(result, Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_oversized_counts_fail_without_allocating() {
        let mut buffer = Vec::new();
        push(&mut buffer, &SceneHeader::default());
        push(&mut buffer, &Nodes { number_of_nodes: u32::MAX });
        assert_eq!(buffer.len(), 8);
        assert!(matches!(SceneReader::read(&buffer), Err(FormatError::Truncated { .. })));

        let mut buffer = Vec::new();
        push(&mut buffer, &SceneHeader::default());
        push(&mut buffer, &Nodes { number_of_nodes: 1 });
        push(
            &mut buffer,
            &Node {
                transform: Transform::IDENTITY,
                number_of_items: u32::MAX,
            },
        );
        assert!(matches!(SceneReader::read(&buffer), Err(FormatError::Truncated { .. })));
    }
}
