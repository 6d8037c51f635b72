//! Version 1 scene file records
//!
//! Every record is `#[repr(C)]` plain old data written in native byte order
//! with no padding beyond natural alignment. Any change to a record requires
//! bumping [`FORMAT_VERSION`]; readers reject mismatched versions.
//!
//! ```text
//! SceneHeader
//! Nodes
//! Node ─┬─ ItemHeader + payload
//!       └─ ItemHeader + payload ...
//! Node ...
//! ```

use bytemuck::{Pod, Zeroable};

use crate::ids::{AssetId, MaterialTechniqueId, SceneItemTypeId, StringId};

/// Container format type tag of compiled scenes
pub const FORMAT_TYPE: StringId = StringId::new("SceneAsset");

/// Whole-format version, bumped on any record change
pub const FORMAT_VERSION: u32 = 1;

/// Scene item type IDs, hashes of the runtime scene item class names
pub mod type_ids {
    use super::{SceneItemTypeId, StringId};

    pub const CAMERA: SceneItemTypeId = StringId::new("CameraSceneItem");
    pub const LIGHT: SceneItemTypeId = StringId::new("LightSceneItem");
    pub const SUNLIGHT: SceneItemTypeId = StringId::new("SunlightSceneItem");
    pub const MESH: SceneItemTypeId = StringId::new("MeshSceneItem");
    pub const SKELETON_MESH: SceneItemTypeId = StringId::new("SkeletonMeshSceneItem");
    pub const SKY: SceneItemTypeId = StringId::new("SkySceneItem");
    pub const VOLUME: SceneItemTypeId = StringId::new("VolumeSceneItem");
    pub const GRASS: SceneItemTypeId = StringId::new("GrassSceneItem");
    pub const TERRAIN: SceneItemTypeId = StringId::new("TerrainSceneItem");
    pub const PARTICLES: SceneItemTypeId = StringId::new("ParticlesSceneItem");

    /// Whether the type carries a material item payload
    pub fn is_material_item(type_id: SceneItemTypeId) -> bool {
        type_id == SKY || type_id == VOLUME || type_id == GRASS || type_id == TERRAIN || type_id == PARTICLES
    }
}

/// Technique used when a material item names none
pub const DEFAULT_MATERIAL_TECHNIQUE_ID: MaterialTechniqueId = StringId::new("Default");

/// Scene file header
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct SceneHeader {
    /// Reserved, always [`SceneHeader::UNUSED`]
    pub unused: u32,
}

impl SceneHeader {
    pub const UNUSED: u32 = 42;
}

impl Default for SceneHeader {
    fn default() -> Self {
        Self { unused: Self::UNUSED }
    }
}

/// Node section header
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Nodes {
    pub number_of_nodes: u32,
}

/// Node transform
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Transform {
    /// Position in world units
    pub position: [f32; 3],
    /// Rotation quaternion as (x, y, z, w)
    pub rotation: [f32; 4],
    /// Per-axis scale factor
    pub scale: [f32; 3],
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Node record, followed by `number_of_items` item records
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Node {
    pub transform: Transform,
    pub number_of_items: u32,
}

/// Item record header, always written even for empty payloads
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ItemHeader {
    pub type_id: SceneItemTypeId,
    /// Payload size in bytes following this header
    pub number_of_bytes: u32,
}

/// Light type stored in [`LightItem::light_type`]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

impl LightType {
    /// Decode a stored light type
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Directional),
            1 => Some(Self::Point),
            2 => Some(Self::Spot),
            _ => None,
        }
    }
}

/// Light scene item payload
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightItem {
    /// [`LightType`] as raw value
    pub light_type: u32,
    /// Linear RGB color, components >= 0
    pub color: [f32; 3],
    /// Radius in world units, zero for directional lights
    pub radius: f32,
    /// Inner spot angle in radians
    pub inner_angle: f32,
    /// Outer spot angle in radians
    pub outer_angle: f32,
    pub near_clip_distance: f32,
    /// IES light profile index, -1 for none
    pub ies_light_profile_index: i32,
}

impl LightItem {
    /// Decoded light type
    pub fn light_type(&self) -> Option<LightType> {
        LightType::from_raw(self.light_type)
    }
}

impl Default for LightItem {
    fn default() -> Self {
        Self {
            light_type: LightType::Point as u32,
            color: [1.0, 1.0, 1.0],
            radius: 1.0,
            inner_angle: 40.0_f32.to_radians(),
            outer_angle: 50.0_f32.to_radians(),
            near_clip_distance: 0.0,
            ies_light_profile_index: -1,
        }
    }
}

/// Sunlight scene item payload
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SunlightItem {
    /// Time of day in hours, e.g. 7.5 for 07:30
    pub sunrise_time: f32,
    pub sunset_time: f32,
    /// Radians
    pub east_direction: f32,
    /// Radians
    pub angle_of_incidence: f32,
    pub time_of_day: f32,
}

impl Default for SunlightItem {
    fn default() -> Self {
        Self {
            sunrise_time: 7.5,
            sunset_time: 20.5,
            east_direction: 0.0,
            angle_of_incidence: 20.0_f32.to_radians(),
            time_of_day: 10.0,
        }
    }
}

/// Mesh scene item payload, followed by the sub-mesh material asset IDs
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshItem {
    pub mesh_asset_id: AssetId,
    pub number_of_sub_mesh_material_asset_ids: u32,
}

/// Skeleton mesh scene item payload, followed by a [`MeshItem`]
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct SkeletonMeshItem {
    pub skeleton_animation_asset_id: AssetId,
}

/// Material scene item payload shared by sky, volume, grass, terrain and
/// particles items, followed by the material property records
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct MaterialItem {
    pub material_asset_id: AssetId,
    pub material_technique_id: MaterialTechniqueId,
    pub material_blueprint_asset_id: AssetId,
    pub number_of_material_properties: u32,
}
