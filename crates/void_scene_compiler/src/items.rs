//! Scene item type registry
//!
//! The closed set of item types a scene may contain. Each entry knows its
//! runtime type ID, its fixed payload size and how to validate and extract
//! its payload from the authored fields.

use std::f32::consts::FRAC_PI_2;

use void_scene_format::material::MaterialProperty;
use void_scene_format::v1::{
    self, LightItem, LightType, MaterialItem, MeshItem, SkeletonMeshItem, SunlightItem,
};
use void_scene_format::{AssetId, MaterialPropertyRecord, SceneItemTypeId, StringId};

use crate::catalog::AssetContext;
use crate::error::FieldError;
use crate::readers::{self, Object};

/// Item kinds known to the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneItemKind {
    Camera,
    Light,
    Sunlight,
    Mesh,
    SkeletonMesh,
    Sky,
    Volume,
    Grass,
    Terrain,
    Particles,
}

/// Validates an item's fields and extracts its payload
pub type ExtractFn = fn(&Object, &dyn AssetContext) -> Result<ItemPayload, FieldError>;

/// Registry entry of one item type
#[derive(Clone, Copy)]
pub struct SceneItemType {
    pub kind: SceneItemKind,
    /// Authored name, also the source of the type ID
    pub name: &'static str,
    pub type_id: SceneItemTypeId,
    /// Payload bytes before any variable-length trailer
    pub fixed_size: usize,
    pub extract: ExtractFn,
}

impl std::fmt::Debug for SceneItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneItemType")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("fixed_size", &self.fixed_size)
            .finish()
    }
}

const fn entry(kind: SceneItemKind, name: &'static str, fixed_size: usize, extract: ExtractFn) -> SceneItemType {
    SceneItemType {
        kind,
        name,
        type_id: StringId::new(name),
        fixed_size,
        extract,
    }
}

const MESH_SIZE: usize = std::mem::size_of::<MeshItem>();
const MATERIAL_SIZE: usize = std::mem::size_of::<MaterialItem>();

/// All supported scene item types
pub static SCENE_ITEM_TYPES: [SceneItemType; 10] = [
    entry(SceneItemKind::Camera, "CameraSceneItem", 0, extract_camera),
    entry(SceneItemKind::Light, "LightSceneItem", std::mem::size_of::<LightItem>(), extract_light),
    entry(SceneItemKind::Sunlight, "SunlightSceneItem", std::mem::size_of::<SunlightItem>(), extract_sunlight),
    entry(SceneItemKind::Mesh, "MeshSceneItem", MESH_SIZE, extract_mesh),
    entry(
        SceneItemKind::SkeletonMesh,
        "SkeletonMeshSceneItem",
        std::mem::size_of::<SkeletonMeshItem>() + MESH_SIZE,
        extract_skeleton_mesh,
    ),
    entry(SceneItemKind::Sky, "SkySceneItem", MATERIAL_SIZE, extract_material),
    entry(SceneItemKind::Volume, "VolumeSceneItem", MATERIAL_SIZE, extract_material),
    entry(SceneItemKind::Grass, "GrassSceneItem", MATERIAL_SIZE, extract_material),
    entry(SceneItemKind::Terrain, "TerrainSceneItem", MATERIAL_SIZE, extract_material),
    entry(SceneItemKind::Particles, "ParticlesSceneItem", MATERIAL_SIZE, extract_material),
];

impl SceneItemType {
    /// Look up by runtime type ID
    pub fn by_type_id(type_id: SceneItemTypeId) -> Option<&'static SceneItemType> {
        SCENE_ITEM_TYPES.iter().find(|t| t.type_id == type_id)
    }

    /// Look up by authored name
    pub fn by_name(name: &str) -> Option<&'static SceneItemType> {
        Self::by_type_id(StringId::new(name)).filter(|t| t.name == name)
    }
}

/// Validated payload of one item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemPayload {
    Camera,
    Light(LightItem),
    Sunlight(SunlightItem),
    Mesh {
        mesh: MeshItem,
        sub_mesh_material_asset_ids: Vec<AssetId>,
    },
    SkeletonMesh {
        skeleton: SkeletonMeshItem,
        mesh: MeshItem,
        sub_mesh_material_asset_ids: Vec<AssetId>,
    },
    Material {
        item: MaterialItem,
        properties: Vec<MaterialProperty>,
    },
}

impl ItemPayload {
    /// Exact number of bytes [`ItemPayload::encode`] appends
    pub fn encoded_size(&self) -> usize {
        use std::mem::size_of;
        match self {
            Self::Camera => 0,
            Self::Light(_) => size_of::<LightItem>(),
            Self::Sunlight(_) => size_of::<SunlightItem>(),
            Self::Mesh {
                sub_mesh_material_asset_ids,
                ..
            } => MESH_SIZE + size_of::<AssetId>() * sub_mesh_material_asset_ids.len(),
            Self::SkeletonMesh {
                sub_mesh_material_asset_ids,
                ..
            } => size_of::<SkeletonMeshItem>() + MESH_SIZE + size_of::<AssetId>() * sub_mesh_material_asset_ids.len(),
            Self::Material { properties, .. } => MATERIAL_SIZE + size_of::<MaterialPropertyRecord>() * properties.len(),
        }
    }

    /// Append the payload bytes
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Camera => {}
            Self::Light(light) => out.extend_from_slice(bytemuck::bytes_of(light)),
            Self::Sunlight(sunlight) => out.extend_from_slice(bytemuck::bytes_of(sunlight)),
            Self::Mesh {
                mesh,
                sub_mesh_material_asset_ids,
            } => {
                out.extend_from_slice(bytemuck::bytes_of(mesh));
                out.extend_from_slice(bytemuck::cast_slice(sub_mesh_material_asset_ids.as_slice()));
            }
            Self::SkeletonMesh {
                skeleton,
                mesh,
                sub_mesh_material_asset_ids,
            } => {
                out.extend_from_slice(bytemuck::bytes_of(skeleton));
                out.extend_from_slice(bytemuck::bytes_of(mesh));
                out.extend_from_slice(bytemuck::cast_slice(sub_mesh_material_asset_ids.as_slice()));
            }
            Self::Material { item, properties } => {
                out.extend_from_slice(bytemuck::bytes_of(item));
                for property in properties {
                    out.extend_from_slice(bytemuck::bytes_of(&property.to_record()));
                }
            }
        }
    }
}

fn extract_camera(_item: &Object, _context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    Ok(ItemPayload::Camera)
}

fn extract_light(item: &Object, _context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    let defaults = LightItem::default();
    let light_type = readers::optional_enum(item, "LightType", LightType::Point)?;
    let light = LightItem {
        light_type: light_type as u32,
        color: readers::optional_rgb_color(item, "Color", defaults.color)?,
        radius: readers::optional_float(item, "Radius", defaults.radius)?,
        inner_angle: readers::optional_angle(item, "InnerAngle", defaults.inner_angle)?,
        outer_angle: readers::optional_angle(item, "OuterAngle", defaults.outer_angle)?,
        near_clip_distance: readers::optional_float(item, "NearClipDistance", defaults.near_clip_distance)?,
        ies_light_profile_index: readers::optional_integer(item, "IesLightProfileIndex", defaults.ies_light_profile_index)?,
    };

    if light_type == LightType::Directional && light.radius != 0.0 {
        return Err(FieldError::invalid("Radius", "for directional lights the radius must be zero"));
    }
    if light_type != LightType::Directional && light.radius <= 0.0 {
        return Err(FieldError::invalid("Radius", "for point or spot lights the radius must be greater than zero"));
    }
    if light.inner_angle < 0.0 {
        return Err(FieldError::invalid("InnerAngle", "the inner spot angle must be >= 0 degrees"));
    }
    if light.outer_angle >= FRAC_PI_2 {
        return Err(FieldError::invalid("OuterAngle", "the outer spot angle must be < 90 degrees"));
    }
    if light.inner_angle >= light.outer_angle {
        return Err(FieldError::invalid(
            "InnerAngle",
            "the inner spot angle must be smaller than the outer spot angle",
        ));
    }
    if light.near_clip_distance < 0.0 {
        return Err(FieldError::invalid("NearClipDistance", "the near clip distance must be >= 0"));
    }
    if light.ies_light_profile_index >= 0 && (item.contains_key("InnerAngle") || item.contains_key("OuterAngle")) {
        return Err(FieldError::invalid(
            "IesLightProfileIndex",
            "\"InnerAngle\" and \"OuterAngle\" are unused when an IES light profile is set",
        ));
    }
    Ok(ItemPayload::Light(light))
}

fn extract_sunlight(item: &Object, _context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    let defaults = SunlightItem::default();
    Ok(ItemPayload::Sunlight(SunlightItem {
        sunrise_time: readers::optional_time_of_day(item, "SunriseTime", defaults.sunrise_time)?,
        sunset_time: readers::optional_time_of_day(item, "SunsetTime", defaults.sunset_time)?,
        east_direction: readers::optional_angle(item, "EastDirection", defaults.east_direction)?,
        angle_of_incidence: readers::optional_angle(item, "AngleOfIncidence", defaults.angle_of_incidence)?,
        time_of_day: readers::optional_time_of_day(item, "TimeOfDay", defaults.time_of_day)?,
    }))
}

fn read_mesh(item: &Object, context: &dyn AssetContext) -> Result<(MeshItem, Vec<AssetId>), FieldError> {
    let mesh_asset_id = readers::mandatory_asset_id(item, "Mesh", context)?;
    let sub_mesh_material_asset_ids = readers::optional_asset_id_list(item, "SubMeshMaterials", context)?;
    let count = u32::try_from(sub_mesh_material_asset_ids.len())
        .map_err(|_| FieldError::invalid("SubMeshMaterials", "too many sub-mesh materials"))?;
    Ok((
        MeshItem {
            mesh_asset_id,
            number_of_sub_mesh_material_asset_ids: count,
        },
        sub_mesh_material_asset_ids,
    ))
}

fn extract_mesh(item: &Object, context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    let (mesh, sub_mesh_material_asset_ids) = read_mesh(item, context)?;
    Ok(ItemPayload::Mesh {
        mesh,
        sub_mesh_material_asset_ids,
    })
}

fn extract_skeleton_mesh(item: &Object, context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    let skeleton = SkeletonMeshItem {
        skeleton_animation_asset_id: readers::optional_asset_id(item, "SkeletonAnimation", context)?,
    };
    let (mesh, sub_mesh_material_asset_ids) = read_mesh(item, context)?;
    Ok(ItemPayload::SkeletonMesh {
        skeleton,
        mesh,
        sub_mesh_material_asset_ids,
    })
}

fn extract_material(item: &Object, context: &dyn AssetContext) -> Result<ItemPayload, FieldError> {
    let material_asset_id = readers::optional_asset_id(item, "Material", context)?;
    let material_blueprint_asset_id = readers::optional_asset_id(item, "MaterialBlueprint", context)?;
    let material_technique_id =
        readers::optional_string_id(item, "MaterialTechnique", v1::DEFAULT_MATERIAL_TECHNIQUE_ID)?;

    match (material_asset_id.is_valid(), material_blueprint_asset_id.is_valid()) {
        (false, false) => {
            return Err(FieldError::invalid(
                "Material",
                "a material asset or a material blueprint asset must be defined",
            ))
        }
        (true, true) => {
            return Err(FieldError::invalid(
                "MaterialBlueprint",
                "a material asset is defined as well, only one of \"Material\" and \"MaterialBlueprint\" is allowed",
            ))
        }
        _ => {}
    }

    let properties = readers::material_properties(item, context)?;
    let number_of_material_properties = u32::try_from(properties.len())
        .map_err(|_| FieldError::invalid("SetMaterialProperties", "too many material properties"))?;
    Ok(ItemPayload::Material {
        item: MaterialItem {
            material_asset_id,
            material_technique_id,
            material_blueprint_asset_id,
            number_of_material_properties,
        },
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetCatalog;
    use serde_json::json;
    use void_scene_format::v1::type_ids;
    use void_scene_format::MaterialPropertyValue;

    fn object(value: serde_json::Value) -> Object {
        value.as_object().cloned().unwrap_or_default()
    }

    fn light(fields: serde_json::Value) -> Result<ItemPayload, FieldError> {
        extract_light(&object(fields), &AssetCatalog::new())
    }

    #[test]
    fn test_table_matches_runtime_type_ids() {
        assert_eq!(SceneItemType::by_name("CameraSceneItem").unwrap().type_id, type_ids::CAMERA);
        assert_eq!(SceneItemType::by_name("LightSceneItem").unwrap().type_id, type_ids::LIGHT);
        assert_eq!(SceneItemType::by_name("SunlightSceneItem").unwrap().type_id, type_ids::SUNLIGHT);
        assert_eq!(SceneItemType::by_name("MeshSceneItem").unwrap().type_id, type_ids::MESH);
        assert_eq!(SceneItemType::by_name("SkeletonMeshSceneItem").unwrap().type_id, type_ids::SKELETON_MESH);
        assert_eq!(SceneItemType::by_name("SkySceneItem").unwrap().type_id, type_ids::SKY);
        assert_eq!(SceneItemType::by_name("VolumeSceneItem").unwrap().type_id, type_ids::VOLUME);
        assert_eq!(SceneItemType::by_name("GrassSceneItem").unwrap().type_id, type_ids::GRASS);
        assert_eq!(SceneItemType::by_name("TerrainSceneItem").unwrap().type_id, type_ids::TERRAIN);
        assert_eq!(SceneItemType::by_name("ParticlesSceneItem").unwrap().type_id, type_ids::PARTICLES);
        assert!(SceneItemType::by_name("lightsceneitem").is_none());
        assert!(SceneItemType::by_name("Light").is_none());
    }

    #[test]
    fn test_light_radius_rules() {
        assert!(light(json!({ "LightType": "DIRECTIONAL", "Radius": 0 })).is_ok());
        assert!(light(json!({ "LightType": "DIRECTIONAL", "Radius": 1 })).is_err());
        assert!(light(json!({ "LightType": "POINT", "Radius": 0 })).is_err());
        assert!(light(json!({ "LightType": "SPOT", "Radius": -2 })).is_err());
        assert!(light(json!({ "LightType": "SPOT", "Radius": 2 })).is_ok());
    }

    #[test]
    fn test_light_angle_rules() {
        assert!(light(json!({ "InnerAngle": 50, "OuterAngle": 50 })).is_err());
        assert!(light(json!({ "InnerAngle": 10, "OuterAngle": 90 })).is_err());
        assert!(light(json!({ "InnerAngle": -1, "OuterAngle": 30 })).is_err());
        assert!(light(json!({ "InnerAngle": 0, "OuterAngle": 89 })).is_ok());
        assert!(light(json!({ "NearClipDistance": -0.1 })).is_err());
        assert!(light(json!({ "Color": [1, 1, -1] })).is_err());
    }

    #[test]
    fn test_ies_profile_excludes_angles() {
        assert!(light(json!({ "IesLightProfileIndex": 2 })).is_ok());
        assert!(light(json!({ "IesLightProfileIndex": 2, "OuterAngle": 45 })).is_err());
        assert!(light(json!({ "IesLightProfileIndex": -1, "OuterAngle": 45 })).is_ok());
    }

    #[test]
    fn test_material_exclusivity() {
        let catalog = AssetCatalog::new().with_asset("Mat").with_asset("Blueprint");
        let both = object(json!({ "Material": "Mat", "MaterialBlueprint": "Blueprint" }));
        let neither = object(json!({ "MaterialTechnique": "Forward" }));
        assert!(extract_material(&both, &catalog).is_err());
        assert!(extract_material(&neither, &catalog).is_err());

        let one = object(json!({ "MaterialBlueprint": "Blueprint" }));
        match extract_material(&one, &catalog).unwrap() {
            ItemPayload::Material { item, properties } => {
                assert_eq!(item.material_asset_id, AssetId::INVALID);
                assert_eq!(item.material_technique_id, v1::DEFAULT_MATERIAL_TECHNIQUE_ID);
                assert!(properties.is_empty());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_encoded_size_matches_encode() {
        let catalog = AssetCatalog::new()
            .with_asset("Cube")
            .with_asset("MatB")
            .with_asset("Walk")
            .with_material("Grass", None, [("Density", MaterialPropertyValue::Float(0.5))]);
        let cases = [
            ("CameraSceneItem", json!({})),
            ("LightSceneItem", json!({ "Radius": 3 })),
            ("SunlightSceneItem", json!({ "TimeOfDay": "12:00" })),
            ("MeshSceneItem", json!({ "Mesh": "Cube", "SubMeshMaterials": ["", "MatB"] })),
            ("SkeletonMeshSceneItem", json!({ "Mesh": "Cube", "SkeletonAnimation": "Walk" })),
            (
                "GrassSceneItem",
                json!({ "Material": "Grass", "SetMaterialProperties": { "Density": 0.75 } }),
            ),
        ];
        for (name, fields) in cases {
            let item_type = SceneItemType::by_name(name).unwrap();
            let payload = (item_type.extract)(&object(fields), &catalog).unwrap();
            let mut out = Vec::new();
            payload.encode(&mut out);
            assert_eq!(out.len(), payload.encoded_size(), "{}", name);
            assert!(payload.encoded_size() >= item_type.fixed_size, "{}", name);
        }
    }
}
