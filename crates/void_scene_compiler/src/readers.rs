//! Typed property readers
//!
//! Every reader pulls one field out of a JSON object, applies units and range
//! checks, and falls back to a default when an optional field is absent.
//! Readers are pure: calling them twice on the same object yields the same
//! value, which the two-pass scene writer relies on.

use glam::{EulerRot, Quat};
use serde_json::Value;
use void_scene_format::v1::LightType;
use void_scene_format::{
    AssetId, MaterialPropertyValue, MaterialPropertyValueType, SortedPropertyVector, StringId,
};

use crate::catalog::AssetContext;
use crate::error::FieldError;

/// JSON object holding the fields of a node or item
pub type Object = serde_json::Map<String, Value>;

/// Enum authored by constant name
pub trait NamedConstant: Copy + 'static {
    /// Accepted names with their values, matched case-sensitively
    const CONSTANTS: &'static [(&'static str, Self)];
}

impl NamedConstant for LightType {
    const CONSTANTS: &'static [(&'static str, Self)] = &[
        ("DIRECTIONAL", LightType::Directional),
        ("POINT", LightType::Point),
        ("SPOT", LightType::Spot),
    ];
}

fn number(value: &Value, field: &str) -> Result<f32, FieldError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
        .ok_or_else(|| FieldError::invalid(field, format!("expected a number, found {}", value)))
}

fn numbers<const N: usize>(value: &Value, field: &str) -> Result<[f32; N], FieldError> {
    let array = value
        .as_array()
        .ok_or_else(|| FieldError::invalid(field, format!("expected an array of {} numbers", N)))?;
    if array.len() != N {
        return Err(FieldError::invalid(
            field,
            format!("expected {} components, found {}", N, array.len()),
        ));
    }
    let mut out = [0.0; N];
    for (slot, element) in out.iter_mut().zip(array) {
        *slot = number(element, field)?;
    }
    Ok(out)
}

/// Optional float
pub fn optional_float(object: &Object, field: &str, default: f32) -> Result<f32, FieldError> {
    object.get(field).map_or(Ok(default), |v| number(v, field))
}

/// Optional signed integer
pub fn optional_integer(object: &Object, field: &str, default: i32) -> Result<i32, FieldError> {
    match object.get(field) {
        None => Ok(default),
        Some(value) => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| FieldError::invalid(field, format!("expected a 32-bit integer, found {}", value))),
    }
}

/// Optional fixed-arity vector in world units
pub fn optional_vector<const N: usize>(object: &Object, field: &str, default: [f32; N]) -> Result<[f32; N], FieldError> {
    object.get(field).map_or(Ok(default), |v| numbers::<N>(v, field))
}

/// Optional fixed-arity factor, e.g. a scale; zero components collapse an axis
pub fn optional_factor<const N: usize>(object: &Object, field: &str, default: [f32; N]) -> Result<[f32; N], FieldError> {
    optional_vector::<N>(object, field, default)
}

/// Optional percentage in [0, 100], returned as a factor in [0, 1]
pub fn optional_percentage(object: &Object, field: &str, default: f32) -> Result<f32, FieldError> {
    match object.get(field) {
        None => Ok(default),
        Some(value) => {
            let percentage = number(value, field)?;
            if !(0.0..=100.0).contains(&percentage) {
                return Err(FieldError::invalid(field, format!("percentage {} is outside [0, 100]", percentage)));
            }
            Ok(percentage / 100.0)
        }
    }
}

/// Optional rotation as `[x, y, z, w]` quaternion or `[x, y, z]` Euler
/// angles in degrees; returned as (x, y, z, w)
pub fn optional_rotation(object: &Object, field: &str, default: [f32; 4]) -> Result<[f32; 4], FieldError> {
    let Some(value) = object.get(field) else {
        return Ok(default);
    };
    let arity = value.as_array().map(Vec::len).unwrap_or(0);
    let rotation = match arity {
        3 => {
            let [x, y, z] = numbers::<3>(value, field)?;
            Quat::from_euler(EulerRot::ZYX, z.to_radians(), y.to_radians(), x.to_radians())
        }
        4 => {
            let quat = Quat::from_array(numbers::<4>(value, field)?);
            if quat.length_squared() <= f32::EPSILON {
                return Err(FieldError::invalid(field, "quaternion must not have zero length"));
            }
            quat.normalize()
        }
        _ => {
            return Err(FieldError::invalid(
                field,
                "expected [x, y, z] Euler angles in degrees or an [x, y, z, w] quaternion",
            ))
        }
    };
    Ok(rotation.to_array())
}

/// Optional linear RGB color, components must be >= 0
pub fn optional_rgb_color(object: &Object, field: &str, default: [f32; 3]) -> Result<[f32; 3], FieldError> {
    let color = optional_vector::<3>(object, field, default)?;
    if color.iter().any(|c| *c < 0.0) {
        return Err(FieldError::invalid(field, "all color components must be positive"));
    }
    Ok(color)
}

/// Optional angle, authored in degrees and returned in radians
pub fn optional_angle(object: &Object, field: &str, default_radians: f32) -> Result<f32, FieldError> {
    object
        .get(field)
        .map_or(Ok(default_radians), |v| number(v, field).map(f32::to_radians))
}

/// Optional time of day as `"HH:MM"` or decimal hours, returned in hours
pub fn optional_time_of_day(object: &Object, field: &str, default: f32) -> Result<f32, FieldError> {
    let Some(value) = object.get(field) else {
        return Ok(default);
    };
    let hours = match value {
        Value::String(text) => parse_time_of_day(text)
            .ok_or_else(|| FieldError::invalid(field, format!("\"{}\" is not a valid \"HH:MM\" time of day", text)))?,
        _ => number(value, field)?,
    };
    if !(0.0..24.0).contains(&hours) {
        return Err(FieldError::invalid(field, format!("time of day {} is outside [0, 24)", hours)));
    }
    Ok(hours)
}

fn parse_time_of_day(text: &str) -> Option<f32> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours as f32 + minutes as f32 / 60.0)
}

/// Optional enum by case-sensitive constant name
pub fn optional_enum<T: NamedConstant>(object: &Object, field: &str, default: T) -> Result<T, FieldError> {
    let Some(value) = object.get(field) else {
        return Ok(default);
    };
    let name = value
        .as_str()
        .ok_or_else(|| FieldError::invalid(field, format!("expected a constant name, found {}", value)))?;
    T::CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| FieldError::UnknownEnumValue {
            field: field.to_string(),
            value: name.to_string(),
            accepted: T::CONSTANTS.iter().map(|(constant, _)| *constant).collect(),
        })
}

fn optional_str<'a>(object: &'a Object, field: &str) -> Result<Option<&'a str>, FieldError> {
    match object.get(field) {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(value) => Err(FieldError::invalid(field, format!("expected a string, found {}", value))),
    }
}

/// Optional hashed string ID; absent or empty yields `default`
pub fn optional_string_id(object: &Object, field: &str, default: StringId) -> Result<StringId, FieldError> {
    Ok(match optional_str(object, field)? {
        Some(text) if !text.is_empty() => StringId::new(text),
        _ => default,
    })
}

fn resolve(context: &dyn AssetContext, field: &str, reference: &str) -> Result<AssetId, FieldError> {
    context.resolve(reference).map_err(|e| FieldError::UnresolvedReference {
        field: field.to_string(),
        reference: e.0,
    })
}

/// Optional asset reference; absent or empty yields [`AssetId::INVALID`]
pub fn optional_asset_id(object: &Object, field: &str, context: &dyn AssetContext) -> Result<AssetId, FieldError> {
    match optional_str(object, field)? {
        Some(reference) => resolve(context, field, reference),
        None => Ok(AssetId::INVALID),
    }
}

/// Mandatory, non-empty asset reference
pub fn mandatory_asset_id(object: &Object, field: &str, context: &dyn AssetContext) -> Result<AssetId, FieldError> {
    match optional_str(object, field)? {
        None => Err(FieldError::missing(field)),
        Some("") => Err(FieldError::invalid(field, "asset reference must not be empty")),
        Some(reference) => resolve(context, field, reference),
    }
}

/// Ordered list of optional asset references, empty entries yield
/// [`AssetId::INVALID`]
pub fn optional_asset_id_list(object: &Object, field: &str, context: &dyn AssetContext) -> Result<Vec<AssetId>, FieldError> {
    let Some(value) = object.get(field) else {
        return Ok(Vec::new());
    };
    let array = value
        .as_array()
        .ok_or_else(|| FieldError::invalid(field, "expected an array of asset references"))?;
    array
        .iter()
        .map(|element| {
            let reference = element
                .as_str()
                .ok_or_else(|| FieldError::invalid(field, format!("expected an asset reference, found {}", element)))?;
            resolve(context, field, reference)
        })
        .collect()
}

/// Parse a material property value of a known value type
///
/// Accepts booleans, numbers, number arrays, whitespace-separated number
/// strings, and for textures an asset reference passed to `resolve_texture`.
pub fn property_value<F>(
    value_type: MaterialPropertyValueType,
    value: &Value,
    field: &str,
    resolve_texture: F,
) -> Result<MaterialPropertyValue, FieldError>
where
    F: Fn(&str) -> Result<AssetId, FieldError>,
{
    use MaterialPropertyValueType as T;

    match value_type {
        T::Boolean => match value {
            Value::Bool(b) => Ok(MaterialPropertyValue::Boolean(*b)),
            Value::String(s) if s == "TRUE" || s == "true" => Ok(MaterialPropertyValue::Boolean(true)),
            Value::String(s) if s == "FALSE" || s == "false" => Ok(MaterialPropertyValue::Boolean(false)),
            _ => Err(FieldError::invalid(field, format!("expected a boolean, found {}", value))),
        },
        T::TextureAssetId => match value {
            Value::String(reference) => resolve_texture(reference).map(MaterialPropertyValue::TextureAssetId),
            _ => Err(FieldError::invalid(field, "expected a texture asset reference")),
        },
        T::Integer | T::Integer2 | T::Integer3 | T::Integer4 => {
            let c = components(value, value_type.component_count(), field)?;
            let mut ints = [0i32; 4];
            for (slot, component) in ints.iter_mut().zip(&c) {
                if component.fract() != 0.0 || *component < i32::MIN as f64 || *component > i32::MAX as f64 {
                    return Err(FieldError::invalid(field, format!("{} is not a 32-bit integer", component)));
                }
                *slot = *component as i32;
            }
            Ok(match value_type {
                T::Integer => MaterialPropertyValue::Integer(ints[0]),
                T::Integer2 => MaterialPropertyValue::Integer2([ints[0], ints[1]]),
                T::Integer3 => MaterialPropertyValue::Integer3([ints[0], ints[1], ints[2]]),
                _ => MaterialPropertyValue::Integer4(ints),
            })
        }
        T::Float | T::Float2 | T::Float3 | T::Float4 => {
            let c = components(value, value_type.component_count(), field)?;
            let mut floats = [0f32; 4];
            for (slot, component) in floats.iter_mut().zip(&c) {
                *slot = *component as f32;
            }
            Ok(match value_type {
                T::Float => MaterialPropertyValue::Float(floats[0]),
                T::Float2 => MaterialPropertyValue::Float2([floats[0], floats[1]]),
                T::Float3 => MaterialPropertyValue::Float3([floats[0], floats[1], floats[2]]),
                _ => MaterialPropertyValue::Float4(floats),
            })
        }
    }
}

fn components(value: &Value, count: usize, field: &str) -> Result<Vec<f64>, FieldError> {
    let parsed: Option<Vec<f64>> = match value {
        Value::Number(n) => n.as_f64().map(|v| vec![v]),
        Value::Array(array) => array.iter().map(Value::as_f64).collect(),
        Value::String(text) => text.split_whitespace().map(|t| t.parse().ok()).collect(),
        _ => None,
    };
    let parsed = parsed
        .filter(|c| c.iter().all(|v| v.is_finite()))
        .ok_or_else(|| FieldError::invalid(field, format!("expected {} numeric components, found {}", count, value)))?;
    if parsed.len() != count {
        return Err(FieldError::invalid(
            field,
            format!("expected {} components, found {}", count, parsed.len()),
        ));
    }
    Ok(parsed)
}

/// Material property overrides of a material scene item
///
/// Only produced when `SetMaterialProperties` is present. The declared table
/// of the referenced material or blueprint is copied in property ID order and
/// the explicitly set values are marked as overwritten. Keys that match no
/// declared property are ignored.
pub fn material_properties(object: &Object, context: &dyn AssetContext) -> Result<SortedPropertyVector, FieldError> {
    const FIELD: &str = "SetMaterialProperties";

    let Some(overrides) = object.get(FIELD) else {
        return Ok(Vec::new());
    };
    let overrides = overrides
        .as_object()
        .ok_or_else(|| FieldError::invalid(FIELD, "expected an object of property name to value"))?;

    let material = optional_asset_id(object, "Material", context)?;
    let blueprint = optional_asset_id(object, "MaterialBlueprint", context)?;
    let source = match (material.is_valid(), blueprint.is_valid()) {
        (true, true) => {
            return Err(FieldError::invalid(
                FIELD,
                "\"Material\" and \"MaterialBlueprint\" are both defined, only one is allowed",
            ))
        }
        (true, false) => material,
        (false, true) => blueprint,
        (false, false) => return Ok(Vec::new()),
    };

    let mut properties = context.declared_properties(source).unwrap_or_default();
    if properties.is_empty() {
        log::debug!("Asset {} declares no material properties, overrides dropped", source);
        return Ok(properties);
    }

    for (name, value) in overrides {
        let id = StringId::new(name);
        match properties.binary_search_by_key(&id, |p| p.id) {
            Ok(index) => {
                let property = &mut properties[index];
                property.value = property_value(property.value.value_type(), value, name, |reference| {
                    resolve(context, name, reference)
                })?;
                property.overwritten = true;
            }
            Err(_) => log::warn!("Ignoring override of undeclared material property \"{}\"", name),
        }
    }
    Ok(properties)
}
