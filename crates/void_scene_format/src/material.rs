//! Material property values as stored in material scene item trailers

use bytemuck::{Pod, Zeroable};

use crate::ids::{AssetId, MaterialPropertyId};

/// Material property value type
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialPropertyValueType {
    Boolean = 0,
    Integer = 1,
    Integer2 = 2,
    Integer3 = 3,
    Integer4 = 4,
    Float = 5,
    Float2 = 6,
    Float3 = 7,
    Float4 = 8,
    TextureAssetId = 9,
}

impl MaterialPropertyValueType {
    /// All value types with their authored names
    pub const NAMES: &'static [(&'static str, Self)] = &[
        ("BOOLEAN", Self::Boolean),
        ("INTEGER", Self::Integer),
        ("INTEGER_2", Self::Integer2),
        ("INTEGER_3", Self::Integer3),
        ("INTEGER_4", Self::Integer4),
        ("FLOAT", Self::Float),
        ("FLOAT_2", Self::Float2),
        ("FLOAT_3", Self::Float3),
        ("FLOAT_4", Self::Float4),
        ("TEXTURE_ASSET_ID", Self::TextureAssetId),
    ];

    /// Decode a stored value type
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::NAMES.iter().map(|(_, t)| *t).find(|t| *t as u8 == raw)
    }

    /// Look up a value type by its authored name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }

    /// Authored name of this value type
    pub fn name(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, t)| t == self)
            .map(|(n, _)| *n)
            .unwrap_or("UNKNOWN")
    }

    /// Number of scalar components
    pub fn component_count(&self) -> usize {
        match self {
            Self::Boolean | Self::Integer | Self::Float | Self::TextureAssetId => 1,
            Self::Integer2 | Self::Float2 => 2,
            Self::Integer3 | Self::Float3 => 3,
            Self::Integer4 | Self::Float4 => 4,
        }
    }
}

/// Typed material property value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialPropertyValue {
    Boolean(bool),
    Integer(i32),
    Integer2([i32; 2]),
    Integer3([i32; 3]),
    Integer4([i32; 4]),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    TextureAssetId(AssetId),
}

impl MaterialPropertyValue {
    /// Value type of this value
    pub fn value_type(&self) -> MaterialPropertyValueType {
        match self {
            Self::Boolean(_) => MaterialPropertyValueType::Boolean,
            Self::Integer(_) => MaterialPropertyValueType::Integer,
            Self::Integer2(_) => MaterialPropertyValueType::Integer2,
            Self::Integer3(_) => MaterialPropertyValueType::Integer3,
            Self::Integer4(_) => MaterialPropertyValueType::Integer4,
            Self::Float(_) => MaterialPropertyValueType::Float,
            Self::Float2(_) => MaterialPropertyValueType::Float2,
            Self::Float3(_) => MaterialPropertyValueType::Float3,
            Self::Float4(_) => MaterialPropertyValueType::Float4,
            Self::TextureAssetId(_) => MaterialPropertyValueType::TextureAssetId,
        }
    }

    /// Pack into four 32-bit words, unused words are zero
    pub fn to_words(&self) -> [u32; 4] {
        let mut words = [0u32; 4];
        match *self {
            Self::Boolean(v) => words[0] = v as u32,
            Self::Integer(v) => words[0] = v as u32,
            Self::Integer2(v) => pack(&mut words, v.iter().map(|x| *x as u32)),
            Self::Integer3(v) => pack(&mut words, v.iter().map(|x| *x as u32)),
            Self::Integer4(v) => pack(&mut words, v.iter().map(|x| *x as u32)),
            Self::Float(v) => words[0] = v.to_bits(),
            Self::Float2(v) => pack(&mut words, v.iter().map(|x| x.to_bits())),
            Self::Float3(v) => pack(&mut words, v.iter().map(|x| x.to_bits())),
            Self::Float4(v) => pack(&mut words, v.iter().map(|x| x.to_bits())),
            Self::TextureAssetId(id) => words[0] = id.raw(),
        }
        words
    }

    /// Unpack from four 32-bit words
    pub fn from_words(value_type: MaterialPropertyValueType, w: [u32; 4]) -> Self {
        let i = |n: usize| w[n] as i32;
        let f = |n: usize| f32::from_bits(w[n]);
        match value_type {
            MaterialPropertyValueType::Boolean => Self::Boolean(w[0] != 0),
            MaterialPropertyValueType::Integer => Self::Integer(i(0)),
            MaterialPropertyValueType::Integer2 => Self::Integer2([i(0), i(1)]),
            MaterialPropertyValueType::Integer3 => Self::Integer3([i(0), i(1), i(2)]),
            MaterialPropertyValueType::Integer4 => Self::Integer4([i(0), i(1), i(2), i(3)]),
            MaterialPropertyValueType::Float => Self::Float(f(0)),
            MaterialPropertyValueType::Float2 => Self::Float2([f(0), f(1)]),
            MaterialPropertyValueType::Float3 => Self::Float3([f(0), f(1), f(2)]),
            MaterialPropertyValueType::Float4 => Self::Float4([f(0), f(1), f(2), f(3)]),
            MaterialPropertyValueType::TextureAssetId => Self::TextureAssetId(AssetId::from_raw(w[0])),
        }
    }
}

fn pack(words: &mut [u32; 4], values: impl Iterator<Item = u32>) {
    for (slot, value) in words.iter_mut().zip(values) {
        *slot = value;
    }
}

/// Material property with its override state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialProperty {
    pub id: MaterialPropertyId,
    pub value: MaterialPropertyValue,
    /// Set when the scene item explicitly overrides the declared value
    pub overwritten: bool,
}

impl MaterialProperty {
    /// Create a non-overwritten property
    pub fn new(id: MaterialPropertyId, value: MaterialPropertyValue) -> Self {
        Self { id, value, overwritten: false }
    }

    /// Decode from a stored record
    pub fn from_record(record: &MaterialPropertyRecord) -> Option<Self> {
        let value_type = MaterialPropertyValueType::from_raw(record.value_type)?;
        Some(Self {
            id: record.property_id,
            value: MaterialPropertyValue::from_words(value_type, record.value),
            overwritten: record.overwritten != 0,
        })
    }

    /// Encode into a stored record
    pub fn to_record(&self) -> MaterialPropertyRecord {
        MaterialPropertyRecord {
            property_id: self.id,
            value_type: self.value.value_type() as u8,
            overwritten: self.overwritten as u8,
            _padding: [0; 2],
            value: self.value.to_words(),
        }
    }
}

/// Material properties sorted by property ID
pub type SortedPropertyVector = Vec<MaterialProperty>;

/// Stored material property
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct MaterialPropertyRecord {
    pub property_id: MaterialPropertyId,
    pub value_type: u8,
    pub overwritten: u8,
    pub _padding: [u8; 2],
    pub value: [u32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StringId;

    #[test]
    fn test_record_size() {
        assert_eq!(core::mem::size_of::<MaterialPropertyRecord>(), 24);
    }

    #[test]
    fn test_record_conversion() {
        let property = MaterialProperty {
            id: StringId::new("AlbedoColor"),
            value: MaterialPropertyValue::Float3([0.25, 0.5, 1.0]),
            overwritten: true,
        };
        let record = property.to_record();
        assert_eq!(record.value_type, MaterialPropertyValueType::Float3 as u8);
        assert_eq!(record.value[3], 0);
        assert_eq!(MaterialProperty::from_record(&record), Some(property));
    }

    #[test]
    fn test_negative_integers_survive_packing() {
        let value = MaterialPropertyValue::Integer2([-3, 7]);
        let words = value.to_words();
        assert_eq!(MaterialPropertyValue::from_words(MaterialPropertyValueType::Integer2, words), value);
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(MaterialPropertyValueType::from_name("FLOAT_4"), Some(MaterialPropertyValueType::Float4));
        assert_eq!(MaterialPropertyValueType::from_name("float_4"), None);
        assert_eq!(MaterialPropertyValueType::TextureAssetId.name(), "TEXTURE_ASSET_ID");
        assert_eq!(MaterialPropertyValueType::from_raw(42), None);
    }
}
