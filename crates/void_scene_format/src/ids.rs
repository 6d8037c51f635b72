//! Identifiers shared by the scene compiler and the runtime loader
//!
//! String identifiers are 32-bit FNV-1a hashes so they can be computed in
//! const context (scene item type IDs) as well as at compile time from
//! authored names (material property IDs, technique IDs).

use core::fmt;
use serde::{Deserialize, Serialize};

const FNV1A_OFFSET_BASIS_32: u32 = 0x811c_9dc5;
const FNV1A_PRIME_32: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash over raw bytes
pub const fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV1A_OFFSET_BASIS_32;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV1A_PRIME_32);
        i += 1;
    }
    hash
}

/// Hashed string identifier
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[serde(transparent)]
pub struct StringId(u32);

impl StringId {
    /// Reserved "no string" value
    pub const INVALID: Self = Self(u32::MAX);

    /// Hash a name into a string ID
    #[inline]
    pub const fn new(name: &str) -> Self {
        Self(fnv1a_32(name.as_bytes()))
    }

    /// Wrap an already hashed value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw hash value
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Check whether this is not the reserved invalid value
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId({:#010x})", self.0)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Scene item type identifier, hash of the type name
pub type SceneItemTypeId = StringId;

/// Material property identifier, hash of the property name
pub type MaterialPropertyId = StringId;

/// Material technique identifier, hash of the technique name
pub type MaterialTechniqueId = StringId;

/// Compiled asset identifier understood by the runtime
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[serde(transparent)]
pub struct AssetId(u32);

impl AssetId {
    /// Sentinel for "no asset referenced"
    pub const INVALID: Self = Self(u32::MAX);

    /// Wrap a raw asset ID
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Derive the asset ID of a reference string
    #[inline]
    pub const fn from_reference(reference: &str) -> Self {
        Self(fnv1a_32(reference.as_bytes()))
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Check whether this is a real asset reference
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "AssetId({})", self.0)
        } else {
            write!(f, "AssetId(INVALID)")
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
