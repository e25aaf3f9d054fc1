//! # Voxel Type Module
//!
//! This module defines the different kinds of voxel in the world and the base
//! colour each one is drawn with.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// The underlying integer type used to store a voxel in a chunk buffer.
pub type VoxelTypeSize = u8;

/// Enumerates all possible voxel types.
///
/// A voxel carries nothing beyond its type. The `FromPrimitive` derive allows
/// conversion from the compact storage integer.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum VoxelType {
    /// Empty space. Never meshed, never blocks a neighbour's face.
    #[default]
    AIR,

    /// Plain dirt, found under the surface layer.
    DIRT,

    /// Grass, the surface layer of generated terrain.
    GRASS,

    /// Stone, the bulk of anything underground.
    STONE,
}

/// Base RGBA colour of each voxel type, indexed by `VoxelType as usize`.
pub static VOXEL_TYPE_TO_COLOR: [[u8; 4]; 4] = [
    [0, 0, 0, 0],         // AIR
    [150, 75, 0, 255],    // DIRT
    [46, 125, 50, 255],   // GRASS
    [100, 100, 100, 255], // STONE
];

/// Colour used for a type missing from [`VOXEL_TYPE_TO_COLOR`].
pub const FALLBACK_COLOR: [u8; 4] = [255, 255, 255, 255];

impl VoxelType {
    /// Converts a stored integer back into a `VoxelType`.
    ///
    /// # Returns
    /// `None` if the value doesn't name a known type.
    pub fn from_id(id: VoxelTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(id)
    }

    /// The compact storage id of this type.
    pub fn id(self) -> VoxelTypeSize {
        self as VoxelTypeSize
    }

    /// Whether this voxel occupies space.
    #[inline]
    pub fn is_solid(self) -> bool {
        self != VoxelType::AIR
    }

    /// The unshaded RGBA colour of this type.
    pub fn base_color(self) -> [u8; 4] {
        VOXEL_TYPE_TO_COLOR
            .get(self as usize)
            .copied()
            .unwrap_or(FALLBACK_COLOR)
    }

    /// Picks a random solid type. Used by the demo to scatter edits.
    pub fn random_solid() -> Self {
        Self::from_id(fastrand::u8(1..=3)).unwrap_or(VoxelType::STONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for voxel_type in [VoxelType::AIR, VoxelType::DIRT, VoxelType::GRASS, VoxelType::STONE] {
            assert_eq!(VoxelType::from_id(voxel_type.id()), Some(voxel_type));
        }
        assert_eq!(VoxelType::from_id(200), None);
    }

    #[test]
    fn only_air_is_not_solid() {
        assert!(!VoxelType::AIR.is_solid());
        assert!(VoxelType::DIRT.is_solid());
        assert!(VoxelType::STONE.is_solid());
    }

    #[test]
    fn random_solid_never_returns_air() {
        for _ in 0..64 {
            assert!(VoxelType::random_solid().is_solid());
        }
    }
}
