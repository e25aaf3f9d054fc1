//! # Face Module
//!
//! This module defines the six faces of a voxel cube, the direction each one
//! points, the corner template used to emit its two triangles, and the flat
//! light factor that fakes ambient occlusion.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel.
///
/// Each variant is assigned a fixed integer so faces can index per-face tables.
/// The order is: [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum Face {
    /// The top face (facing positive Y)
    TOP = 0,

    /// The bottom face (facing negative Y)
    BOTTOM = 1,

    /// The left face (facing negative X)
    LEFT = 2,

    /// The right face (facing positive X)
    RIGHT = 3,

    /// The front face (facing positive Z)
    FRONT = 4,

    /// The back face (facing negative Z)
    BACK = 5,
}

/// Corner offsets of the two triangles emitted for each face, indexed by
/// `Face as usize`. Winding is counter-clockwise seen from outside the cube.
static FACE_VERTICES: [[[i32; 3]; 6]; 6] = [
    // TOP (+Y)
    [[0, 1, 0], [0, 1, 1], [1, 1, 1], [0, 1, 0], [1, 1, 1], [1, 1, 0]],
    // BOTTOM (-Y)
    [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 0], [1, 0, 1], [0, 0, 1]],
    // LEFT (-X)
    [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 0, 0], [0, 1, 1], [0, 1, 0]],
    // RIGHT (+X)
    [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 0], [1, 1, 1], [1, 0, 1]],
    // FRONT (+Z)
    [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 0, 1], [1, 1, 1], [0, 1, 1]],
    // BACK (-Z)
    [[0, 0, 0], [0, 1, 0], [1, 1, 0], [0, 0, 0], [1, 1, 0], [1, 0, 0]],
];

/// Flat light factor per face. Top is fully lit, bottom darkest, sides in between.
static FACE_SHADE_FACTORS: [f32; 6] = [1.0, 0.5, 0.7, 0.75, 0.75, 0.75];

impl Face {
    /// Returns an array containing all six faces in a consistent order.
    ///
    /// The order is: [TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK]
    pub fn all() -> [Face; 6] {
        [
            Face::TOP,
            Face::BOTTOM,
            Face::LEFT,
            Face::RIGHT,
            Face::FRONT,
            Face::BACK,
        ]
    }

    /// Unit step from a voxel to the neighbour this face looks at.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            Face::TOP => Vector3::new(0, 1, 0),
            Face::BOTTOM => Vector3::new(0, -1, 0),
            Face::LEFT => Vector3::new(-1, 0, 0),
            Face::RIGHT => Vector3::new(1, 0, 0),
            Face::FRONT => Vector3::new(0, 0, 1),
            Face::BACK => Vector3::new(0, 0, -1),
        }
    }

    /// The face on the other side of a shared boundary.
    pub fn opposite(self) -> Face {
        match self {
            Face::TOP => Face::BOTTOM,
            Face::BOTTOM => Face::TOP,
            Face::LEFT => Face::RIGHT,
            Face::RIGHT => Face::LEFT,
            Face::FRONT => Face::BACK,
            Face::BACK => Face::FRONT,
        }
    }

    /// Corner offsets (relative to the voxel's minimum corner) of the six
    /// vertices making up this face's two triangles.
    pub fn vertices(self) -> &'static [[i32; 3]; 6] {
        &FACE_VERTICES[self as usize]
    }

    /// The light factor applied to a voxel's base colour on this face.
    pub fn shade_factor(self) -> f32 {
        FACE_SHADE_FACTORS[self as usize]
    }

    /// Multiplies the RGB channels of `base` by this face's light factor.
    /// Alpha is left untouched.
    pub fn shade(self, base: [u8; 4]) -> [u8; 4] {
        let factor = self.shade_factor();
        [
            (base[0] as f32 * factor) as u8,
            (base[1] as f32 * factor) as u8,
            (base[2] as f32 * factor) as u8,
            base[3],
        ]
    }
}
