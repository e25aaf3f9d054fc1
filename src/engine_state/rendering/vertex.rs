//! Vertex data structures for voxel meshes.
//!
//! This module defines the vertex format produced by the mesh builder and the
//! conversions the main thread applies before handing a mesh to the GPU.

use cgmath::Point3;

/// A vertex of a voxel mesh.
///
/// Represents a corner of a voxel face in chunk-local grid coordinates, with
/// the face's flat shaded colour.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes)
/// - Color: 4x u8 RGBA (4 bytes)
///
/// Total size: 16 bytes, no padding, so a slice of vertices can be viewed as
/// raw bytes with `bytemuck`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// X coordinate relative to the chunk's minimum corner
    x: i32,
    /// Y coordinate relative to the chunk's minimum corner
    y: i32,
    /// Z coordinate relative to the chunk's minimum corner
    z: i32,
    /// Shaded RGBA colour
    color: [u8; 4],
}

impl Vertex {
    /// Byte offset of the position attribute.
    pub const POSITION_OFFSET: usize = 0;
    /// Byte offset of the colour attribute.
    pub const COLOR_OFFSET: usize = std::mem::size_of::<[i32; 3]>();
    /// Distance in bytes between consecutive vertices.
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    /// Creates a new vertex.
    ///
    /// # Arguments
    /// * `pos` - The grid position of the vertex, relative to its chunk
    /// * `color` - RGBA colour, already shaded for the face
    pub fn new(pos: Point3<i32>, color: [u8; 4]) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            color,
        }
    }

    /// Chunk-local corner position.
    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Shaded RGBA colour.
    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    /// Position as the float triple most graphics APIs expect.
    pub fn position_f32(&self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }

    /// Views a vertex slice as raw bytes, ready for a vertex buffer upload.
    pub fn as_bytes(vertices: &[Vertex]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 16);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
    }

    #[test]
    fn byte_view_preserves_fields() {
        let vertices = [
            Vertex::new(Point3::new(1, 2, 3), [10, 20, 30, 255]),
            Vertex::new(Point3::new(-4, 5, 6), [0, 0, 0, 0]),
        ];
        let bytes = Vertex::as_bytes(&vertices);
        assert_eq!(bytes.len(), 2 * Vertex::STRIDE);
        assert_eq!(&bytes[Vertex::COLOR_OFFSET..Vertex::STRIDE], &[10, 20, 30, 255]);

        let back: &[Vertex] = bytemuck::cast_slice(bytes);
        assert_eq!(back[1].position(), Point3::new(-4, 5, 6));
    }
}
