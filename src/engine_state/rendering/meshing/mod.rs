//! # Chunk Meshing
//!
//! Converts a chunk's voxels into a flat, non-indexed triangle list.
//!
//! ## Algorithm
//!
//! Plain face culling. For every solid voxel, each of its six faces is emitted
//! as two triangles (six vertices) when the cell it looks at is air. Cells
//! beyond the chunk edge are looked up in the neighbouring chunk:
//!
//! - neighbour not resident: the face is exposed, so chunk borders draw until
//!   the neighbour loads and triggers a re-mesh,
//! - neighbour resident with no voxel buffer: treated as all air,
//! - otherwise the neighbour's voxel decides.
//!
//! Coplanar faces are not merged.
//!
//! The builder walks the chunk twice: once to count exposed faces, once to
//! fill a vector reserved to the exact size. A chunk with zero exposed faces
//! produces no mesh at all rather than an empty one.

use cgmath::Point3;
use log::error;

use super::Vertex;
use crate::engine_state::voxels::chunk::{ChunkKey, LocalPos, VoxelBuffer, CHUNK_SIZE};
use crate::engine_state::voxels::voxel::{Face, VoxelType};

mod neighborhood;

pub use neighborhood::{ChunkNeighborhood, NeighborVoxels, VoxelLookup};

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Vertices emitted per visible face (two triangles, no index reuse).
pub const VERTICES_PER_FACE: usize = 6;

/// CPU-side mesh of one chunk, awaiting upload on the main thread.
#[derive(Debug, Clone)]
pub struct MeshData {
    /// The chunk this mesh was built for
    pub position: ChunkKey,
    /// Chunk-local vertices, six per visible face
    pub vertices: Vec<Vertex>,
}

impl MeshData {
    /// Vertices in the triangle list.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Visible faces, six vertices each.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    /// Position stream in the float layout the mesh service takes.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.vertices.iter().map(Vertex::position_f32).collect()
    }

    /// Colour stream, parallel to [`MeshData::positions`].
    pub fn colors(&self) -> Vec<[u8; 4]> {
        self.vertices.iter().map(Vertex::color).collect()
    }
}

/// Decides whether `face` of the voxel at `local` is visible.
///
/// # Arguments
/// * `lookup` - Where neighbour chunks are read from
/// * `position` - The chunk that owns `center`
/// * `center` - The voxels of that chunk
/// * `local` - The voxel whose face is tested
/// * `face` - The face to test
///
/// # Returns
/// `true` if the adjacent cell is air or lies in a chunk that isn't resident.
pub fn is_face_exposed<L: VoxelLookup + ?Sized>(
    lookup: &L,
    position: ChunkKey,
    center: &VoxelBuffer,
    local: LocalPos,
    face: Face,
) -> bool {
    let normal = face.normal();
    let x = local.x as i32 + normal.x;
    let y = local.y as i32 + normal.y;
    let z = local.z as i32 + normal.z;

    let inside = |v: i32| (0..CHUNK_SIZE_I32).contains(&v);
    if inside(x) && inside(y) && inside(z) {
        return !center.get(x as usize, y as usize, z as usize).is_solid();
    }

    let neighbor = ChunkKey::new(
        position.x + x.div_euclid(CHUNK_SIZE_I32),
        position.y + y.div_euclid(CHUNK_SIZE_I32),
        position.z + z.div_euclid(CHUNK_SIZE_I32),
    );
    match lookup.voxels_at(neighbor) {
        NeighborVoxels::Absent | NeighborVoxels::Present(None) => true,
        NeighborVoxels::Present(Some(voxels)) => !voxels
            .get(
                x.rem_euclid(CHUNK_SIZE_I32) as usize,
                y.rem_euclid(CHUNK_SIZE_I32) as usize,
                z.rem_euclid(CHUNK_SIZE_I32) as usize,
            )
            .is_solid(),
    }
}

/// Calls `f` for every solid voxel and each of its exposed faces.
fn for_each_exposed_face<L, F>(lookup: &L, position: ChunkKey, voxels: &VoxelBuffer, mut f: F)
where
    L: VoxelLookup + ?Sized,
    F: FnMut(LocalPos, VoxelType, Face),
{
    for z in 0..CHUNK_SIZE {
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let voxel_type = voxels.get(x, y, z);
                if !voxel_type.is_solid() {
                    continue;
                }
                let local = LocalPos::new(x, y, z);
                for face in Face::all() {
                    if is_face_exposed(lookup, position, voxels, local, face) {
                        f(local, voxel_type, face);
                    }
                }
            }
        }
    }
}

/// Counts the faces [`build_chunk_mesh`] would emit.
pub fn count_exposed_faces<L: VoxelLookup + ?Sized>(
    lookup: &L,
    position: ChunkKey,
    voxels: &VoxelBuffer,
) -> usize {
    let mut count = 0;
    for_each_exposed_face(lookup, position, voxels, |_, _, _| count += 1);
    count
}

/// Builds the triangle list for the chunk at `position`.
///
/// # Arguments
/// * `lookup` - Neighbour voxel source for faces on the chunk border
/// * `position` - The chunk being meshed
/// * `voxels` - Its voxel buffer, `None` for an all-air chunk
///
/// # Returns
/// `None` if the chunk has no buffer, no exposed face, or the vertex vector
/// could not be allocated. Otherwise the mesh.
pub fn build_chunk_mesh<L: VoxelLookup + ?Sized>(
    lookup: &L,
    position: ChunkKey,
    voxels: Option<&VoxelBuffer>,
) -> Option<MeshData> {
    let voxels = voxels?;

    let faces = count_exposed_faces(lookup, position, voxels);
    if faces == 0 {
        return None;
    }

    let mut vertices = Vec::new();
    if let Err(err) = vertices.try_reserve_exact(faces * VERTICES_PER_FACE) {
        error!(
            "Failed to allocate {} vertices for chunk {:?}: {}",
            faces * VERTICES_PER_FACE,
            position,
            err
        );
        return None;
    }

    for_each_exposed_face(lookup, position, voxels, |local, voxel_type, face| {
        let color = face.shade(voxel_type.base_color());
        for corner in face.vertices() {
            let vertex_position = Point3::new(
                local.x as i32 + corner[0],
                local.y as i32 + corner[1],
                local.z as i32 + corner[2],
            );
            vertices.push(Vertex::new(vertex_position, color));
        }
    });

    Some(MeshData { position, vertices })
}
