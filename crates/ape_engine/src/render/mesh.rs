//! Mesh representation for 3D models
//!
//! Backend-agnostic vertex and index data. The Vulkan input layout for
//! [`Vertex`] lives in `backends::vulkan::rendering::vertex_layout`.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// 3D vertex data structure for rendering
///
/// `#[repr(C)]` keeps the field order the vertex shader expects:
/// position (location 0), color (location 1), texture coordinate (location 2).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// Object-space position
    pub pos: [f32; 3],
    /// Per-vertex color, multiplied with the texture sample
    pub color: [f32; 3],
    /// Texture coordinate with V pointing down the image
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex
    pub fn new(pos: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { pos, color, tex_coord }
    }

    fn bits(&self) -> [u32; 8] {
        [
            self.pos[0].to_bits(),
            self.pos[1].to_bits(),
            self.pos[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
        ]
    }
}

// Structural equality on the raw float bits so vertices can key a HashMap
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Unique vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from raw vertex and index data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Whether the mesh has anything to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// Builds a [`Mesh`] while sharing one index between identical vertices
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: Mesh,
    unique: HashMap<Vertex, u32>,
}

impl MeshBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex reference, reusing the index of an identical earlier vertex
    pub fn push(&mut self, vertex: Vertex) -> u32 {
        let vertices = &mut self.mesh.vertices;
        let index = *self.unique.entry(vertex).or_insert_with(|| {
            vertices.push(vertex);
            (vertices.len() - 1) as u32
        });
        self.mesh.indices.push(index);
        index
    }

    /// Number of unique vertices so far
    pub fn unique_vertex_count(&self) -> usize {
        self.mesh.vertices.len()
    }

    /// Finish building
    pub fn build(self) -> Mesh {
        self.mesh
    }
}
