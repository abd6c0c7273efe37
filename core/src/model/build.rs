//! CPU-side vertex building for model renderers.
//!
//! These routines fill renderer-owned vertex storage from a model definition or
//! instance. They write through [`VertexSink`], so the destination can be a
//! plain slice or a strided attribute inside an interleaved vertex array.

use super::def::{ModelDef, ModelVertex};
use super::instance::Model;
use crate::math::{Mat4, Vec3, rotate_vector, transform_point};

/// Indexed destination for per-vertex values.
pub trait VertexSink<T> {
    /// Number of addressable elements.
    fn len(&self) -> usize;

    /// Whether the sink has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` at `index`. Panics if `index >= len()`.
    fn set(&mut self, index: usize, value: T);
}

impl<T> VertexSink<T> for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn set(&mut self, index: usize, value: T) {
        self[index] = value;
    }
}

impl<T> VertexSink<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn set(&mut self, index: usize, value: T) {
        self[index] = value;
    }
}

/// Write UV set `uv_set` of every vertex, with V flipped to top-left origin.
pub fn build_uv<S>(def: &ModelDef, uv: &mut S, uv_set: usize)
where
    S: VertexSink<[f32; 2]> + ?Sized,
{
    assert!(
        uv_set < def.num_uvs_per_vertex(),
        "UV set {uv_set} requested but the definition has {}",
        def.num_uvs_per_vertex()
    );
    assert!(uv.len() >= def.num_vertices());

    for vertex in 0..def.num_vertices() {
        let coords = def.uv(vertex, uv_set);
        uv.set(vertex, [coords.x, 1.0 - coords.y]);
    }
}

/// Write three indices per face, in face order.
pub fn build_indices<S>(def: &ModelDef, indices: &mut S)
where
    S: VertexSink<u16> + ?Sized,
{
    assert!(indices.len() >= def.num_faces() * 3);

    for (face_index, face) in def.faces().iter().enumerate() {
        for (corner, &vertex) in face.vertices.iter().enumerate() {
            indices.set(face_index * 3 + corner, vertex);
        }
    }
}

/// Write the current position and normal of every vertex of `model`.
///
/// Skinned models are transformed by their animated bones; unskinned models
/// copy the bind pose, leaving the world transform to the vertex shader.
/// Positions are written with `w = 1` and normals with `w = 0`.
pub fn build_position_and_normals<P, N>(model: &Model, positions: &mut P, normals: &mut N)
where
    P: VertexSink<[f32; 4]> + ?Sized,
    N: VertexSink<[f32; 4]> + ?Sized,
{
    let def = model.def();
    let vertices = def.vertices();
    assert!(positions.len() >= vertices.len());
    assert!(normals.len() >= vertices.len());

    match model.bone_matrices() {
        Some(bone_matrices) => {
            skin_points_and_normals(vertices, bone_matrices, positions, normals);
        }
        None => {
            for (index, vertex) in vertices.iter().enumerate() {
                positions.set(index, point4(&vertex.position));
                normals.set(index, vector4(&vertex.normal));
            }
        }
    }
}

/// Skin `vertices` by blending up to four bone matrices per vertex.
///
/// Vertices without bone influences keep their bind pose. Normals are
/// renormalized after blending.
pub fn skin_points_and_normals<P, N>(
    vertices: &[ModelVertex],
    bone_matrices: &[Mat4],
    positions: &mut P,
    normals: &mut N,
) where
    P: VertexSink<[f32; 4]> + ?Sized,
    N: VertexSink<[f32; 4]> + ?Sized,
{
    crate::profile_function!();

    for (index, vertex) in vertices.iter().enumerate() {
        if vertex.blend.is_static() {
            positions.set(index, point4(&vertex.position));
            normals.set(index, vector4(&vertex.normal));
            continue;
        }

        let mut blended = Mat4::zeros();
        for (bone, weight) in vertex.blend.influences() {
            assert!(
                bone < bone_matrices.len(),
                "vertex {index} references bone {bone}, only {} matrices supplied",
                bone_matrices.len()
            );
            blended += bone_matrices[bone] * weight;
        }

        let position = transform_point(&blended, &vertex.position);
        let normal = rotate_vector(&blended, &vertex.normal);
        let normal = normal.try_normalize(f32::EPSILON).unwrap_or(normal);

        positions.set(index, point4(&position));
        normals.set(index, vector4(&normal));
    }
}

#[inline]
fn point4(v: &Vec3) -> [f32; 4] {
    [v.x, v.y, v.z, 1.0]
}

#[inline]
fn vector4(v: &Vec3) -> [f32; 4] {
    [v.x, v.y, v.z, 0.0]
}
