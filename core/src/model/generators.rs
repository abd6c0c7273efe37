//! Model definition generators for common shapes.
//!
//! Used by demos, tests and benchmarks that need model data without an asset
//! pipeline.

use super::def::{ModelDef, ModelFace, ModelVertex, VertexBlend};
use crate::math::{Vec2, Vec3};

/// Generate a quad in the XY plane facing +Z with one UV set.
///
/// 4 vertices, 2 faces.
pub fn quad(half_width: f32, half_height: f32) -> ModelDef {
    quad_with_uv_sets(half_width, half_height, 1)
}

/// Generate a quad with `uv_sets` UV sets.
///
/// Set 0 covers the unit square; every further set is a shrunken copy, like a
/// lightmap atlas region.
pub fn quad_with_uv_sets(half_width: f32, half_height: f32, uv_sets: usize) -> ModelDef {
    let corners = [
        (Vec3::new(-half_width, -half_height, 0.0), Vec2::new(0.0, 1.0)),
        (Vec3::new(half_width, -half_height, 0.0), Vec2::new(1.0, 1.0)),
        (Vec3::new(half_width, half_height, 0.0), Vec2::new(1.0, 0.0)),
        (Vec3::new(-half_width, half_height, 0.0), Vec2::new(0.0, 0.0)),
    ];

    let vertices = corners
        .iter()
        .map(|(position, _)| ModelVertex::new(*position, Vec3::z()))
        .collect();

    let mut uvs = Vec::with_capacity(corners.len() * uv_sets);
    for (_, uv) in &corners {
        for set in 0..uv_sets {
            let scale = 1.0 / (set + 1) as f32;
            uvs.push(uv * scale + Vec2::repeat(0.25 * set as f32 * scale));
        }
    }

    let faces = vec![ModelFace::new(0, 1, 2), ModelFace::new(2, 3, 0)];

    ModelDef::new(vertices, uvs, uv_sets, faces).with_name("quad")
}

/// Generate a flat grid of `columns x rows` cells in the XY plane.
///
/// `(columns + 1) * (rows + 1)` vertices, `columns * rows * 2` faces.
pub fn grid(columns: u16, rows: u16) -> ModelDef {
    let (vertices, uvs) = grid_vertices(columns, rows, |_, _| VertexBlend::NONE);
    let faces = grid_faces(columns, rows);
    ModelDef::new(vertices, uvs, 1, faces).with_name("grid")
}

/// Generate a two-bone strip along +X, two vertices tall.
///
/// Weights move linearly from bone 0 at `x = 0` to bone 1 at `x = segments`.
pub fn skinned_strip(segments: u16) -> ModelDef {
    let (vertices, uvs) = grid_vertices(segments, 1, |column, _| {
        let t = column as f32 / segments.max(1) as f32;
        VertexBlend::pair(0, 1.0 - t, 1, t)
    });
    let faces = grid_faces(segments, 1);
    ModelDef::new(vertices, uvs, 1, faces)
        .with_bones(2)
        .with_name("skinned_strip")
}

fn grid_vertices(
    columns: u16,
    rows: u16,
    blend: impl Fn(u16, u16) -> VertexBlend,
) -> (Vec<ModelVertex>, Vec<Vec2>) {
    let count = (columns as usize + 1) * (rows as usize + 1);
    let mut vertices = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);

    for row in 0..=rows {
        for column in 0..=columns {
            vertices.push(
                ModelVertex::new(Vec3::new(column as f32, row as f32, 0.0), Vec3::z())
                    .with_blend(blend(column, row)),
            );
            uvs.push(Vec2::new(
                column as f32 / columns.max(1) as f32,
                row as f32 / rows.max(1) as f32,
            ));
        }
    }

    (vertices, uvs)
}

fn grid_faces(columns: u16, rows: u16) -> Vec<ModelFace> {
    let stride = columns + 1;
    let mut faces = Vec::with_capacity(columns as usize * rows as usize * 2);

    for row in 0..rows {
        for column in 0..columns {
            let current = row * stride + column;
            let above = current + stride;
            faces.push(ModelFace::new(current, current + 1, above));
            faces.push(ModelFace::new(current + 1, above + 1, above));
        }
    }

    faces
}
