//! Model definitions.
//!
//! A [`ModelDef`] is the immutable description of a shape: vertices, UV sets,
//! triangle faces and bone count. It is shared (via `Arc`) by every [`Model`]
//! instance of that shape.
//!
//! Renderers cache backend-specific data on the definition through a slot map
//! keyed by [`RenderDataKey`]. This keeps the definition ignorant of every
//! renderer type while still letting each renderer build its data once per
//! shape. Cached data is dropped together with the definition.
//!
//! [`Model`]: super::Model

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::math::{Vec2, Vec3};

/// Maximum number of bones that can influence one vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Bone index marking an unused influence slot.
pub const NO_BONE: u8 = 0xFF;

/// Identity of a render-data owner.
///
/// Each renderer allocates one key at construction and uses it to find its own
/// entries in [`ModelDef`] and [`Model`](super::Model) render-data slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderDataKey(u64);

impl RenderDataKey {
    /// Allocate a process-unique key.
    pub fn unique() -> Self {
        static NEXT_KEY: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw key value, for logging.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Bone influences of a single vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBlend {
    /// Bone indices, [`NO_BONE`] for unused slots.
    pub bones: [u8; MAX_BONE_INFLUENCES],
    /// Weights of each influence. Used slots should sum to 1.
    pub weights: [f32; MAX_BONE_INFLUENCES],
}

impl VertexBlend {
    /// A vertex not attached to any bone.
    pub const NONE: Self = Self {
        bones: [NO_BONE; MAX_BONE_INFLUENCES],
        weights: [0.0; MAX_BONE_INFLUENCES],
    };

    /// A vertex fully attached to one bone.
    pub fn single(bone: u8) -> Self {
        let mut blend = Self::NONE;
        blend.bones[0] = bone;
        blend.weights[0] = 1.0;
        blend
    }

    /// A vertex split between two bones.
    pub fn pair(a: u8, weight_a: f32, b: u8, weight_b: f32) -> Self {
        let mut blend = Self::NONE;
        blend.bones[0] = a;
        blend.weights[0] = weight_a;
        blend.bones[1] = b;
        blend.weights[1] = weight_b;
        blend
    }

    /// Whether no bone influences this vertex.
    pub fn is_static(&self) -> bool {
        self.bones[0] == NO_BONE
    }

    /// Iterate the used `(bone, weight)` pairs.
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bones
            .iter()
            .zip(self.weights.iter())
            .take_while(|(bone, _)| **bone != NO_BONE)
            .map(|(bone, weight)| (*bone as usize, *weight))
    }
}

impl Default for VertexBlend {
    fn default() -> Self {
        Self::NONE
    }
}

/// A vertex of a model definition, in bind pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub blend: VertexBlend,
}

impl ModelVertex {
    /// Create a vertex that is not attached to any bone.
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            blend: VertexBlend::NONE,
        }
    }

    /// Attach the vertex to bones.
    pub fn with_blend(mut self, blend: VertexBlend) -> Self {
        self.blend = blend;
        self
    }
}

/// A triangle referencing three vertices of its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelFace {
    pub vertices: [u16; 3],
}

impl ModelFace {
    pub fn new(a: u16, b: u16, c: u16) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }
}

/// Immutable shape description shared by all instances of a model.
///
/// # Panics
///
/// Construction panics on malformed input: a UV array whose length is not
/// `vertices * uvs_per_vertex`, a face referencing a missing vertex, more
/// vertices than 16-bit indices can address, or a blend referencing a bone
/// beyond [`num_bones`](Self::num_bones).
pub struct ModelDef {
    name: Option<String>,
    vertices: Vec<ModelVertex>,
    /// UVs stored per vertex: `uv_coordinates[vertex * num_uvs_per_vertex + set]`.
    uv_coordinates: Vec<Vec2>,
    num_uvs_per_vertex: usize,
    faces: Vec<ModelFace>,
    num_bones: usize,
    render_data: RwLock<HashMap<RenderDataKey, Arc<dyn Any + Send + Sync>>>,
}

impl ModelDef {
    /// Create a definition from its vertices, interleaved UV sets and faces.
    pub fn new(
        vertices: Vec<ModelVertex>,
        uv_coordinates: Vec<Vec2>,
        num_uvs_per_vertex: usize,
        faces: Vec<ModelFace>,
    ) -> Self {
        assert!(
            vertices.len() <= u16::MAX as usize + 1,
            "model definition has {} vertices, more than 16-bit indices can address",
            vertices.len()
        );
        assert_eq!(
            uv_coordinates.len(),
            vertices.len() * num_uvs_per_vertex,
            "UV array length must be vertices * uvs_per_vertex"
        );
        if let Some(face) = faces
            .iter()
            .find(|face| face.vertices.iter().any(|&v| v as usize >= vertices.len()))
        {
            panic!(
                "face {:?} references a vertex outside 0..{}",
                face.vertices,
                vertices.len()
            );
        }

        Self {
            name: None,
            vertices,
            uv_coordinates,
            num_uvs_per_vertex,
            faces,
            num_bones: 0,
            render_data: RwLock::new(HashMap::new()),
        }
    }

    /// Declare the skeleton size. Every blended vertex must reference bones below it.
    pub fn with_bones(mut self, num_bones: usize) -> Self {
        for (index, vertex) in self.vertices.iter().enumerate() {
            for (bone, _) in vertex.blend.influences() {
                assert!(
                    bone < num_bones,
                    "vertex {index} references bone {bone} but the skeleton has {num_bones}"
                );
            }
        }
        self.num_bones = num_bones;
        self
    }

    /// Set a debug name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Debug name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_uvs_per_vertex(&self) -> usize {
        self.num_uvs_per_vertex
    }

    pub fn num_bones(&self) -> usize {
        self.num_bones
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[ModelFace] {
        &self.faces
    }

    /// All UV coordinates, `num_uvs_per_vertex` consecutive entries per vertex.
    pub fn uv_coordinates(&self) -> &[Vec2] {
        &self.uv_coordinates
    }

    /// UV coordinate of one vertex in one UV set.
    pub fn uv(&self, vertex: usize, uv_set: usize) -> Vec2 {
        debug_assert!(uv_set < self.num_uvs_per_vertex);
        self.uv_coordinates[vertex * self.num_uvs_per_vertex + uv_set]
    }

    /// Get the render data cached by `key`, if any and if it has type `T`.
    pub fn render_data<T: Any + Send + Sync>(&self, key: RenderDataKey) -> Option<Arc<T>> {
        let data = self.render_data.read().get(&key).cloned()?;
        data.downcast::<T>().ok()
    }

    /// Cache render data for `key`, replacing any previous entry.
    pub fn set_render_data<T: Any + Send + Sync>(&self, key: RenderDataKey, data: Arc<T>) {
        self.render_data.write().insert(key, data);
    }

    /// Drop the render data cached by `key`. Returns whether an entry existed.
    pub fn clear_render_data(&self, key: RenderDataKey) -> bool {
        self.render_data.write().remove(&key).is_some()
    }

    /// Number of renderers that have cached data on this definition.
    pub fn render_data_count(&self) -> usize {
        self.render_data.read().len()
    }
}

impl std::fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("vertices", &self.vertices.len())
            .field("faces", &self.faces.len())
            .field("uvs_per_vertex", &self.num_uvs_per_vertex)
            .field("bones", &self.num_bones)
            .field("render_data", &self.render_data_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(ModelDef: Send, Sync);
