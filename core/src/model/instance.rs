//! Model instances.

use std::any::Any;
use std::sync::Arc;

use bitflags::bitflags;

use super::def::{ModelDef, RenderDataKey};
use crate::math::Mat4;

bitflags! {
    /// What changed on a model since its render data was last updated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u32 {
        /// Vertex positions or normals changed (pose, skinning).
        const VERTICES = 1 << 1;
        /// Player or object color changed.
        const COLOR = 1 << 4;
        /// World transform changed.
        const TRANSFORM = 1 << 5;
    }
}

impl Default for UpdateFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-instance renderer data owned by a [`Model`].
///
/// The data is created by the renderer identified by [`key`](Self::key) and is
/// opaque to the model. Fresh render data starts fully dirty so the first
/// update builds everything.
pub struct ModelRenderData {
    key: RenderDataKey,
    update_flags: UpdateFlags,
    data: Box<dyn Any + Send + Sync>,
}

impl ModelRenderData {
    pub fn new<T: Any + Send + Sync>(key: RenderDataKey, data: T) -> Self {
        Self {
            key,
            update_flags: UpdateFlags::all(),
            data: Box::new(data),
        }
    }

    /// The renderer that created this data.
    pub fn key(&self) -> RenderDataKey {
        self.key
    }

    /// Pending update flags.
    pub fn update_flags(&self) -> UpdateFlags {
        self.update_flags
    }

    /// Return and clear the pending update flags.
    pub fn take_update_flags(&mut self) -> UpdateFlags {
        std::mem::take(&mut self.update_flags)
    }

    pub fn set_dirty(&mut self, flags: UpdateFlags) {
        self.update_flags |= flags;
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut()
    }
}

impl std::fmt::Debug for ModelRenderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRenderData")
            .field("key", &self.key)
            .field("update_flags", &self.update_flags)
            .finish_non_exhaustive()
    }
}

/// One placed, possibly animated occurrence of a [`ModelDef`].
#[derive(Debug)]
pub struct Model {
    def: Arc<ModelDef>,
    transform: Mat4,
    bone_matrices: Option<Vec<Mat4>>,
    render_data: Option<ModelRenderData>,
}

impl Model {
    /// Create an unskinned instance at the origin.
    pub fn new(def: Arc<ModelDef>) -> Self {
        Self {
            def,
            transform: Mat4::identity(),
            bone_matrices: None,
            render_data: None,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.def
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.set_dirty(UpdateFlags::TRANSFORM);
    }

    /// Animated bone matrices, present for skinned models.
    pub fn bone_matrices(&self) -> Option<&[Mat4]> {
        self.bone_matrices.as_deref()
    }

    /// Whether vertex positions come from CPU skinning.
    pub fn is_skinned(&self) -> bool {
        self.bone_matrices.is_some()
    }

    /// Set the animated pose. One matrix per bone of the definition.
    pub fn set_bone_matrices(&mut self, matrices: Vec<Mat4>) {
        assert_eq!(
            matrices.len(),
            self.def.num_bones(),
            "bone matrix count must match the definition's skeleton"
        );
        self.bone_matrices = Some(matrices);
        self.set_dirty(UpdateFlags::VERTICES);
    }

    /// Flag changes for the renderer. Ignored while no render data exists,
    /// since new render data starts fully dirty anyway.
    pub fn set_dirty(&mut self, flags: UpdateFlags) {
        if let Some(render_data) = &mut self.render_data {
            render_data.set_dirty(flags);
        }
    }

    pub fn render_data(&self) -> Option<&ModelRenderData> {
        self.render_data.as_ref()
    }

    pub fn set_render_data(&mut self, render_data: ModelRenderData) {
        self.render_data = Some(render_data);
    }

    /// Detach the render data, e.g. to update it while borrowing the model.
    pub fn take_render_data(&mut self) -> Option<ModelRenderData> {
        self.render_data.take()
    }
}

static_assertions::assert_impl_all!(Model: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generators;

    #[test]
    fn test_new_render_data_is_fully_dirty() {
        let mut data = ModelRenderData::new(RenderDataKey::unique(), 5u32);
        assert_eq!(data.update_flags(), UpdateFlags::all());
        assert_eq!(data.take_update_flags(), UpdateFlags::all());
        assert!(data.update_flags().is_empty());
        assert_eq!(data.downcast_ref::<u32>(), Some(&5));
        assert!(data.downcast_ref::<i64>().is_none());
    }

    #[test]
    fn test_set_dirty_reaches_render_data() {
        let mut model = Model::new(Arc::new(generators::quad(1.0, 1.0)));
        model.set_dirty(UpdateFlags::VERTICES);
        assert!(model.render_data().is_none());

        let mut data = ModelRenderData::new(RenderDataKey::unique(), ());
        data.take_update_flags();
        model.set_render_data(data);

        model.set_transform(Mat4::identity());
        let flags = model.render_data().map(|d| d.update_flags());
        assert_eq!(flags, Some(UpdateFlags::TRANSFORM));
    }

    #[test]
    fn test_bone_matrices_mark_vertices_dirty() {
        let mut model = Model::new(Arc::new(generators::skinned_strip(4)));
        assert!(!model.is_skinned());

        let mut data = ModelRenderData::new(RenderDataKey::unique(), ());
        data.take_update_flags();
        model.set_render_data(data);

        model.set_bone_matrices(vec![Mat4::identity(); 2]);
        assert!(model.is_skinned());
        assert!(
            model
                .render_data()
                .is_some_and(|d| d.update_flags().contains(UpdateFlags::VERTICES))
        );
    }

    #[test]
    #[should_panic(expected = "bone matrix count")]
    fn test_wrong_bone_count_panics() {
        let mut model = Model::new(Arc::new(generators::skinned_strip(4)));
        model.set_bone_matrices(vec![Mat4::identity(); 3]);
    }
}
