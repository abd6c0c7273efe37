//! Frame driver for model vertex renderers.

use std::sync::Arc;

use kiln_core::model::{Model, ModelDef, ModelRenderData, RenderDataKey, UpdateFlags};

use super::{ModelVertexRenderer, ShaderProgram};
use crate::command::DeviceCommandContext;
use crate::error::GraphicsError;

/// Runs a [`ModelVertexRenderer`] over the models of a frame.
///
/// Per-instance data lives in each model's render-data slot under the
/// driver's own key. Models whose slot is empty or holds another renderer's
/// data get fresh, fully dirty data on the next [`prepare_models`].
///
/// # Lifecycle
///
/// ```ignore
/// let mut models_renderer = ModelRenderer::new(ShaderModelVertexRenderer::new(device));
///
/// // Each frame:
/// ctx.begin_frame();
/// models_renderer.prepare_models(&mut models)?;
/// models_renderer.upload_models(&mut ctx, &models)?;
/// models_renderer.render_models(&mut ctx, &shader, &models);
/// ctx.submit()?;
/// ```
///
/// [`prepare_models`]: Self::prepare_models
#[derive(Debug)]
pub struct ModelRenderer<R> {
    renderer: R,
    key: RenderDataKey,
}

impl<R: ModelVertexRenderer> ModelRenderer<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            key: RenderDataKey::unique(),
        }
    }

    /// Key of the per-instance data this driver stores on models.
    pub fn key(&self) -> RenderDataKey {
        self.key
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Create missing per-instance data and apply pending updates.
    ///
    /// # Errors
    ///
    /// Returns the first device error. Models already processed keep their
    /// updates; the failing model keeps its pending flags.
    pub fn prepare_models(&mut self, models: &mut [Model]) -> Result<(), GraphicsError> {
        kiln_core::profile_function!();

        for model in models.iter_mut() {
            let mut render_data = match model.take_render_data() {
                Some(render_data) if render_data.key() == self.key => render_data,
                _ => {
                    let data = self.renderer.create_model_data(self.key, model)?;
                    ModelRenderData::new(self.key, data)
                }
            };

            let flags = render_data.take_update_flags();
            let Some(data) = render_data.downcast_mut::<R::ModelData>() else {
                panic!("render data under the driver key has an unexpected type");
            };
            let result = self.renderer.update_model_data(model, data, flags);
            if result.is_err() {
                render_data.set_dirty(flags);
            }
            model.set_render_data(render_data);
            result?;
        }
        Ok(())
    }

    /// Transfer pending data of every model.
    ///
    /// # Errors
    ///
    /// Returns the first transfer error.
    pub fn upload_models(
        &mut self,
        ctx: &mut DeviceCommandContext,
        models: &[Model],
    ) -> Result<(), GraphicsError> {
        kiln_core::profile_function!();

        for model in models {
            let data = self.model_data(model);
            self.renderer.upload_model_data(ctx, model, data)?;
        }
        Ok(())
    }

    /// Draw every model, preparing each distinct definition once.
    ///
    /// Models are grouped by definition in order of first appearance.
    pub fn render_models(
        &mut self,
        ctx: &mut DeviceCommandContext,
        shader: &ShaderProgram,
        models: &[Model],
    ) {
        kiln_core::profile_function!();

        for (def, group) in group_by_def(models) {
            self.renderer.prepare_model_def(ctx, &def);
            for model in group {
                let data = self.model_data(model);
                self.renderer.render_model(ctx, shader, model, data);
            }
        }
    }

    /// Run prepare, upload and render for one frame.
    ///
    /// # Errors
    ///
    /// Returns the first device error of the prepare or upload step.
    pub fn draw_models(
        &mut self,
        ctx: &mut DeviceCommandContext,
        shader: &ShaderProgram,
        models: &mut [Model],
    ) -> Result<(), GraphicsError> {
        self.prepare_models(models)?;
        self.upload_models(ctx, models)?;
        self.render_models(ctx, shader, models);
        Ok(())
    }

    /// Per-instance data of `model`, if prepared by this driver.
    pub fn try_model_data<'a>(&self, model: &'a Model) -> Option<&'a R::ModelData> {
        model
            .render_data()
            .filter(|render_data| render_data.key() == self.key)
            .and_then(ModelRenderData::downcast_ref::<R::ModelData>)
    }

    fn model_data<'a>(&self, model: &'a Model) -> &'a R::ModelData {
        let Some(data) = self.try_model_data(model) else {
            panic!(
                "model {:?} has no render data; call prepare_models first",
                model.def().name()
            );
        };
        data
    }
}

fn group_by_def(models: &[Model]) -> Vec<(Arc<ModelDef>, Vec<&Model>)> {
    let mut groups: Vec<(Arc<ModelDef>, Vec<&Model>)> = Vec::new();
    for model in models {
        match groups.iter_mut().find(|(def, _)| Arc::ptr_eq(def, model.def())) {
            Some((_, group)) => group.push(model),
            None => groups.push((Arc::clone(model.def()), vec![model])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use kiln_core::model::generators;

    use super::*;

    /// Records the operations it receives.
    #[derive(Default)]
    struct RecordingRenderer {
        log: Vec<String>,
        created: usize,
    }

    impl ModelVertexRenderer for RecordingRenderer {
        type ModelData = usize;

        fn key(&self) -> RenderDataKey {
            RenderDataKey::unique()
        }

        fn create_model_data(
            &mut self,
            _key: RenderDataKey,
            _model: &Model,
        ) -> Result<usize, GraphicsError> {
            self.created += 1;
            self.log.push(format!("create {}", self.created));
            Ok(self.created)
        }

        fn update_model_data(
            &mut self,
            _model: &Model,
            data: &mut usize,
            flags: UpdateFlags,
        ) -> Result<(), GraphicsError> {
            self.log.push(format!("update {} {:?}", data, flags.bits()));
            Ok(())
        }

        fn upload_model_data(
            &mut self,
            _ctx: &mut DeviceCommandContext,
            _model: &Model,
            data: &usize,
        ) -> Result<(), GraphicsError> {
            self.log.push(format!("upload {data}"));
            Ok(())
        }

        fn prepare_model_def(&mut self, _ctx: &mut DeviceCommandContext, def: &ModelDef) {
            self.log
                .push(format!("prepare {}", def.name().unwrap_or_default()));
        }

        fn render_model(
            &mut self,
            _ctx: &mut DeviceCommandContext,
            _shader: &ShaderProgram,
            _model: &Model,
            data: &usize,
        ) {
            self.log.push(format!("render {data}"));
        }
    }

    fn context() -> DeviceCommandContext {
        crate::GraphicsDevice::new(crate::DeviceParameters::new())
            .unwrap()
            .create_command_context()
    }

    #[test]
    fn test_prepare_creates_once_and_clears_flags() {
        let mut driver = ModelRenderer::new(RecordingRenderer::default());
        let mut models = vec![Model::new(Arc::new(generators::quad(1.0, 1.0)))];

        driver.prepare_models(&mut models).unwrap();
        driver.prepare_models(&mut models).unwrap();

        let all = UpdateFlags::all().bits();
        assert_eq!(
            driver.renderer().log,
            vec![
                "create 1".to_string(),
                format!("update 1 {all}"),
                "update 1 0".to_string(),
            ]
        );
        assert_eq!(driver.try_model_data(&models[0]), Some(&1));
    }

    #[test]
    fn test_foreign_render_data_is_replaced() {
        let mut driver = ModelRenderer::new(RecordingRenderer::default());
        let mut model = Model::new(Arc::new(generators::quad(1.0, 1.0)));
        model.set_render_data(ModelRenderData::new(RenderDataKey::unique(), 99usize));

        driver
            .prepare_models(std::slice::from_mut(&mut model))
            .unwrap();

        assert_eq!(driver.renderer().created, 1);
        assert_eq!(driver.try_model_data(&model), Some(&1));
    }

    #[test]
    fn test_render_groups_by_definition() {
        let mut driver = ModelRenderer::new(RecordingRenderer::default());
        let mut ctx = context();
        let quad = Arc::new(generators::quad(1.0, 1.0));
        let grid = Arc::new(generators::grid(1, 1));
        let mut models = vec![
            Model::new(Arc::clone(&quad)),
            Model::new(Arc::clone(&grid)),
            Model::new(Arc::clone(&quad)),
        ];

        driver
            .draw_models(&mut ctx, &ShaderProgram::new(), &mut models)
            .unwrap();

        let log = &driver.renderer().log;
        let rendering: Vec<&str> = log
            .iter()
            .skip_while(|entry| !entry.starts_with("prepare"))
            .map(String::as_str)
            .collect();
        assert_eq!(
            rendering,
            vec!["prepare quad", "render 1", "render 3", "prepare grid", "render 2"]
        );
        assert_eq!(log.iter().filter(|e| e.starts_with("upload")).count(), 3);
    }

    #[test]
    #[should_panic(expected = "call prepare_models first")]
    fn test_upload_without_prepare_panics() {
        let mut driver = ModelRenderer::new(RecordingRenderer::default());
        let mut ctx = context();
        let models = vec![Model::new(Arc::new(generators::quad(1.0, 1.0)))];

        driver.upload_models(&mut ctx, &models).unwrap();
    }
}
