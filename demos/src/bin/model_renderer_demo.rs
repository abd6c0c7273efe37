//! # Model Renderer Demo
//!
//! Renders static grids and animated two-bone strips through the shader model
//! vertex renderer for a fixed number of frames, then logs the render stats.
//!
//! ```bash
//! cargo run -p kiln-demos --bin model_renderer_demo -- --frames 120 --strips 32
//! ```

use std::sync::Arc;

use clap::Parser;
use kiln_core::math::{
    Mat4, Vec3, mat4_from_scale_rotation_translation, mat4_from_translation, quat_from_rotation_z,
};
use kiln_core::model::{Model, generators};
use kiln_graphics::{
    DeviceParameters, GraphicsDevice, GraphicsError, ModelRenderer, RenderStats,
    ShaderModelVertexRenderer, ShaderProgram, VertexAttributeStream,
};

/// Kiln model renderer demo arguments.
#[derive(Parser, Debug)]
#[command(name = "model_renderer_demo", about = "Kiln model renderer demo", version)]
struct Args {
    /// Number of frames to render.
    #[arg(long, default_value = "60")]
    frames: u32,

    /// Number of static grid instances.
    #[arg(long, default_value = "16")]
    grids: usize,

    /// Grid resolution in cells per side. Capped so the grid stays
    /// addressable with 16-bit indices.
    #[arg(long, default_value = "32", value_parser = clap::value_parser!(u16).range(1..=255))]
    grid_size: u16,

    /// Number of animated strip instances.
    #[arg(long, default_value = "8")]
    strips: usize,

    /// Use two UV sets on the quad instances.
    #[arg(long)]
    lightmapped: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    kiln_graphics::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GraphicsError> {
    let device = GraphicsDevice::new(DeviceParameters::new().with_label("demo device"))?;
    let mut ctx = device.create_command_context();
    let mut renderer = ModelRenderer::new(ShaderModelVertexRenderer::new(Arc::clone(&device)));
    let shader = ShaderProgram::new().with_label("model").with_inputs([
        VertexAttributeStream::Position,
        VertexAttributeStream::Normal,
        VertexAttributeStream::Uv0,
    ]);

    let mut models = build_scene(args);
    log::info!(
        "Rendering {} models on {} for {} frames",
        models.len(),
        device.backend_name(),
        args.frames
    );

    let mut totals = RenderStats::default();
    for frame in 0..args.frames {
        animate(&mut models, frame);

        ctx.begin_frame();
        renderer.draw_models(&mut ctx, &shader, &mut models)?;
        accumulate(&mut totals, ctx.stats());
        if frame == 0 {
            log::info!("First frame: {:?}", ctx.stats());
        }
        ctx.submit()?;
        kiln_core::frame_mark!();
    }

    log::info!("Totals: {:?}", totals);
    log::info!(
        "Definitions built: {}, vertex input layouts: {}, live buffers: {}",
        renderer.renderer().defs_built(),
        device.vertex_input_layouts(),
        device.buffer_count()
    );
    Ok(())
}

fn build_scene(args: &Args) -> Vec<Model> {
    let grid = Arc::new(generators::grid(args.grid_size, args.grid_size));
    let strip = Arc::new(generators::skinned_strip(16));
    let quad = Arc::new(if args.lightmapped {
        generators::quad_with_uv_sets(0.5, 0.5, 2)
    } else {
        generators::quad(0.5, 0.5)
    });

    let mut models = Vec::with_capacity(args.grids + args.strips + 1);
    for index in 0..args.grids {
        let offset = Vec3::new(index as f32 * (args.grid_size as f32 + 1.0), 0.0, 0.0);
        models.push(Model::new(Arc::clone(&grid)).with_transform(mat4_from_translation(offset)));
    }
    for _ in 0..args.strips {
        let mut model = Model::new(Arc::clone(&strip));
        model.set_bone_matrices(vec![Mat4::identity(); strip.num_bones()]);
        models.push(model);
    }
    models.push(Model::new(quad));
    models
}

/// Swing bone 1 of every skinned model around Z.
fn animate(models: &mut [Model], frame: u32) {
    let angle = (frame as f32 * 0.05).sin() * 0.5;
    let swing = mat4_from_scale_rotation_translation(
        Vec3::repeat(1.0),
        quat_from_rotation_z(angle),
        Vec3::zeros(),
    );

    for model in models.iter_mut().filter(|model| model.is_skinned()) {
        model.set_bone_matrices(vec![Mat4::identity(), swing]);
    }
}

fn accumulate(totals: &mut RenderStats, frame: &RenderStats) {
    totals.draw_calls += frame.draw_calls;
    totals.model_tris += frame.model_tris;
    totals.buffer_uploads += frame.buffer_uploads;
    totals.uploaded_bytes += frame.uploaded_bytes;
}
