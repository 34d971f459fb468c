// headless.rs
// Windowless frame loop on the software rasterizer

use log::info;

use crate::backend::SoftwareBackend;
use crate::error::RunError;
use crate::renderer::{FrameStats, Renderer};
use crate::scene::demo::{build_demo, DEMO_SEED};
use crate::scene::Scene;
use crate::settings::RenderSettings;

const FIXED_DT: f64 = 1.0 / 60.0;

/// Renders `settings.headless.frames` frames of the demo at a fixed time
/// step and writes the last one to `settings.headless.output`.
pub fn run_headless(settings: &RenderSettings) -> Result<FrameStats, RunError> {
    let (width, height) = (settings.resolution.width, settings.resolution.height);
    info!(
        "Headless run: {} frames at {}x{}",
        settings.headless.frames, width, height
    );

    let mut scene = Scene::new(width, height);
    build_demo(&mut scene, DEMO_SEED);

    let mut renderer = Renderer::new(SoftwareBackend::new(width, height));
    renderer.set_clear_color(settings.clear_color);

    let mut stats = FrameStats::default();
    for _ in 0..settings.headless.frames {
        renderer.begin_frame();
        scene.update(FIXED_DT);
        scene.render(&mut renderer);
        stats = renderer.end_frame()?;
    }

    renderer.backend().save_png(&settings.headless.output)?;
    info!("Last frame: {:?}", stats);
    Ok(stats)
}
