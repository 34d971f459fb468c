pub mod app;
pub mod asset;
pub mod backend;
pub mod error;
pub mod headless;
pub mod layout;
pub mod renderer;
pub mod scene;
pub mod settings;

use app::App;
use backend::BackendKind;
use error::RunError;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Loads `settings.json` and runs the demo on the configured backend: the
/// software backend renders headless to a PNG, wgpu opens a window.
pub fn run() -> Result<(), RunError> {
    init_logging();
    let settings = RenderSettings::load();

    match settings.backend {
        BackendKind::Software => {
            log::info!("Starting layered renderer (software, headless)");
            headless::run_headless(&settings)?;
        }
        BackendKind::Wgpu => {
            log::info!("Starting layered renderer (wgpu)");
            let event_loop = EventLoop::new()?;
            let mut app = App::new(settings);
            event_loop.run_app(&mut app)?;
            if let Some(err) = app.take_error() {
                return Err(err);
            }
        }
    }

    log::info!("Application shutdown complete");
    Ok(())
}
