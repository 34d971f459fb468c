// app.rs
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::backend::{create_backend, BackendTarget};
use crate::error::RunError;
use crate::renderer::Renderer;
use crate::scene::demo::{build_demo, DEMO_SEED};
use crate::scene::Scene;
use crate::settings::RenderSettings;

pub struct App {
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    scene: Option<Scene>,
    last_frame: Option<std::time::Instant>,
    error: Option<RunError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            window: None,
            renderer: None,
            scene: None,
            last_frame: None,
            error: None,
        }
    }

    /// The fatal error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<RunError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RunError) {
        log::error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RunError> {
        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title("wgpu layout renderer")
            .with_inner_size(PhysicalSize::new(resolution.width, resolution.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let backend = create_backend(
            self.settings.backend,
            BackendTarget::Window(window.clone()),
            &self.settings,
        )?;
        let mut renderer = Renderer::new(backend);
        renderer.set_clear_color(self.settings.clear_color);

        let (width, height) = renderer.viewport_size();
        let mut scene = Scene::new(width, height);
        build_demo(&mut scene, DEMO_SEED);

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.scene = Some(scene);
        self.last_frame = Some(std::time::Instant::now());
        Ok(())
    }

    fn redraw(&mut self) -> Result<(), RunError> {
        let (Some(renderer), Some(scene)) = (self.renderer.as_mut(), self.scene.as_mut()) else {
            return Ok(());
        };
        let now = std::time::Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        renderer.begin_frame();
        scene.update(dt);
        scene.render(renderer);
        renderer.end_frame()?;
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != id {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
                if let Some(scene) = self.scene.as_mut() {
                    scene.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                    return;
                }
                window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            _ => {}
        }
    }
}
