use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::renderer::Color;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: Color,
    #[serde(default)]
    pub headless: HeadlessSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            clear_color: Self::default_clear_color(),
            headless: HeadlessSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.headless.frames == 0 {
            warn!("Headless frame count must be greater than zero. Rendering one frame.");
            self.headless.frames = 1;
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_clear_color() -> Color {
        Color::rgb(24, 26, 32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Options for the windowless software run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessSettings {
    #[serde(default = "HeadlessSettings::default_frames")]
    pub frames: u32,
    #[serde(default = "HeadlessSettings::default_output")]
    pub output: PathBuf,
}

impl HeadlessSettings {
    const fn default_frames() -> u32 {
        60
    }

    fn default_output() -> PathBuf {
        PathBuf::from("frame.png")
    }
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            frames: Self::default_frames(),
            output: Self::default_output(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}
