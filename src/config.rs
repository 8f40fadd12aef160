// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH: &str = "config.toml";

/// Directory holding the running executable, if it can be determined
pub fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Triangle".to_string(),
            width: 256,
            height: 256,
        }
    }
}

/// What the pre-recorded command buffers draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawVariant {
    /// Clear only, no pipeline or shaders
    Clear,
    /// Clear, then draw the shader-generated triangle
    Triangle,
}

/// How devices, queue families and swapchain parameters are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Take index 0 of everything the driver reports
    First,
    /// Score devices and prefer sRGB formats and the configured present mode
    Preferred,
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub variant: DrawVariant,
    pub selection: SelectionPolicy,
    pub present_mode: String,
    pub max_frames_in_flight: usize,
    /// Clear color of swapchain image 0
    pub first_image_clear: [f32; 4],
    /// Clear color of every other swapchain image
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            variant: DrawVariant::Triangle,
            selection: SelectionPolicy::First,
            present_mode: "fifo".to_string(),
            max_frames_in_flight: 2,
            first_image_clear: [1.0, 0.0, 0.0, 1.0],
            clear_color: [0.0, 0.0, 1.0, 1.0],
        }
    }
}

/// Where the precompiled SPIR-V binaries live
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory, relative to the executable (or the working directory)
    pub directory: String,
    pub vertex: String,
    pub fragment: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: "shaders".to_string(),
            vertex: "shader_vert.spv".to_string(),
            fragment: "shader_frag.spv".to_string(),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub debug_report: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            debug_report: true,
            log_to_file: true,
            log_file: "vkboot.log".to_string(),
            show_fps: false,
        }
    }
}

impl DebugConfig {
    /// Where the log file goes. Relative names are placed next to the
    /// executable so the log does not depend on the working directory.
    pub fn log_path(&self, exe_dir: Option<&Path>) -> PathBuf {
        let path = Path::new(&self.log_file);
        match exe_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Config {
    /// Load config.toml, falling back to defaults. The load error is handed
    /// back because logging is configured from the result.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(CONFIG_PATH) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse configuration text and normalize out-of-range values
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;

        if config.graphics.max_frames_in_flight == 0 {
            log::warn!("max_frames_in_flight must be at least 1, using 1");
            config.graphics.max_frames_in_flight = 1;
        }

        Ok(config)
    }

    /// Get present mode as Vulkan enum
    pub fn get_present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }
}
