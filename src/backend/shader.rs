// Shader binary location and loading
//
// Vulkan consumes SPIR-V words. The binaries are compiled ahead of time
// (see build.rs) and read from disk next to the executable.

use crate::config::ShaderConfig;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Resolved paths of the vertex and fragment binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPaths {
    /// Resolve against the executable's directory, falling back to the
    /// working directory when the binaries are not found there
    pub fn locate(config: &ShaderConfig) -> Self {
        Self::locate_in(config, crate::config::executable_dir().as_deref())
    }

    pub fn locate_in(config: &ShaderConfig, exe_dir: Option<&Path>) -> Self {
        let resolve = |name: &str| {
            let relative = Path::new(&config.directory).join(name);
            match exe_dir {
                Some(dir) if dir.join(&relative).exists() => dir.join(&relative),
                _ => relative,
            }
        };

        Self {
            vertex: resolve(&config.vertex),
            fragment: resolve(&config.fragment),
        }
    }
}

/// Read a SPIR-V binary into 32-bit words
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open shader binary {:?}", path))?;
    let code = ash::util::read_spv(&mut file)
        .with_context(|| format!("Failed to read SPIR-V from {:?}", path))?;
    log::info!("Loaded shader {:?} ({} words)", path, code.len());
    Ok(code)
}
