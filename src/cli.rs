use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream a camera to a pose-inference service and draw the returned skeleton")]
pub struct Cli {
    /// TOML config file; defaults are used when it does not exist.
    #[arg(long, default_value = "posture_stream.toml")]
    pub config: PathBuf,

    /// Replay a directory of JPEG/PNG frames instead of opening a camera.
    #[arg(long)]
    pub clip: Option<PathBuf>,

    /// Inference model variant (key of `[stream.models]`).
    #[arg(long)]
    pub model: Option<String>,

    /// Write the composited overlay to this image file.
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// Display box size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    pub display: Option<(u32, u32)>,

    /// Initial camera index.
    #[arg(long)]
    pub camera: Option<usize>,

    /// Turn the camera on and start live analysis immediately.
    #[arg(long)]
    pub autostart: bool,
}

impl Cli {
    /// Command-line flags take precedence over the file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.stream.model_name = model.clone();
        }
        if let Some(preview) = &self.preview {
            config.display.preview_path = Some(preview.display().to_string());
        }
        if let Some((width, height)) = self.display {
            config.display.width = width;
            config.display.height = height;
        }
        if let Some(index) = self.camera {
            config.camera.index = index;
        }
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("bad width `{w}`"))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("bad height `{h}`"))?;
    if width == 0 || height == 0 {
        return Err("display size must be non-zero".to_string());
    }
    Ok((width, height))
}
