use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::config::ResizeMode;
use crate::scanner::MediaKind;
use crate::{Result, WallgridError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub resize: ResizeMode,
}

pub fn default_state_file() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("wallpaper")
}

/// Applies `request` through the backend matching its media kind, then asks
/// the compositor to reload. The caller records the state file on success.
pub fn apply(request: &ApplyRequest) -> Result<()> {
    if !request.path.exists() {
        return Err(WallgridError::MissingFile(request.path.clone()));
    }

    match request.kind {
        MediaKind::Image => apply_image(&request.path, request.resize)?,
        MediaKind::Video => apply_video(&request.path)?,
    }

    reload_compositor();
    Ok(())
}

/// Runs a user-supplied command (whitespace-split) with the file path
/// appended, instead of the built-in backends.
pub fn apply_with_command(command: &str, path: &Path) -> Result<()> {
    let parts: Vec<&str> = command.split_whitespace().collect();
    if parts.is_empty() {
        return Err(WallgridError::CommandExecution("Empty command".to_owned()));
    }
    if !path.exists() {
        return Err(WallgridError::MissingFile(path.to_path_buf()));
    }

    let output = Command::new(parts[0])
        .args(&parts[1..])
        .arg(path)
        .output()
        .map_err(|e| WallgridError::CommandExecution(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WallgridError::CommandExecution(stderr.into_owned()));
    }
    Ok(())
}

fn apply_image(path: &Path, resize: ResizeMode) -> Result<()> {
    // A running video wallpaper would paint over swww
    let _ = Command::new("pkill")
        .arg("mpvpaper")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    let output = Command::new("swww")
        .arg("img")
        .args(["--filter", "Lanczos3"])
        .args(["--resize", resize.as_str()])
        .args(["--transition-duration", "1"])
        .args(["--transition-type", "center"])
        .arg(path)
        .output()
        .map_err(|e| WallgridError::CommandExecution(format!("swww: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WallgridError::CommandExecution(format!(
            "swww: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Monitor {
    name: String,
    width: u32,
    height: u32,
}

fn apply_video(path: &Path) -> Result<()> {
    let monitors = hyprland_monitors()?;
    if monitors.is_empty() {
        return Err(WallgridError::CommandExecution(
            "hyprctl reported no monitors".to_owned(),
        ));
    }

    // Scale to the smallest output so one file fits every monitor
    let target_width = monitors.iter().map(|m| m.width).min().unwrap_or(1920);
    let target_height = monitors.iter().map(|m| m.height).min().unwrap_or(1080);

    let (video_width, _) = video_dimensions(path)?;
    let playable = if video_width > target_width {
        rescale_video(path, target_width, target_height)?
    } else {
        path.to_path_buf()
    };

    for monitor in &monitors {
        // mpvpaper keeps running as the wallpaper; -s stops older instances
        Command::new("mpvpaper")
            .arg("-s")
            .args(["-o", "no-audio loop"])
            .arg(&monitor.name)
            .arg(&playable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| WallgridError::CommandExecution(format!("mpvpaper: {}", e)))?;
    }
    Ok(())
}

fn hyprland_monitors() -> Result<Vec<Monitor>> {
    let output = Command::new("hyprctl")
        .args(["monitors", "-j"])
        .output()
        .map_err(|e| WallgridError::CommandExecution(format!("hyprctl: {}", e)))?;

    if !output.status.success() {
        return Err(WallgridError::CommandExecution(
            "hyprctl monitors failed".to_owned(),
        ));
    }
    serde_json::from_slice(&output.stdout)
        .map_err(|e| WallgridError::CommandExecution(format!("hyprctl monitors: {}", e)))
}

fn video_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| WallgridError::CommandExecution(format!("ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(WallgridError::CommandExecution("ffprobe failed".to_owned()));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_dimensions(text.trim()).ok_or_else(|| {
        WallgridError::CommandExecution(format!("ffprobe: unexpected output {:?}", text.trim()))
    })
}

pub fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let (width, height) = text.split_once('x')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

fn rescale_video(path: &Path, width: u32, height: u32) -> Result<PathBuf> {
    let user = std::env::var("USER").unwrap_or_else(|_| "wallgrid".to_owned());
    let scaled = std::env::temp_dir().join(format!("{}-scaled.mp4", user));
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height
    );

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(path)
        .args(["-vf", &filter])
        .arg(&scaled)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| WallgridError::CommandExecution(format!("ffmpeg: {}", e)))?;

    if !status.success() {
        return Err(WallgridError::CommandExecution(format!(
            "ffmpeg exited with {}",
            status
        )));
    }
    Ok(scaled)
}

fn reload_compositor() {
    match Command::new("hyprctl")
        .arg("reload")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {}
        _ => log::debug!("hyprctl reload was not applied"),
    }
}

pub fn save_current(state_file: &Path, wallpaper: &Path) -> Result<()> {
    if let Some(parent) = state_file.parent() {
        fs::create_dir_all(parent).map_err(WallgridError::SaveState)?;
    }
    fs::write(state_file, wallpaper.to_string_lossy().as_bytes())
        .map_err(WallgridError::SaveState)?;
    Ok(())
}

pub fn restore(state_file: &Path) -> Option<PathBuf> {
    let raw = fs::read_to_string(state_file).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}
