//! Viewer configuration.
//!
//! Every field has a default, so a TOML file only needs to list what it
//! changes. Distances are in world units where one meter is `world_scale`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub world_scale: f32,
    pub dome_scale: f32,

    pub eye: [f32; 3],
    pub lookat: [f32; 3],
    pub fov_deg: f32,
    pub znear: f32,
    pub zfar: f32,

    pub light_intensity: f32,
    /// Defaults to just above the dome apex.
    pub light_position: Option<[f32; 3]>,
    pub light_step: f32,
    pub shadow_fov_deg: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub shadow_resolution: u32,

    pub playback_speed: f32,
    /// Defaults to a tenth of `world_scale`.
    pub move_dist: Option<f32>,
    pub move_angle_deg: f32,

    pub assets_dir: PathBuf,
    pub vegetation_seed: u64,
    pub vegetation_per_kind: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 1024,
            window_height: 768,
            world_scale: 10.0,
            dome_scale: 15.0,
            eye: [0.0, 20.0, 0.0],
            lookat: [100.0, 0.0, 0.0],
            fov_deg: 45.0,
            znear: 10.0,
            zfar: 3000.0,
            light_intensity: 1e6,
            light_position: None,
            light_step: 5.0,
            shadow_fov_deg: 120.0,
            shadow_near: 10.0,
            shadow_far: 3000.0,
            shadow_resolution: 2048,
            playback_speed: 2.0,
            move_dist: None,
            move_angle_deg: 3.0,
            assets_dir: PathBuf::from("assets"),
            vegetation_seed: 42,
            vegetation_per_kind: 40,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Config from the file named by the first CLI argument, or the defaults.
    pub fn from_args() -> anyhow::Result<Self> {
        match std::env::args().nth(1) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn light_position(&self) -> [f32; 3] {
        self.light_position
            .unwrap_or([0.0, 1.1 * self.world_scale * self.dome_scale, 0.0])
    }

    pub fn move_dist(&self) -> f32 {
        self.move_dist.unwrap_or(0.1 * self.world_scale)
    }

    /// Radius of the dome in world units.
    pub fn dome_radius(&self) -> f32 {
        self.world_scale * self.dome_scale
    }

    /// Half size of the skybox.
    pub fn skybox_size(&self) -> f32 {
        100.0 * self.world_scale
    }

    pub fn asset(&self, relative: &str) -> PathBuf {
        self.assets_dir.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_scene_constants() {
        let config = ViewerConfig::default();
        assert_eq!((config.window_width, config.window_height), (1024, 768));
        assert_eq!(config.light_position(), [0.0, 165.0, 0.0]);
        assert_eq!(config.move_dist(), 1.0);
        assert_eq!(config.dome_radius(), 150.0);
        assert_eq!(config.skybox_size(), 1000.0);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ViewerConfig::from_toml(
            r#"
            world_scale = 20.0
            playback_speed = 0.5
            assets_dir = "/srv/models"
            "#,
        )
        .unwrap();
        assert_eq!(config.world_scale, 20.0);
        assert_eq!(config.playback_speed, 0.5);
        assert_eq!(config.move_dist(), 2.0);
        assert_eq!(config.asset("bot/bot.gltf"), PathBuf::from("/srv/models/bot/bot.gltf"));
        assert_eq!(config.fov_deg, 45.0);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(ViewerConfig::from_toml("window_width = \"wide\"").is_err());
    }
}
