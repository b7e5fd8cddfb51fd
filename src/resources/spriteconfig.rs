//! Sprite cache configuration resource.
//!
//! Texture garbage collection and software cleanup limits are loaded from an
//! INI file. Missing keys keep their defaults.
//!
//! # Configuration File Format
//!
//! ```ini
//! [textures]
//! management = true
//! longevity = 60
//! clean_pulse = 15
//! clean_threshold = 2500
//! eviction = gpu
//!
//! [software]
//! clean_threshold = 1800
//! clean_size = 500
//!
//! [catalog]
//! dir = ./assets
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::{info, warn};
use std::path::PathBuf;

const DEFAULT_TEXTURE_MANAGEMENT: bool = true;
const DEFAULT_TEXTURE_LONGEVITY_SECS: u64 = 60;
const DEFAULT_TEXTURE_CLEAN_PULSE_SECS: u64 = 15;
const DEFAULT_TEXTURE_CLEAN_THRESHOLD: usize = 2500;
const DEFAULT_SOFTWARE_CLEAN_THRESHOLD: usize = 1800;
const DEFAULT_SOFTWARE_CLEAN_SIZE: usize = 500;
const DEFAULT_CATALOG_DIR: &str = "./assets";
const DEFAULT_CONFIG_PATH: &str = "./mapsprites.ini";

/// The cleanup list never shrinks below this many entries.
pub const MIN_CLEANUP_LIST_BOUND: usize = 100;

/// What an idle image gives up during garbage collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Release the GPU texture only; decoded pixels stay cached.
    #[default]
    Gpu,
    /// Release the GPU texture and drop the decoded pixels as well.
    GpuAndPixels,
}

impl EvictionPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gpu" => Some(EvictionPolicy::Gpu),
            "gpu_and_pixels" => Some(EvictionPolicy::GpuAndPixels),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvictionPolicy::Gpu => "gpu",
            EvictionPolicy::GpuAndPixels => "gpu_and_pixels",
        }
    }

    pub fn drops_pixels(self) -> bool {
        self == EvictionPolicy::GpuAndPixels
    }
}

/// Sprite cache configuration.
#[derive(Resource, Debug, Clone)]
pub struct SpriteConfig {
    /// Run texture garbage collection at all.
    pub texture_management: bool,
    /// Seconds an image may stay idle before its texture is released.
    pub texture_longevity: u64,
    /// Minimum seconds between two collection sweeps.
    pub texture_clean_pulse: u64,
    /// Collection only runs with more resident textures than this.
    pub texture_clean_threshold: usize,
    pub eviction: EvictionPolicy,
    /// Requested bound of the cleanup list.
    pub software_clean_threshold: usize,
    /// Entries released from the front of the cleanup list when it overflows.
    pub software_clean_size: usize,
    /// Catalog directory used by the command line tool.
    pub catalog_dir: PathBuf,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            texture_management: DEFAULT_TEXTURE_MANAGEMENT,
            texture_longevity: DEFAULT_TEXTURE_LONGEVITY_SECS,
            texture_clean_pulse: DEFAULT_TEXTURE_CLEAN_PULSE_SECS,
            texture_clean_threshold: DEFAULT_TEXTURE_CLEAN_THRESHOLD,
            eviction: EvictionPolicy::default(),
            software_clean_threshold: DEFAULT_SOFTWARE_CLEAN_THRESHOLD,
            software_clean_size: DEFAULT_SOFTWARE_CLEAN_SIZE,
            catalog_dir: PathBuf::from(DEFAULT_CATALOG_DIR),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a configuration that loads from and saves to `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current values. Returns an error if the
    /// file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [textures] section
        if let Some(management) = config.getbool("textures", "management").ok().flatten() {
            self.texture_management = management;
        }
        if let Some(longevity) = config.getuint("textures", "longevity").ok().flatten() {
            self.texture_longevity = longevity;
        }
        if let Some(pulse) = config.getuint("textures", "clean_pulse").ok().flatten() {
            self.texture_clean_pulse = pulse;
        }
        if let Some(threshold) = config.getuint("textures", "clean_threshold").ok().flatten() {
            self.texture_clean_threshold = threshold as usize;
        }
        if let Some(eviction) = config.get("textures", "eviction") {
            match EvictionPolicy::parse(&eviction) {
                Some(policy) => self.eviction = policy,
                None => warn!("Unknown eviction policy '{}', keeping {}", eviction, self.eviction.as_str()),
            }
        }

        // [software] section
        if let Some(threshold) = config.getuint("software", "clean_threshold").ok().flatten() {
            self.software_clean_threshold = threshold as usize;
        }
        if let Some(size) = config.getuint("software", "clean_size").ok().flatten() {
            self.software_clean_size = size as usize;
        }

        // [catalog] section
        if let Some(dir) = config.get("catalog", "dir") {
            self.catalog_dir = PathBuf::from(dir);
        }

        info!(
            "Loaded config: management={}, longevity={}s, pulse={}s, threshold={}, eviction={}, cleanup bound={}, clean size={}",
            self.texture_management,
            self.texture_longevity,
            self.texture_clean_pulse,
            self.texture_clean_threshold,
            self.eviction.as_str(),
            self.cleanup_list_bound(),
            self.software_clean_size
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        config.set("textures", "management", Some(self.texture_management.to_string()));
        config.set("textures", "longevity", Some(self.texture_longevity.to_string()));
        config.set("textures", "clean_pulse", Some(self.texture_clean_pulse.to_string()));
        config.set(
            "textures",
            "clean_threshold",
            Some(self.texture_clean_threshold.to_string()),
        );
        config.set("textures", "eviction", Some(self.eviction.as_str().to_string()));

        config.set(
            "software",
            "clean_threshold",
            Some(self.software_clean_threshold.to_string()),
        );
        config.set("software", "clean_size", Some(self.software_clean_size.to_string()));

        config.set(
            "catalog",
            "dir",
            Some(self.catalog_dir.to_string_lossy().into_owned()),
        );

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    pub fn longevity_ms(&self) -> u64 {
        self.texture_longevity.saturating_mul(1000)
    }

    pub fn clean_pulse_ms(&self) -> u64 {
        self.texture_clean_pulse.saturating_mul(1000)
    }

    /// Effective bound of the cleanup list.
    pub fn cleanup_list_bound(&self) -> usize {
        self.software_clean_threshold.max(MIN_CLEANUP_LIST_BOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mapsprites_{}_{}.ini", name, std::process::id()))
    }

    #[test]
    fn defaults() {
        let config = SpriteConfig::new();
        assert_eq!(config.longevity_ms(), 60_000);
        assert_eq!(config.clean_pulse_ms(), 15_000);
        assert_eq!(config.cleanup_list_bound(), 1800);
        assert_eq!(config.eviction, EvictionPolicy::Gpu);
    }

    #[test]
    fn cleanup_bound_has_floor() {
        let config = SpriteConfig {
            software_clean_threshold: 10,
            ..SpriteConfig::new()
        };
        assert_eq!(config.cleanup_list_bound(), MIN_CLEANUP_LIST_BOUND);
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut config = SpriteConfig::with_path(&path);
        config.texture_longevity = 5;
        config.eviction = EvictionPolicy::GpuAndPixels;
        config.software_clean_size = 7;
        config.save_to_file().unwrap();

        let mut loaded = SpriteConfig::with_path(&path);
        loaded.load_from_file().unwrap();
        assert_eq!(loaded.texture_longevity, 5);
        assert_eq!(loaded.eviction, EvictionPolicy::GpuAndPixels);
        assert_eq!(loaded.software_clean_size, 7);
        assert_eq!(loaded.texture_clean_threshold, 2500);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = temp_path("partial");
        std::fs::write(&path, "[textures]\nlongevity = 2\neviction = bogus\n").unwrap();
        let mut config = SpriteConfig::with_path(&path);
        config.load_from_file().unwrap();
        assert_eq!(config.texture_longevity, 2);
        assert_eq!(config.eviction, EvictionPolicy::Gpu);
        assert!(config.texture_management);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn huge_durations_saturate() {
        let path = temp_path("huge");
        std::fs::write(
            &path,
            "[textures]\nlongevity = 18446744073709551615\nclean_pulse = 18446744073709551\n",
        )
        .unwrap();
        let mut config = SpriteConfig::with_path(&path);
        config.load_from_file().unwrap();
        assert_eq!(config.texture_longevity, u64::MAX);
        assert_eq!(config.longevity_ms(), u64::MAX);
        assert_eq!(config.clean_pulse_ms(), 18_446_744_073_709_551_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut config = SpriteConfig::with_path("/nonexistent/mapsprites.ini");
        assert!(config.load_from_file().is_err());
    }
}
