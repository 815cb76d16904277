//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Largest beta ceiling accepted. Keeps gamma finite in f32 arithmetic.
const MAX_BETA_CEILING: f32 = 0.999_999;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Output surface settings.
    pub window: WindowConfig,
    /// Velocity limits, activation threshold, and view mode curves.
    pub relativity: RelativityConfig,
    /// Background star catalog settings.
    pub starfield: StarfieldConfig,
    /// Camera and warp stage settings.
    pub render: RenderConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Output surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Title used by hosts that open a window.
    pub title: String,
}

/// Display mode selected at startup.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
pub enum DisplayMode {
    /// Physically derived distortion.
    #[default]
    Raw,
    /// Damped "navigation display" distortion.
    Compensated,
}

/// Tuning for the compensated (navigation) view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompensationConfig {
    /// Asymptotic limit of the damped speed fraction. Range (0, 1).
    pub beta_limit: f32,
    /// Exponent applied to the Doppler factor for brightness (raw physics uses 3).
    pub beaming_exponent: f32,
    /// Fraction of the Doppler tint applied. Range [0, 1].
    pub tint_strength: f32,
}

/// Relativistic transform limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelativityConfig {
    /// Speeds at or above this fraction of c are clamped to it.
    pub beta_ceiling: f32,
    /// The warp pass only runs when the effective beta exceeds this value.
    pub activation_threshold: f32,
    /// Lower clamp on the beaming multiplier.
    pub min_intensity: f32,
    /// Upper clamp on the beaming multiplier.
    pub max_intensity: f32,
    /// View mode active on the first frame.
    pub start_mode: DisplayMode,
    /// Compensated view tuning.
    pub compensation: CompensationConfig,
}

/// How the background starfield is transformed.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
pub enum StarfieldStrategy {
    /// Baked cubemap, aberrated in bulk by the warp pass.
    #[default]
    Skybox,
    /// Finite list of bright stars, each transformed analytically on the CPU.
    DiscreteStars,
}

/// Starfield catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarfieldConfig {
    /// Catalog seed. Same seed, same sky.
    pub seed: u64,
    /// Stars baked into the skybox cubemap.
    pub star_count: u32,
    /// Brightest stars kept for the discrete strategy.
    pub bright_star_count: u32,
    /// Edge length of each cubemap face in pixels.
    pub cubemap_face_size: u32,
    /// Background transform strategy.
    pub strategy: StarfieldStrategy,
}

/// Camera and warp stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Try the wgpu warp stage first; fall back to the CPU stage otherwise.
    pub gpu_warp: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Draw the HUD overlay.
    pub show_hud: bool,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Redshift".to_string(),
        }
    }
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            beta_limit: 0.6,
            beaming_exponent: 1.5,
            tint_strength: 0.5,
        }
    }
}

impl Default for RelativityConfig {
    fn default() -> Self {
        Self {
            beta_ceiling: 0.999,
            activation_threshold: 0.01,
            min_intensity: 1.0e-5,
            max_intensity: 1.0e5,
            start_mode: DisplayMode::Raw,
            compensation: CompensationConfig::default(),
        }
    }
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            star_count: 6000,
            bright_star_count: 250,
            cubemap_face_size: 256,
            strategy: StarfieldStrategy::Skybox,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 70.0,
            gpu_warp: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_hud: true,
        }
    }
}

/// Per-user config directory (`<platform config dir>/redshift`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("redshift"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::Parse)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config.validated())
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::Write)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::Write)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
        let new_config = ron::from_str::<Config>(&contents)
            .map_err(ConfigError::Parse)?
            .validated();

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Clamp values that would break the transform math into their legal ranges.
    ///
    /// The ceiling stays strictly below 1 so gamma is always finite, the intensity
    /// clamp is ordered and positive, and the compensation limit stays inside (0, 1).
    pub fn validated(mut self) -> Self {
        let rel = &mut self.relativity;
        if !rel.beta_ceiling.is_finite() || !(0.0..=MAX_BETA_CEILING).contains(&rel.beta_ceiling)
        {
            log::warn!(
                "beta_ceiling {} out of range, clamping into [0, {MAX_BETA_CEILING}]",
                rel.beta_ceiling
            );
            rel.beta_ceiling = if rel.beta_ceiling.is_finite() {
                rel.beta_ceiling.clamp(0.0, MAX_BETA_CEILING)
            } else {
                RelativityConfig::default().beta_ceiling
            };
        }
        if !rel.activation_threshold.is_finite() || rel.activation_threshold < 0.0 {
            rel.activation_threshold = 0.0;
        }
        if !(rel.min_intensity.is_finite() && rel.min_intensity > 0.0) {
            rel.min_intensity = RelativityConfig::default().min_intensity;
        }
        if !(rel.max_intensity.is_finite() && rel.max_intensity >= rel.min_intensity) {
            rel.max_intensity = rel.min_intensity.max(RelativityConfig::default().max_intensity);
        }

        let comp = &mut rel.compensation;
        if !(comp.beta_limit > 0.0 && comp.beta_limit < 1.0) {
            comp.beta_limit = CompensationConfig::default().beta_limit;
        }
        if !(comp.beaming_exponent.is_finite() && comp.beaming_exponent >= 0.0) {
            comp.beaming_exponent = CompensationConfig::default().beaming_exponent;
        }
        comp.tint_strength = if comp.tint_strength.is_finite() {
            comp.tint_strength.clamp(0.0, 1.0)
        } else {
            CompensationConfig::default().tint_strength
        };

        self.window.width = self.window.width.max(1);
        self.window.height = self.window.height.max(1);
        self.starfield.cubemap_face_size = self.starfield.cubemap_face_size.max(1);
        if !(self.render.fov_y_degrees > 1.0 && self.render.fov_y_degrees < 179.0) {
            self.render.fov_y_degrees = RenderConfig::default().fov_y_degrees;
        }
        self
    }
}
