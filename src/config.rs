//! Configuration management for tt_fanctl.
//!
//! Handles loading, parsing, and validation of the YAML configuration file.
//! Besides daemon settings it carries the persisted per-fan data (monitoring
//! source, point table and Bezier control points).

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    color::Color,
    drivers::tt_riing_quad::{self, protocol::PACKET_SIZE},
    effects::{CompositeEffect, CyclicFadeEffect, EffectCommand, FadeEffect, StaticEffect},
    fan_curve::{BezierCurve, CurveMode, Point, PointCurve},
    sensors::SensorLoader,
    system::{Controller, Fan, MonitoringMode, System},
    temperature_sensors::{FixedSensor, LmSensorLoader},
};

/// Most LEDs one SET LIGHT packet can address (header, port and mode first).
pub const MAX_LEDS_PER_FAN: usize = (PACKET_SIZE - 5) / 3;

/// Main configuration structure.
///
/// # Example
///
/// ```yaml
/// version: 1
/// refresh_interval_ms: 100
/// poll_interval_ms: 1000
/// curve_mode: point
/// usb: { vid: 0x264A, pid_min: 0x2260, pid_max: 0x226F, init: true }
/// sensors:
///   cpu: { kind: lm-sensors, chip: "k10temp-pci-00c3", feature: "Tctl" }
///   gpu: { kind: fixed, celsius: 40.0 }
/// effects:
///   - { kind: cyclic-fade, colors: [[255, 0, 0], [0, 0, 255]], segment_ms: 1500 }
/// active_effect: 0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Period of the LED refresh and effects loops.
    #[serde(default = "defaults::refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Period of sensor polling.
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub curve_mode: CurveMode,

    #[serde(default)]
    pub usb: UsbSelector,

    #[serde(default = "defaults::leds_per_fan")]
    pub leds_per_fan: usize,

    #[serde(default)]
    pub sensors: SensorsCfg,

    /// Effect prototypes, addressed by position.
    #[serde(default)]
    pub effects: Vec<EffectCfg>,

    /// Effect started at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_effect: Option<usize>,

    /// Write the fan data back to this file on shutdown.
    #[serde(default)]
    pub save_on_exit: bool,

    #[serde(default)]
    pub system: SystemCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            refresh_interval_ms: defaults::refresh_interval_ms(),
            poll_interval_ms: defaults::poll_interval_ms(),
            curve_mode: CurveMode::default(),
            usb: UsbSelector::default(),
            leds_per_fan: defaults::leds_per_fan(),
            sensors: SensorsCfg::default(),
            effects: Vec::new(),
            active_effect: None,
            save_on_exit: false,
            system: SystemCfg::default(),
        }
    }
}

/// USB selector for hub discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbSelector {
    pub vid: u16,
    pub pid_min: u16,
    pub pid_max: u16,

    /// Perform the INIT handshake after opening.
    #[serde(default = "defaults::usb_init")]
    pub init: bool,
}

impl Default for UsbSelector {
    fn default() -> Self {
        Self {
            vid: tt_riing_quad::VID,
            pid_min: tt_riing_quad::PID_MIN,
            pid_max: tt_riing_quad::PID_MAX,
            init: defaults::usb_init(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsCfg {
    pub cpu: SensorCfg,
    pub gpu: SensorCfg,
}

impl Default for SensorsCfg {
    fn default() -> Self {
        Self {
            cpu: SensorCfg::LmSensors {
                chip: "k10temp-pci-00c3".into(),
                feature: "Tctl".into(),
            },
            gpu: SensorCfg::LmSensors {
                chip: "amdgpu-pci-0300".into(),
                feature: "edge".into(),
            },
        }
    }
}

/// Temperature sensor backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SensorCfg {
    /// lm-sensors chip (e.g. "k10temp-pci-00c3") and feature (e.g. "Tctl").
    LmSensors { chip: String, feature: String },
    /// Constant reading.
    Fixed { celsius: f32 },
}

impl SensorCfg {
    pub fn loader(&self) -> Box<dyn SensorLoader> {
        match self {
            SensorCfg::LmSensors { chip, feature } => Box::new(LmSensorLoader {
                chip: chip.clone(),
                feature: feature.clone(),
            }),
            SensorCfg::Fixed { celsius } => Box::new(FixedSensor { celsius: *celsius }),
        }
    }
}

/// Lighting effect definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EffectCfg {
    Static {
        color: Color,
        duration_ms: u64,
    },
    Fade {
        from: Color,
        to: Color,
        duration_ms: u64,
    },
    Composite {
        steps: Vec<EffectCfg>,
    },
    CyclicFade {
        colors: Vec<Color>,
        segment_ms: u64,
    },
}

impl EffectCfg {
    pub fn to_command(&self) -> EffectCommand {
        match self {
            EffectCfg::Static { color, duration_ms } => EffectCommand::Static(StaticEffect::new(
                *color,
                Duration::from_millis(*duration_ms),
            )),
            EffectCfg::Fade {
                from,
                to,
                duration_ms,
            } => EffectCommand::Fade(FadeEffect::new(
                *from,
                *to,
                Duration::from_millis(*duration_ms),
            )),
            EffectCfg::Composite { steps } => EffectCommand::Composite(CompositeEffect::new(
                steps.iter().map(EffectCfg::to_command).collect(),
            )),
            EffectCfg::CyclicFade { colors, segment_ms } => EffectCommand::CyclicFade(
                CyclicFadeEffect::new(colors.clone(), Duration::from_millis(*segment_ms)),
            ),
        }
    }
}

/// Persisted data model, one entry per physical controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemCfg {
    #[serde(default)]
    pub controllers: Vec<ControllerCfg>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerCfg {
    #[serde(default)]
    pub fans: Vec<FanCfg>,
}

/// Persisted fan, keyed the way the desktop tools write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanCfg {
    #[serde(rename = "Monitoring")]
    pub monitoring: MonitoringMode,
    #[serde(rename = "Temps")]
    pub temps: Vec<f32>,
    #[serde(rename = "Speeds")]
    pub speeds: Vec<f32>,
    #[serde(rename = "ControlPoints")]
    pub control_points: Vec<Point>,
}

impl From<&Fan> for FanCfg {
    fn from(fan: &Fan) -> Self {
        Self {
            monitoring: fan.monitoring,
            temps: fan.point_curve.temps().to_vec(),
            speeds: fan.point_curve.speeds().to_vec(),
            control_points: fan.bezier_curve.points().to_vec(),
        }
    }
}

impl From<&System> for SystemCfg {
    fn from(system: &System) -> Self {
        Self {
            controllers: system
                .controllers()
                .iter()
                .map(|c| ControllerCfg {
                    fans: c.fans().iter().map(FanCfg::from).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<&SystemCfg> for System {
    type Error = anyhow::Error;

    fn try_from(cfg: &SystemCfg) -> Result<Self> {
        let controllers = cfg
            .controllers
            .iter()
            .enumerate()
            .map(|(c, ctrl)| {
                let fans = ctrl
                    .fans
                    .iter()
                    .enumerate()
                    .map(|(f, fan)| {
                        let point_curve = PointCurve::new(fan.temps.clone(), fan.speeds.clone())
                            .with_context(|| format!("Fan {c}:{f}"))?;
                        let bezier_curve = BezierCurve::from_slice(&fan.control_points)
                            .with_context(|| format!("Fan {c}:{f}"))?;
                        Ok(Fan::with_curves(f, fan.monitoring, point_curve, bezier_curve))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Controller::with_fans(c, fans))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(System::new(controllers))
    }
}

impl Config {
    /// Checks everything that would otherwise surface as undefined behavior
    /// at runtime: timings, USB range, LED count, curve data, effect index.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!("Unsupported config version {}", self.version);
        }
        if self.refresh_interval_ms == 0 || self.poll_interval_ms == 0 {
            bail!("Intervals must be greater than zero");
        }
        if self.usb.pid_min > self.usb.pid_max {
            bail!(
                "USB pid_min {:04X} is above pid_max {:04X}",
                self.usb.pid_min,
                self.usb.pid_max
            );
        }
        if !(1..=MAX_LEDS_PER_FAN).contains(&self.leds_per_fan) {
            bail!("leds_per_fan must be within 1-{MAX_LEDS_PER_FAN}");
        }
        if let Some(idx) = self.active_effect {
            if idx >= self.effects.len() {
                bail!(
                    "active_effect {idx} out of range ({} effects defined)",
                    self.effects.len()
                );
            }
        }
        self.to_system().context("Invalid fan data")?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn to_system(&self) -> Result<System> {
        System::try_from(&self.system)
    }

    pub fn effect_commands(&self) -> Vec<EffectCommand> {
        self.effects.iter().map(EffectCfg::to_command).collect()
    }

    /// Loads `path`, or the first file found in the standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. TT_FANCTL_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/tt_fanctl/config.yml or ~/.config/tt_fanctl/config.yml
    /// 4. /etc/tt_fanctl/config.yml
    ///
    /// Falls back to defaults when nothing is found. Returns the path used.
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        match path.or_else(locate_config) {
            Some(path) => {
                let config = Self::load_from(&path)?;
                Ok((config, Some(path)))
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        info!("Loading config from: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }

    /// Writes the configuration atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        let tmp_path = path.with_extension("yml.tmp");
        fs::write(&tmp_path, yaml).with_context(|| {
            format!("Failed to write temporary config to {}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move config to {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Replaces the persisted fan data with `system`.
    pub fn store_system(&mut self, system: &System) {
        self.system = SystemCfg::from(system);
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Ok(env_path) = env::var("TT_FANCTL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("tt_fanctl/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/tt_fanctl/config.yml");
    etc.exists().then(|| etc.to_path_buf())
}

mod defaults {
    pub fn refresh_interval_ms() -> u64 {
        100
    }

    pub fn poll_interval_ms() -> u64 {
        1000
    }

    pub fn leds_per_fan() -> usize {
        crate::device_controller::LEDS_PER_FAN
    }

    pub fn usb_init() -> bool {
        true
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    /// Parses and validates YAML text.
    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }
}
