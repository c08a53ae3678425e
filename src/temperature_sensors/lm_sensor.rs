use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use lm_sensors::{
    LMSensors, SubFeatureRef,
    value::{Kind as ValueKind, Value},
};
use log::{debug, info, warn};

use crate::sensors::{Reading, SensorLoader, TemperatureSensor};

/// Wrapper that lets the library handle live in a static.
pub struct LMSensorsRef(pub LMSensors);

// SAFETY: libsensors (>= 3.6) serializes all operations behind an internal global mutex.
unsafe impl Send for LMSensorsRef {}
unsafe impl Sync for LMSensorsRef {}

/// Process-wide lm-sensors handle, `None` when libsensors is unavailable.
pub static LMSENSORS: LazyLock<Option<LMSensorsRef>> =
    LazyLock::new(|| match lm_sensors::Initializer::default().initialize() {
        Ok(sensors) => {
            info!("lm-sensors initialized successfully");
            Some(LMSensorsRef(sensors))
        }
        Err(e) => {
            warn!("lm-sensors not available: {e}");
            None
        }
    });

pub struct LmSensorSource {
    key: String,
    subf: SubFeatureRef<'static>,
}

// SAFETY: libsensors (>= 3.6) guards all sensor access with an internal global mutex.
//         The `SubFeatureRef::value()` call is read-only.
//         Therefore, moving this pointer across threads cannot cause data races.
unsafe impl Send for LmSensorSource {}
unsafe impl Sync for LmSensorSource {}

impl LmSensorSource {
    /// Finds the temperature input of `feature` on the chip named `chip`.
    pub fn discover(lmsensors: &'static LMSensors, chip: &str, feature: &str) -> Result<Self> {
        let chip_ref = lmsensors
            .chip_iter(None)
            .find(|c| c.name().map(|n| n == chip).unwrap_or(false))
            .ok_or_else(|| anyhow!("lm-sensors chip '{chip}' not found"))?;
        let feat_ref = chip_ref
            .feature_iter()
            .find(|f| {
                f.name()
                    .map(|n| n.unwrap_or("N/A"))
                    .map(|s| s == feature)
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("Feature '{feature}' not found on chip '{chip}'"))?;
        let subf = feat_ref
            .sub_feature_iter()
            .find(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))
            .ok_or_else(|| anyhow!("'{chip}:{feature}' has no temperature input"))?;

        let key = format!("lm:{chip}:{feature}");
        info!("Found LM sensor: {key}");
        Ok(Self { key, subf })
    }

    fn read_input(&self) -> Result<f32> {
        match self.subf.value()? {
            Value::TemperatureInput(t) => Ok(t as f32),
            _ => Err(anyhow!("non-temperature value")),
        }
    }
}

impl TemperatureSensor for LmSensorSource {
    fn name(&self) -> String {
        self.key.clone()
    }

    /// A failed read reports 0 °C.
    fn read_temperature(&self) -> Reading {
        match self.read_input() {
            Ok(t) => Reading::good(t),
            Err(e) => {
                debug!("{}: {e:#}", self.key);
                Reading::failed(0.0)
            }
        }
    }
}

/// Loads an lm-sensors backed sensor by chip and feature name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmSensorLoader {
    pub chip: String,
    pub feature: String,
}

impl SensorLoader for LmSensorLoader {
    fn load(&self) -> Result<Box<dyn TemperatureSensor>> {
        let lm = LMSENSORS
            .as_ref()
            .ok_or_else(|| anyhow!("lm-sensors is not available on this system"))?;
        Ok(Box::new(LmSensorSource::discover(
            &lm.0,
            &self.chip,
            &self.feature,
        )?))
    }
}
