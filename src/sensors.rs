//! Temperature sensor capability and its pluggable loader.

use anyhow::Result;

/// Outcome of one sensor read.
///
/// `celsius` is whatever the backend produced, also when `ok` is false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub ok: bool,
    pub celsius: f32,
}

impl Reading {
    pub const fn good(celsius: f32) -> Self {
        Self { ok: true, celsius }
    }

    pub const fn failed(celsius: f32) -> Self {
        Self { ok: false, celsius }
    }
}

/// A source of temperatures in degrees Celsius.
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSensor: Send + Sync {
    fn read_temperature(&self) -> Reading;
    fn name(&self) -> String;
}

/// Builds a sensor backend at startup.
///
/// A loader error is fatal for whoever is constructing the monitor.
pub trait SensorLoader {
    fn load(&self) -> Result<Box<dyn TemperatureSensor>>;
}
