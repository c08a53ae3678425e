//! Concrete [`TemperatureSensor`](crate::sensors::TemperatureSensor) backends.

pub mod fixed;
pub mod lm_sensor;

pub use fixed::FixedSensor;
pub use lm_sensor::LmSensorLoader;
