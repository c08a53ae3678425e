//! # tt_fanctl
//!
//! Temperature driven fan control and LED effects for Thermaltake Riing Quad
//! hubs over HID.
//!
//! ## Features
//!
//! - **Fan Curves**: point tables with linear interpolation or cubic Bezier
//!   curves, switchable at runtime
//! - **Temperature Monitoring**: CPU and GPU sensors via lm-sensors
//! - **Lighting Effects**: static, fade, composite and endlessly cycling fades
//! - **Telemetry**: live speed and RPM readback published on an event bus
//!
//! ## Architecture
//!
//! - [`Monitoring`](monitoring::Monitoring) polls sensors and notifies observers
//! - [`FanController`](fan_controller::FanController) turns temperatures into
//!   speeds and runs the LED refresh and effects loops
//! - [`DeviceController`](device_controller::DeviceController) addresses fans
//!   by `(controller, fan)` on top of the HID protocol
//! - [`EventBus`](event::EventBus) carries notifications to presentation layers
//!
//! ## Example
//!
//! ```no_run
//! use tt_fanctl::{application::Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (config, path) = Config::load(None)?;
//!     Application::builder()
//!         .with_config(config, path)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod application;
pub mod color;
pub mod config;
pub mod device_controller;
pub mod drivers;
pub mod effects;
pub mod event;
pub mod fan_controller;
pub mod fan_curve;
pub mod monitoring;
pub mod sensors;
pub mod system;
pub mod task_manager;
pub mod temperature_sensors;

#[cfg(test)]
mod test_utils;
