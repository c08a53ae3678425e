//! Application wiring and builder.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use hidapi::HidApi;
use log::{info, warn};

use crate::{
    config::Config,
    device_controller::DeviceController,
    drivers::tt_riing_quad::{self, DeviceIO, QuadDevice},
    effects::EffectsEngine,
    event::{EventBus, Mediator},
    fan_controller::FanController,
    monitoring::{Monitoring, ObserverCpu, ObserverGpu},
    sensors::TemperatureSensor,
};

/// The assembled daemon: hubs, fan controller and sensor monitoring.
///
/// # Example
///
/// ```no_run
/// use tt_fanctl::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let (config, path) = Config::load(None)?;
/// Application::builder()
///     .with_config(config, path)
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    monitoring: Monitoring,
    fan_controller: Arc<FanController>,
    event_bus: EventBus,
    config: Config,
    config_path: Option<PathBuf>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn fan_controller(&self) -> &Arc<FanController> {
        &self.fan_controller
    }

    pub fn monitoring(&self) -> &Monitoring {
        &self.monitoring
    }

    /// Subscribe here to receive telemetry and edit notifications.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Starts the refresh, effects and monitoring workers.
    pub fn start(&self) -> Result<()> {
        self.fan_controller.start()?;
        self.monitoring.start()?;
        info!("All workers started");
        Ok(())
    }

    /// Stops every worker; persists fan data first if configured to.
    pub fn shutdown(&mut self) -> Result<()> {
        let monitoring = self.monitoring.shutdown();
        let controller = self.fan_controller.shutdown();

        if self.config.save_on_exit {
            match &self.config_path {
                Some(path) => {
                    self.config.store_system(&self.fan_controller.system());
                    self.config.save(path)?;
                }
                None => warn!("save_on_exit is set but no configuration file was loaded"),
            }
        }

        monitoring.and(controller)
    }

    /// Runs until Ctrl+C, then shuts down.
    pub async fn run(mut self) -> Result<()> {
        self.start()?;
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Shutdown signal received");
        self.shutdown()
    }
}

/// Builder for [`Application`].
///
/// Hubs are probed over HID and sensors come from the configured loaders
/// unless supplied explicitly.
#[derive(Default)]
pub struct ApplicationBuilder {
    config: Option<Config>,
    config_path: Option<PathBuf>,
    devices: Option<Vec<QuadDevice<Box<dyn DeviceIO>>>>,
    sensors: Option<(Box<dyn TemperatureSensor>, Box<dyn TemperatureSensor>)>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// `path` is where fan data is written back when `save_on_exit` is set.
    pub fn with_config(mut self, config: Config, path: Option<PathBuf>) -> Self {
        self.config = Some(config);
        self.config_path = path;
        self
    }

    pub fn with_devices(mut self, devices: Vec<QuadDevice<Box<dyn DeviceIO>>>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn with_sensors(
        mut self,
        cpu: Box<dyn TemperatureSensor>,
        gpu: Box<dyn TemperatureSensor>,
    ) -> Self {
        self.sensors = Some((cpu, gpu));
        self
    }

    /// Opens hardware and sensors and wires everything together.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, when no hub can be opened or
    /// initialized, or when a sensor cannot be loaded.
    pub fn build(self) -> Result<Application> {
        let config = self.config.unwrap_or_default();
        config.validate().context("Invalid configuration")?;

        let devices = match self.devices {
            Some(devices) => devices,
            None => {
                let api = HidApi::new()
                    .map_err(|e| anyhow!("{e}"))
                    .context("hidapi init")?;
                tt_riing_quad::probe(&api, &config.usb)?
                    .into_iter()
                    .map(QuadDevice::boxed)
                    .collect()
            }
        };
        let device = DeviceController::new(devices, config.leds_per_fan);
        info!(
            "{} controller(s), {} channels each",
            device.controller_count(),
            device.channels()
        );

        let event_bus = EventBus::new();
        let mediator: Arc<dyn Mediator> = Arc::new(event_bus.clone());
        let fan_controller = Arc::new(
            FanController::new(
                device,
                config.to_system()?,
                EffectsEngine::new(config.effect_commands()),
                mediator,
                config.refresh_interval(),
            )
            .with_curve_mode(config.curve_mode),
        );
        if let Some(index) = config.active_effect {
            fan_controller.set_active_effect(index);
        }

        let monitoring = match self.sensors {
            Some((cpu, gpu)) => Monitoring::new(cpu, gpu, config.poll_interval()),
            None => Monitoring::from_loaders(
                config.sensors.cpu.loader().as_ref(),
                config.sensors.gpu.loader().as_ref(),
                config.poll_interval(),
            )?,
        };
        monitoring.add_observer(Arc::new(ObserverCpu(Arc::clone(&fan_controller))));
        monitoring.add_observer(Arc::new(ObserverGpu(Arc::clone(&fan_controller))));

        Ok(Application {
            monitoring,
            fan_controller,
            event_bus,
            config,
            config_path: self.config_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::Color,
        config::{EffectCfg, SensorCfg},
        event::Message,
        system::{CHANNELS_PER_CONTROLLER, MonitoringMode},
        temperature_sensors::FixedSensor,
        test_utils::FakeHub,
    };
    use pretty_assertions::assert_eq;
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    fn fast_config() -> Config {
        Config {
            refresh_interval_ms: 5,
            poll_interval_ms: 5,
            sensors: crate::config::SensorsCfg {
                cpu: SensorCfg::Fixed { celsius: 40.0 },
                gpu: SensorCfg::Fixed { celsius: 70.0 },
            },
            ..Config::default()
        }
    }

    fn hubs(hubs: &[FakeHub]) -> Vec<QuadDevice<Box<dyn DeviceIO>>> {
        hubs.iter()
            .enumerate()
            .map(|(idx, hub)| QuadDevice::new(format!("quad{idx}"), hub.clone()).boxed())
            .collect()
    }

    #[test]
    fn runs_all_workers_against_hardware() {
        let hub = FakeHub::new();
        let mut config = fast_config();
        config.effects = vec![EffectCfg::Static {
            color: Color::new(0, 0, 255),
            duration_ms: 60_000,
        }];
        config.active_effect = Some(0);

        let mut app = Application::builder()
            .with_config(config, None)
            .with_devices(hubs(&[hub.clone()]))
            .build()
            .unwrap();
        let mut rx = app.event_bus().subscribe();

        app.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        app.shutdown().unwrap();

        assert!(hub.fan_writes().iter().all(|&(_, speed)| speed == 50));
        assert!(
            hub.light_writes()
                .contains(&(1, Color::new(0, 0, 255)))
        );
        assert!(matches!(rx.try_recv(), Ok(Message::Stats(_))));
        assert_eq!(app.monitoring().temperatures().cpu, 40.0);
    }

    #[test]
    fn explicit_sensors_override_config() {
        let app = Application::builder()
            .with_config(Config::default(), None)
            .with_devices(hubs(&[FakeHub::new(), FakeHub::new()]))
            .with_sensors(
                Box::new(FixedSensor { celsius: 20.0 }),
                Box::new(FixedSensor { celsius: 30.0 }),
            )
            .build()
            .unwrap();
        app.monitoring().tick();

        assert_eq!(app.monitoring().temperatures().gpu, 30.0);
        assert_eq!(app.fan_controller().system().controllers().len(), 2);
    }

    #[test]
    fn invalid_config_fails_build() {
        let config = Config {
            version: 9,
            ..fast_config()
        };
        let err = Application::builder()
            .with_config(config, None)
            .with_devices(hubs(&[FakeHub::new()]))
            .build()
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("Unsupported config version"));
    }

    #[test]
    fn fan_data_is_saved_on_exit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let config = Config {
            save_on_exit: true,
            ..fast_config()
        };
        config.save(&path).unwrap();

        let mut app = Application::builder()
            .with_config(config, Some(path.clone()))
            .with_devices(hubs(&[FakeHub::new()]))
            .build()
            .unwrap();
        app.fan_controller()
            .set_monitoring(0, 2, MonitoringMode::Gpu)
            .unwrap();
        app.shutdown().unwrap();

        let saved = Config::load_from(&path).unwrap();
        let system = saved.to_system().unwrap();
        assert_eq!(system.controllers()[0].fans().len(), CHANNELS_PER_CONTROLLER);
        assert_eq!(system.fan(0, 2).unwrap().monitoring, MonitoringMode::Gpu);
    }
}
