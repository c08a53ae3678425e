//! Periodic sensor polling with synchronous observer fan-out.
//!
//! Every tick reads the CPU and GPU sensors and hands one event per source to
//! each registered [`Observer`] on the polling thread. The stock observers
//! forward to [`FanController`], so fan speed updates run inline here.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::{
    fan_controller::FanController,
    sensors::{SensorLoader, TemperatureSensor},
    task_manager::TaskManager,
};

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureEvent {
    Cpu(f32),
    Gpu(f32),
}

#[cfg_attr(test, mockall::automock)]
pub trait Observer: Send + Sync {
    fn on_temperature(&self, event: TemperatureEvent);
}

/// Drives CPU-monitored fans.
pub struct ObserverCpu(pub Arc<FanController>);

impl Observer for ObserverCpu {
    fn on_temperature(&self, event: TemperatureEvent) {
        if let TemperatureEvent::Cpu(temp) = event {
            self.0.update_cpu_fans(temp);
        }
    }
}

/// Drives GPU-monitored fans.
pub struct ObserverGpu(pub Arc<FanController>);

impl Observer for ObserverGpu {
    fn on_temperature(&self, event: TemperatureEvent) {
        if let TemperatureEvent::Gpu(temp) = event {
            self.0.update_gpu_fans(temp);
        }
    }
}

/// Latest reading per source, overwritten on every tick even when the read
/// failed. Zero before the first tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Temperatures {
    pub cpu: f32,
    pub gpu: f32,
}

struct Inner {
    cpu: Box<dyn TemperatureSensor>,
    gpu: Box<dyn TemperatureSensor>,
    observers: Mutex<Vec<Arc<dyn Observer>>>,
    cache: Mutex<Temperatures>,
}

impl Inner {
    fn read(sensor: &dyn TemperatureSensor) -> f32 {
        let reading = sensor.read_temperature();
        if !reading.ok {
            warn!("Sensor {} read failed, got {}", sensor.name(), reading.celsius);
        }
        reading.celsius
    }

    fn tick(&self) {
        let (cpu, gpu) = (Self::read(self.cpu.as_ref()), Self::read(self.gpu.as_ref()));
        *self.cache.lock() = Temperatures { cpu, gpu };
        debug!("Temperatures: cpu={cpu} gpu={gpu}");

        let observers = self.observers.lock();
        for event in [TemperatureEvent::Cpu(cpu), TemperatureEvent::Gpu(gpu)] {
            for observer in observers.iter() {
                observer.on_temperature(event);
            }
        }
    }
}

pub struct Monitoring {
    inner: Arc<Inner>,
    interval: Duration,
    tasks: Mutex<TaskManager>,
}

impl Monitoring {
    pub fn new(
        cpu: Box<dyn TemperatureSensor>,
        gpu: Box<dyn TemperatureSensor>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cpu,
                gpu,
                observers: Mutex::new(Vec::new()),
                cache: Mutex::new(Temperatures::default()),
            }),
            interval,
            tasks: Mutex::new(TaskManager::new()),
        }
    }

    /// Loads both sensors; either loader failing is an error.
    pub fn from_loaders(
        cpu: &dyn SensorLoader,
        gpu: &dyn SensorLoader,
        interval: Duration,
    ) -> Result<Self> {
        let cpu = cpu.load().context("Failed to load CPU sensor")?;
        let gpu = gpu.load().context("Failed to load GPU sensor")?;
        info!("Monitoring {} (cpu) and {} (gpu)", cpu.name(), gpu.name());
        Ok(Self::new(cpu, gpu, interval))
    }

    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.inner.observers.lock().push(observer);
    }

    /// Polls once on the calling thread.
    pub fn tick(&self) {
        self.inner.tick();
    }

    pub fn temperatures(&self) -> Temperatures {
        *self.inner.cache.lock()
    }

    pub fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if tasks.active_count() > 0 {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        tasks.spawn_periodic("monitoring", self.interval, move || inner.tick())
    }

    pub fn shutdown(&self) -> Result<()> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        tasks.shutdown_all()
    }
}

impl Drop for Monitoring {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Monitoring shutdown failed: {e:#}");
        }
    }
}
