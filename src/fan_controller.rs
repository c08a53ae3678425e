//! The orchestrator tying curves, effects and the hardware together.
//!
//! [`FanController`] owns two periodic workers:
//!
//! * **refresh** pushes every cell of the active color buffer to the hubs;
//! * **effects** advances the running effect, fills the staging buffer with
//!   its color and swaps it in.
//!
//! Temperature driven speed updates run on the caller's thread. One mutex
//! guards the hubs together with the active buffer, so a speed exchange and a
//! color refresh never interleave on the wire.

use std::{mem, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};

use crate::{
    color::{Color, ColorBuffer},
    device_controller::DeviceController,
    effects::{EffectParams, EffectsEngine},
    event::{ColorMessage, DataMessage, Mediator, ModeMessage, StatsMessage},
    fan_curve::{CurveData, CurveMode, to_duty},
    system::{MonitoringMode, System},
    task_manager::TaskManager,
};

/// Default period of the refresh and effects loops.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

struct State {
    device: DeviceController,
    active: ColorBuffer,
}

struct Shared {
    state: Mutex<State>,
    staging: Mutex<ColorBuffer>,
    system: RwLock<System>,
    curve_mode: RwLock<CurveMode>,
    effects: Mutex<EffectsEngine>,
    mediator: Arc<dyn Mediator>,
    interval: Duration,
}

impl Shared {
    fn refresh(&self) {
        let state = self.state.lock();
        for (controller, fan, color) in state.active.iter() {
            state.device.set_rgb(controller, fan, color);
        }
    }

    fn advance_effect(&self) {
        let Some(color) = self.effects.lock().update(self.interval) else {
            return;
        };
        let mut staging = self.staging.lock();
        staging.fill(color);
        mem::swap(&mut self.state.lock().active, &mut *staging);
    }
}

pub struct FanController {
    shared: Arc<Shared>,
    tasks: Mutex<TaskManager>,
}

impl core::fmt::Debug for FanController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FanController")
            .field("device", &self.shared.state.lock().device)
            .field("curve_mode", &*self.shared.curve_mode.read())
            .field("interval", &self.shared.interval)
            .finish()
    }
}

impl FanController {
    /// Wires up the orchestrator. `system` is fitted to the hub topology.
    pub fn new(
        device: DeviceController,
        mut system: System,
        effects: EffectsEngine,
        mediator: Arc<dyn Mediator>,
        interval: Duration,
    ) -> Self {
        system.fit_topology(device.controller_count(), device.channels());
        let active = device.make_color_buffer();
        let staging = device.make_color_buffer();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State { device, active }),
                staging: Mutex::new(staging),
                system: RwLock::new(system),
                curve_mode: RwLock::new(CurveMode::default()),
                effects: Mutex::new(effects),
                mediator,
                interval,
            }),
            tasks: Mutex::new(TaskManager::new()),
        }
    }

    pub fn with_curve_mode(self, mode: CurveMode) -> Self {
        *self.shared.curve_mode.write() = mode;
        self
    }

    /// Starts the refresh and effects workers. Calling it twice is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if tasks.active_count() > 0 {
            return Ok(());
        }
        let interval = self.shared.interval;

        let shared = Arc::clone(&self.shared);
        tasks.spawn_periodic("refresh", interval, move || shared.refresh())?;
        let shared = Arc::clone(&self.shared);
        tasks.spawn_periodic("effects", interval, move || shared.advance_effect())?;

        info!("Fan controller started, interval {interval:?}");
        Ok(())
    }

    /// Stops both workers and waits for them; takes at most one tick.
    pub fn shutdown(&self) -> Result<()> {
        let mut tasks = mem::take(&mut *self.tasks.lock());
        tasks.shutdown_all()
    }

    /// Writes one cell of the active buffer, or every cell with `to_all`.
    ///
    /// Returns `false` when the address is out of range and `to_all` is unset.
    pub fn update_fan_color(&self, controller: usize, fan: usize, color: Color, to_all: bool) -> bool {
        {
            let mut state = self.shared.state.lock();
            if to_all {
                state.active.fill(color);
            } else if !state.active.set(controller, fan, color) {
                return false;
            }
        }
        self.shared.mediator.notify(
            ColorMessage {
                controller,
                fan,
                color,
                to_all,
            }
            .into(),
        );
        true
    }

    pub fn update_cpu_fans(&self, temp: f32) {
        self.update_fans(MonitoringMode::Cpu, temp);
    }

    pub fn update_gpu_fans(&self, temp: f32) {
        self.update_fans(MonitoringMode::Gpu, temp);
    }

    /// Drives every fan watching `source` from its active curve.
    fn update_fans(&self, source: MonitoringMode, temp: f32) {
        let mode = *self.shared.curve_mode.read();
        let targets: Vec<(usize, usize, u8)> = self
            .shared
            .system
            .read()
            .fans()
            .filter(|(_, fan)| fan.monitoring == source)
            .map(|(controller, fan)| {
                let speed = to_duty(fan.speed_for_temperature(mode, temp));
                (controller, fan.index(), speed)
            })
            .collect();

        let stats: Vec<StatsMessage> = {
            let state = self.shared.state.lock();
            targets
                .into_iter()
                .filter_map(|(controller, fan, speed)| {
                    debug!("{source:?} {temp:.1}°C -> fan {controller}:{fan} at {speed}%");
                    state
                        .device
                        .send_to_fan(controller, fan, speed)
                        .map(|s| StatsMessage {
                            controller,
                            fan,
                            speed: s.speed,
                            rpm: s.rpm,
                        })
                })
                .collect()
        };

        for msg in stats {
            self.shared.mediator.notify(msg.into());
        }
    }

    pub fn curve_mode(&self) -> CurveMode {
        *self.shared.curve_mode.read()
    }

    pub fn set_curve_mode(&self, mode: CurveMode) {
        *self.shared.curve_mode.write() = mode;
        info!("Curve mode set to {mode:?}");
        self.shared.mediator.notify(ModeMessage { mode }.into());
    }

    /// Replaces one of a fan's curves. Invalid data leaves the fan untouched.
    pub fn update_curve_data(&self, controller: usize, fan: usize, data: CurveData) -> Result<()> {
        {
            let mut system = self.shared.system.write();
            let target = system
                .fan_mut(controller, fan)
                .ok_or_else(|| anyhow!("No fan {fan} on controller {controller}"))?;
            match &data {
                CurveData::Point { temps, speeds } => {
                    target.point_curve.update_data(temps.clone(), speeds.clone())?
                }
                CurveData::Bezier { points } => target.bezier_curve.update_points(*points)?,
            }
        }
        self.shared.mediator.notify(
            DataMessage {
                controller,
                fan,
                data,
            }
            .into(),
        );
        Ok(())
    }

    pub fn set_monitoring(&self, controller: usize, fan: usize, mode: MonitoringMode) -> Result<()> {
        let mut system = self.shared.system.write();
        let target = system
            .fan_mut(controller, fan)
            .ok_or_else(|| anyhow!("No fan {fan} on controller {controller}"))?;
        target.monitoring = mode;
        Ok(())
    }

    /// Copy of the data model, e.g. for persisting.
    pub fn system(&self) -> System {
        self.shared.system.read().clone()
    }

    /// Copy of the buffer the refresh loop is pushing.
    pub fn color_buffer(&self) -> ColorBuffer {
        self.shared.state.lock().active.clone()
    }

    pub fn set_active_effect(&self, index: usize) -> Option<usize> {
        self.shared.effects.lock().set_active_effect(index)
    }

    pub fn update_active_effect(&self, color: Color, duration: Duration) -> bool {
        self.shared
            .effects
            .lock()
            .update_active_effect(EffectParams { color, duration })
    }

    pub fn clear_active_effect(&self) {
        self.shared.effects.lock().clear_active_effect();
    }

    pub fn active_effect(&self) -> Option<usize> {
        self.shared.effects.lock().active_index()
    }
}

impl Drop for FanController {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Fan controller shutdown failed: {e:#}");
        }
    }
}
