//! Logical `(controller, fan)` addressing on top of the hub transport.
//!
//! Every exchange here is best effort: I/O errors, timeouts and FAIL statuses
//! are logged as warnings and never propagated or retried.

use log::warn;

use crate::{
    color::{Color, ColorBuffer},
    drivers::tt_riing_quad::{
        DeviceIO, FanData, QuadDevice,
        protocol::{PER_LED_MODE, Status},
    },
    system::CHANNELS_PER_CONTROLLER,
};

/// LEDs on one Riing fan.
pub const LEDS_PER_FAN: usize = 52;

/// Live telemetry read back after a speed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanStats {
    pub speed: u8,
    pub rpm: u16,
}

pub struct DeviceController {
    devices: Vec<QuadDevice<Box<dyn DeviceIO>>>,
    channels: usize,
    leds_per_fan: usize,
}

impl core::fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceController")
            .field(
                "devices",
                &self.devices.iter().map(QuadDevice::name).collect::<Vec<_>>(),
            )
            .field("channels", &self.channels)
            .field("leds_per_fan", &self.leds_per_fan)
            .finish()
    }
}

impl DeviceController {
    /// Wraps opened hubs; index in `devices` is the controller index.
    pub fn new(devices: Vec<QuadDevice<Box<dyn DeviceIO>>>, leds_per_fan: usize) -> Self {
        Self {
            devices,
            channels: CHANNELS_PER_CONTROLLER,
            leds_per_fan,
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn controller_count(&self) -> usize {
        self.devices.len()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fans per controller, in controller order.
    pub fn topology(&self) -> Vec<usize> {
        vec![self.channels; self.devices.len()]
    }

    /// Zeroed buffer with one cell per addressable fan.
    pub fn make_color_buffer(&self) -> ColorBuffer {
        ColorBuffer::new(&self.topology())
    }

    fn address(&self, controller: usize, fan: usize) -> Option<(&QuadDevice<Box<dyn DeviceIO>>, u8)> {
        if fan >= self.channels {
            return None;
        }
        let port = u8::try_from(fan + 1).ok()?;
        self.devices.get(controller).map(|dev| (dev, port))
    }

    /// Sets a fan's duty cycle, then reads back its live speed and RPM.
    ///
    /// Returns `None` when the read-back leg fails; a failed SET is logged
    /// and the read-back still happens.
    pub fn send_to_fan(&self, controller: usize, fan: usize, speed: u8) -> Option<FanStats> {
        let Some((dev, port)) = self.address(controller, fan) else {
            warn!("No fan {fan} on controller {controller}");
            return None;
        };

        match dev.set_speed(port, speed) {
            Ok(Status::Success) => {}
            Ok(status) => warn!("{}: SET FAN port {port} answered {status:?}", dev.name()),
            Err(e) => warn!("{}: SET FAN port {port} failed: {e:#}", dev.name()),
        }

        match dev.get_data(port) {
            Ok(FanData { speed, rpm }) => Some(FanStats { speed, rpm }),
            Err(e) => {
                warn!("{}: GET FAN port {port} failed: {e:#}", dev.name());
                None
            }
        }
    }

    /// Paints every LED of one fan with `color`. Returns `true` on SUCCESS.
    pub fn set_rgb(&self, controller: usize, fan: usize, color: Color) -> bool {
        let Some((dev, port)) = self.address(controller, fan) else {
            warn!("No fan {fan} on controller {controller}");
            return false;
        };

        match dev.set_rgb(port, PER_LED_MODE, vec![color; self.leds_per_fan]) {
            Ok(Status::Success) => true,
            Ok(status) => {
                warn!("{}: SET LIGHT port {port} answered {status:?}", dev.name());
                false
            }
            Err(e) => {
                warn!("{}: SET LIGHT port {port} failed: {e:#}", dev.name());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeHub;
    use pretty_assertions::assert_eq;

    fn controller_with(hubs: &[FakeHub]) -> DeviceController {
        DeviceController::new(
            hubs.iter()
                .enumerate()
                .map(|(idx, hub)| QuadDevice::new(format!("quad{idx}"), hub.clone()).boxed())
                .collect(),
            LEDS_PER_FAN,
        )
    }

    #[test]
    fn send_to_fan_sets_then_reads_back() {
        let hubs = [FakeHub::new(), FakeHub::new()];
        let ctrl = controller_with(&hubs);

        let stats = ctrl.send_to_fan(1, 2, 65).unwrap();
        assert_eq!(
            stats,
            FanStats {
                speed: 65,
                rpm: FakeHub::rpm_for(65)
            }
        );
        assert_eq!(hubs[1].fan_writes(), vec![(3, 65)]);
        assert!(hubs[0].sent().is_empty());
    }

    #[test]
    fn failed_set_still_reads_back() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);
        ctrl.send_to_fan(0, 0, 30).unwrap();

        hub.fail_next(1);
        let stats = ctrl.send_to_fan(0, 0, 90).unwrap();
        assert_eq!(stats.speed, 30);
        assert_eq!(hub.sent().len(), 4);
    }

    #[test]
    fn failed_read_back_yields_none() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);

        hub.go_silent(true);
        assert_eq!(ctrl.send_to_fan(0, 0, 30), None);
        hub.go_silent(false);

        assert!(ctrl.send_to_fan(0, 0, 30).is_some());
    }

    #[test]
    fn silent_hub_yields_none_after_writing() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);
        hub.go_silent(true);
        assert_eq!(ctrl.send_to_fan(0, 1, 50), None);
        assert!(hub.fan_writes().contains(&(2, 50)));
    }

    #[test]
    fn out_of_range_addresses_are_ignored() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);
        assert_eq!(ctrl.send_to_fan(1, 0, 50), None);
        assert_eq!(ctrl.send_to_fan(0, CHANNELS_PER_CONTROLLER, 50), None);
        assert!(!ctrl.set_rgb(0, 9, Color::BLACK));
        assert!(hub.sent().is_empty());
    }

    #[test]
    fn set_rgb_paints_whole_channel() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);
        assert!(ctrl.set_rgb(0, 4, Color::new(10, 20, 30)));

        let sent = hub.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][..5], [0x00, 0x32, 0x52, 5, PER_LED_MODE]);
        for led in sent[0][5..5 + LEDS_PER_FAN * 3].chunks(3) {
            assert_eq!(led, &[20, 10, 30]);
        }
    }

    #[test]
    fn set_rgb_reports_fail_status() {
        let hub = FakeHub::new();
        let ctrl = controller_with(&[hub.clone()]);
        hub.fail_next(1);
        assert!(!ctrl.set_rgb(0, 0, Color::BLACK));
    }

    #[test]
    fn color_buffer_matches_topology() {
        let ctrl = controller_with(&[FakeHub::new(), FakeHub::new()]);
        let buf = ctrl.make_color_buffer();
        assert_eq!(buf.shape(), vec![CHANNELS_PER_CONTROLLER; 2]);
        assert_eq!(buf.uniform_color(), Some(Color::BLACK));
        assert_eq!(ctrl.with_channels(3).make_color_buffer().shape(), vec![3, 3]);
    }
}
