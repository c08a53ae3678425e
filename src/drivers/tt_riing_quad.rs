//! Thermaltake Riing Quad fan/lighting hub.
//!
//! [`probe`] finds every hub on the bus by vendor id and product-id range,
//! opens it and optionally performs the INIT handshake.

pub mod controller;
pub mod device_io;
pub mod protocol;

use anyhow::{Context, Result, anyhow, bail};
use hidapi::{DeviceInfo, HidApi, HidDevice};
use log::{info, warn};

use crate::config::UsbSelector;

pub use controller::{FanData, QuadDevice, READ_TIMEOUT};
pub use device_io::DeviceIO;

/// Thermaltake Vendor ID for HID devices.
pub const VID: u16 = 0x264A;

/// Product ids used by Riing Quad hubs.
pub const PID_MIN: u16 = 0x2260;
pub const PID_MAX: u16 = 0x226F;

/// One enumerated HID interface that may be a hub.
pub trait HubCandidate {
    type Io: DeviceIO;

    fn vendor_id(&self) -> u16;
    fn product_id(&self) -> u16;
    fn open(&self) -> Result<Self::Io>;
}

struct HidCandidate<'a> {
    api: &'a HidApi,
    info: &'a DeviceInfo,
}

impl HubCandidate for HidCandidate<'_> {
    type Io = HidDevice;

    fn vendor_id(&self) -> u16 {
        self.info.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.info.product_id()
    }

    fn open(&self) -> Result<HidDevice> {
        self.info.open_device(self.api).map_err(|e| anyhow!("{e}"))
    }
}

/// Opens every hub on the bus matched by `usb`, in enumeration order.
///
/// # Errors
///
/// See [`connect`].
pub fn probe(api: &HidApi, usb: &UsbSelector) -> Result<Vec<QuadDevice<HidDevice>>> {
    connect(api.device_list().map(|info| HidCandidate { api, info }), usb)
}

/// Opens the candidates matched by `usb` and runs the optional INIT handshake.
///
/// # Errors
///
/// Fails if a matching hub cannot be opened, if an enabled INIT handshake
/// does not succeed, or if no hub matches at all.
pub fn connect<C: HubCandidate>(
    candidates: impl IntoIterator<Item = C>,
    usb: &UsbSelector,
) -> Result<Vec<QuadDevice<C::Io>>> {
    let pids = usb.pid_min..=usb.pid_max;
    let devices = candidates
        .into_iter()
        .filter(|c| c.vendor_id() == usb.vid && pids.contains(&c.product_id()))
        .inspect(|c| info!("Hub candidate PID={:04X}", c.product_id()))
        .enumerate()
        .map(|(idx, c)| {
            let dev = c.open().with_context(|| {
                format!(
                    "Failed to open device {:04X}:{:04X}",
                    c.vendor_id(),
                    c.product_id()
                )
            })?;
            let quad = QuadDevice::new(format!("TTRiingQuad{}", idx + 1), dev);

            if usb.init {
                quad.init()
                    .with_context(|| format!("INIT handshake failed on {}", quad.name()))?;
            }
            match quad.firmware_version() {
                Ok((major, minor, patch)) => {
                    info!("{} firmware {major}.{minor}.{patch}", quad.name())
                }
                Err(e) => warn!("{}: firmware query failed: {e:#}", quad.name()),
            }
            Ok(quad)
        })
        .collect::<Result<Vec<_>>>()?;

    if devices.is_empty() {
        bail!(
            "No controllers found for VID {:04X} PID {:04X}-{:04X}",
            usb.vid,
            usb.pid_min,
            usb.pid_max
        );
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeHub;
    use pretty_assertions::assert_eq;

    struct FakeCandidate {
        vid: u16,
        pid: u16,
        hub: FakeHub,
        openable: bool,
    }

    impl FakeCandidate {
        fn new(vid: u16, pid: u16) -> Self {
            Self {
                vid,
                pid,
                hub: FakeHub::new(),
                openable: true,
            }
        }
    }

    impl HubCandidate for &FakeCandidate {
        type Io = FakeHub;

        fn vendor_id(&self) -> u16 {
            self.vid
        }

        fn product_id(&self) -> u16 {
            self.pid
        }

        fn open(&self) -> Result<FakeHub> {
            if !self.openable {
                bail!("permission denied");
            }
            Ok(self.hub.clone())
        }
    }

    #[test]
    fn only_matching_ids_are_opened() {
        let found = [
            FakeCandidate::new(VID, PID_MIN),
            FakeCandidate::new(VID, PID_MAX + 1),
            FakeCandidate::new(0x1234, PID_MIN + 1),
            FakeCandidate::new(VID, PID_MAX),
        ];
        let hubs = connect(&found, &UsbSelector::default()).unwrap();

        let names: Vec<&str> = hubs.iter().map(QuadDevice::name).collect();
        assert_eq!(names, vec!["TTRiingQuad1", "TTRiingQuad2"]);
        assert_eq!(found[0].hub.sent()[0][..3], [0x00, 0xFE, 0x33]);
        assert_eq!(found[3].hub.sent()[0][..3], [0x00, 0xFE, 0x33]);
        assert!(found[1].hub.sent().is_empty());
        assert!(found[2].hub.sent().is_empty());
    }

    #[test]
    fn init_failure_aborts_enumeration() {
        let found = [FakeCandidate::new(VID, PID_MIN), FakeCandidate::new(VID, PID_MIN + 1)];
        found[1].hub.fail_next(1);

        let err = connect(&found, &UsbSelector::default()).err().unwrap();
        assert!(format!("{err:#}").contains("INIT handshake failed on TTRiingQuad2"));
    }

    #[test]
    fn init_can_be_skipped() {
        let found = [FakeCandidate::new(VID, PID_MIN)];
        let usb = UsbSelector {
            init: false,
            ..UsbSelector::default()
        };

        assert_eq!(connect(&found, &usb).unwrap().len(), 1);
        assert_eq!(found[0].hub.sent()[0][..3], [0x00, 0x33, 0x50]);
    }

    #[test]
    fn open_failure_is_fatal() {
        let mut broken = FakeCandidate::new(VID, PID_MIN);
        broken.openable = false;

        let err = connect([&broken], &UsbSelector::default()).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to open device 264A:2260"));
    }

    #[test]
    fn no_match_is_an_error() {
        let found = [FakeCandidate::new(VID, 0x1000)];
        let err = connect(&found, &UsbSelector::default()).err().unwrap();
        assert!(err.to_string().contains("No controllers found"));
    }
}
