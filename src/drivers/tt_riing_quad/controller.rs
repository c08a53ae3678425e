use anyhow::{Context, Result, anyhow, bail};
#[cfg(debug_assertions)]
use log::debug;

use crate::color::Color;

use super::{
    device_io::DeviceIO,
    protocol::{Command, PACKET_SIZE, Response, Status},
};

/// HID communication timeout in milliseconds.
pub const READ_TIMEOUT: i32 = 250;

/// Speed and RPM read back from one fan channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanData {
    pub speed: u8,
    pub rpm: u16,
}

/// One opened hub speaking the Riing Quad protocol.
///
/// Every exchange is a write of one fixed-size packet followed by a blocking
/// read of one fixed-size response.
///
/// # Type Parameters
///
/// * `Io` - Device I/O implementation (typically HidDevice)
#[derive(Debug)]
pub struct QuadDevice<Io: DeviceIO> {
    name: String,
    dev: Io,
}

impl<Io: DeviceIO> QuadDevice<Io> {
    pub fn new(name: impl Into<String>, dev: Io) -> Self {
        Self {
            name: name.into(),
            dev,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Erases the transport type so hubs of different kinds share a list.
    pub fn boxed(self) -> QuadDevice<Box<dyn DeviceIO>> {
        QuadDevice {
            name: self.name,
            dev: Box::new(self.dev),
        }
    }

    /// Encodes `cmd` and writes the padded packet.
    pub fn send_request(&self, cmd: &Command) -> Result<()> {
        let packet = cmd.to_packet()?;
        #[cfg(debug_assertions)]
        {
            debug!("{} <- {packet:?}", self.name);
        }
        let written = self
            .dev
            .write(packet.as_bytes())
            .with_context(|| format!("{}: write failed", self.name))?;
        if written != PACKET_SIZE {
            bail!("{}: short write ({written}/{PACKET_SIZE} bytes)", self.name);
        }
        Ok(())
    }

    /// Reads one response and decodes it as the answer to `cmd`.
    pub fn read_response(&self, cmd: &Command, timeout_ms: i32) -> Result<Response> {
        let mut buf = [0u8; PACKET_SIZE];
        let n = self
            .dev
            .read(&mut buf, timeout_ms)
            .with_context(|| format!("{}: read failed", self.name))?;
        Response::parse(cmd, &buf[..n])
    }

    fn request(&self, cmd: Command) -> Result<Response> {
        self.send_request(&cmd)?;
        self.read_response(&cmd, READ_TIMEOUT)
    }

    /// Performs the INIT handshake.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or when the hub does not answer SUCCESS.
    pub fn init(&self) -> Result<()> {
        match self.request(Command::Init)? {
            Response::Status(Status::Success) => Ok(()),
            other => Err(anyhow!(
                "{}: invalid init response {other:?}, expected SUCCESS",
                self.name
            )),
        }
    }

    /// Returns the firmware version as (major, minor, patch).
    pub fn firmware_version(&self) -> Result<(u8, u8, u8)> {
        match self.request(Command::GetFirmwareVersion)? {
            Response::FirmwareVersion {
                major,
                minor,
                patch,
            } => Ok((major, minor, patch)),
            other => Err(anyhow!("{}: invalid firmware response {other:?}", self.name)),
        }
    }

    /// Sets a fixed duty cycle on `port` (1-based).
    pub fn set_speed(&self, port: u8, speed: u8) -> Result<Status> {
        match self.request(Command::SetSpeed { port, speed })? {
            Response::Status(status) => Ok(status),
            other => Err(anyhow!("{}: invalid set speed response {other:?}", self.name)),
        }
    }

    /// Reads live speed and RPM of `port` (1-based).
    pub fn get_data(&self, port: u8) -> Result<FanData> {
        match self.request(Command::GetData { port })? {
            Response::Data { speed, rpm } => Ok(FanData { speed, rpm }),
            other => Err(anyhow!("{}: invalid get data response {other:?}", self.name)),
        }
    }

    /// Writes one color per LED on `port` (1-based).
    pub fn set_rgb(&self, port: u8, mode: u8, colors: Vec<Color>) -> Result<Status> {
        match self.request(Command::SetRgb { port, mode, colors })? {
            Response::Status(status) => Ok(status),
            other => Err(anyhow!("{}: invalid set rgb response {other:?}", self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::tt_riing_quad::protocol::PER_LED_MODE;
    use crate::test_utils::FakeHub;
    use pretty_assertions::assert_eq;

    #[test]
    fn init_accepts_success() {
        let hub = FakeHub::new();
        let dev = QuadDevice::new("quad", hub.clone());
        dev.init().unwrap();
        assert_eq!(hub.sent()[0][..3], [0x00, 0xFE, 0x33]);
    }

    #[test]
    fn init_rejects_fail_status() {
        let hub = FakeHub::new();
        hub.fail_next(1);
        let err = QuadDevice::new("quad", hub).init().unwrap_err();
        assert!(err.to_string().contains("invalid init response"));
    }

    #[test]
    fn every_write_is_full_size() {
        let hub = FakeHub::new();
        let dev = QuadDevice::new("quad", hub.clone());
        dev.set_speed(1, 40).unwrap();
        dev.set_rgb(2, PER_LED_MODE, vec![Color::new(1, 2, 3); 52])
            .unwrap();
        assert!(hub.sent().iter().all(|p| p.len() == PACKET_SIZE));
    }

    #[test]
    fn set_then_get_reads_back() {
        let hub = FakeHub::new();
        let dev = QuadDevice::new("quad", hub);
        assert_eq!(dev.set_speed(3, 70).unwrap(), Status::Success);
        let data = dev.get_data(3).unwrap();
        assert_eq!(
            data,
            FanData {
                speed: 70,
                rpm: FakeHub::rpm_for(70)
            }
        );
    }

    #[test]
    fn timeout_is_an_error() {
        let hub = FakeHub::new();
        hub.go_silent(true);
        let dev = QuadDevice::new("quad", hub);
        let err = dev.get_data(1).unwrap_err();
        assert!(format!("{err:#}").contains("timed out"));
    }

    #[test]
    fn firmware_version_is_decoded() {
        let hub = FakeHub::new();
        let dev = QuadDevice::new("quad", hub).boxed();
        assert_eq!(dev.firmware_version().unwrap(), FakeHub::FIRMWARE);
    }
}
