use anyhow::{Result, anyhow, bail};
use hidapi::HidDevice;

/// Raw byte transport to one opened controller.
pub trait DeviceIO: Send + 'static {
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Blocking read of one report. A timeout is an error.
    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

impl DeviceIO for HidDevice {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        Self::write(self, buf).map_err(|e| anyhow!("{e}"))
    }

    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let n = Self::read_timeout(self, buf, timeout_ms).map_err(|e| anyhow!("{e}"))?;
        if n == 0 {
            bail!("Read timed out after {timeout_ms} ms");
        }
        Ok(n)
    }
}

impl<T: DeviceIO + ?Sized> DeviceIO for Box<T> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        (**self).read(buf, timeout_ms)
    }
}
