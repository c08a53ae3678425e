//! Fixed-size packet layout of the Riing Quad HID protocol.
//!
//! Every request is `PACKET_SIZE` bytes: start byte, command family, target,
//! then a target-specific payload, zero padded. hidapi strips the report id
//! from responses, so they start with the echoed family and target and carry
//! a status byte at [`STATUS_OFFSET`]. FAN GET answers put the speed where
//! the status would be.

use anyhow::{Result, anyhow, bail};

use crate::color::Color;

/// Length of every request and response.
pub const PACKET_SIZE: usize = 193;

pub const START: u8 = 0x00;

/// Response status byte.
pub const STATUS_OFFSET: usize = 2;
/// FAN GET payload.
pub const SPEED_OFFSET: usize = 2;
pub const RPM_LOW_OFFSET: usize = 3;
pub const RPM_HIGH_OFFSET: usize = 4;
/// FIRMWARE GET payload: major, minor, patch.
pub const FIRMWARE_OFFSET: usize = 0;

/// Fan mode byte for a fixed duty cycle.
pub const FIXED_SPEED_MODE: u8 = 0x01;
/// Light mode byte for per-LED static colors.
pub const PER_LED_MODE: u8 = 0x24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Family {
    Set = 0x32,
    Get = 0x33,
    Init = 0xFE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Target {
    /// Second byte of the INIT handshake.
    Handshake = 0x33,
    Firmware = 0x50,
    Fan = 0x51,
    Light = 0x52,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Fail,
    Unknown(u8),
}

impl Status {
    pub const SUCCESS: u8 = 0xFC;
    pub const FAIL: u8 = 0xFE;

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        match byte {
            Self::SUCCESS => Status::Success,
            Self::FAIL => Status::Fail,
            other => Status::Unknown(other),
        }
    }
}

/// Something that can be appended to a packet.
pub trait PacketField {
    /// Encoded length in bytes.
    fn encoded_len(&self) -> usize;

    /// Writes exactly `encoded_len()` bytes into `dst`.
    fn encode(&self, dst: &mut [u8]);
}

impl PacketField for u8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[0] = *self;
    }
}

impl PacketField for Family {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[0] = *self as u8;
    }
}

impl PacketField for Target {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[0] = *self as u8;
    }
}

impl PacketField for Color {
    fn encoded_len(&self) -> usize {
        3
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[..3].copy_from_slice(&self.grb());
    }
}

impl<T: PacketField> PacketField for [T] {
    fn encoded_len(&self) -> usize {
        self.iter().map(PacketField::encoded_len).sum()
    }

    fn encode(&self, dst: &mut [u8]) {
        let mut at = 0;
        for field in self {
            let len = field.encoded_len();
            field.encode(&mut dst[at..at + len]);
            at += len;
        }
    }
}

impl<T: PacketField, const N: usize> PacketField for [T; N] {
    fn encoded_len(&self) -> usize {
        self.as_slice().encoded_len()
    }

    fn encode(&self, dst: &mut [u8]) {
        self.as_slice().encode(dst)
    }
}

/// A finished request, always `PACKET_SIZE` bytes on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; PACKET_SIZE],
    len: usize,
}

impl Packet {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes written before padding.
    pub fn used(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::fmt::Debug for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Packet({:02X?})", self.used())
    }
}

/// Appends typed fields into a fixed buffer, failing on overflow.
///
/// # Example
///
/// ```
/// use tt_fanctl::drivers::tt_riing_quad::protocol::{Family, PacketBuilder, Target};
///
/// let packet = PacketBuilder::new(Family::Set, Target::Fan)
///     .append(&2u8)?
///     .append(&0x01u8)?
///     .append(&75u8)?
///     .finish();
/// assert_eq!(packet.used(), &[0x00, 0x32, 0x51, 2, 0x01, 75]);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    buffer: [u8; PACKET_SIZE],
    offset: usize,
}

impl PacketBuilder {
    pub fn new(family: Family, target: Target) -> Self {
        let mut buffer = [0u8; PACKET_SIZE];
        buffer[0] = START;
        buffer[1] = family as u8;
        buffer[2] = target as u8;
        Self { buffer, offset: 3 }
    }

    pub fn append<F: PacketField + ?Sized>(mut self, field: &F) -> Result<Self> {
        let len = field.encoded_len();
        let end = self.offset + len;
        if end > PACKET_SIZE {
            bail!(
                "Packet overflow: {} bytes at offset {} exceed {PACKET_SIZE}",
                len,
                self.offset
            );
        }
        field.encode(&mut self.buffer[self.offset..end]);
        self.offset = end;
        Ok(self)
    }

    pub fn finish(self) -> Packet {
        Packet {
            bytes: self.buffer,
            len: self.offset,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Init,
    GetFirmwareVersion,
    GetData { port: u8 },
    SetSpeed { port: u8, speed: u8 },
    SetRgb { port: u8, mode: u8, colors: Vec<Color> },
}

impl Command {
    pub fn to_packet(&self) -> Result<Packet> {
        let packet = match self {
            Command::Init => PacketBuilder::new(Family::Init, Target::Handshake),
            Command::GetFirmwareVersion => PacketBuilder::new(Family::Get, Target::Firmware),
            Command::GetData { port } => PacketBuilder::new(Family::Get, Target::Fan).append(port)?,
            Command::SetSpeed { port, speed } => PacketBuilder::new(Family::Set, Target::Fan)
                .append(port)?
                .append(&FIXED_SPEED_MODE)?
                .append(speed)?,
            Command::SetRgb { port, mode, colors } => PacketBuilder::new(Family::Set, Target::Light)
                .append(port)?
                .append(mode)?
                .append(colors.as_slice())?,
        };
        Ok(packet.finish())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    Status(Status),
    FirmwareVersion { major: u8, minor: u8, patch: u8 },
    Data { speed: u8, rpm: u16 },
}

impl Response {
    pub fn parse(cmd: &Command, buf: &[u8]) -> Result<Self> {
        let byte = |at: usize| {
            buf.get(at)
                .copied()
                .ok_or_else(|| anyhow!("Response too short ({} bytes) for {cmd:?}", buf.len()))
        };
        match cmd {
            Command::Init | Command::SetSpeed { .. } | Command::SetRgb { .. } => {
                Ok(Response::Status(byte(STATUS_OFFSET)?.into()))
            }
            Command::GetFirmwareVersion => Ok(Response::FirmwareVersion {
                major: byte(FIRMWARE_OFFSET)?,
                minor: byte(FIRMWARE_OFFSET + 1)?,
                patch: byte(FIRMWARE_OFFSET + 2)?,
            }),
            Command::GetData { .. } => Ok(Response::Data {
                speed: byte(SPEED_OFFSET)?,
                rpm: u16::from(byte(RPM_HIGH_OFFSET)?) << 8 | u16::from(byte(RPM_LOW_OFFSET)?),
            }),
        }
    }
}
