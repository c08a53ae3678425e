//! Scripted stand-in for a Riing Quad hub used across unit tests.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, bail};
use parking_lot::Mutex;

use crate::{
    color::Color,
    drivers::tt_riing_quad::{
        device_io::DeviceIO,
        protocol::{
            FIRMWARE_OFFSET, Family, PACKET_SIZE, RPM_HIGH_OFFSET, RPM_LOW_OFFSET, SPEED_OFFSET,
            STATUS_OFFSET, Status, Target,
        },
    },
};

#[derive(Default)]
struct HubState {
    sent: Vec<Vec<u8>>,
    pending: Option<[u8; PACKET_SIZE]>,
    speeds: HashMap<u8, u8>,
    fail_next: usize,
    silent: bool,
}

/// Answers like real hardware seen through hidapi: echoes family and target
/// without the report id, reports SUCCESS unless told to fail, and remembers
/// the last speed set per port.
#[derive(Clone, Default)]
pub(crate) struct FakeHub(Arc<Mutex<HubState>>);

impl FakeHub {
    pub(crate) const FIRMWARE: (u8, u8, u8) = (1, 2, 3);

    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rpm_for(speed: u8) -> u16 {
        u16::from(speed) * 20
    }

    /// The next `n` status answers carry FAIL. GET replies have no status.
    pub(crate) fn fail_next(&self, n: usize) {
        self.0.lock().fail_next = n;
    }

    /// While silent every read times out.
    pub(crate) fn go_silent(&self, silent: bool) {
        self.0.lock().silent = silent;
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.0.lock().sent.clone()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().sent.clear();
    }

    /// `(port, speed)` of every SET FAN written so far.
    pub(crate) fn fan_writes(&self) -> Vec<(u8, u8)> {
        self.matching(Family::Set, Target::Fan)
            .map(|p| (p[3], p[5]))
            .collect()
    }

    /// `(port, first LED color)` of every SET LIGHT written so far.
    pub(crate) fn light_writes(&self) -> Vec<(u8, Color)> {
        self.matching(Family::Set, Target::Light)
            .map(|p| (p[3], Color::new(p[6], p[5], p[7])))
            .collect()
    }

    fn matching(&self, family: Family, target: Target) -> impl Iterator<Item = Vec<u8>> {
        self.sent()
            .into_iter()
            .filter(move |p| p[1] == family as u8 && p[2] == target as u8)
    }
}

impl HubState {
    fn next_status(&mut self) -> u8 {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            Status::FAIL
        } else {
            Status::SUCCESS
        }
    }
}

impl DeviceIO for FakeHub {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.0.lock();
        state.sent.push(buf.to_vec());

        let mut resp = [0u8; PACKET_SIZE];
        resp[..2].copy_from_slice(&buf[1..3]);
        let (family, target, port) = (buf[1], buf[2], buf[3]);
        match (family, target) {
            (f, t) if f == Family::Get as u8 && t == Target::Firmware as u8 => {
                let (major, minor, patch) = Self::FIRMWARE;
                resp[FIRMWARE_OFFSET..FIRMWARE_OFFSET + 3].copy_from_slice(&[major, minor, patch]);
            }
            (f, t) if f == Family::Get as u8 && t == Target::Fan as u8 => {
                let speed = state.speeds.get(&port).copied().unwrap_or(0);
                let rpm = Self::rpm_for(speed);
                resp[SPEED_OFFSET] = speed;
                resp[RPM_LOW_OFFSET] = (rpm & 0xFF) as u8;
                resp[RPM_HIGH_OFFSET] = (rpm >> 8) as u8;
            }
            (f, t) if f == Family::Set as u8 && t == Target::Fan as u8 => {
                let status = state.next_status();
                if status == Status::SUCCESS {
                    state.speeds.insert(port, buf[5]);
                }
                resp[STATUS_OFFSET] = status;
            }
            _ => resp[STATUS_OFFSET] = state.next_status(),
        }
        state.pending = Some(resp);
        Ok(buf.len())
    }

    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let mut state = self.0.lock();
        if state.silent {
            state.pending = None;
            bail!("Read timed out after {timeout_ms} ms");
        }
        let Some(resp) = state.pending.take() else {
            bail!("Read timed out after {timeout_ms} ms");
        };
        let n = buf.len().min(PACKET_SIZE);
        buf[..n].copy_from_slice(&resp[..n]);
        Ok(n)
    }
}
