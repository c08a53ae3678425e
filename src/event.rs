//! One-way notifications from the control core to presentation consumers.

use anyhow::Result;
use log::debug;
use tokio::sync::broadcast;

use crate::{
    color::Color,
    fan_curve::{CurveData, CurveMode},
};

/// Live telemetry read back from one fan after a speed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsMessage {
    pub controller: usize,
    pub fan: usize,
    pub speed: u8,
    pub rpm: u16,
}

/// A user-driven color write. With `to_all` the address is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMessage {
    pub controller: usize,
    pub fan: usize,
    pub color: Color,
    pub to_all: bool,
}

/// The controller-wide curve mode changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeMessage {
    pub mode: CurveMode,
}

/// One fan's curve was replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    pub controller: usize,
    pub fan: usize,
    pub data: CurveData,
}

/// Every notification the core emits, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Stats(StatsMessage),
    Color(ColorMessage),
    Mode(ModeMessage),
    Data(DataMessage),
}

impl From<StatsMessage> for Message {
    fn from(msg: StatsMessage) -> Self {
        Message::Stats(msg)
    }
}

impl From<ColorMessage> for Message {
    fn from(msg: ColorMessage) -> Self {
        Message::Color(msg)
    }
}

impl From<ModeMessage> for Message {
    fn from(msg: ModeMessage) -> Self {
        Message::Mode(msg)
    }
}

impl From<DataMessage> for Message {
    fn from(msg: DataMessage) -> Self {
        Message::Data(msg)
    }
}

/// Fire-and-forget sink for [`Message`]s.
///
/// Called synchronously from worker threads; implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait Mediator: Send + Sync {
    fn notify(&self, message: Message);
}

/// Broadcast-channel mediator that any number of consumers can subscribe to.
///
/// # Example
///
/// ```
/// use tt_fanctl::event::{EventBus, Mediator, Message, ModeMessage};
/// use tt_fanctl::fan_curve::CurveMode;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
/// bus.notify(Message::Mode(ModeMessage { mode: CurveMode::Bezier }));
/// assert!(matches!(rx.try_recv(), Ok(Message::Mode(_))));
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Message>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes to all current subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, message: Message) -> Result<()> {
        self.sender.send(message)?;
        Ok(())
    }

    /// Each subscriber receives every message published after subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Mediator for EventBus {
    fn notify(&self, message: Message) {
        if let Err(e) = self.publish(message) {
            debug!("Dropped notification: {e}");
        }
    }
}
