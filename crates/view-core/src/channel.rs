use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

use crate::types::{BackendEvent, ViewCommand};

/// Receiving side of the backend callback stream, owned by the single view consumer.
pub type EventStream = mpsc::Receiver<BackendEvent>;

/// Errors returned when the other side of a channel is gone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendChannelError {
    /// Nobody is draining view commands anymore.
    #[error("command channel is closed")]
    CommandChannelClosed,
    /// The view stopped consuming backend callbacks.
    #[error("event channel is closed")]
    EventChannelClosed,
}

/// Cloneable handle the view side uses to send commands to the backend.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::Sender<ViewCommand>,
}

impl CommandSender {
    /// Queue one command, waiting for buffer space.
    pub async fn send(&self, command: ViewCommand) -> Result<(), BackendChannelError> {
        trace!(command = command.label(), "sending view command");
        self.tx
            .send(command)
            .await
            .map_err(|_| BackendChannelError::CommandChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Cloneable handle a backend uses to deliver callbacks to the view.
///
/// Delivery waits for buffer space, so a slow view slows the backend down
/// instead of losing callbacks.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<BackendEvent>,
}

impl EventSender {
    pub async fn send(&self, event: BackendEvent) -> Result<(), BackendChannelError> {
        trace!(event = event.label(), "delivering backend event");
        self.tx
            .send(event)
            .await
            .map_err(|_| BackendChannelError::EventChannelClosed)
    }
}

/// Wiring between a backend and the view layer: bounded commands one way,
/// bounded callbacks the other.
#[derive(Clone, Debug)]
pub struct BackendChannels {
    commands: CommandSender,
    events: EventSender,
}

impl BackendChannels {
    /// Build both channels. The backend keeps the command receiver and the
    /// view consumes the event stream.
    ///
    /// Zero capacities are raised to one.
    pub fn new(
        command_capacity: usize,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<ViewCommand>, EventStream) {
        let (command_tx, command_rx) = mpsc::channel(command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(event_capacity.max(1));
        let channels = Self {
            commands: CommandSender { tx: command_tx },
            events: EventSender { tx: event_tx },
        };
        (channels, command_rx, event_rx)
    }

    pub fn command_sender(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Deliver a backend callback, waiting while the view is behind.
    ///
    /// The stream ends once every sender, including this one, is dropped.
    pub async fn emit(&self, event: BackendEvent) -> Result<(), BackendChannelError> {
        self.events.send(event).await
    }
}
