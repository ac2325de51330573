//! Async channel bridge between Tokio runtime and USB thread
//!
//! The async side submits transfers without blocking and receives their
//! completions as events. The USB thread executes transfers one at a time,
//! so completions come back in submission order.

use async_channel::{Receiver, Sender, TrySendError, bounded};
use protocol::{BulkOut, BulkTransport, TransferCompletion, TransportError};

use crate::usb_types::DeviceAddress;

/// Default number of commands that may be queued for the USB thread
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum TransferCommand {
    /// Execute a bulk OUT transfer
    SubmitBulkOut {
        /// Target device
        device: DeviceAddress,
        /// Transfer to execute
        transfer: BulkOut,
    },

    /// Shutdown the USB thread gracefully
    Shutdown,
}

/// Events from USB thread to Tokio runtime
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// A submitted transfer finished
    Completed {
        /// Device the transfer was sent to
        device: DeviceAddress,
        /// Transfer outcome, carrying the submitted buffer
        completion: TransferCompletion,
    },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct TransferBridge {
    cmd_tx: Sender<TransferCommand>,
    event_rx: Receiver<TransferEvent>,
}

impl TransferBridge {
    /// Queue a command without waiting for space
    pub fn try_send_command(&self, cmd: TransferCommand) -> Result<(), TransportError> {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: TransferCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the USB thread
    pub async fn recv_event(&self) -> crate::Result<TransferEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Ask the USB thread to stop
    pub async fn shutdown(&self) -> crate::Result<()> {
        self.send_command(TransferCommand::Shutdown).await
    }
}

impl BulkTransport for TransferBridge {
    type Device = DeviceAddress;

    fn submit_bulk_out(
        &mut self,
        device: &DeviceAddress,
        transfer: BulkOut,
    ) -> Result<(), TransportError> {
        self.try_send_command(TransferCommand::SubmitBulkOut {
            device: *device,
            transfer,
        })
    }
}

/// Handle for USB thread (blocking)
pub struct TransferWorker {
    cmd_rx: Receiver<TransferCommand>,
    event_tx: Sender<TransferEvent>,
}

impl TransferWorker {
    /// Receive a command from Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<TransferCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Send an event to Tokio runtime (blocking)
    pub fn send_event(&self, event: TransferEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (TransferBridge for Tokio, TransferWorker for USB thread)
pub fn create_transfer_bridge(queue_depth: usize) -> (TransferBridge, TransferWorker) {
    let (cmd_tx, cmd_rx) = bounded(queue_depth.max(1));
    let (event_tx, event_rx) = bounded(queue_depth.max(1));

    (
        TransferBridge { cmd_tx, event_rx },
        TransferWorker { cmd_rx, event_tx },
    )
}
