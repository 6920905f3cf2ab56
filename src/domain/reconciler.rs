//! Sync Reconciler
//!
//! Arbitrates between the cube's own reports and the locally tracked state.
//!
//! ```text
//!  connect             ──▶ AwaitingSnapshot
//!  next in-order move  ──▶ Synced
//!  valid snapshot      ──▶ Synced
//!  local reset         ──▶ Synced
//!  sequence gap        ──▶ Degraded
//!  invalid snapshot    ──▶ Degraded
//! ```
//!
//! Device moves are applied in every state. Entering `Degraded` asks the
//! transport for a fresh snapshot, once per visit.

use crate::domain::cube::{CubeState, StateError};
use crate::domain::models::{
    CubeEvent, Frame, Move, MoveEvent, MoveSource, StateSnapshot, SyncStatus,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How an incoming device sequence number relates to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ordering {
    Next,
    Gap(u16),
    Stale,
}

/// Serial-number comparison, so the cursor survives wraparound of the
/// 16-bit device counter.
fn order(cursor: u16, sequence: u16) -> Ordering {
    match sequence.wrapping_sub(cursor) as i16 {
        1 => Ordering::Next,
        delta if delta > 1 => Ordering::Gap(delta as u16 - 1),
        _ => Ordering::Stale,
    }
}

pub struct SyncReconciler {
    cube: CubeState,
    status: SyncStatus,
    cursor: u16,
    device_connected: bool,
    event_sender: mpsc::UnboundedSender<CubeEvent>,
}

impl SyncReconciler {
    pub fn new(event_sender: mpsc::UnboundedSender<CubeEvent>) -> Self {
        Self {
            cube: CubeState::new(),
            status: SyncStatus::AwaitingSnapshot,
            cursor: 0,
            device_connected: false,
            event_sender,
        }
    }

    pub fn cube(&self) -> &CubeState {
        &self.cube
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn is_device_connected(&self) -> bool {
        self.device_connected
    }

    /// The transport (re)connected to a cube. Sequencing restarts and the
    /// local state is unknown until the device reports it.
    pub fn on_connected(&mut self) {
        info!("Cube connected, waiting for state snapshot");
        self.device_connected = true;
        self.cursor = 0;
        self.set_status(SyncStatus::AwaitingSnapshot);
        self.emit(CubeEvent::SnapshotRequested);
    }

    pub fn on_disconnected(&mut self) {
        info!("Cube disconnected, virtual moves enabled");
        self.device_connected = false;
    }

    /// Put the cube back to solved and treat that as the agreed state.
    pub fn reset(&mut self) {
        self.cube.reset();
        self.set_status(SyncStatus::Synced);
    }

    pub fn on_frame(&mut self, frame: Frame) -> Result<(), StateError> {
        match frame {
            Frame::Move(event) => {
                self.on_move_event(event);
                Ok(())
            }
            Frame::Snapshot(snapshot) => self.on_snapshot(&snapshot),
            Frame::Battery(battery) => {
                debug!("Battery level {}%", battery.level);
                self.emit(CubeEvent::Battery(battery));
                Ok(())
            }
        }
    }

    /// Apply a move typed by the user. Only allowed while no device owns the
    /// cube state.
    pub fn apply_virtual(&mut self, mv: Move) -> Result<(), StateError> {
        if self.device_connected {
            return Err(StateError::DeviceAuthoritative);
        }
        self.apply(mv, MoveSource::Virtual, None);
        Ok(())
    }

    fn on_move_event(&mut self, event: MoveEvent) {
        let ordering = order(self.cursor, event.sequence);
        if ordering == Ordering::Stale {
            debug!(
                "Ignoring retransmitted move {} (seq {}, cursor {})",
                event.mv, event.sequence, self.cursor
            );
            return;
        }
        self.cursor = event.sequence;
        self.apply(event.mv, MoveSource::Device, Some(event.sequence));

        match ordering {
            Ordering::Gap(missed) => {
                warn!(
                    "Missed {} move(s) before seq {}, requesting snapshot",
                    missed, event.sequence
                );
                self.degrade();
            }
            _ => self.set_status(SyncStatus::Synced),
        }
    }

    fn on_snapshot(&mut self, snapshot: &StateSnapshot) -> Result<(), StateError> {
        let previous = self.cube.clone();
        if let Err(e) = self.cube.load_snapshot(snapshot) {
            warn!("Rejected state snapshot: {}", e);
            self.degrade();
            return Err(e);
        }

        if self.status != SyncStatus::AwaitingSnapshot {
            let drift = previous.facelet_diff(&self.cube);
            if drift > 0 {
                warn!("Snapshot corrected {} sticker(s) of drift", drift);
            }
        }
        if let Some(sequence) = snapshot.sequence {
            self.cursor = sequence;
        }
        self.set_status(SyncStatus::Synced);
        Ok(())
    }

    fn apply(&mut self, mv: Move, source: MoveSource, sequence: Option<u16>) {
        self.cube.apply_move(mv);
        self.emit(CubeEvent::MoveApplied {
            mv,
            source,
            sequence,
        });
        if self.cube.is_solved() {
            self.emit(CubeEvent::Solved);
        }
    }

    fn degrade(&mut self) {
        if self.status != SyncStatus::Degraded {
            self.set_status(SyncStatus::Degraded);
            self.emit(CubeEvent::SnapshotRequested);
        }
    }

    fn set_status(&mut self, status: SyncStatus) {
        if self.status != status {
            self.status = status;
            self.emit(CubeEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: CubeEvent) {
        let _ = self.event_sender.send(event);
    }
}
