//! Cube Session Module
//!
//! The single task that owns the cube. Transport notifications and user
//! commands arrive over one channel and are handled strictly in arrival order;
//! readers observe the result through a `watch` channel.

use crate::domain::cube::{Facelets, StateError};
use crate::domain::models::{format_sequence, BatteryStatus, CubeEvent, Frame, Move, SyncStatus};
use crate::domain::reconciler::SyncReconciler;
use crate::domain::scramble::{GuideStep, ScrambleGenerator, ScrambleGuide};
use crate::infrastructure::bluetooth::protocol::{self, DecodeError};
use rand::rngs::StdRng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Signals from the BLE transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// One raw notification payload.
    Packet(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Transport(TransportEvent),
    VirtualMove(Move),
    Reset,
    /// Generate a scramble of the given length.
    Scramble(usize),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("dropped frame: {0}")]
    Decode(#[from] DecodeError),
    #[error("rejected: {0}")]
    State(#[from] StateError),
}

/// Read model published after every handled command.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeView {
    pub facelets: Facelets,
    pub solved: bool,
    pub status: SyncStatus,
    pub battery: Option<BatteryStatus>,
}

impl Default for CubeView {
    fn default() -> Self {
        Self {
            facelets: Facelets::solved(),
            solved: true,
            status: SyncStatus::AwaitingSnapshot,
            battery: None,
        }
    }
}

/// Client side of a running session.
pub struct SessionHandle {
    pub commands: mpsc::UnboundedSender<SessionCommand>,
    pub view: watch::Receiver<CubeView>,
    pub task: JoinHandle<()>,
}

pub struct CubeSession {
    reconciler: SyncReconciler,
    scrambler: ScrambleGenerator<StdRng>,
    guide: Option<ScrambleGuide>,
    battery: Option<BatteryStatus>,
    event_sender: mpsc::UnboundedSender<CubeEvent>,
    view_sender: watch::Sender<CubeView>,
}

impl CubeSession {
    pub fn new(
        scrambler: ScrambleGenerator<StdRng>,
        event_sender: mpsc::UnboundedSender<CubeEvent>,
    ) -> (Self, watch::Receiver<CubeView>) {
        let (view_sender, view_receiver) = watch::channel(CubeView::default());
        let session = Self {
            reconciler: SyncReconciler::new(event_sender.clone()),
            scrambler,
            guide: None,
            battery: None,
            event_sender,
            view_sender,
        };
        (session, view_receiver)
    }

    /// Start the session on the current tokio runtime.
    pub fn spawn(
        scrambler: ScrambleGenerator<StdRng>,
        event_sender: mpsc::UnboundedSender<CubeEvent>,
    ) -> SessionHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (session, view) = Self::new(scrambler, event_sender);
        let task = tokio::spawn(session.run(receiver));
        SessionHandle {
            commands,
            view,
            task,
        }
    }

    pub fn reconciler(&self) -> &SyncReconciler {
        &self.reconciler
    }

    pub fn guide(&self) -> Option<&ScrambleGuide> {
        self.guide.as_ref()
    }

    /// Handle commands until every sender is dropped.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("Cube session started");
        while let Some(command) = commands.recv().await {
            match self.handle(command) {
                Ok(()) => {}
                Err(SessionError::Decode(e)) => debug!("Dropped frame: {}", e),
                Err(e) => warn!("{}", e),
            }
        }
        info!("Cube session stopped");
    }

    pub fn handle(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        let result = match command {
            SessionCommand::Transport(event) => self.on_transport(event),
            SessionCommand::VirtualMove(mv) => self
                .reconciler
                .apply_virtual(mv)
                .map_err(SessionError::from),
            SessionCommand::Reset => {
                info!("Cube reset to solved");
                self.guide = None;
                self.reconciler.reset();
                Ok(())
            }
            SessionCommand::Scramble(length) => self.scramble(length),
        };
        self.publish();
        result
    }

    fn on_transport(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::Connected => {
                self.reconciler.on_connected();
                Ok(())
            }
            TransportEvent::Disconnected => {
                self.reconciler.on_disconnected();
                if self.guide.take().is_some() {
                    info!("Guided scramble abandoned on disconnect");
                }
                Ok(())
            }
            TransportEvent::Packet(raw) => {
                let frame = protocol::decode(&raw)?;
                self.on_frame(frame)
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        if let Frame::Battery(battery) = &frame {
            self.battery = Some(*battery);
        }
        let performed = match &frame {
            Frame::Move(event) => Some(event.mv),
            _ => None,
        };

        let cursor = self.reconciler.cursor();
        self.reconciler.on_frame(frame)?;

        // The cursor only moves for turns the device actually made
        if let Some(mv) = performed {
            if self.reconciler.cursor() != cursor {
                self.follow_guide(mv);
            }
        }
        Ok(())
    }

    fn scramble(&mut self, length: usize) -> Result<(), SessionError> {
        let sequence = self.scrambler.generate(length);
        info!("Scramble: {}", format_sequence(&sequence));
        self.emit(CubeEvent::Scrambled(sequence.clone()));

        if self.reconciler.is_device_connected() {
            let guide = ScrambleGuide::new(sequence);
            self.emit_progress(&guide);
            self.guide = (!guide.is_complete()).then_some(guide);
        } else {
            for mv in sequence {
                self.reconciler.apply_virtual(mv)?;
            }
        }
        Ok(())
    }

    fn follow_guide(&mut self, mv: Move) {
        let Some(guide) = self.guide.as_mut() else {
            return;
        };
        let step = guide.record(mv);
        if let GuideStep::Undo(undo) = step {
            debug!("Scramble off track, undo with {}", undo);
        }
        if let Some(guide) = self.guide.as_ref() {
            self.emit_progress(guide);
        }
        if step == GuideStep::Complete {
            info!("Guided scramble complete");
            self.guide = None;
        }
    }

    fn emit_progress(&self, guide: &ScrambleGuide) {
        self.emit(CubeEvent::ScrambleProgress {
            completed: guide.completed(),
            total: guide.total(),
            next: guide.next_step(),
        });
    }

    fn emit(&self, event: CubeEvent) {
        let _ = self.event_sender.send(event);
    }

    fn publish(&self) {
        let cube = self.reconciler.cube();
        self.view_sender.send_replace(CubeView {
            facelets: cube.facelets(),
            solved: cube.is_solved(),
            status: self.reconciler.status(),
            battery: self.battery,
        });
    }
}
