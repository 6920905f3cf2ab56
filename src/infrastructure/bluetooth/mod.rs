//! Bluetooth Module
//!
//! Turns the GiiKER cube's BLE notifications into cube state.
//!
//! ## Architecture
//!
//! ```text
//!  transport (BLE notifications, connect / disconnect)
//!        │  TransportEvent
//!        ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                      CubeSession                         │
//! │  (single task, owns the reconciler and scramble guide)   │
//! └──────┬──────────────────────┬───────────────────────────┘
//!        │                      │
//!        ▼                      ▼
//! ┌────────────┐        ┌────────────────┐
//! │  Protocol  │        │ SyncReconciler │──▶ CubeEvent
//! │            │ Frame  │                │
//! │ - XOR key  │───────▶│ - sequencing   │──▶ CubeView (watch)
//! │ - checksum │        │ - snapshots    │
//! └────────────┘        └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Frame layout, deobfuscation and validation
//! - [`service`] - Session task coordinating decoding and reconciliation

pub mod protocol;
pub mod service;

// Re-export main service for convenience
pub use service::{CubeSession, CubeView, SessionCommand, SessionHandle, TransportEvent};
