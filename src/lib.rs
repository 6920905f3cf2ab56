//! Smart-cube state tracking for the GiiKER Bluetooth cube.
//!
//! The [`domain`] layer models the cube and the sync rules; the
//! [`infrastructure`] layer decodes device frames and runs the session task.

pub mod domain;
pub mod infrastructure;
