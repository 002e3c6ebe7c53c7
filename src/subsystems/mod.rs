//! Long-running subsystems started by the binary.

pub mod comms;
