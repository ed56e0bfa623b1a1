use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::work::Instruction;

/// Errors raised while building an active object's dispatch table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Work instruction {instruction} is out of range (valid: 0..{max})")]
    InstructionOutOfRange { instruction: Instruction, max: Instruction },
}

/// Errors related to starting an active object.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Failed to spawn thread for active object: {0}")]
    Thread(#[from] io::Error),
    #[error("Handler registration failed: {0}")]
    Registration(#[from] RegistrationError),
}

/// Errors related to shutting an active object down.
#[derive(Error, Debug, Clone)]
pub enum ShutdownError {
    #[error("Timed out after {0:?} waiting for the active object thread to stop")]
    Timeout(Duration),
    #[error("Active object thread panicked: {0}")]
    Panicked(String),
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
