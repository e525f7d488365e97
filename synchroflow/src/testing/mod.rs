//! Testing utilities for code that registers synchronizations.
//!
//! This module provides:
//! - A shared notification log
//! - Recording, failing and panicking synchronizations
//! - A synchronization that registers another one mid-dispatch

mod mocks;

pub use mocks::{
    FailingSynchronization, NotificationLog, PanickingSynchronization,
    RecordingSynchronization, RegisteringSynchronization,
};
