//! Crash-safe persistence for the latest model snapshot.

mod atomic;
mod persistence;

pub use atomic::atomic_write;
pub use persistence::{ModelArtifact, PersistenceError, PersistenceManager, ScalarState};
