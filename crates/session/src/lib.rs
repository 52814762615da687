// crates/session/src/lib.rs
//! Session lifecycle controller for GEO analysis jobs.
//!
//! Reconciles three entry paths — starting a new job, re-opening a
//! finished one, re-running with identical prompts — into one race-free
//! view state. The controller polls the backend status endpoint at a
//! fixed cadence, infers liveness for re-selected sessions with a
//! results-then-status probe, discards responses for superseded
//! sessions, and emits exactly one terminal event per session lifetime.

pub mod cache;
pub mod controller;
pub mod error;
pub mod state;

mod poller;
mod resolver;

pub use cache::{CacheStore, InvalidateCache, MemoryCache, NoopCache, ReadGroup};
pub use controller::SessionController;
pub use error::FailureReason;
pub use state::{PollConfig, SessionEvent, ViewState};
