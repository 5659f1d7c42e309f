//! Avatar state synchronization
//!
//! Drives the animated assistant avatars of the chat widget: binds runtimes
//! to their hosting surfaces, serializes semantic-state writes into the
//! animation's inputs, forwards the "open panel" event and maps page
//! notifications onto avatar states.

pub mod arbiter;
pub mod assistant;
pub mod binder;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod model;
pub mod reconciler;

mod context;

pub use context::*;
