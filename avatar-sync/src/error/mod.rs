//! Error types

mod api;
mod engine;
mod load;

pub use api::*;
pub use engine::*;
pub use load::*;
