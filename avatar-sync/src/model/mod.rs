//! Data model shared by the core components

mod input;
mod notification;
mod slot;
mod state;

pub use input::*;
pub use notification::*;
pub use slot::*;
pub use state::*;
