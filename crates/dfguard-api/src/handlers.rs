//! Request handlers.

pub mod analysis;
pub mod health;
pub mod logs;

pub use analysis::*;
pub use health::*;
pub use logs::*;
