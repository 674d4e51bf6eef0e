use super::args::*;

mod dispatch;
pub mod replay;
pub mod score;
pub mod script;
pub mod validate;

pub use dispatch::dispatch;
