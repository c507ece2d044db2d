#![deny(clippy::unwrap_used)]
#![deny(clippy::undocumented_unsafe_blocks)]
#![deny(unused_must_use)]
pub mod eskf;
pub mod frame;
pub mod lio;
mod utils;
