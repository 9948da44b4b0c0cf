//! Host-facing contract and stdio bridge for embedding the worker.

pub mod contract;
pub mod effects;
pub mod stdio;

pub use effects::{ChannelHost, HostEffect};
pub use stdio::{run_bridge, run_stdio_bridge};
