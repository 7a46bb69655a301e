//! Handlers 模块

pub mod network_types;
pub mod networks;
pub mod runtime;
pub mod system;

pub use network_types::*;
pub use networks::*;
pub use runtime::*;
pub use system::*;
