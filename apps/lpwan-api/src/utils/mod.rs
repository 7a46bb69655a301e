//! 响应与 DTO 辅助函数

pub mod response;

pub use response::*;
