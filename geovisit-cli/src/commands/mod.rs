//! CLI command implementations.

pub mod common;
pub mod distance;
pub mod init;
pub mod replay;
pub mod significant;
