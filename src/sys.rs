//! Interfaces to the operating system's windowing facilities.

pub mod error;
pub mod geometry;
pub mod screen;
pub mod scripted;
pub mod window_server;

pub use error::SysError;
