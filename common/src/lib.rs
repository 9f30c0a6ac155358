#![allow(clippy::too_many_arguments)]

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod interval;
pub mod logging;
pub mod messages;
pub mod model;
pub mod network;

pub use error::OverlayError;
