mod auth;
mod client;
pub mod codec;
mod diff;
mod error;
mod logger;
pub mod protocol;
mod transport;
pub mod tree;
mod types;

pub use auth::{extract_client_credentials, extract_client_credentials_from_text};
pub use client::{DaikinClient, DaikinClientBuilder};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{build_mode_patch, UPDATE_INTERVAL};
pub use reqwest::Method;
pub use tree::ParamNode;
pub use types::*;
