pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;
pub mod web;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::AppConfig;

pub use adapters::{Credentials, FirebaseStore};
pub use crate::core::{parser::parse_csv, uploader::UploadOrchestrator};
pub use domain::model::{Batch, Cell, DestinationPath, UploadResult};
pub use utils::error::{Result, UploaderError};
