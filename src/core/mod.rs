pub mod parser;
pub mod uploader;

pub use crate::domain::model::{Batch, Cell, DatasetInfo, DestinationPath, Record, UploadResult};
pub use crate::domain::ports::DocumentStore;
pub use crate::utils::error::Result;
