//! The per-job pipeline and everything it reports through.

pub mod controller;
pub mod error;
pub mod messages;
pub mod parts;
pub mod progress;
pub mod report;
pub mod status;
pub mod transport;
pub mod upload;

pub use controller::{Pipeline, PipelineConfig};
pub use error::PipelineError;
pub use parts::PartMetadata;
pub use progress::{ProgressReader, ProgressSnapshot, UploadProgress};
pub use report::{JobReport, PartOutcome, UploadResult};
pub use status::StatusMessage;
pub use transport::{ChatTransport, MediaUpload, MessageRef, TransportError, UploadKind};
pub use upload::UploadReporter;
