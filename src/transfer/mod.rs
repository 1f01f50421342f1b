pub mod download;
pub mod progress;
pub mod upload;
pub mod validation;

pub use download::Downloader;
pub use progress::{ProgressFormatter, ProgressStats, ProgressTracker};
pub use upload::{UploadOptions, UploadRequest, Uploader};
pub use validation::validate_record;
