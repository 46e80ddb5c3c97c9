//! IO modules - side effects (network, filesystem)

pub mod download;
pub mod transport;

pub use download::{BatchOutcome, DownloadError, DownloadOptions, DownloadResult, DownloadTask, Downloader};
pub use transport::{ArtifactTransport, FetchError, HttpTransport};
