pub mod config;
pub mod downloader;

pub use config::{AcquireConfig, NetworkConfig, ResolverMode};
pub use downloader::{
    AcquisitionError, AcquisitionSession, Acquirer, DownloadJob, EncodingOption, JobCoordinator,
    JobState, MediaInfo, SessionPhase, TrimSpec,
};

