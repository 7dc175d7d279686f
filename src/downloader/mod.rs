// Acquisition pipeline - resolve, select, submit, poll, deliver

pub mod backends;
pub mod coordinator;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod traits;
pub mod utils;

pub use coordinator::JobCoordinator;
pub use errors::{AcquisitionError, ErrorKind, PollError, ResolutionError, SubmissionError};
pub use extractors::{build_resolver, Resolver, ScrapeResolver, ServiceResolver};
pub use models::{DownloadJob, EncodingOption, JobState, MediaInfo, TrimSpec};
pub use orchestrator::Acquirer;
pub use session::{AcquisitionSession, SessionPhase, SessionSnapshot};
pub use traits::{JobBackend, MetadataService, PageFetcher};
