// Serpwatch Infrastructure - Filesystem Adapters
// Implements: JobStore, ResultArchive, ArtifactStore, ResultRenderer

mod atomic;
pub mod artifact_store;
pub mod job_store;
pub mod renderer;
pub mod result_archive;

pub use artifact_store::LocalArtifactStore;
pub use job_store::FsJobStore;
pub use renderer::HtmlReportRenderer;
pub use result_archive::FsResultArchive;
