// Port Layer - Interfaces for external dependencies

pub mod artifact_store;
pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod renderer;
pub mod serp_provider;
pub mod staging_repository;
pub mod time_provider;

// Re-exports
pub use artifact_store::{ArtifactError, ArtifactStore, ResultArchive};
pub use id_provider::{IdProvider, UuidProvider};
pub use job_store::JobStore;
pub use renderer::{RenderError, ResultRenderer};
pub use serp_provider::{
    ContextParam, ProviderError, ProviderJobStatus, SearchRequest, SerpProvider,
};
pub use staging_repository::StagingRepository;
pub use time_provider::{SystemTimeProvider, TimeProvider};
