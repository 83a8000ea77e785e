//! Application decision engine and run orchestration.
//!
//! The engine classifies each posting; the orchestrator replays the waitlist, walks the
//! feed down to the watermark, and computes the state the next run starts from. All
//! platform and storage access goes through the traits in `gateway` and `store`.

pub mod decision;
pub mod domain;
pub mod gateway;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
mod tests;

pub use decision::{decide, Action};
pub use domain::{
    parse_timestamp, ApplyChannel, AuditEntry, AuthToken, CredentialBlob, DocumentBindings,
    DocumentId, DocumentKind, JobRecord, JobRecordBuilder, PostingId, RunContext, StoredConfig,
};
pub use gateway::{FeedPage, GatewayError, SessionGateway, SubmissionOutcome};
pub use orchestrator::{PipelineOrchestrator, RunOutcome, RunPhase, RunReport, RunStatus, RunTally};
pub use store::{refresh_credentials, AuditLog, ConfigStore, StoreError, WaitlistStore};
