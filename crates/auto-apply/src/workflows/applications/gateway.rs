use std::fmt::Debug;

use super::domain::{AuthToken, CredentialBlob, DocumentId, JobRecord};

/// Result of one submission call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    /// Any non-success status. The platform uses the same status family for an
    /// expired session and a malformed submission, so callers treat both as a
    /// credential failure.
    Rejected { status: u16 },
}

/// One feed response that carried a result collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub records: Vec<JobRecord>,
    /// Entries present in the response that could not be mapped into records.
    pub skipped: usize,
}

impl FeedPage {
    pub fn new(records: Vec<JobRecord>) -> Self {
        Self {
            records,
            skipped: 0,
        }
    }

    /// No entries at all, readable or not: the feed has run out.
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty() && self.skipped == 0
    }
}

/// Failure talking to the platform outside of a submission verdict.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("platform rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("platform unreachable: {0}")]
    Transport(String),
    #[error("landing page did not carry an anti-forgery token")]
    MissingToken,
    #[error("invalid feed url '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },
}

impl GatewayError {
    /// The platform answered and refused the session. Anything else means it was
    /// never reached, and says nothing about the cookies.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::MissingToken)
    }
}

/// Authenticated session against the recruiting platform.
///
/// Calls block until the platform answers.
pub trait SessionGateway: Debug {
    /// Fetch the anti-forgery token. Called once per run before any submission.
    fn fetch_auth_token(&self) -> Result<AuthToken, GatewayError>;

    /// Fetch one page of the feed, newest first. `Ok(None)` means the response
    /// carried no result collection.
    fn fetch_page(&self, feed_url: &str, page: u32) -> Result<Option<FeedPage>, GatewayError>;

    fn submit(
        &self,
        record: &JobRecord,
        documents: &[DocumentId],
        token: &AuthToken,
    ) -> Result<SubmissionOutcome, GatewayError>;

    /// Current cookie state, including anything the platform refreshed.
    fn credentials(&self) -> CredentialBlob;
}
