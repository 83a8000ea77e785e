use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform identifier of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostingId(pub u64);

impl fmt::Display for PostingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document category a posting may demand (resume, cover letter, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKind(pub u32);

impl DocumentKind {
    pub const RESUME: Self = Self(1);
    pub const COVER_LETTER: Self = Self(2);
    pub const TRANSCRIPT: Self = Self(3);

    pub const fn label(self) -> &'static str {
        match self.0 {
            1 => "resume",
            2 => "cover letter",
            3 => "transcript",
            _ => "other document",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.0)
    }
}

/// Identifier of one of the user's uploaded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

/// Maps each document category the user can satisfy to the document to send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBindings(BTreeMap<DocumentKind, DocumentId>);

impl DocumentBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for the three categories the platform knows about. A missing id
    /// leaves the category unbound.
    pub fn standard(
        resume: Option<DocumentId>,
        cover_letter: Option<DocumentId>,
        transcript: Option<DocumentId>,
    ) -> Self {
        let mut bindings = Self::new();
        for (kind, id) in [
            (DocumentKind::RESUME, resume),
            (DocumentKind::COVER_LETTER, cover_letter),
            (DocumentKind::TRANSCRIPT, transcript),
        ] {
            if let Some(id) = id {
                bindings = bindings.bind(kind, id);
            }
        }
        bindings
    }

    pub fn bind(mut self, kind: DocumentKind, id: DocumentId) -> Self {
        self.0.insert(kind, id);
        self
    }

    pub fn get(&self, kind: DocumentKind) -> Option<DocumentId> {
        self.0.get(&kind).copied()
    }
}

/// Whether the platform accepts the application itself or redirects elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyChannel {
    Internal,
    External,
}

/// Normalized, immutable view of one posting from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    id: PostingId,
    apply_opens_at: Option<DateTime<Utc>>,
    last_updated_at: DateTime<Utc>,
    employer_name: String,
    posting_name: String,
    applicable_kind: String,
    apply_channel: ApplyChannel,
    required_documents: Vec<DocumentKind>,
}

impl JobRecord {
    pub fn builder(id: PostingId, last_updated_at: DateTime<Utc>) -> JobRecordBuilder {
        JobRecordBuilder {
            id,
            last_updated_at,
            apply_opens_at: None,
            employer_name: String::new(),
            posting_name: String::new(),
            applicable_kind: String::new(),
            apply_channel: ApplyChannel::Internal,
            required_documents: Vec::new(),
        }
    }

    pub fn id(&self) -> PostingId {
        self.id
    }

    pub fn apply_opens_at(&self) -> Option<DateTime<Utc>> {
        self.apply_opens_at
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn employer_name(&self) -> &str {
        &self.employer_name
    }

    pub fn posting_name(&self) -> &str {
        &self.posting_name
    }

    pub fn applicable_kind(&self) -> &str {
        &self.applicable_kind
    }

    pub fn apply_channel(&self) -> ApplyChannel {
        self.apply_channel
    }

    pub fn required_documents(&self) -> &[DocumentKind] {
        &self.required_documents
    }
}

#[derive(Debug, Clone)]
pub struct JobRecordBuilder {
    id: PostingId,
    last_updated_at: DateTime<Utc>,
    apply_opens_at: Option<DateTime<Utc>>,
    employer_name: String,
    posting_name: String,
    applicable_kind: String,
    apply_channel: ApplyChannel,
    required_documents: Vec<DocumentKind>,
}

impl JobRecordBuilder {
    pub fn posting_name(mut self, name: impl Into<String>) -> Self {
        self.posting_name = name.into();
        self
    }

    pub fn employer_name(mut self, name: impl Into<String>) -> Self {
        self.employer_name = name.into();
        self
    }

    pub fn applicable_kind(mut self, kind: impl Into<String>) -> Self {
        self.applicable_kind = kind.into();
        self
    }

    pub fn apply_channel(mut self, channel: ApplyChannel) -> Self {
        self.apply_channel = channel;
        self
    }

    pub fn apply_opens_at(mut self, opens_at: Option<DateTime<Utc>>) -> Self {
        self.apply_opens_at = opens_at;
        self
    }

    /// Add a required document kind; repeated kinds keep their first position.
    pub fn require(mut self, kind: DocumentKind) -> Self {
        if !self.required_documents.contains(&kind) {
            self.required_documents.push(kind);
        }
        self
    }

    pub fn build(self) -> JobRecord {
        JobRecord {
            id: self.id,
            apply_opens_at: self.apply_opens_at,
            last_updated_at: self.last_updated_at,
            employer_name: self.employer_name,
            posting_name: self.posting_name,
            applicable_kind: self.applicable_kind,
            apply_channel: self.apply_channel,
            required_documents: self.required_documents,
        }
    }
}

/// Anti-forgery token required on submission calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Cookie name/value pairs the platform session runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBlob(pub BTreeMap<String, String>);

impl CredentialBlob {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Values shared by every decision and submission within one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub watermark: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub documents: DocumentBindings,
    pub auth_token: AuthToken,
}

/// Configuration-side persistent state, round-tripped through the config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub auth_valid: bool,
    pub watermark: DateTime<Utc>,
    pub feed_url: String,
    pub documents: DocumentBindings,
    pub credentials: CredentialBlob,
}

/// One line of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub posting_id: PostingId,
    pub posting_name: String,
    pub employer_name: String,
    pub applied_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn for_record(record: &JobRecord, applied_at: DateTime<Utc>) -> Self {
        Self {
            posting_id: record.id(),
            posting_name: record.posting_name().to_string(),
            employer_name: record.employer_name().to_string(),
            applied_at,
        }
    }
}

/// Parse the timestamp shapes seen in feed data and stored state: RFC 3339,
/// naive ISO date-times (read as UTC) and plain dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    None
}
