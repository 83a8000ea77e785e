use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::applications::domain::{
    ApplyChannel, AuditEntry, AuthToken, CredentialBlob, DocumentBindings, DocumentId,
    DocumentKind, JobRecord, JobRecordBuilder, PostingId, RunContext, StoredConfig,
};
use crate::workflows::applications::gateway::{
    FeedPage, GatewayError, SessionGateway, SubmissionOutcome,
};
use crate::workflows::applications::store::{AuditLog, ConfigStore, StoreError, WaitlistStore};
use crate::workflows::applications::PipelineOrchestrator;

pub(super) const RESUME_ID: DocumentId = DocumentId(101);
pub(super) const COVER_ID: DocumentId = DocumentId(202);
pub(super) const TRANSCRIPT_ID: DocumentId = DocumentId(303);

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn bindings() -> DocumentBindings {
    DocumentBindings::standard(Some(RESUME_ID), Some(COVER_ID), Some(TRANSCRIPT_ID))
}

/// Internal, already open posting that only needs a resume.
pub(super) fn posting(id: u64, updated: DateTime<Utc>) -> JobRecordBuilder {
    JobRecord::builder(PostingId(id), updated)
        .posting_name(format!("Software Intern {id}"))
        .employer_name(format!("Employer {id}"))
        .applicable_kind("Job")
        .apply_channel(ApplyChannel::Internal)
        .require(DocumentKind::RESUME)
}

pub(super) fn context(now: DateTime<Utc>) -> RunContext {
    RunContext {
        watermark: at(2023, 9, 1),
        now,
        documents: bindings(),
        auth_token: AuthToken::new("csrf-token"),
    }
}

pub(super) fn stored_config(watermark: DateTime<Utc>) -> StoredConfig {
    let mut cookies = BTreeMap::new();
    cookies.insert("_session".to_string(), "stale".to_string());
    StoredConfig {
        auth_valid: true,
        watermark,
        feed_url: "https://platform.test/postings?sort=updated_at".to_string(),
        documents: bindings(),
        credentials: CredentialBlob(cookies),
    }
}

#[derive(Debug, Clone)]
pub(super) enum PageScript {
    Records(Vec<JobRecord>),
    /// A page whose entries were all skipped by the parser.
    Unreadable(usize),
    Malformed,
    Fail(u16),
    Unreachable,
}

/// Gateway that replays scripted pages and verdicts and records every call.
#[derive(Debug)]
pub(super) struct ScriptedGateway {
    token_available: bool,
    token_reachable: bool,
    pages: Vec<PageScript>,
    rejections: HashMap<PostingId, u16>,
    unreachable: HashSet<PostingId>,
    cookies: CredentialBlob,
    token_requests: Mutex<usize>,
    pages_requested: Mutex<Vec<u32>>,
    submissions: Mutex<Vec<(PostingId, Vec<DocumentId>)>>,
}

impl ScriptedGateway {
    pub(super) fn new() -> Self {
        let mut cookies = BTreeMap::new();
        cookies.insert("_session".to_string(), "refreshed".to_string());
        Self {
            token_available: true,
            token_reachable: true,
            pages: Vec::new(),
            rejections: HashMap::new(),
            unreachable: HashSet::new(),
            cookies: CredentialBlob(cookies),
            token_requests: Mutex::new(0),
            pages_requested: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn with_page(mut self, records: Vec<JobRecord>) -> Self {
        self.pages.push(PageScript::Records(records));
        self
    }

    pub(super) fn with_script(mut self, script: PageScript) -> Self {
        self.pages.push(script);
        self
    }

    pub(super) fn rejecting(mut self, id: u64, status: u16) -> Self {
        self.rejections.insert(PostingId(id), status);
        self
    }

    pub(super) fn unreachable_on(mut self, id: u64) -> Self {
        self.unreachable.insert(PostingId(id));
        self
    }

    pub(super) fn without_token(mut self) -> Self {
        self.token_available = false;
        self
    }

    pub(super) fn token_unreachable(mut self) -> Self {
        self.token_reachable = false;
        self
    }

    pub(super) fn submitted_ids(&self) -> Vec<PostingId> {
        self.submissions
            .lock()
            .expect("gateway mutex poisoned")
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub(super) fn submissions(&self) -> Vec<(PostingId, Vec<DocumentId>)> {
        self.submissions
            .lock()
            .expect("gateway mutex poisoned")
            .clone()
    }

    pub(super) fn pages_requested(&self) -> Vec<u32> {
        self.pages_requested
            .lock()
            .expect("gateway mutex poisoned")
            .clone()
    }

    pub(super) fn token_requests(&self) -> usize {
        *self.token_requests.lock().expect("gateway mutex poisoned")
    }

    pub(super) fn refreshed_cookies(&self) -> CredentialBlob {
        self.cookies.clone()
    }
}

impl SessionGateway for ScriptedGateway {
    fn fetch_auth_token(&self) -> Result<AuthToken, GatewayError> {
        *self.token_requests.lock().expect("gateway mutex poisoned") += 1;
        if !self.token_reachable {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        if self.token_available {
            Ok(AuthToken::new("csrf-token"))
        } else {
            Err(GatewayError::MissingToken)
        }
    }

    fn fetch_page(&self, _feed_url: &str, page: u32) -> Result<Option<FeedPage>, GatewayError> {
        self.pages_requested
            .lock()
            .expect("gateway mutex poisoned")
            .push(page);
        match self.pages.get(page as usize - 1) {
            Some(PageScript::Records(records)) => Ok(Some(FeedPage::new(records.clone()))),
            Some(PageScript::Unreadable(skipped)) => Ok(Some(FeedPage {
                records: Vec::new(),
                skipped: *skipped,
            })),
            Some(PageScript::Malformed) | None => Ok(None),
            Some(PageScript::Fail(status)) => Err(GatewayError::Rejected { status: *status }),
            Some(PageScript::Unreachable) => {
                Err(GatewayError::Transport("operation timed out".to_string()))
            }
        }
    }

    fn submit(
        &self,
        record: &JobRecord,
        documents: &[DocumentId],
        token: &AuthToken,
    ) -> Result<SubmissionOutcome, GatewayError> {
        assert_eq!(token.expose(), "csrf-token");
        self.submissions
            .lock()
            .expect("gateway mutex poisoned")
            .push((record.id(), documents.to_vec()));
        if self.unreachable.contains(&record.id()) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        match self.rejections.get(&record.id()) {
            Some(status) => Ok(SubmissionOutcome::Rejected { status: *status }),
            None => Ok(SubmissionOutcome::Accepted),
        }
    }

    fn credentials(&self) -> CredentialBlob {
        self.cookies.clone()
    }
}

/// Shared record of store writes, in order.
#[derive(Debug, Clone, Default)]
pub(super) struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    fn push(&self, entry: &'static str) {
        self.0.lock().expect("journal mutex poisoned").push(entry);
    }

    pub(super) fn entries(&self) -> Vec<&'static str> {
        self.0.lock().expect("journal mutex poisoned").clone()
    }
}

#[derive(Debug)]
pub(super) struct MemoryConfigStore {
    config: Mutex<StoredConfig>,
    journal: Journal,
    fail_save: bool,
}

impl MemoryConfigStore {
    pub(super) fn new(config: StoredConfig, journal: Journal) -> Self {
        Self {
            config: Mutex::new(config),
            journal,
            fail_save: false,
        }
    }

    pub(super) fn failing(config: StoredConfig, journal: Journal) -> Self {
        Self {
            fail_save: true,
            ..Self::new(config, journal)
        }
    }

    pub(super) fn current(&self) -> StoredConfig {
        self.config.lock().expect("config mutex poisoned").clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<StoredConfig, StoreError> {
        Ok(self.current())
    }

    fn save(&self, config: &StoredConfig) -> Result<(), StoreError> {
        if self.fail_save {
            return Err(StoreError::Io {
                path: PathBuf::from("conf.json"),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.journal.push("config");
        *self.config.lock().expect("config mutex poisoned") = config.clone();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryWaitlist {
    records: Mutex<Vec<JobRecord>>,
    journal: Journal,
}

impl MemoryWaitlist {
    pub(super) fn new(records: Vec<JobRecord>, journal: Journal) -> Self {
        Self {
            records: Mutex::new(records),
            journal,
        }
    }

    pub(super) fn ids(&self) -> Vec<PostingId> {
        self.records
            .lock()
            .expect("waitlist mutex poisoned")
            .iter()
            .map(JobRecord::id)
            .collect()
    }
}

impl WaitlistStore for MemoryWaitlist {
    fn load(&self) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.records.lock().expect("waitlist mutex poisoned").clone())
    }

    fn save(&self, records: &[JobRecord]) -> Result<(), StoreError> {
        self.journal.push("waitlist");
        *self.records.lock().expect("waitlist mutex poisoned") = records.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    journal: Journal,
}

impl MemoryAuditLog {
    pub(super) fn new(entries: Vec<AuditEntry>, journal: Journal) -> Self {
        Self {
            entries: Mutex::new(entries),
            journal,
        }
    }

    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entries: &[AuditEntry]) -> Result<(), StoreError> {
        self.journal.push("audit");
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .extend_from_slice(entries);
        Ok(())
    }

    fn applied_ids(&self) -> Result<HashSet<PostingId>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|entry| entry.posting_id)
            .collect())
    }
}

pub(super) type TestOrchestrator =
    PipelineOrchestrator<ScriptedGateway, MemoryConfigStore, MemoryWaitlist, MemoryAuditLog>;

pub(super) struct Harness {
    pub(super) gateway: Arc<ScriptedGateway>,
    pub(super) config: Arc<MemoryConfigStore>,
    pub(super) waitlist: Arc<MemoryWaitlist>,
    pub(super) audit: Arc<MemoryAuditLog>,
    pub(super) journal: Journal,
    pub(super) orchestrator: TestOrchestrator,
}

pub(super) fn harness(
    gateway: ScriptedGateway,
    config: StoredConfig,
    waitlist: Vec<JobRecord>,
) -> Harness {
    let journal = Journal::default();
    build_harness(
        gateway,
        MemoryConfigStore::new(config, journal.clone()),
        waitlist,
        Vec::new(),
        journal,
    )
}

pub(super) fn build_harness(
    gateway: ScriptedGateway,
    config: MemoryConfigStore,
    waitlist: Vec<JobRecord>,
    audit: Vec<AuditEntry>,
    journal: Journal,
) -> Harness {
    let gateway = Arc::new(gateway);
    let config = Arc::new(config);
    let waitlist = Arc::new(MemoryWaitlist::new(waitlist, journal.clone()));
    let audit = Arc::new(MemoryAuditLog::new(audit, journal.clone()));
    let orchestrator = PipelineOrchestrator::new(
        gateway.clone(),
        config.clone(),
        waitlist.clone(),
        audit.clone(),
    );

    Harness {
        gateway,
        config,
        waitlist,
        audit,
        journal,
        orchestrator,
    }
}
