use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::decision::{decide, Action};
use super::domain::{AuditEntry, JobRecord, PostingId, RunContext, StoredConfig};
use super::gateway::{GatewayError, SessionGateway, SubmissionOutcome};
use super::store::{AuditLog, ConfigStore, StoreError, WaitlistStore};

/// Where a run currently is. `Done`, `AuthFailed` and `Interrupted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    ReplayingWaitlist,
    ScanningFeed,
    Finalizing,
    Done,
    AuthFailed,
    /// The platform could not be reached.
    Interrupted,
}

impl RunPhase {
    fn halted_by(err: &GatewayError) -> Self {
        if err.is_credential_failure() {
            Self::AuthFailed
        } else {
            Self::Interrupted
        }
    }
}

/// Terminal status surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The platform rejected a request during this run.
    CredentialExpired,
    /// Credentials were already marked invalid; the platform was not contacted.
    StaleCredentials,
    /// A network failure cut the run short. Credentials and watermark are kept.
    Interrupted,
}

impl RunStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CredentialExpired => "credentials expired",
            Self::StaleCredentials => "credentials need refreshing",
            Self::Interrupted => "interrupted by a network failure",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub submitted: usize,
    pub deferred: usize,
    pub rejected_external: usize,
    pub rejected_document: usize,
    pub already_applied: usize,
    pub unreadable_entries: usize,
    pub pages_scanned: u32,
    pub reached_watermark: bool,
}

/// Next persistent state computed by a run, before it is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub config: StoredConfig,
    pub waitlist: Vec<JobRecord>,
    pub audit: Vec<AuditEntry>,
    pub tally: RunTally,
}

/// What the operator sees once a run is committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub watermark: DateTime<Utc>,
    pub tally: RunTally,
    pub applied: Vec<AuditEntry>,
    pub deferred: Vec<PostingId>,
}

impl RunReport {
    fn stale(config: &StoredConfig) -> Self {
        Self {
            status: RunStatus::StaleCredentials,
            watermark: config.watermark,
            tally: RunTally::default(),
            applied: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} applied, {} deferred, {} external, {} missing documents, {} already applied, {} page(s) scanned",
            self.status.label(),
            self.tally.submitted,
            self.deferred.len(),
            self.tally.rejected_external,
            self.tally.rejected_document,
            self.tally.already_applied,
            self.tally.pages_scanned,
        )
    }
}

impl From<RunOutcome> for RunReport {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            status: outcome.status,
            watermark: outcome.config.watermark,
            deferred: outcome.waitlist.iter().map(JobRecord::id).collect(),
            applied: outcome.audit,
            tally: outcome.tally,
        }
    }
}

enum Step {
    Continue,
    Halt(JobRecord, RunPhase),
}

#[derive(Default)]
struct RunLedger {
    deferred: Vec<JobRecord>,
    deferred_ids: HashSet<PostingId>,
    audit: Vec<AuditEntry>,
    submitted: HashSet<PostingId>,
    tally: RunTally,
}

impl RunLedger {
    fn defer(&mut self, record: JobRecord) {
        if self.carry(record) {
            self.tally.deferred += 1;
        }
    }

    fn carry(&mut self, record: JobRecord) -> bool {
        if self.deferred_ids.insert(record.id()) {
            self.deferred.push(record);
            true
        } else {
            false
        }
    }

    fn record_submission(&mut self, entry: AuditEntry) {
        self.submitted.insert(entry.posting_id);
        self.tally.submitted += 1;
        self.audit.push(entry);
    }
}

/// Drives one run: waitlist replay, feed scan, finalize, commit.
pub struct PipelineOrchestrator<G, C, W, A> {
    gateway: Arc<G>,
    config_store: Arc<C>,
    waitlist_store: Arc<W>,
    audit_log: Arc<A>,
}

impl<G, C, W, A> PipelineOrchestrator<G, C, W, A>
where
    G: SessionGateway,
    C: ConfigStore,
    W: WaitlistStore,
    A: AuditLog,
{
    pub fn new(
        gateway: Arc<G>,
        config_store: Arc<C>,
        waitlist_store: Arc<W>,
        audit_log: Arc<A>,
    ) -> Self {
        Self {
            gateway,
            config_store,
            waitlist_store,
            audit_log,
        }
    }

    /// Execute a full run started at `now` and commit the resulting state.
    pub fn run(&self, now: DateTime<Utc>) -> Result<RunReport, StoreError> {
        let config = self.config_store.load()?;
        if !config.auth_valid {
            warn!("stored credentials are marked invalid; refresh them before the next run");
            return Ok(RunReport::stale(&config));
        }

        let waitlist = self.waitlist_store.load()?;
        let applied = self.audit_log.applied_ids()?;
        info!(
            waitlisted = waitlist.len(),
            watermark = %config.watermark,
            "starting run"
        );

        let outcome = self.execute(&config, waitlist, &applied, now);
        self.commit(&outcome)?;

        let report = RunReport::from(outcome);
        info!(status = report.status.label(), "{}", report.summary());
        Ok(report)
    }

    /// Compute the next state without touching the stores.
    pub fn execute(
        &self,
        config: &StoredConfig,
        waitlist: Vec<JobRecord>,
        applied: &HashSet<PostingId>,
        now: DateTime<Utc>,
    ) -> RunOutcome {
        let mut ledger = RunLedger::default();

        let auth_token = match self.gateway.fetch_auth_token() {
            Ok(token) => token,
            Err(err) => {
                let phase = RunPhase::halted_by(&err);
                warn!(error = %err, ?phase, "could not obtain anti-forgery token");
                return self.finalize(config, phase, ledger, waitlist, now);
            }
        };

        let context = RunContext {
            watermark: config.watermark,
            now,
            documents: config.documents.clone(),
            auth_token,
        };

        let mut phase = RunPhase::ReplayingWaitlist;
        let mut carried = Vec::new();
        let mut pending = waitlist.into_iter();
        while let Some(record) = pending.next() {
            if let Step::Halt(record, halted) = self.process(record, &context, applied, &mut ledger)
            {
                carried.push(record);
                carried.extend(pending.by_ref());
                phase = halted;
                break;
            }
        }

        if phase == RunPhase::ReplayingWaitlist {
            phase = RunPhase::ScanningFeed;
            debug!(
                ?phase,
                submitted = ledger.tally.submitted,
                deferred = ledger.tally.deferred,
                "waitlist replayed"
            );
            phase = self.scan_feed(config, &context, applied, &mut ledger);
        }

        self.finalize(config, phase, ledger, carried, now)
    }

    fn scan_feed(
        &self,
        config: &StoredConfig,
        context: &RunContext,
        applied: &HashSet<PostingId>,
        ledger: &mut RunLedger,
    ) -> RunPhase {
        let mut page = 1u32;
        loop {
            let feed_page = match self.gateway.fetch_page(&config.feed_url, page) {
                Ok(Some(feed_page)) if !feed_page.is_exhausted() => feed_page,
                Ok(_) => {
                    debug!(page, "feed page carried no results, ending scan");
                    return RunPhase::Finalizing;
                }
                Err(err) => {
                    let phase = RunPhase::halted_by(&err);
                    warn!(page, error = %err, ?phase, "feed request failed");
                    return phase;
                }
            };
            ledger.tally.pages_scanned += 1;
            ledger.tally.unreadable_entries += feed_page.skipped;

            for record in feed_page.records {
                if record.last_updated_at() <= context.watermark {
                    debug!(page, posting = %record.id(), "reached watermark, ending scan");
                    ledger.tally.reached_watermark = true;
                    return RunPhase::Finalizing;
                }

                if let Step::Halt(_, halted) = self.process(record, context, applied, ledger) {
                    return halted;
                }
            }

            page += 1;
        }
    }

    fn process(
        &self,
        record: JobRecord,
        context: &RunContext,
        applied: &HashSet<PostingId>,
        ledger: &mut RunLedger,
    ) -> Step {
        let id = record.id();
        if applied.contains(&id) || ledger.submitted.contains(&id) {
            debug!(posting = %id, "already applied, skipping");
            ledger.tally.already_applied += 1;
            return Step::Continue;
        }

        let action = decide(&record, context);
        match action {
            Action::Submit(documents) => {
                match self
                    .gateway
                    .submit(&record, &documents, &context.auth_token)
                {
                    Ok(SubmissionOutcome::Accepted) => {
                        info!(
                            posting = %id,
                            name = record.posting_name(),
                            employer = record.employer_name(),
                            "applied"
                        );
                        ledger.record_submission(AuditEntry::for_record(&record, context.now));
                        Step::Continue
                    }
                    Ok(SubmissionOutcome::Rejected { status }) => {
                        warn!(posting = %id, status, "submission rejected; treating credentials as expired");
                        Step::Halt(record, RunPhase::AuthFailed)
                    }
                    Err(err) => {
                        let phase = RunPhase::halted_by(&err);
                        warn!(posting = %id, error = %err, ?phase, "submission failed");
                        Step::Halt(record, phase)
                    }
                }
            }
            Action::DeferOpenDate => {
                debug!(posting = %id, opens_at = ?record.apply_opens_at(), "{}", action.summary());
                ledger.defer(record);
                Step::Continue
            }
            Action::RejectExternalChannel => {
                debug!(posting = %id, "{}", action.summary());
                ledger.tally.rejected_external += 1;
                Step::Continue
            }
            Action::RejectUnsupportedDocument(_) => {
                debug!(posting = %id, "{}", action.summary());
                ledger.tally.rejected_document += 1;
                Step::Continue
            }
        }
    }

    fn finalize(
        &self,
        config: &StoredConfig,
        phase: RunPhase,
        mut ledger: RunLedger,
        carried: Vec<JobRecord>,
        now: DateTime<Utc>,
    ) -> RunOutcome {
        let mut next = config.clone();
        next.credentials = self.gateway.credentials();

        let terminal = match phase {
            RunPhase::AuthFailed | RunPhase::Interrupted => phase,
            _ => RunPhase::Done,
        };
        debug!(phase = ?terminal, "finalizing run");

        if terminal != RunPhase::Done {
            // Keep postings the halted replay never reached.
            for record in carried {
                ledger.carry(record);
            }
        }

        let status = match terminal {
            RunPhase::AuthFailed => {
                next.auth_valid = false;
                RunStatus::CredentialExpired
            }
            RunPhase::Interrupted => RunStatus::Interrupted,
            _ => {
                next.auth_valid = true;
                next.watermark = now;
                RunStatus::Completed
            }
        };

        RunOutcome {
            status,
            config: next,
            waitlist: ledger.deferred,
            audit: ledger.audit,
            tally: ledger.tally,
        }
    }

    /// Audit first, config last: the config holds the watermark, so a failure
    /// before it leaves the previous window in place for the next run.
    fn commit(&self, outcome: &RunOutcome) -> Result<(), StoreError> {
        if !outcome.audit.is_empty() {
            self.audit_log.append(&outcome.audit)?;
        }
        self.waitlist_store.save(&outcome.waitlist)?;
        self.config_store.save(&outcome.config)
    }
}
