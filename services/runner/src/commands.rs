use crate::cli::{CredentialsArgs, RunArgs};
use auto_apply::config::AppConfig;
use auto_apply::error::AppError;
use auto_apply::storage::{read_credentials, CsvAuditLog, JsonConfigStore, JsonWaitlistStore};
use auto_apply::telemetry;
use auto_apply::workflows::applications::{
    refresh_credentials, AuditLog, ConfigStore, PipelineOrchestrator, RunReport, RunStatus,
    WaitlistStore,
};
use auto_apply::workflows::handshake::HandshakeClient;
use chrono::Utc;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Exit status for runs that stopped on credentials; cron wrappers key off it.
const CREDENTIALS_EXIT: u8 = 2;

pub(crate) fn run_once(config: &AppConfig, args: RunArgs) -> Result<ExitCode, AppError> {
    telemetry::init(&config.telemetry)?;

    let config_store = Arc::new(JsonConfigStore::new(&config.storage.config_file));
    let stored = config_store.load()?;
    let gateway = Arc::new(HandshakeClient::new(
        &stored.feed_url,
        stored.credentials,
        &config.gateway,
    )?);

    info!(
        environment = ?config.environment,
        config = %config.storage.config_file.display(),
        "auto-apply run starting"
    );

    let orchestrator = PipelineOrchestrator::new(
        gateway,
        config_store,
        Arc::new(JsonWaitlistStore::new(&config.storage.waitlist_file)),
        Arc::new(CsvAuditLog::new(&config.storage.audit_file)),
    );
    let report = orchestrator.run(Utc::now())?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
    } else {
        render_report(&report);
    }

    Ok(match report.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::CredentialExpired | RunStatus::StaleCredentials => {
            ExitCode::from(CREDENTIALS_EXIT)
        }
        RunStatus::Interrupted => ExitCode::FAILURE,
    })
}

fn render_report(report: &RunReport) {
    println!("{}", report.summary());
    for entry in &report.applied {
        println!(
            "  applied {} - {} at {}",
            entry.posting_id, entry.posting_name, entry.employer_name
        );
    }
    if !report.deferred.is_empty() {
        let ids: Vec<String> = report.deferred.iter().map(ToString::to_string).collect();
        println!("  waiting on: {}", ids.join(", "));
    }
    match report.status {
        RunStatus::Completed => println!("  next run scans postings updated after {}", report.watermark),
        RunStatus::CredentialExpired | RunStatus::StaleCredentials => {
            println!("  export fresh cookies and run `auto-apply credentials --cookies <file>`")
        }
        RunStatus::Interrupted => {
            println!("  platform unreachable; the next run retries from {}", report.watermark)
        }
    }
}

pub(crate) fn show_status(config: &AppConfig) -> Result<(), AppError> {
    let stored = JsonConfigStore::new(&config.storage.config_file).load()?;
    let waitlist = JsonWaitlistStore::new(&config.storage.waitlist_file).load()?;
    let applied = CsvAuditLog::new(&config.storage.audit_file).applied_ids()?;

    println!(
        "credentials:  {}",
        if stored.auth_valid { "valid" } else { "invalid" }
    );
    println!("watermark:    {}", stored.watermark);
    println!("feed:         {}", stored.feed_url);
    println!("deferred:     {}", waitlist.len());
    println!("applied:      {}", applied.len());
    Ok(())
}

pub(crate) fn update_credentials(
    config: &AppConfig,
    args: CredentialsArgs,
) -> Result<(), AppError> {
    telemetry::init(&config.telemetry)?;

    let cookies = read_credentials(&args.cookies)?;
    let count = cookies.0.len();
    let store = JsonConfigStore::new(&config.storage.config_file);
    refresh_credentials(&store, cookies)?;

    info!(cookies = count, path = %store.path().display(), "credentials refreshed");
    println!("stored {count} cookie(s); credentials marked valid");
    Ok(())
}
