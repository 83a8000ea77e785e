use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::workflows::applications::{
    parse_timestamp, ApplyChannel, DocumentKind, FeedPage, GatewayError, JobRecord, PostingId,
};

/// `apply_type` value meaning the platform takes the application itself.
const PLATFORM_APPLY_TYPE: &str = "handshake";
const PAGE_PARAM: &str = "page";

#[derive(Debug, Deserialize)]
struct FeedEntry {
    job_id: u64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    apply_start: Option<String>,
    updated_at: String,
    #[serde(default)]
    job_name: String,
    #[serde(default)]
    employer_name: String,
    job: FeedJob,
}

#[derive(Debug, Deserialize)]
struct FeedJob {
    #[serde(rename = "type")]
    kind: String,
    job_apply_setting: ApplySetting,
    #[serde(default)]
    required_job_document_types: Vec<RequiredDocument>,
}

#[derive(Debug, Deserialize)]
struct ApplySetting {
    apply_type: String,
}

#[derive(Debug, Deserialize)]
struct RequiredDocument {
    document_type_id: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedEntryError {
    #[error("unexpected entry shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("posting {id}: unreadable {field} '{value}'")]
    Timestamp {
        id: u64,
        field: &'static str,
        value: String,
    },
}

impl TryFrom<FeedEntry> for JobRecord {
    type Error = FeedEntryError;

    fn try_from(entry: FeedEntry) -> Result<Self, Self::Error> {
        let updated_at =
            parse_timestamp(&entry.updated_at).ok_or_else(|| FeedEntryError::Timestamp {
                id: entry.job_id,
                field: "updated_at",
                value: entry.updated_at.clone(),
            })?;

        let apply_opens_at = match entry.apply_start.as_deref() {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| FeedEntryError::Timestamp {
                id: entry.job_id,
                field: "apply_start",
                value: raw.to_string(),
            })?),
            None => None,
        };

        let channel = if entry.job.job_apply_setting.apply_type == PLATFORM_APPLY_TYPE {
            ApplyChannel::Internal
        } else {
            ApplyChannel::External
        };

        let builder = JobRecord::builder(PostingId(entry.job_id), updated_at)
            .posting_name(entry.job_name)
            .employer_name(entry.employer_name)
            .applicable_kind(entry.job.kind)
            .apply_channel(channel)
            .apply_opens_at(apply_opens_at);

        Ok(entry
            .job
            .required_job_document_types
            .iter()
            .fold(builder, |builder, required| {
                builder.require(DocumentKind(required.document_type_id))
            })
            .build())
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

pub fn parse_entry(raw: &Value) -> Result<JobRecord, FeedEntryError> {
    let entry = FeedEntry::deserialize(raw)?;
    JobRecord::try_from(entry)
}

/// Map one feed response body into a page. `None` when the body is not JSON or
/// has no `results` array. Unreadable entries are skipped and counted.
pub fn parse_page(body: &str) -> Option<FeedPage> {
    let payload: Value = serde_json::from_str(body).ok()?;
    let results = payload.get("results")?.as_array()?;

    let mut page = FeedPage::new(Vec::with_capacity(results.len()));
    for (index, raw) in results.iter().enumerate() {
        match parse_entry(raw) {
            Ok(record) => page.records.push(record),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable feed entry");
                page.skipped += 1;
            }
        }
    }
    Some(page)
}

fn parse_feed_url(feed_url: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(feed_url.trim()).map_err(|err| GatewayError::InvalidFeedUrl {
        url: feed_url.to_string(),
        reason: err.to_string(),
    })?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(GatewayError::InvalidFeedUrl {
            url: feed_url.to_string(),
            reason: "expected an absolute http(s) url".to_string(),
        });
    }

    Ok(without_page(url))
}

fn without_page(mut url: Url) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(retained);
    }
    url
}

/// Drop any `page` parameter copied along with a browser URL.
pub fn sanitize_feed_url(feed_url: &str) -> Result<String, GatewayError> {
    parse_feed_url(feed_url).map(String::from)
}

pub fn page_url(feed_url: &str, page: u32) -> Result<Url, GatewayError> {
    let mut url = parse_feed_url(feed_url)?;
    url.query_pairs_mut()
        .append_pair(PAGE_PARAM, &page.to_string());
    Ok(url)
}

/// Scheme, host and port of the feed; the token page and submission endpoint live there.
pub fn platform_origin(feed_url: &str) -> Result<Url, GatewayError> {
    let mut origin = parse_feed_url(feed_url)?;
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    Ok(origin)
}
