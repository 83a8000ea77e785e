use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tracing::debug;
use url::Url;

use super::cookies::absorb_set_cookie;
use super::csrf::extract_token;
use super::feed::{page_url, parse_page, platform_origin};
use crate::config::GatewayConfig;
use crate::workflows::applications::{
    AuthToken, CredentialBlob, DocumentId, FeedPage, GatewayError, JobRecord, SessionGateway,
    SubmissionOutcome,
};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";
const ACCEPT_JSON: &str = "application/json";
const ACCEPT_SUBMIT: &str = "application/json, text/javascript, */*; q=0.01";
const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
const CSRF_HEADER: &str = "X-CSRF-Token";

/// Cookie-authenticated session against the platform.
///
/// Wraps the async reqwest client with an owned runtime so the orchestrator
/// can drive it with plain blocking calls.
pub struct HandshakeClient {
    origin: Url,
    http: Client,
    runtime: Runtime,
    cookies: Mutex<CredentialBlob>,
}

impl HandshakeClient {
    pub fn new(
        feed_url: &str,
        credentials: CredentialBlob,
        config: &GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let origin = platform_origin(feed_url)?;
        let runtime = Runtime::new().map_err(|err| GatewayError::Transport(err.to_string()))?;

        let mut builder = Client::builder().timeout(config.request_timeout);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let http = {
            let _guard = runtime.enter();
            builder.build().map_err(transport_error)?
        };

        Ok(Self {
            origin,
            http,
            runtime,
            cookies: Mutex::new(credentials),
        })
    }

    fn jar(&self) -> MutexGuard<'_, CredentialBlob> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submission_url(&self, record: &JobRecord) -> Result<Url, GatewayError> {
        self.origin
            .join(&format!("jobs/{}/applications", record.id()))
            .map_err(|err| GatewayError::InvalidFeedUrl {
                url: self.origin.to_string(),
                reason: err.to_string(),
            })
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        let jar = self.jar();
        if jar.is_empty() {
            return None;
        }
        HeaderValue::from_str(&jar.header_value()).ok()
    }

    fn absorb(&self, headers: &HeaderMap) {
        let now = Utc::now();
        let mut jar = self.jar();
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                absorb_set_cookie(&mut jar, raw, now);
            }
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), GatewayError> {
        let request = match self.cookie_header() {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        };

        self.runtime.block_on(async {
            let response = request.send().await.map_err(transport_error)?;
            self.absorb(response.headers());
            let status = response.status();
            let body = response.text().await.map_err(transport_error)?;
            Ok((status, body))
        })
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(err.to_string())
}

fn require_success(status: StatusCode) -> Result<(), GatewayError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Rejected {
            status: status.as_u16(),
        })
    }
}

fn token_response(status: StatusCode, body: &str) -> Result<AuthToken, GatewayError> {
    require_success(status)?;
    extract_token(body).ok_or(GatewayError::MissingToken)
}

fn page_response(status: StatusCode, body: &str) -> Result<Option<FeedPage>, GatewayError> {
    require_success(status)?;
    Ok(parse_page(body))
}

fn submission_payload(record: &JobRecord, documents: &[DocumentId]) -> Value {
    json!({
        "application": {
            "applicable_id": record.id(),
            "applicable_type": record.applicable_kind(),
            "document_ids": documents,
        },
        "work_authorization_status": null,
    })
}

fn submission_outcome(status: StatusCode) -> SubmissionOutcome {
    if status.is_success() {
        SubmissionOutcome::Accepted
    } else {
        SubmissionOutcome::Rejected {
            status: status.as_u16(),
        }
    }
}

impl std::fmt::Debug for HandshakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeClient")
            .field("origin", &self.origin.as_str())
            .finish_non_exhaustive()
    }
}

impl SessionGateway for HandshakeClient {
    fn fetch_auth_token(&self) -> Result<AuthToken, GatewayError> {
        let request = self.http.get(self.origin.clone()).header(ACCEPT, ACCEPT_HTML);
        let (status, body) = self.send(request)?;
        token_response(status, &body)
    }

    fn fetch_page(&self, feed_url: &str, page: u32) -> Result<Option<FeedPage>, GatewayError> {
        let url = page_url(feed_url, page)?;
        debug!(page, url = %url, "fetching feed page");
        let request = self.http.get(url).header(ACCEPT, ACCEPT_JSON);
        let (status, body) = self.send(request)?;
        page_response(status, &body)
    }

    fn submit(
        &self,
        record: &JobRecord,
        documents: &[DocumentId],
        token: &AuthToken,
    ) -> Result<SubmissionOutcome, GatewayError> {
        let payload = submission_payload(record, documents);
        let request = self
            .http
            .post(self.submission_url(record)?)
            .header(ACCEPT, ACCEPT_SUBMIT)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(CSRF_HEADER, token.expose())
            .body(payload.to_string());

        let (status, _) = self.send(request)?;
        Ok(submission_outcome(status))
    }

    fn credentials(&self) -> CredentialBlob {
        self.jar().clone()
    }
}
