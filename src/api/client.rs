//! Purpose: Blocking HTTP client for the four record endpoints.
//! Exports: `ApiClient`.
//! Role: Client half of the envelope contract; used by the CLI and the UI controller.
//! Invariants: Base URLs are scheme + authority only; endpoint paths are fixed.
//! Invariants: `{success:false}` bodies and raw delete error bodies decode to typed errors.
#![allow(clippy::result_large_err)]

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::envelope::{Envelope, ErrorBody};
use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Record, RecordUpdate};

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: Url,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct IdRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    id: &'a str,
    update: &'a RecordUpdate,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(ApiClientInner { base_url, agent }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn health(&self) -> ApiResult<()> {
        let url = build_url(&self.inner.base_url, "healthz")?;
        let response = self.inner.agent.get(url.as_str()).call();
        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }

    pub fn list_records(&self) -> ApiResult<Vec<Record>> {
        let records = self.request_envelope::<(), Vec<Record>>("GET", "get_data", None)?;
        Ok(records.unwrap_or_default())
    }

    pub fn write_record(&self, message: &str) -> ApiResult<()> {
        let payload = WriteRequest { message };
        self.request_envelope::<_, serde_json::Value>("POST", "write_data", Some(&payload))?;
        Ok(())
    }

    pub fn delete_record(&self, id: &str) -> ApiResult<()> {
        let payload = IdRequest { id };
        self.request_envelope::<_, serde_json::Value>("DELETE", "delete_data", Some(&payload))?;
        Ok(())
    }

    pub fn update_record(&self, id: &str, update: &RecordUpdate) -> ApiResult<()> {
        let payload = UpdateRequest { id, update };
        self.request_envelope::<_, serde_json::Value>("POST", "update_data", Some(&payload))?;
        Ok(())
    }

    fn request_envelope<T, R>(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&T>,
    ) -> ApiResult<Option<R>>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, endpoint)?;
        let request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => decode_success_status(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid server url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("server url must use http or https scheme")
        );
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("server url must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, endpoint: &str) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("server url cannot be a base")
        })?;
        path.clear();
        path.push(endpoint);
    }
    Ok(url)
}

/// Failures also arrive with status 200: as an envelope, or as a raw error body on delete.
fn decode_success_status<R>(response: ureq::Response) -> ApiResult<Option<R>>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    decode_success_body(&body)
}

fn decode_success_body<R>(body: &str) -> ApiResult<Option<R>>
where
    R: DeserializeOwned,
{
    match serde_json::from_str::<Envelope<R>>(body) {
        Ok(envelope) => envelope.into_result(),
        Err(err) => match serde_json::from_str::<ErrorBody>(body) {
            Ok(raw) => Err(raw.into_error()),
            Err(_) => Err(Error::new(ErrorKind::Internal)
                .with_message("invalid response json")
                .with_source(err)),
        },
    }
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> Error {
    if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        if let Err(err) = envelope.into_result() {
            return err;
        }
    }
    if let Ok(raw) = serde_json::from_str::<ErrorBody>(body) {
        return raw.into_error();
    }
    Error::new(error_kind_from_status(status)).with_message(format!("server error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 415 | 422 => ErrorKind::Validation,
        500..=599 => ErrorKind::Store,
        _ => ErrorKind::Io,
    }
}

fn transport_error(err: ureq::Transport) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("request failed")
        .with_hint("Is `msgboard serve` running at the configured --url?")
        .with_source(err)
}
