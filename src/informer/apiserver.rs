use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::Stream;
use futures::StreamExt;
use reqwest::Certificate;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;

use super::ListOptions;
use super::ListWatcher;
use super::Status;
use super::WatchEvent;
use super::WatchStream;
use crate::ApiServerConfig;
use crate::Error;
use crate::EventList;
use crate::EventRecord;
use crate::Result;
use crate::TransportError;

const EVENTS_PATH: &str = "/api/v1/events";

/// Extra time granted to a watch request beyond its server-side timeout
const WATCH_GRACE: Duration = Duration::from_secs(30);

/// Lists and watches `core/v1` events across all namespaces.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiServerListWatcher {
    client: Client,
    events_url: String,
    token_file: PathBuf,
    request_timeout: Duration,
}

impl ApiServerListWatcher {
    pub async fn new(config: &ApiServerConfig) -> Result<Self> {
        let base_url = config.resolve_url()?;

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);

        match tokio::fs::read(&config.ca_file).await {
            Ok(pem) => {
                builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %config.ca_file.display(), "no CA bundle, using system roots");
            }
            Err(source) => {
                return Err(TransportError::Credentials {
                    path: config.ca_file.clone(),
                    source,
                }
                .into())
            }
        }

        Ok(Self {
            client: builder.build()?,
            events_url: format!("{base_url}{EVENTS_PATH}"),
            token_file: config.token_file.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn events_url(&self) -> &str {
        &self.events_url
    }

    /// Projected service account tokens rotate, so the file is read per call
    async fn bearer_token(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.token_file).await {
            Ok(token) => {
                let token = token.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TransportError::Credentials {
                path: self.token_file.clone(),
                source,
            }
            .into()),
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<Response> {
        let request = match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        };

        if status.as_u16() == 410 {
            Err(TransportError::WatchExpired(message).into())
        } else {
            Err(TransportError::Status {
                code: status.as_u16(),
                message,
            }
            .into())
        }
    }
}

/// Query string of a list (`watch == false`) or watch request
pub fn query_pairs(
    options: &ListOptions,
    watch: bool,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if watch {
        params.push(("watch", "true".to_string()));
    }
    if let Some(selector) = options.field_selector.as_deref().filter(|s| !s.is_empty()) {
        params.push(("fieldSelector", selector.to_string()));
    }
    if let Some(rv) = options.resource_version.as_deref().filter(|s| !s.is_empty()) {
        params.push(("resourceVersion", rv.to_string()));
    }
    if watch && options.allow_bookmarks {
        params.push(("allowWatchBookmarks", "true".to_string()));
    }
    if let Some(timeout) = options.timeout_seconds {
        params.push(("timeoutSeconds", timeout.to_string()));
    }
    params
}

#[async_trait]
impl ListWatcher for ApiServerListWatcher {
    async fn list(
        &self,
        options: &ListOptions,
    ) -> Result<EventList> {
        let request = self
            .client
            .get(&self.events_url)
            .query(&query_pairs(options, false))
            .timeout(self.request_timeout);

        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn watch(
        &self,
        options: &ListOptions,
    ) -> Result<WatchStream> {
        let mut request = self.client.get(&self.events_url).query(&query_pairs(options, true));
        if let Some(timeout) = options.timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout) + WATCH_GRACE);
        }

        let response = self.send(request).await?;
        Ok(decode_watch_stream(response.bytes_stream()))
    }
}

#[derive(Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: serde_json::Value,
}

/// Decodes one line of a watch body. Blank lines yield `None`.
pub fn decode_watch_line(line: &[u8]) -> Result<Option<WatchEvent>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let raw: RawWatchEvent = serde_json::from_slice(line)?;
    let event = match raw.kind.as_str() {
        "ADDED" => WatchEvent::Added(serde_json::from_value(raw.object)?),
        "MODIFIED" => WatchEvent::Modified(serde_json::from_value(raw.object)?),
        "DELETED" => WatchEvent::Deleted(serde_json::from_value(raw.object)?),
        "BOOKMARK" => {
            let record: EventRecord = serde_json::from_value(raw.object)?;
            WatchEvent::Bookmark(record.resource_version().unwrap_or_default().to_string())
        }
        "ERROR" => WatchEvent::Error(serde_json::from_value::<Status>(raw.object)?),
        other => {
            return Err(TransportError::Decode(serde::de::Error::custom(format!(
                "unknown watch event type {other:?}"
            )))
            .into())
        }
    };
    Ok(Some(event))
}

/// Splits a newline-delimited byte stream into watch notifications.
///
/// The stream ends after the first transport error.
pub fn decode_watch_stream<S, B, E>(bytes: S) -> WatchStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let state = (bytes.boxed(), Vec::<u8>::new(), false);

    stream::unfold(state, |(mut bytes, mut buffer, mut finished)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match decode_watch_line(&line) {
                    Ok(Some(event)) => return Some((Ok(event), (bytes, buffer, finished))),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), (bytes, Vec::new(), true))),
                }
            }

            if finished {
                if buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut buffer);
                match decode_watch_line(&line) {
                    Ok(Some(event)) => return Some((Ok(event), (bytes, buffer, finished))),
                    Ok(None) => return None,
                    Err(e) => return Some((Err(e), (bytes, buffer, finished))),
                }
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(e.into()), (bytes, Vec::new(), true))),
                None => finished = true,
            }
        }
    })
    .boxed()
}
