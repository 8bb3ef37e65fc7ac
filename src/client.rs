use std::{num::NonZeroUsize, time::Duration};

use crate::{
    error::Error,
    gate::{RequestGate, DEFAULT_HOLD, DEFAULT_LIMIT},
    lazy::{kind, LazyView},
    result::Result,
};
use reqwest::{Client as ReqwestClient, StatusCode};
use serde_json::{Map, Value};
use tokio::runtime::Handle;

const HOST: &str = "a.4cdn.org";

/// Reads the imageboard API.
///
/// Every request goes through the client's [`RequestGate`], so a single
/// client shared between tasks respects the API rules as a whole.
#[derive(Debug)]
pub struct Client {
    http: ReqwestClient,
    base: String,
    gate: RequestGate,
}

impl Client {
    /// Creates a client with the default settings:
    /// `https`, a one second hold and up to 8000 concurrent requests.
    pub fn new() -> Client {
        Client {
            http: ReqwestClient::new(),
            base: base_url(true),
            gate: RequestGate::new(DEFAULT_HOLD, DEFAULT_LIMIT),
        }
    }

    /// Returns a [`ClientBuilder`] for customising the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Returns the base url requests are made against.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &ReqwestClient {
        &self.http
    }

    /// Returns the gate pacing this client's requests.
    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// Closes the gate, failing every pending and future request.
    pub fn close(&self) {
        self.gate.close();
    }

    /// Requests `{base}/{route}.json` and returns the decoded body.
    ///
    /// The admission slot is held until the body has been read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedStatus`] on any non-2xx status,
    /// [`Error::Reqwest`] on transport or decoding failures,
    /// and [`Error::Closed`] if the client was closed.
    pub async fn interact(&self, route: &str) -> Result<Value> {
        let url = format!("{}/{route}.json", self.base);

        let admission = self.gate.admit().await?;
        log::debug!("request for {url} dispatched");
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        log::debug!("response status for {url}: {status}");
        if !status.is_success() {
            return Err(Error::UnexpectedStatus(status));
        }

        let payload = response.json::<Value>().await?;
        admission.release();
        Ok(payload)
    }

    /// Returns every board.
    ///
    /// # Errors
    ///
    /// Fails if the request fails or the payload has no `boards` array.
    pub async fn get_boards(&self) -> Result<Vec<LazyView>> {
        let data = self.interact("boards").await?;
        views(field(data, "boards")?)
    }

    /// Returns a board's active threads.
    ///
    /// Without a page (or with page `0`) this returns one summary per index
    /// page, as listed by `threads.json`. With a page it returns the threads
    /// shown on that index page.
    ///
    /// # Errors
    ///
    /// Fails if the request fails or the payload is not shaped as expected.
    pub async fn get_threads(&self, board: &str, page: Option<u32>) -> Result<Vec<LazyView>> {
        match page.filter(|&page| page > 0) {
            Some(page) => {
                let data = self.interact(&format!("{board}/{page}")).await?;
                views(field(data, "threads")?)
            }
            None => views(self.interact(&format!("{board}/threads")).await?),
        }
    }

    /// Returns the ids of a board's archived threads.
    ///
    /// Boards without an archive answer `404`, which yields an empty list.
    ///
    /// # Errors
    ///
    /// Fails on any other request failure, or if an id is not an
    /// unsigned integer.
    pub async fn get_archive(&self, board: &str) -> Result<Vec<u64>> {
        let data = match self.interact(&format!("{board}/archive")).await {
            Ok(data) => data,
            Err(Error::UnexpectedStatus(code)) if code == StatusCode::NOT_FOUND => {
                log::warn!("/{board}/ has no archive");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match data {
            Value::Array(ids) => ids
                .iter()
                .map(|id| {
                    id.as_u64().ok_or_else(|| {
                        Error::UnexpectedPayload(format!("archived thread id {id} is not an integer"))
                    })
                })
                .collect(),
            other => Err(unexpected("an array", &other)),
        }
    }

    /// Returns the posts of a thread, OP first.
    ///
    /// # Errors
    ///
    /// Fails if the request fails (including `404` for a missing thread)
    /// or the payload has no `posts` array.
    pub async fn get_thread(&self, board: &str, thread: u64) -> Result<Vec<LazyView>> {
        let data = self.interact(&format!("{board}/thread/{thread}")).await?;
        views(field(data, "posts")?)
    }

    /// Returns a board's catalog.
    ///
    /// The catalog is served as an array of pages; it is wrapped in a view
    /// under the `pages` key. An object payload is wrapped as is.
    ///
    /// # Errors
    ///
    /// Fails if the request fails or the payload is neither an array
    /// nor an object.
    pub async fn get_catalog(&self, board: &str) -> Result<LazyView> {
        match self.interact(&format!("{board}/catalog")).await? {
            Value::Array(pages) => {
                let mut map = Map::new();
                map.insert("pages".to_owned(), Value::Array(pages));
                Ok(LazyView::new(map))
            }
            other => LazyView::from_value(other),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures a [`Client`].
///
/// ```rust
/// use std::time::Duration;
///
/// let client = lazy4chan::Client::builder()
///     .secure(false)
///     .hold(Duration::from_millis(1500))
///     .limit(16)
///     .build()
///     .unwrap();
/// assert_eq!(client.base_url(), "http://a.4cdn.org");
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    secure: bool,
    hold: Duration,
    limit: usize,
    http: Option<ReqwestClient>,
    runtime: Option<Handle>,
    base_url: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder {
            secure: true,
            hold: DEFAULT_HOLD,
            limit: DEFAULT_LIMIT.get(),
            http: None,
            runtime: None,
            base_url: None,
        }
    }
}

impl ClientBuilder {
    /// Use `https` (the default) or plain `http`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Minimum time between the start of two requests.
    /// [`Duration::ZERO`] disables pacing.
    pub fn hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Maximum number of requests awaiting a response at once.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Reuse an existing HTTP client instead of creating one.
    pub fn http(mut self, http: ReqwestClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Spawn pacing releases on `runtime` instead of the ambient runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Send requests to `url` instead of the API host. Overrides [`secure`].
    ///
    /// [`secure`]: ClientBuilder::secure
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the concurrency limit is zero.
    pub fn build(self) -> Result<Client> {
        let limit = NonZeroUsize::new(self.limit)
            .ok_or_else(|| Error::Config("concurrency limit must be positive".to_owned()))?;

        let base = match self.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => base_url(self.secure),
        };

        Ok(Client {
            http: self.http.unwrap_or_default(),
            base,
            gate: RequestGate::with_runtime(self.hold, limit, self.runtime),
        })
    }
}

fn base_url(secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{HOST}")
}

fn field(data: Value, key: &str) -> Result<Value> {
    match data {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| Error::UnexpectedPayload(format!("missing {key:?} field"))),
        other => Err(unexpected("an object", &other)),
    }
}

fn views(data: Value) -> Result<Vec<LazyView>> {
    match data {
        Value::Array(items) => items.into_iter().map(LazyView::from_value).collect(),
        other => Err(unexpected("an array", &other)),
    }
}

fn unexpected(expected: &str, found: &Value) -> Error {
    Error::UnexpectedPayload(format!("expected {expected}, found {}", kind(found)))
}
