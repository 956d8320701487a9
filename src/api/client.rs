use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::base::Base;
use super::params::ListOptions;
use super::retry::{RetryStrategy, TOO_MANY_REQUESTS};
use super::table::Table;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::types::UserAndScopesDict;
use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT_URL: &str = "https://api.airtable.com";
pub const API_VERSION: &str = "v0";
pub const API_KEY_ENV: &str = "AIRTABLE_API_KEY";

/// GET requests longer than this are re-sent as POST where the API allows it
pub const MAX_URL_LENGTH: usize = 16_000;

/// Connection to the Airtable API.
///
/// Cloning an `Api` is cheap and every clone refers to the same client;
/// [`Api::same_client`] tells clones apart from independently built ones.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    api_key: String,
    endpoint_url: Url,
    timeout: Option<Duration>,
    retry_strategy: RetryStrategy,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("endpoint_url", &self.inner.endpoint_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("retry_strategy", &self.inner.retry_strategy)
            .finish_non_exhaustive()
    }
}

pub struct ApiBuilder {
    api_key: String,
    endpoint_url: String,
    timeout: Option<Duration>,
    retry_strategy: RetryStrategy,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiBuilder {
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    pub fn no_retries(self) -> Self {
        self.retry_strategy(RetryStrategy::none())
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Api> {
        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }
        let endpoint_url = Url::parse(&self.endpoint_url).map_err(|e| {
            Error::InvalidParam(format!("invalid endpoint url {}: {}", self.endpoint_url, e))
        })?;
        if endpoint_url.cannot_be_a_base() {
            return Err(Error::InvalidParam(format!(
                "endpoint url {} cannot carry a path",
                endpoint_url
            )));
        }
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Api {
            inner: Arc::new(ApiInner {
                api_key,
                endpoint_url,
                timeout: self.timeout,
                retry_strategy: self.retry_strategy,
                transport,
            }),
        })
    }
}

/// A single call against the API, before options are encoded
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Listing options: query string for GET, JSON body otherwise
    pub options: Option<ListOptions>,
    /// Where to send an over-long GET instead
    pub fallback: Option<(Method, Url)>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
            options: None,
            fallback: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn options(mut self, options: ListOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn fallback(mut self, method: Method, url: Url) -> Self {
        self.fallback = Some((method, url));
        self
    }
}

impl Api {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ApiBuilder {
        ApiBuilder {
            api_key: api_key.into(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            timeout: None,
            retry_strategy: RetryStrategy::default(),
            transport: None,
        }
    }

    /// Build a client from the `AIRTABLE_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| Error::MissingApiKey)?;
        Self::new(key)
    }

    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    pub fn endpoint_url(&self) -> &Url {
        &self.inner.endpoint_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.inner.retry_strategy
    }

    /// True when both handles share the same underlying client
    pub fn same_client(&self, other: &Api) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn base(&self, base_id: impl Into<String>) -> Base {
        Base::new(self, base_id)
    }

    pub fn table(&self, base_id: impl Into<String>, table_name: impl Into<String>) -> Table {
        self.base(base_id).table(table_name)
    }

    /// `{endpoint}/v0/{segments...}`, each segment percent-encoded
    pub fn build_url<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.inner.endpoint_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::InvalidParam(format!(
                    "endpoint url {} cannot carry a path",
                    self.inner.endpoint_url
                ))
            })?;
            path.pop_if_empty().push(API_VERSION);
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        Ok(url)
    }

    pub fn whoami(&self) -> Result<UserAndScopesDict> {
        let url = self.build_url(&["meta", "whoami"])?;
        let value = self.request(Request::new(Method::GET, url))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send one request and return the decoded JSON body
    pub fn request(&self, request: Request) -> Result<Value> {
        let http = self.prepare(request)?;
        self.send(&http)
    }

    /// Follow `offset` cursors, yielding one JSON page at a time
    pub fn iterate_requests(&self, request: Request) -> Result<PageIter> {
        let http = self.prepare(request)?;
        Ok(PageIter {
            api: self.clone(),
            next_request: Some(http),
        })
    }

    fn prepare(&self, request: Request) -> Result<HttpRequest> {
        let Request {
            method,
            url,
            query,
            body,
            options,
            fallback,
        } = request;

        if let Some(options) = &options {
            options.validate()?;
        }

        let mut http = HttpRequest {
            method,
            url,
            api_key: self.inner.api_key.clone(),
            query: query.clone(),
            body,
            timeout: self.inner.timeout,
        };

        let Some(options) = options else {
            return Ok(http);
        };

        if http.method != Method::GET {
            http.body = Some(merge_body(http.body.take(), options.to_json()));
            return Ok(http);
        }

        http.query.extend(options.to_query());
        if http.full_url_len() > MAX_URL_LENGTH {
            if let Some((method, url)) = fallback {
                debug!(
                    target: "airtable::api",
                    "URL exceeds {} characters, switching to {} {}", MAX_URL_LENGTH, method, url
                );
                http.method = method;
                http.url = url;
                http.query = query;
                http.body = Some(merge_body(http.body.take(), options.to_json()));
            }
        }
        Ok(http)
    }

    pub(crate) fn send(&self, request: &HttpRequest) -> Result<Value> {
        let strategy = &self.inner.retry_strategy;
        let mut retries = 0;

        loop {
            debug!(target: "airtable::api", "{} {}", request.method, request.url);
            let response = self.inner.transport.send(request)?;

            if response.is_success() {
                return parse_body(&response.body);
            }

            if strategy.is_retryable(response.status) && strategy.can_retry(retries) {
                retries += 1;
                let wait = strategy.backoff(retries, response.retry_after);
                warn!(
                    target: "airtable::retry",
                    "{} {} returned {}, retry {}/{} in {:?}",
                    request.method, request.url, response.status, retries, strategy.total, wait
                );
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
                continue;
            }

            if response.status == TOO_MANY_REQUESTS && strategy.is_retryable(response.status) {
                return Err(Error::RateLimited {
                    url: request.url.to_string(),
                    attempts: retries + 1,
                });
            }
            return Err(api_error(request, &response));
        }
    }
}

/// Pages of a cursor-paginated listing
pub struct PageIter {
    api: Api,
    next_request: Option<HttpRequest>,
}

impl Iterator for PageIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.next_request.take()?;
        match self.api.send(&request) {
            Ok(page) => {
                if let Some(offset) = page.get("offset").and_then(Value::as_str) {
                    self.next_request = Some(with_offset(request, offset));
                }
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

fn with_offset(mut request: HttpRequest, offset: &str) -> HttpRequest {
    if request.method == Method::GET {
        request.query.retain(|(k, _)| k != "offset");
        request.query.push(("offset".to_string(), offset.to_string()));
    } else {
        let mut body = match request.body.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("offset".to_string(), Value::String(offset.to_string()));
        request.body = Some(Value::Object(body));
    }
    request
}

fn merge_body(body: Option<Value>, extra: Value) -> Value {
    match (body, extra) {
        (Some(Value::Object(mut base)), Value::Object(extra)) => {
            base.extend(extra);
            Value::Object(base)
        }
        (Some(other), _) => other,
        (None, extra) => extra,
    }
}

fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body)?)
}

fn api_error(request: &HttpRequest, response: &HttpResponse) -> Error {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    let (kind, message) = match parsed.as_ref().and_then(|v| v.get("error")) {
        Some(Value::Object(err)) => (
            err.get("type").and_then(Value::as_str).map(str::to_string),
            err.get("message").and_then(Value::as_str).map(str::to_string),
        ),
        Some(Value::String(kind)) => (Some(kind.clone()), None),
        _ => (None, None),
    };

    let message = message
        .or_else(|| kind.clone())
        .or_else(|| {
            let text = response.body.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| {
            StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unknown error")
                .to_string()
        });

    Error::Api {
        method: request.method.clone(),
        url: request.url.to_string(),
        status: response.status,
        kind,
        message,
    }
}
