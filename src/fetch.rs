//! Small HTTP helper in the XHR tradition: synchronous argument checks, a
//! `data-loading` marker on `<body>` while the request is in flight, and
//! rejection on any status outside 0, 2xx and 304.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::dom::Document;
use crate::error::{BlissError, FetchError, Result};

const LOADING_ATTRIBUTE: &str = "data-loading";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Defaults to `GET`.
    pub method: Option<String>,
    /// Appended to the query string for `GET`, sent as the body otherwise.
    pub data: String,
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
}

fn is_success(status: u16) -> bool {
    status == 0 || (200..300).contains(&status) || status == 304
}

impl Document {
    fn resolve_url(&self, url: &str) -> Result<Url> {
        let resolved = match self.config().base_url() {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|_| FetchError::InvalidUrl(url.to_string()).into())
    }

    fn set_loading(&self, url: Option<&Url>) {
        let Some(body) = self.body() else {
            return;
        };
        let Some(element) = body.as_element() else {
            return;
        };
        let mut attributes = element.attributes.borrow_mut();
        match url {
            Some(url) => {
                attributes.insert(LOADING_ATTRIBUTE, url.to_string());
            }
            None => {
                attributes.remove(LOADING_ATTRIBUTE);
            }
        }
    }

    /// Start a request. Argument errors are returned immediately; transport
    /// and status failures surface when the returned future is awaited.
    pub fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<impl Future<Output = Result<FetchResponse>>> {
        if url.is_empty() {
            return Err(FetchError::MissingUrl("empty".to_string()).into());
        }
        let mut url = self.resolve_url(url)?;

        let method = options
            .method
            .as_deref()
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| BlissError::invalid("fetch", "an HTTP method"))?;

        let is_get = method == Method::GET;
        if is_get && !options.data.is_empty() {
            let query = format!("{}{}", url.query().unwrap_or(""), options.data);
            url.set_query(Some(&query));
        }

        let has_content_type = options
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));

        let timeout = Duration::from_secs(self.config().fetch.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                warn!(target: "bliss::fetch", %error, "failed to build HTTP client");
                FetchError::Network
            })?;

        let mut request = client.request(method.clone(), url.clone());
        if !is_get && !has_content_type {
            request = request.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !is_get {
            request = request.body(options.data);
        }

        self.set_loading(Some(&url));
        debug!(target: "bliss::fetch", %method, %url, "request started");

        Ok(send(self.clone(), request, url))
    }
}

async fn send(
    document: Document,
    request: reqwest::RequestBuilder,
    url: Url,
) -> Result<FetchResponse> {
    let response = request.send().await.map_err(|error| {
        warn!(target: "bliss::fetch", %url, %error, "request failed");
        FetchError::Network
    })?;
    document.set_loading(None);

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    debug!(target: "bliss::fetch", %url, status = status.as_u16(), "response received");
    if !is_success(status.as_u16()) {
        return Err(FetchError::Status(status_text).into());
    }

    let url = response.url().clone();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(|_| FetchError::Network)?;
    Ok(FetchResponse {
        url,
        status: status.as_u16(),
        status_text,
        headers,
        body,
    })
}
