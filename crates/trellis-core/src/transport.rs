//! HTTP transport boundary
//!
//! Backends describe requests as [`HttpRequest`] values relative to the
//! configured root URI; a [`Transport`] executes them. Every call blocks
//! until the server answers. There is no retry and no timeout beyond the
//! one configured on the transport.

use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, TrellisError};

/// HTTP verbs used by the backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// One request relative to the root URI
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path segments below the root; encoded by the transport
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Post, segments)
    }

    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Put, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Delete, segments)
    }

    /// Append a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Path below the root, for logging
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Raw outcome of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A JSON response with the given status
    pub fn json(status: u16, body: &JsonValue) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }
}

/// Executes requests against a graph server
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking HTTP transport over reqwest
pub struct HttpTransport {
    client: HttpClient,
    root: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let root = Url::parse(config.root())
            .map_err(|e| {
                TrellisError::Config(format!("invalid root_uri '{}': {e}", config.root_uri))
            })?;
        if root.cannot_be_a_base() {
            return Err(TrellisError::Config(format!(
                "root_uri '{}' cannot be a base URL",
                config.root_uri
            )));
        }

        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("trellis/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrellisError::Transport(format!("http client: {e}")))?;

        Ok(Self {
            client,
            root,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, request: &HttpRequest) -> Result<Url> {
        let mut url = self.root.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TrellisError::Config("root_uri cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.extend(request.segments.iter());
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.url(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, url.clone())
            .header("Accept", "application/json");
        if let Some(user) = &self.username {
            builder = builder.basic_auth(user, self.password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| TrellisError::Transport(format!("{} {url} failed: {e}", request.method)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .map_err(|e| TrellisError::Transport(format!("failed to read response body: {e}")))?;

        tracing::debug!("{} {} -> {}", request.method, url, status);

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_encodes_segments() {
        let transport =
            HttpTransport::from_config(&Config::new("http://localhost:7474/db/data/")).unwrap();
        let request = HttpRequest::get(["index", "node", "people", "name", "James Thornton"]);
        let url = transport.url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:7474/db/data/index/node/people/name/James%20Thornton"
        );
    }

    #[test]
    fn test_url_query_pairs() {
        let transport =
            HttpTransport::from_config(&Config::new("http://localhost:8182/graphs/emptygraph"))
                .unwrap();
        let request = HttpRequest::get(["indices", "people"])
            .param("key", "name")
            .param("value", "James");
        let url = transport.url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8182/graphs/emptygraph/indices/people?key=name&value=James"
        );
    }

    #[test]
    fn test_invalid_root_uri() {
        assert!(matches!(
            HttpTransport::from_config(&Config::new("not a url")),
            Err(TrellisError::Config(_))
        ));
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::post(["node"]).json(json!({"name": "James"}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path(), "/node");
        assert_eq!(request.body, Some(json!({"name": "James"})));
    }
}
