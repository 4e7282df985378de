//! Shared test doubles and fixtures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::http::{HttpClient, HttpRequest, HttpResponse};
use super::TransportError;
use crate::config::ConnectionConfig;

/// Replays queued responses in order and records every request it sees
#[derive(Debug, Default)]
pub(crate) struct ScriptedHttp {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub(crate) fn push_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Parsed JSON body of the `n`th request
    pub(crate) fn body(&self, n: usize) -> serde_json::Value {
        let requests = self.requests.lock().unwrap();
        serde_json::from_str(requests[n].body.as_deref().unwrap_or("null")).unwrap()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".to_string())))
    }
}

pub(crate) fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

pub(crate) fn response_with_header(status: u16, body: &str, name: &'static str, value: &str) -> HttpResponse {
    let mut response = response(status, body);
    response.headers.insert(
        HeaderName::from_static(name),
        HeaderValue::from_str(value).unwrap(),
    );
    response
}

pub(crate) fn connection() -> ConnectionConfig {
    ConnectionConfig::build(&HashMap::from([
        ("host".to_string(), "localhost".to_string()),
        ("port".to_string(), "8112".to_string()),
        ("credential".to_string(), "deluge".to_string()),
        ("username".to_string(), "admin".to_string()),
    ]))
    .unwrap()
}
