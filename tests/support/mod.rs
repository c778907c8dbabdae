//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use supplyline_core::{
    Backoff, Catalog, HarvestOptions, HttpClient, HttpError, HttpRequest, HttpResponse,
    AUTH_TIMEOUT,
};

/// Token body accepted by every supplier's login parser.
pub const LOGIN_BODY: &str =
    r#"{"sessionToken":"token-1","apikey":"token-1","access_token":"token-1","token_type":"Bearer"}"#;

type Responder = Box<dyn Fn(&HttpRequest, usize) -> Result<HttpResponse, HttpError> + Send + Sync>;

/// `HttpClient` that answers login calls with [`LOGIN_BODY`] (or a configured response) and
/// data calls through a closure receiving the request and its 0-based data call index.
pub struct ScriptedHttp {
    login: Mutex<Box<dyn Fn() -> Result<HttpResponse, HttpError> + Send + Sync>>,
    data: Responder,
    logins: Mutex<usize>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new(
        data: impl Fn(&HttpRequest, usize) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            login: Mutex::new(Box::new(|| Ok(HttpResponse::ok_json(LOGIN_BODY)))),
            data: Box::new(data),
            logins: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_login(
        self: Arc<Self>,
        login: impl Fn() -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        *self.login.lock().expect("login lock") = Box::new(login);
        self
    }

    pub fn logins(&self) -> usize {
        *self.logins.lock().expect("logins lock")
    }

    /// URLs of data calls, in order.
    pub fn data_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }

    pub fn data_calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = if request.timeout == AUTH_TIMEOUT {
            *self.logins.lock().expect("logins lock") += 1;
            (*self.login.lock().expect("login lock"))()
        } else {
            let mut requests = self.requests.lock().expect("requests lock");
            let index = requests.len();
            let response = (self.data)(&request, index);
            requests.push(request);
            response
        };
        Box::pin(async move { response })
    }
}

/// Catalog `A1..=An` with ids `1..=n`.
pub fn catalog(size: i64) -> Catalog {
    (1..=size).map(|id| (format!("A{id}"), id)).collect()
}

/// Item numbers of a chunked request (`itemNumbers=` or `ItemNumber=` query parameter).
pub fn requested_numbers(url: &str) -> Vec<String> {
    let query = url
        .split_once("itemNumbers=")
        .or_else(|| url.split_once("ItemNumber="))
        .map_or("", |(_, query)| query);
    query
        .replace("%2C", ",")
        .split(',')
        .filter(|number| !number.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Premier pricing array for every number in the request.
pub fn premier_pricing_body(url: &str) -> String {
    let rows = requested_numbers(url)
        .into_iter()
        .map(|number| {
            serde_json::json!({
                "itemNumber": number,
                "pricing": [{ "currency": "USD", "cost": 10.0, "jobber": 12.0, "map": 14.0, "retail": 15.0 }],
            })
        })
        .collect::<Vec<_>>();
    serde_json::Value::Array(rows).to_string()
}

pub fn server_error() -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::new(500, "upstream unavailable"))
}

/// Default options without pauses between failures.
pub fn options(batch_size: usize) -> HarvestOptions {
    HarvestOptions::default()
        .with_batch_size(batch_size)
        .with_backoff(Backoff::none())
}
