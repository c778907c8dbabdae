//! Meyer `ItemInformation` connector.
//!
//! Login is `POST {base}Authentication`; the returned `apikey` is sent as
//! `Authorization: Espresso <apikey>:1`.
//!
//! A 200 response whose body is an object carrying `statusCode: 500` (error code `40501`,
//! "No results found") means none of the requested numbers are known; it is an empty
//! result, not an error. An expired token comes back as HTTP 500 with a JSON body carrying
//! `statusCode: 401` / `errorCode: 4012`. Any other 500 is a transient server error.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::batch::{BatchSource, Continuation, WorkUnit};
use crate::connector::{Connector, ConnectorPolicy};
use crate::credential::{parse_login_body, token_field, AuthScheme, Authenticator, Credential};
use crate::error::{AuthError, ConfigError, MalformedRow};
use crate::http_client::{HttpError, HttpRequest, HttpResponse, AUTH_TIMEOUT, DATA_TIMEOUT};
use crate::items::{Catalog, MeyerItemInformation, NormalizedItem};
use crate::outcome::{json_type, Payload, RequestOutcome, ResponseBody};
use crate::source::Supplier;

pub(crate) const ITEM_INFORMATION: &str = "item_information";

const NO_RESULTS_STATUS: i64 = 500;
const NO_RESULTS_ERROR: i64 = 40501;
const TOKEN_REJECTED_STATUS: i64 = 401;
const TOKEN_REJECTED_ERROR: i64 = 4012;

struct MeyerLogin {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

impl Authenticator for MeyerLogin {
    fn supplier(&self) -> Supplier {
        Supplier::Meyer
    }

    fn login_request(&self, base_url: &str) -> Result<HttpRequest, AuthError> {
        HttpRequest::post(format!("{base_url}Authentication"))
            .with_json(&LoginBody {
                username: &self.username,
                password: &self.password,
            })
            .map(|request| request.with_timeout(AUTH_TIMEOUT))
            .map_err(|error| AuthError::Transport {
                supplier: Supplier::Meyer,
                message: format!("failed to encode login body: {error}"),
            })
    }

    fn parse_credential(&self, body: &str) -> Result<Credential, AuthError> {
        let body = parse_login_body(Supplier::Meyer, body)?;
        let token = token_field(Supplier::Meyer, &body, "apikey")?;
        Ok(Credential::new(token, AuthScheme::Espresso))
    }
}

pub struct MeyerConnector {
    base_url: String,
    catalog: Arc<Catalog>,
    authenticator: Arc<MeyerLogin>,
}

impl MeyerConnector {
    pub fn item_information(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            catalog,
            authenticator: Arc::new(MeyerLogin {
                username: username.into(),
                password: password.into(),
            }),
        }
    }
}

impl Connector for MeyerConnector {
    fn supplier(&self) -> Supplier {
        Supplier::Meyer
    }

    fn endpoint(&self) -> &'static str {
        ITEM_INFORMATION
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn policy(&self) -> ConnectorPolicy {
        ConnectorPolicy::chunked()
    }

    fn authenticator(&self) -> Arc<dyn Authenticator> {
        self.authenticator.clone()
    }

    fn batch_source(
        &self,
        batch_size: usize,
        resume: Option<&Continuation>,
    ) -> Result<BatchSource, ConfigError> {
        super::chunked_source(&self.catalog, batch_size, resume)
    }

    fn build_request(&self, unit: &WorkUnit, credential: &Credential) -> HttpRequest {
        let numbers = unit.identifiers().join(",");
        HttpRequest::get(format!(
            "{}ItemInformation?ItemNumber={}",
            self.base_url,
            urlencoding::encode(&numbers)
        ))
        .with_auth(&credential.http_auth())
        .with_timeout(DATA_TIMEOUT)
    }

    fn classify(&self, response: Result<HttpResponse, HttpError>, url: &str) -> RequestOutcome {
        let response = match response {
            Ok(response) => response,
            Err(error) => return RequestOutcome::from_transport_error(&error, url),
        };

        if response.status == 200 {
            return match ResponseBody::parse(&response.body) {
                Some(ResponseBody::Rows(rows)) => RequestOutcome::Success(Payload::rows(rows)),
                Some(ResponseBody::Object(object)) if is_no_results(&object) => {
                    RequestOutcome::EmptyResult
                }
                Some(ResponseBody::Object(object)) => RequestOutcome::Fatal(format!(
                    "unexpected object body: {}",
                    Value::Object(object)
                )),
                None => RequestOutcome::Fatal(String::from("200 response body is not a JSON array or object")),
            };
        }
        if is_token_rejected(&response) {
            return RequestOutcome::AuthExpired;
        }
        RequestOutcome::transient(&response, url)
    }

    fn next_work_unit(&self, _previous: &WorkUnit, _payload: &Payload) -> Option<WorkUnit> {
        None
    }

    fn decode(&self, row: &Value) -> Result<NormalizedItem, MalformedRow> {
        if !row.is_object() {
            return Err(MalformedRow::new(
                "row",
                format!("is a JSON {}, expected an object", json_type(row)),
            ));
        }
        MeyerItemInformation::from_row(row, &self.catalog).map(NormalizedItem::MeyerItemInformation)
    }
}

fn integer_field(object: &Map<String, Value>, name: &str) -> Option<i64> {
    object.get(name).and_then(Value::as_i64)
}

fn is_no_results(object: &Map<String, Value>) -> bool {
    integer_field(object, "statusCode") == Some(NO_RESULTS_STATUS)
        && integer_field(object, "errorCode").map_or(true, |code| code == NO_RESULTS_ERROR)
}

fn is_token_rejected(response: &HttpResponse) -> bool {
    if response.status == 401 {
        return true;
    }
    if response.status != 500 {
        return false;
    }
    match ResponseBody::parse(&response.body) {
        Some(ResponseBody::Object(object)) => {
            integer_field(&object, "statusCode") == Some(TOKEN_REJECTED_STATUS)
                || integer_field(&object, "errorCode") == Some(TOKEN_REJECTED_ERROR)
        }
        _ => false,
    }
}
