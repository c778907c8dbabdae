//! Turn14 `/v1/items` and `/v1/items/data` connectors.
//!
//! Both endpoints are cursor-paginated: every page carries `links.next`, a path relative to
//! the API root, and the last page carries none. Requests are limited to five per second.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::batch::{BatchSource, Continuation, WorkUnit};
use crate::connector::{Connector, ConnectorPolicy};
use crate::credential::{parse_login_body, token_field, AuthScheme, Authenticator, Credential};
use crate::error::{AuthError, ConfigError, MalformedRow};
use crate::http_client::{HttpError, HttpRequest, HttpResponse, AUTH_TIMEOUT, DATA_TIMEOUT};
use crate::items::{Catalog, NormalizedItem, Turn14Item, Turn14ItemData};
use crate::outcome::{json_type, PageEnvelope, Payload, RequestOutcome};
use crate::source::Supplier;
use crate::throttling::RequestThrottle;

const REQUESTS_PER_SECOND: u32 = 5;
/// The pass stops on the fifth consecutive timeout or non-200 response, not on the sixth
/// (a `> 5` counter check would allow one more request).
const TIMEOUT_CEILING: u32 = 5;
const FAILURE_CEILING: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn14Endpoint {
    Items,
    ItemData,
}

impl Turn14Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::ItemData => "item_data",
        }
    }

    const fn first_page(self) -> &'static str {
        match self {
            Self::Items => "/v1/items?page=1",
            Self::ItemData => "/v1/items/data?page=1",
        }
    }
}

struct Turn14Login {
    client_id: String,
    client_secret: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl Authenticator for Turn14Login {
    fn supplier(&self) -> Supplier {
        Supplier::Turn14
    }

    fn login_request(&self, base_url: &str) -> Result<HttpRequest, AuthError> {
        HttpRequest::post(format!("{base_url}/v1/token"))
            .with_json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .map(|request| request.with_timeout(AUTH_TIMEOUT))
            .map_err(|error| AuthError::Transport {
                supplier: Supplier::Turn14,
                message: format!("failed to encode token request: {error}"),
            })
    }

    fn parse_credential(&self, body: &str) -> Result<Credential, AuthError> {
        let body = parse_login_body(Supplier::Turn14, body)?;
        let token = token_field(Supplier::Turn14, &body, "access_token")?;
        let token_type = token_field(Supplier::Turn14, &body, "token_type")?;
        Ok(Credential::new(token, AuthScheme::TokenType(token_type)))
    }
}

pub struct Turn14Connector {
    endpoint: Turn14Endpoint,
    base_url: String,
    /// `None` for item data, which is keyed by API id only.
    catalog: Option<Arc<Catalog>>,
    authenticator: Arc<Turn14Login>,
    throttle: RequestThrottle,
}

impl Turn14Connector {
    fn new(
        endpoint: Turn14Endpoint,
        base_url: String,
        client_id: String,
        client_secret: String,
        catalog: Option<Arc<Catalog>>,
    ) -> Self {
        Self {
            endpoint,
            base_url: base_url.trim_end_matches('/').to_owned(),
            catalog,
            authenticator: Arc::new(Turn14Login {
                client_id,
                client_secret,
            }),
            throttle: RequestThrottle::per_second(REQUESTS_PER_SECOND),
        }
    }

    pub fn items(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self::new(
            Turn14Endpoint::Items,
            base_url.into(),
            client_id.into(),
            client_secret.into(),
            Some(catalog),
        )
    }

    pub fn item_data(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::new(
            Turn14Endpoint::ItemData,
            base_url.into(),
            client_id.into(),
            client_secret.into(),
            None,
        )
    }

    fn page_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            format!("{}{path}", self.base_url)
        }
    }
}

impl Connector for Turn14Connector {
    fn supplier(&self) -> Supplier {
        Supplier::Turn14
    }

    fn endpoint(&self) -> &'static str {
        self.endpoint.as_str()
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn policy(&self) -> ConnectorPolicy {
        ConnectorPolicy {
            throttle: Some(self.throttle.clone()),
            ..ConnectorPolicy::cursor(TIMEOUT_CEILING, FAILURE_CEILING)
        }
    }

    fn authenticator(&self) -> Arc<dyn Authenticator> {
        self.authenticator.clone()
    }

    fn batch_source(
        &self,
        _batch_size: usize,
        resume: Option<&Continuation>,
    ) -> Result<BatchSource, ConfigError> {
        super::cursor_source(resume)
    }

    fn build_request(&self, unit: &WorkUnit, credential: &Credential) -> HttpRequest {
        let path = match unit {
            WorkUnit::Page(Some(path)) => path.as_str(),
            WorkUnit::Page(None) | WorkUnit::Batch(_) => self.endpoint.first_page(),
        };
        HttpRequest::get(self.page_url(path))
            .with_auth(&credential.http_auth())
            .with_timeout(DATA_TIMEOUT)
    }

    fn classify(&self, response: Result<HttpResponse, HttpError>, url: &str) -> RequestOutcome {
        let response = match response {
            Ok(response) => response,
            Err(error) => return RequestOutcome::from_transport_error(&error, url),
        };

        match response.status {
            401 => RequestOutcome::AuthExpired,
            200 => match PageEnvelope::parse(&response.body) {
                Ok(envelope) => RequestOutcome::Success(envelope.into_payload()),
                Err(detail) => RequestOutcome::Fatal(detail),
            },
            _ => RequestOutcome::transient(&response, url),
        }
    }

    fn next_work_unit(&self, _previous: &WorkUnit, payload: &Payload) -> Option<WorkUnit> {
        payload
            .next
            .as_ref()
            .map(|next| WorkUnit::Page(Some(next.clone())))
    }

    fn decode(&self, row: &Value) -> Result<NormalizedItem, MalformedRow> {
        if !row.is_object() {
            return Err(MalformedRow::new(
                "row",
                format!("is a JSON {}, expected an object", json_type(row)),
            ));
        }
        match (&self.catalog, self.endpoint) {
            (Some(catalog), Turn14Endpoint::Items) => {
                Turn14Item::from_row(row, catalog).map(NormalizedItem::Turn14Item)
            }
            (None, Turn14Endpoint::Items) => Err(MalformedRow::new(
                "part_number",
                "cannot be matched without a catalog",
            )),
            (_, Turn14Endpoint::ItemData) => {
                Turn14ItemData::from_row(row).map(NormalizedItem::Turn14ItemData)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Pagination;
    use crate::outcome::OutcomeKind;
    use serde_json::json;

    fn items() -> Turn14Connector {
        Turn14Connector::items(
            "https://turn14.test/",
            "client",
            "secret",
            Arc::new(Catalog::from([(String::from("T14-1"), 31)])),
        )
    }

    #[test]
    fn token_request_uses_client_credentials() {
        let login = Turn14Login {
            client_id: String::from("client"),
            client_secret: String::from("secret"),
        };
        let request = login.login_request("https://turn14.test").expect("request");
        assert_eq!(request.url, "https://turn14.test/v1/token");
        let body: Value =
            serde_json::from_str(request.body.as_deref().unwrap_or_default()).expect("json body");
        assert_eq!(body["grant_type"], "client_credentials");
        assert_eq!(body["client_id"], "client");

        let credential = login
            .parse_credential(r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#)
            .expect("token");
        assert_eq!(credential.scheme(), &AuthScheme::TokenType(String::from("Bearer")));
        assert!(login.parse_credential(r#"{"access_token":"tok"}"#).is_err());
    }

    #[test]
    fn pages_resolve_against_the_api_root() {
        let connector = items();
        let credential = Credential::new("tok", AuthScheme::TokenType(String::from("Bearer")));

        let first = connector.build_request(&WorkUnit::Page(None), &credential);
        assert_eq!(first.url, "https://turn14.test/v1/items?page=1");
        assert_eq!(
            first.headers.get("authorization").map(String::as_str),
            Some("Bearer tok")
        );

        let next = connector.build_request(
            &WorkUnit::Page(Some(String::from("/v1/items?page=2"))),
            &credential,
        );
        assert_eq!(next.url, "https://turn14.test/v1/items?page=2");

        let absolute = connector.build_request(
            &WorkUnit::Page(Some(String::from("https://mirror.test/v1/items?page=3"))),
            &credential,
        );
        assert_eq!(absolute.url, "https://mirror.test/v1/items?page=3");
    }

    #[test]
    fn envelope_drives_the_cursor() {
        let connector = items();
        let outcome = connector.classify(
            Ok(HttpResponse::ok_json(
                r#"{"data":[{"id":"1"}],"links":{"next":"/v1/items?page=2"}}"#,
            )),
            "u",
        );
        let RequestOutcome::Success(payload) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(
            connector.next_work_unit(&WorkUnit::Page(None), &payload),
            Some(WorkUnit::Page(Some(String::from("/v1/items?page=2"))))
        );

        let outcome = connector.classify(
            Ok(HttpResponse::ok_json(r#"{"data":[],"links":{"next":null}}"#)),
            "u",
        );
        let RequestOutcome::Success(payload) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(connector.next_work_unit(&WorkUnit::Page(None), &payload), None);
    }

    #[test]
    fn classification_by_status() {
        let connector = items();
        let classify = |response| connector.classify(Ok(response), "u").kind();
        assert_eq!(classify(HttpResponse::new(401, "")), OutcomeKind::AuthExpired);
        assert_eq!(classify(HttpResponse::new(429, "")), OutcomeKind::TransientServerError);
        assert_eq!(classify(HttpResponse::ok_json("[1,2]")), OutcomeKind::Fatal);
    }

    #[test]
    fn policy_is_cursor_without_requeue() {
        let policy = items().policy();
        assert_eq!(policy.pagination, Pagination::Cursor);
        assert!(!policy.requeue);
        assert_eq!(policy.timeout_ceiling, Some(5));
        assert_eq!(policy.failure_ceiling, Some(5));
        assert!(policy.throttle.is_some());
    }

    #[test]
    fn item_data_decodes_without_a_catalog() {
        let connector = Turn14Connector::item_data("https://turn14.test", "client", "secret");
        let item = connector
            .decode(&json!({
                "id": "9001",
                "files": [{ "media_content": "Photo", "links": [{ "url": "https://img/1.jpg" }] }],
                "vehicle_fitments": [{ "vehicle_id": 7 }, { "vehicle_id": 3 }, { "vehicle_id": 7 }],
            }))
            .expect("valid row");
        let NormalizedItem::Turn14ItemData(data) = item else {
            panic!("unexpected item kind");
        };
        assert_eq!(data.vehicle_ids, vec![3, 7]);
        assert_eq!(data.media.len(), 1);
    }
}
