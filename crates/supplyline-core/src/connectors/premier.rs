//! Premier `pricing` and `inventory` connectors.

use std::sync::Arc;

use serde_json::Value;

use crate::batch::{BatchSource, Continuation, WorkUnit};
use crate::connector::{Connector, ConnectorPolicy};
use crate::credential::{parse_login_body, token_field, AuthScheme, Authenticator, Credential};
use crate::error::{AuthError, ConfigError, MalformedRow};
use crate::http_client::{HttpError, HttpRequest, HttpResponse, AUTH_TIMEOUT, DATA_TIMEOUT};
use crate::items::{Catalog, NormalizedItem, PremierInventory, PremierPricing};
use crate::outcome::{json_type, Payload, RequestOutcome, ResponseBody};
use crate::source::Supplier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremierEndpoint {
    Pricing,
    Inventory,
}

impl PremierEndpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pricing => "pricing",
            Self::Inventory => "inventory",
        }
    }
}

struct PremierLogin {
    api_key: String,
}

impl Authenticator for PremierLogin {
    fn supplier(&self) -> Supplier {
        Supplier::Premier
    }

    fn login_request(&self, base_url: &str) -> Result<HttpRequest, AuthError> {
        Ok(HttpRequest::get(format!(
            "{base_url}authenticate?apiKey={}",
            urlencoding::encode(&self.api_key)
        ))
        .with_timeout(AUTH_TIMEOUT))
    }

    fn parse_credential(&self, body: &str) -> Result<Credential, AuthError> {
        let body = parse_login_body(Supplier::Premier, body)?;
        let token = token_field(Supplier::Premier, &body, "sessionToken")?;
        Ok(Credential::new(token, AuthScheme::Bearer))
    }
}

/// Both Premier endpoints take a comma-joined `itemNumbers` list and answer with an array.
pub struct PremierConnector {
    endpoint: PremierEndpoint,
    base_url: String,
    catalog: Arc<Catalog>,
    authenticator: Arc<PremierLogin>,
}

impl PremierConnector {
    pub fn new(
        endpoint: PremierEndpoint,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            endpoint,
            base_url: base_url.into(),
            catalog,
            authenticator: Arc::new(PremierLogin {
                api_key: api_key.into(),
            }),
        }
    }

    pub fn pricing(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self::new(PremierEndpoint::Pricing, base_url, api_key, catalog)
    }

    pub fn inventory(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self::new(PremierEndpoint::Inventory, base_url, api_key, catalog)
    }
}

impl Connector for PremierConnector {
    fn supplier(&self) -> Supplier {
        Supplier::Premier
    }

    fn endpoint(&self) -> &'static str {
        self.endpoint.as_str()
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
            "{}{}?itemNumbers={}",
            self.base_url,
            self.endpoint.as_str(),
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

        match response.status {
            // The reqwest transport reports the canonical phrase, so a real 401 always matches.
            401 if response.reason == "Unauthorized" => {
                RequestOutcome::AuthExpired
            }
            200 => match ResponseBody::parse(&response.body) {
                Some(ResponseBody::Rows(rows)) => RequestOutcome::Success(Payload::rows(rows)),
                Some(ResponseBody::Object(object)) => RequestOutcome::Fatal(format!(
                    "expected an array of items, got {}",
                    Value::Object(object)
                )),
                None => RequestOutcome::Fatal(String::from("200 response body is not a JSON array")),
            },
            _ => RequestOutcome::transient(&response, url),
        }
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
        match self.endpoint {
            PremierEndpoint::Pricing => {
                PremierPricing::from_row(row, &self.catalog).map(NormalizedItem::PremierPricing)
            }
            PremierEndpoint::Inventory => {
                PremierInventory::from_row(row, &self.catalog).map(NormalizedItem::PremierInventory)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeKind;
    use serde_json::json;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from([
            (String::from("PRE-1"), 21),
            (String::from("PRE-2"), 22),
        ]))
    }

    #[test]
    fn login_sends_the_api_key_as_a_query_parameter() {
        let login = PremierLogin {
            api_key: String::from("k&y"),
        };
        let request = login.login_request("https://premier.test/api/v5/").expect("request");
        assert_eq!(
            request.url,
            "https://premier.test/api/v5/authenticate?apiKey=k%26y"
        );
        let credential = login
            .parse_credential(r#"{"sessionToken":"tok"}"#)
            .expect("token");
        assert_eq!(credential.scheme(), &AuthScheme::Bearer);
        assert_eq!(credential.token(), "tok");
    }

    #[test]
    fn data_request_targets_the_endpoint_path() {
        let connector = PremierConnector::inventory("https://premier.test/api/v5/", "k", catalog());
        let unit = WorkUnit::Batch(vec![String::from("PRE-1"), String::from("PRE-2")]);
        let request = connector.build_request(&unit, &Credential::new("tok", AuthScheme::Bearer));
        assert_eq!(
            request.url,
            "https://premier.test/api/v5/inventory?itemNumbers=PRE-1%2CPRE-2"
        );
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer tok")
        );
    }

    #[test]
    fn only_an_unauthorized_401_expires_the_session() {
        let connector = PremierConnector::pricing("https://premier.test/", "k", catalog());
        let classify = |response: HttpResponse| connector.classify(Ok(response), "u").kind();

        assert_eq!(classify(HttpResponse::new(401, "")), OutcomeKind::AuthExpired);
        assert_eq!(
            classify(HttpResponse::new(401, "").with_reason("UNAUTHORIZED")),
            OutcomeKind::TransientServerError
        );
        assert_eq!(
            classify(HttpResponse::new(401, "").with_reason("Session Closed")),
            OutcomeKind::TransientServerError
        );
        assert_eq!(classify(HttpResponse::new(502, "")), OutcomeKind::TransientServerError);
        assert_eq!(classify(HttpResponse::ok_json("[]")), OutcomeKind::Success);
        assert_eq!(classify(HttpResponse::ok_json("{}")), OutcomeKind::Fatal);
    }

    #[test]
    fn decode_follows_the_endpoint() {
        let row = json!({
            "itemNumber": "PRE-2",
            "pricing": [{ "currency": "USD", "cost": 10.5 }],
            "inventory": [{ "warehouseCode": "UT-1-US", "quantityAvailable": 4 }],
        });

        let pricing = PremierConnector::pricing("https://premier.test/", "k", catalog());
        assert!(matches!(
            pricing.decode(&row),
            Ok(NormalizedItem::PremierPricing(item)) if item.usd.cost == Some(10.5)
        ));

        let inventory = PremierConnector::inventory("https://premier.test/", "k", catalog());
        assert!(matches!(
            inventory.decode(&row),
            Ok(NormalizedItem::PremierInventory(item)) if item.supplier_item_id == 22
        ));
    }
}
