//! Credential store: one token slot, minted by a supplier-specific login call.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AuthError;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::source::Supplier;

/// How a token is encoded into the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Bearer <token>`
    Bearer,
    /// `Espresso <token>:1`
    Espresso,
    /// `<token_type> <token>`, the type being returned by the login call.
    TokenType(String),
}

/// Opaque token value plus its header encoding rule.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    scheme: AuthScheme,
}

impl Credential {
    pub fn new(token: impl Into<String>, scheme: AuthScheme) -> Self {
        Self {
            token: token.into(),
            scheme,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    pub fn http_auth(&self) -> HttpAuth {
        match &self.scheme {
            AuthScheme::Bearer => HttpAuth::BearerToken(self.token.clone()),
            AuthScheme::Espresso => HttpAuth::Header {
                name: String::from("authorization"),
                value: format!("Espresso {}:1", self.token),
            },
            AuthScheme::TokenType(token_type) => HttpAuth::Header {
                name: String::from("authorization"),
                value: format!("{token_type} {}", self.token),
            },
        }
    }
}

// Tokens never reach logs.
impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Supplier-specific login call.
pub trait Authenticator: Send + Sync {
    fn supplier(&self) -> Supplier;

    /// Login request against `base_url`.
    fn login_request(&self, base_url: &str) -> Result<HttpRequest, AuthError>;

    /// Extract the credential from a successful login response body.
    fn parse_credential(&self, body: &str) -> Result<Credential, AuthError>;
}

/// Holds the current credential and knows how to mint a fresh one.
pub struct CredentialStore {
    http: Arc<dyn HttpClient>,
    authenticator: Arc<dyn Authenticator>,
    base_url: String,
    current: Option<Credential>,
    logins: u32,
    refreshes: u32,
}

impl CredentialStore {
    pub fn new(
        http: Arc<dyn HttpClient>,
        authenticator: Arc<dyn Authenticator>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authenticator,
            base_url: base_url.into(),
            current: None,
            logins: 0,
            refreshes: 0,
        }
    }

    /// Perform a login call and store its credential in the slot.
    pub async fn acquire(&mut self) -> Result<Credential, AuthError> {
        let supplier = self.authenticator.supplier();
        let request = self.authenticator.login_request(&self.base_url)?;
        debug!(%supplier, "requesting access token");

        self.logins = self.logins.saturating_add(1);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|error| AuthError::Transport {
                supplier,
                message: error.message().to_owned(),
            })?;

        if !response.is_success() {
            return Err(AuthError::Rejected {
                supplier,
                status: response.status,
                body: response.body,
            });
        }

        let credential = self.authenticator.parse_credential(&response.body)?;
        info!(%supplier, "access token acquired");
        self.current = Some(credential.clone());
        Ok(credential)
    }

    /// Discard the current credential and acquire a new one.
    pub async fn refresh(&mut self) -> Result<Credential, AuthError> {
        self.current = None;
        self.refreshes = self.refreshes.saturating_add(1);
        self.acquire().await
    }

    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Number of login calls issued, including refreshes.
    pub const fn logins(&self) -> u32 {
        self.logins
    }

    pub const fn refreshes(&self) -> u32 {
        self.refreshes
    }
}

/// Pull a string field out of a JSON login body.
pub(crate) fn token_field(
    supplier: Supplier,
    body: &serde_json::Value,
    field: &str,
) -> Result<String, AuthError> {
    match body.get(field) {
        Some(serde_json::Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        Some(_) => Err(AuthError::MalformedToken {
            supplier,
            detail: format!("field '{field}' is not a non-empty string"),
        }),
        None => Err(AuthError::MalformedToken {
            supplier,
            detail: format!("field '{field}' is missing"),
        }),
    }
}

pub(crate) fn parse_login_body(
    supplier: Supplier,
    body: &str,
) -> Result<serde_json::Value, AuthError> {
    serde_json::from_str(body).map_err(|error| AuthError::MalformedToken {
        supplier,
        detail: format!("login body is not JSON: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    struct FixedLogin {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
    }

    impl HttpClient for FixedLogin {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let next = self.responses.lock().expect("lock").remove(0);
            Box::pin(async move { next })
        }
    }

    struct TokenLogin;

    impl Authenticator for TokenLogin {
        fn supplier(&self) -> Supplier {
            Supplier::Premier
        }

        fn login_request(&self, base_url: &str) -> Result<HttpRequest, AuthError> {
            Ok(HttpRequest::get(format!("{base_url}authenticate")))
        }

        fn parse_credential(&self, body: &str) -> Result<Credential, AuthError> {
            let body = parse_login_body(Supplier::Premier, body)?;
            let token = token_field(Supplier::Premier, &body, "sessionToken")?;
            Ok(Credential::new(token, AuthScheme::Bearer))
        }
    }

    fn store(responses: Vec<Result<HttpResponse, HttpError>>) -> CredentialStore {
        CredentialStore::new(
            Arc::new(FixedLogin {
                responses: Mutex::new(responses),
            }),
            Arc::new(TokenLogin),
            "https://api.test/",
        )
    }

    #[test]
    fn schemes_encode_authorization_header() {
        let espresso = Credential::new("abc", AuthScheme::Espresso).http_auth();
        let typed = Credential::new("xyz", AuthScheme::TokenType(String::from("Bearer"))).http_auth();

        let request = HttpRequest::get("https://api.test/").with_auth(&espresso);
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Espresso abc:1")
        );
        let request = HttpRequest::get("https://api.test/").with_auth(&typed);
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer xyz")
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let credential = Credential::new("secret-token", AuthScheme::Bearer);
        assert!(!format!("{credential:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn refresh_replaces_the_slot_wholesale() {
        let mut store = store(vec![
            Ok(HttpResponse::ok_json(r#"{"sessionToken":"first"}"#)),
            Ok(HttpResponse::ok_json(r#"{"sessionToken":"second"}"#)),
        ]);

        store.acquire().await.expect("first login");
        assert_eq!(store.current().map(Credential::token), Some("first"));

        store.refresh().await.expect("refresh");
        assert_eq!(store.current().map(Credential::token), Some("second"));
        assert_eq!(store.logins(), 2);
        assert_eq!(store.refreshes(), 1);
    }

    #[tokio::test]
    async fn rejected_login_carries_the_response_body() {
        let mut store = store(vec![Ok(HttpResponse::new(403, r#"{"error":"bad key"}"#))]);

        let error = store.acquire().await.expect_err("rejected");
        assert_eq!(
            error,
            AuthError::Rejected {
                supplier: Supplier::Premier,
                status: 403,
                body: String::from(r#"{"error":"bad key"}"#),
            }
        );
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_the_slot_empty() {
        let mut store = store(vec![
            Ok(HttpResponse::ok_json(r#"{"sessionToken":"first"}"#)),
            Err(HttpError::timeout("login timed out")),
        ]);

        store.acquire().await.expect("first login");
        let error = store.refresh().await.expect_err("transport failure");
        assert!(matches!(error, AuthError::Transport { .. }));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn missing_token_field_is_malformed() {
        let mut store = store(vec![Ok(HttpResponse::ok_json(r#"{"token":"x"}"#))]);

        let error = store.acquire().await.expect_err("malformed");
        assert!(matches!(error, AuthError::MalformedToken { .. }));
    }
}
