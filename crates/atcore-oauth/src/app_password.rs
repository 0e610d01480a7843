//! Legacy app-password login: `com.atproto.server.createSession` /
//! `refreshSession`. No DPoP key, no PKCE, no authorization-server redirect;
//! just an identifier/password POST against the PDS. Kept around for
//! clients and bots that can't or don't want to run the interactive OAuth
//! flow.

use atcore_common::http_client::{AuthorizationToken, HttpClient};
use atcore_common::types::did::Did;
use atcore_common::{CowStr, IntoStatic};
use http::{Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

/// Errors from the app-password login/refresh flow.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AppPasswordError {
    #[error("HTTP transport error: {0}")]
    #[diagnostic(code(atcore_oauth::app_password::transport))]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("request construction failed: {0}")]
    #[diagnostic(code(atcore_oauth::app_password::request))]
    Request(#[from] http::Error),

    #[error("failed to (de)serialize session: {0}")]
    #[diagnostic(code(atcore_oauth::app_password::serde))]
    Serde(#[from] serde_json::Error),

    #[error("{identifier}: {message}")]
    #[diagnostic(code(atcore_oauth::app_password::rejected))]
    Rejected {
        identifier: &'static str,
        message: String,
    },

    #[error("session has no refresh token")]
    #[diagnostic(code(atcore_oauth::app_password::no_refresh_token))]
    NoRefreshToken,
}

type Result<T> = core::result::Result<T, AppPasswordError>;

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    #[serde(rename = "refreshJwt")]
    refresh_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    error: String,
    message: Option<String>,
}

/// A logged-in app-password session: handle, DID, and the bearer token
/// pair. Carries no DPoP key, per RFC 9449 being an OAuth-only mechanism.
#[derive(Debug, Clone)]
pub struct AppPasswordTokens {
    pub did: Did<'static>,
    pub handle: CowStr<'static>,
    pub access_jwt: CowStr<'static>,
    pub refresh_jwt: CowStr<'static>,
}

/// `POST <pds>/xrpc/com.atproto.server.createSession`.
pub async fn create_session<T: HttpClient>(
    client: &T,
    pds_url: &Url,
    identifier: &str,
    password: &str,
) -> Result<AppPasswordTokens> {
    let body = serde_json::to_vec(&CreateSessionBody { identifier, password })?;
    let req = Request::builder()
        .uri(format!("{}xrpc/com.atproto.server.createSession", ensure_trailing_slash(pds_url)))
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(body)?;
    let res = client
        .send_http(req)
        .await
        .map_err(|e| AppPasswordError::Transport(Box::new(e)))?;
    into_tokens(res)
}

/// `POST <pds>/xrpc/com.atproto.server.refreshSession` using the refresh
/// token as a bearer credential (no body).
pub async fn refresh_session<T: HttpClient>(
    client: &T,
    pds_url: &Url,
    refresh_jwt: &str,
) -> Result<AppPasswordTokens> {
    let req = Request::builder()
        .uri(format!("{}xrpc/com.atproto.server.refreshSession", ensure_trailing_slash(pds_url)))
        .method(Method::POST)
        .header("Authorization", format!("Bearer {refresh_jwt}"))
        .body(Vec::new())?;
    let res = client
        .send_http(req)
        .await
        .map_err(|e| AppPasswordError::Transport(Box::new(e)))?;
    into_tokens(res)
}

fn ensure_trailing_slash(url: &Url) -> CowStr<'static> {
    let s = url.as_str();
    if s.ends_with('/') {
        s.to_string().into()
    } else {
        format!("{s}/").into()
    }
}

fn into_tokens(res: http::Response<Vec<u8>>) -> Result<AppPasswordTokens> {
    if res.status() == StatusCode::OK {
        let parsed: SessionResponse = serde_json::from_slice(res.body())?;
        Ok(AppPasswordTokens {
            did: Did::new_owned(parsed.did)
                .map_err(|e| AppPasswordError::Rejected {
                    identifier: "invalid `did` in session response",
                    message: e.to_string(),
                })?
                .into_static(),
            handle: parsed.handle.into(),
            access_jwt: parsed.access_jwt.into(),
            refresh_jwt: parsed.refresh_jwt.into(),
        })
    } else {
        let body: XrpcErrorBody = serde_json::from_slice(res.body()).unwrap_or(XrpcErrorBody {
            error: res.status().to_string(),
            message: None,
        });
        Err(AppPasswordError::Rejected {
            identifier: "createSession/refreshSession rejected",
            message: body.message.unwrap_or(body.error),
        })
    }
}

/// A live app-password session. No DPoP, single-flight refresh on the
/// current token, and the same refresh-on-401 pattern as the OAuth
/// session so the authenticated client can stay generic over both.
pub struct AppPasswordSession<T> {
    client: std::sync::Arc<T>,
    pds_url: Url,
    tokens: RwLock<AppPasswordTokens>,
}

impl<T> AppPasswordSession<T> {
    pub fn new(client: std::sync::Arc<T>, pds_url: Url, tokens: AppPasswordTokens) -> Self {
        Self {
            client,
            pds_url,
            tokens: RwLock::new(tokens),
        }
    }

    pub async fn did(&self) -> Did<'static> {
        self.tokens.read().await.did.clone()
    }

    pub async fn handle(&self) -> CowStr<'static> {
        self.tokens.read().await.handle.clone()
    }

    pub async fn access_token(&self) -> AuthorizationToken<'static> {
        AuthorizationToken::Bearer(self.tokens.read().await.access_jwt.clone())
    }

    pub async fn refresh_token(&self) -> Option<AuthorizationToken<'static>> {
        Some(AuthorizationToken::Bearer(
            self.tokens.read().await.refresh_jwt.clone(),
        ))
    }
}

impl<T: HttpClient> AppPasswordSession<T> {
    /// Exchange the current refresh token for a fresh token pair.
    pub async fn refresh(&self) -> Result<AuthorizationToken<'static>> {
        let refresh_jwt = self.tokens.read().await.refresh_jwt.clone();
        let fresh = refresh_session(self.client.as_ref(), &self.pds_url, refresh_jwt.as_ref()).await?;
        let token = AuthorizationToken::Bearer(fresh.access_jwt.clone());
        *self.tokens.write().await = fresh;
        Ok(token)
    }
}

impl<T> HttpClient for AppPasswordSession<T>
where
    T: HttpClient + Send + Sync + 'static,
{
    type Error = atcore_common::error::TransportError;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        use atcore_common::error::TransportError;

        let (parts, body) = request.into_parts();
        let access = self.access_token().await;

        let build = |parts: &http::request::Parts, body: &[u8], token: &AuthorizationToken<'_>| {
            let mut req = Request::builder().uri(parts.uri.clone()).method(parts.method.clone());
            for (name, value) in parts.headers.iter() {
                req = req.header(name, value);
            }
            req.header("Authorization", token.header_value()).body(body.to_vec())
        };

        let req = build(&parts, &body, &access).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let res = self
            .client
            .send_http(req)
            .await
            .map_err(|e| TransportError::Other(Box::new(e)))?;

        if res.status() == StatusCode::UNAUTHORIZED {
            if let Ok(new_token) = self.refresh().await {
                let retry = build(&parts, &body, &new_token)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                return self
                    .client
                    .send_http(retry)
                    .await
                    .map_err(|e| TransportError::Other(Box::new(e)));
            }
        }

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockClient {
        queue: Arc<Mutex<VecDeque<http::Response<Vec<u8>>>>>,
        log: Arc<Mutex<Vec<http::Request<Vec<u8>>>>>,
    }

    impl MockClient {
        async fn push(&self, resp: http::Response<Vec<u8>>) {
            self.queue.lock().await.push_back(resp);
        }
    }

    impl HttpClient for MockClient {
        type Error = std::convert::Infallible;

        async fn send_http(
            &self,
            request: http::Request<Vec<u8>>,
        ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
            self.log.lock().await.push(request);
            Ok(self.queue.lock().await.pop_front().expect("no queued response"))
        }
    }

    fn session_body(access: &str, refresh: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "accessJwt": access,
            "refreshJwt": refresh,
            "did": "did:plc:alice",
            "handle": "alice.example.com",
        }))
        .unwrap()
    }

    fn ok_response(body: Vec<u8>) -> http::Response<Vec<u8>> {
        http::Response::builder().status(StatusCode::OK).body(body).unwrap()
    }

    #[tokio::test]
    async fn create_session_parses_tokens() {
        let client = MockClient::default();
        client.push(ok_response(session_body("acc1", "ref1"))).await;

        let tokens = create_session(&client, &Url::parse("https://pds.example").unwrap(), "alice.example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(tokens.did.as_ref(), "did:plc:alice");
        assert_eq!(tokens.handle.as_ref(), "alice.example.com");
        assert_eq!(tokens.access_jwt.as_ref(), "acc1");
        assert_eq!(tokens.refresh_jwt.as_ref(), "ref1");
    }

    #[tokio::test]
    async fn create_session_rejects_error_response() {
        let client = MockClient::default();
        let body = serde_json::to_vec(&serde_json::json!({
            "error": "AuthenticationRequired",
            "message": "Invalid identifier or password",
        }))
        .unwrap();
        client
            .push(http::Response::builder().status(StatusCode::UNAUTHORIZED).body(body).unwrap())
            .await;

        let err = create_session(&client, &Url::parse("https://pds.example").unwrap(), "alice.example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AppPasswordError::Rejected { .. }));
    }

    #[tokio::test]
    async fn send_http_refreshes_once_on_401_then_retries() {
        let inner = MockClient::default();
        // First call with the stale access token: unauthorized.
        inner
            .push(http::Response::builder().status(StatusCode::UNAUTHORIZED).body(Vec::new()).unwrap())
            .await;
        // refreshSession response.
        inner.push(ok_response(session_body("acc2", "ref2"))).await;
        // Retried original request with the fresh token.
        inner.push(ok_response(b"ok".to_vec())).await;

        let session = AppPasswordSession::new(
            Arc::new(inner.clone()),
            Url::parse("https://pds.example").unwrap(),
            AppPasswordTokens {
                did: Did::new_owned("did:plc:alice").unwrap(),
                handle: "alice.example.com".to_string().into(),
                access_jwt: "acc1".to_string().into(),
                refresh_jwt: "ref1".to_string().into(),
            },
        );

        let req = http::Request::builder()
            .uri("https://pds.example/xrpc/app.bsky.feed.getTimeline")
            .method(Method::GET)
            .body(Vec::new())
            .unwrap();
        let res = session.send_http(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(session.access_token().await, AuthorizationToken::Bearer("acc2".to_string().into()));
    }
}
