//! Authenticated HTTP client: ties the credential vault, the OAuth flow
//! engine and the app-password fallback together behind one handle-keyed
//! facade with auto-refresh.

use crate::error::{AuthCoreError, Result};
use atcore_common::http_client::{AuthorizationToken, HttpClient};
use atcore_common::session::SessionStoreError;
use atcore_common::types::did::Did;
use atcore_common::{CowStr, IntoStatic};
use atcore_identity::Resolver;
use atcore_oauth::app_password::{self, AppPasswordSession, AppPasswordTokens};
use atcore_oauth::atproto::AtprotoClientMetadata;
use atcore_oauth::authstore::ClientAuthStore;
use atcore_oauth::client::{OAuthClient, OAuthSession};
use atcore_oauth::loopback::LoopbackConfig;
use atcore_oauth::scopes::Scope;
use atcore_oauth::session::{AuthRequestData, ClientData, ClientSessionData, DpopClientData};
use atcore_oauth::types::{AuthorizeOptions, TokenSet};
use atcore_vault::{Account, Credentials, StorageBackend, Vault, VaultConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use url::Url;

const SESSION_ID: &str = "primary";

/// Translates between the vault's handle-keyed [`Credentials`] and the
/// OAuth engine's DID-keyed [`ClientSessionData`].
///
/// One vault holds many accounts, but the OAuth engine's
/// [`ClientAuthStore`] only sees DIDs and session ids. Each login call
/// records the handle it's about to authenticate as `pending_handle`
/// before starting the flow, so that when the flow completes and calls
/// `upsert_session` with the resulting `account_did`, that DID can be
/// tied back to the right vault entry. Resolved DIDs are cached in
/// `did_to_handle` so later refreshes don't need the pending-handle dance
/// at all.
struct VaultAuthStore {
    vault: Arc<Vault>,
    did_to_handle: RwLock<HashMap<String, CowStr<'static>>>,
    pending_handle: RwLock<Option<CowStr<'static>>>,
    auth_requests: RwLock<HashMap<String, AuthRequestData<'static>>>,
}

impl VaultAuthStore {
    fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            did_to_handle: RwLock::new(HashMap::new()),
            pending_handle: RwLock::new(None),
            auth_requests: RwLock::new(HashMap::new()),
        }
    }

    async fn set_pending_handle(&self, handle: CowStr<'static>) {
        *self.pending_handle.write().await = Some(handle);
    }

    async fn handle_for(&self, did: &Did<'_>) -> Option<CowStr<'static>> {
        if let Some(handle) = self.did_to_handle.read().await.get(did.as_str()).cloned() {
            return Some(handle);
        }
        self.vault
            .handle_for_did(did.as_str())
            .await
            .map(CowStr::from)
    }

    async fn remember(&self, did: &Did<'_>, handle: CowStr<'static>) {
        self.did_to_handle.write().await.insert(did.as_str().to_string(), handle);
    }
}

#[async_trait::async_trait]
impl ClientAuthStore for VaultAuthStore {
    async fn get_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> core::result::Result<Option<ClientSessionData<'_>>, SessionStoreError> {
        if session_id != SESSION_ID {
            return Ok(None);
        }
        let Some(handle) = self.handle_for(did).await else {
            return Ok(None);
        };
        match self.vault.load(handle.as_ref()).await {
            Ok(creds) => Ok(Some(
                credentials_to_session_data(&creds).map_err(|e| SessionStoreError::Other(Box::new(e)))?,
            )),
            Err(atcore_vault::VaultError::NotFound(_)) => Ok(None),
            Err(e) => Err(SessionStoreError::Other(Box::new(e))),
        }
    }

    async fn upsert_session(
        &self,
        session: ClientSessionData<'_>,
    ) -> core::result::Result<(), SessionStoreError> {
        let session = session.into_static();
        let handle = match self.handle_for(&session.account_did).await {
            Some(h) => h,
            None => {
                let pending = self.pending_handle.write().await.take().ok_or_else(|| {
                    SessionStoreError::Other(Box::new(AuthCoreError::Internal(
                        "no handle known for this OAuth session; call login_oauth through Client".into(),
                    )))
                })?;
                self.remember(&session.account_did, pending.clone()).await;
                pending
            }
        };
        let credentials = session_data_to_credentials(handle, &session, self.vault.backend_kind());
        self.vault
            .save(credentials)
            .await
            .map_err(|e| SessionStoreError::Other(Box::new(e)))
    }

    async fn delete_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> core::result::Result<(), SessionStoreError> {
        if session_id != SESSION_ID {
            return Ok(());
        }
        if let Some(handle) = self.handle_for(did).await {
            self.vault
                .delete(handle.as_ref())
                .await
                .map_err(|e| SessionStoreError::Other(Box::new(e)))?;
        }
        Ok(())
    }

    async fn get_auth_req_info(
        &self,
        state: &str,
    ) -> core::result::Result<Option<AuthRequestData<'_>>, SessionStoreError> {
        Ok(self.auth_requests.read().await.get(state).cloned())
    }

    async fn save_auth_req_info(
        &self,
        auth_req_info: &AuthRequestData<'_>,
    ) -> core::result::Result<(), SessionStoreError> {
        self.auth_requests
            .write()
            .await
            .insert(auth_req_info.state.to_string(), auth_req_info.clone().into_static());
        Ok(())
    }

    async fn delete_auth_req_info(&self, state: &str) -> core::result::Result<(), SessionStoreError> {
        self.auth_requests.write().await.remove(state);
        Ok(())
    }
}

fn credentials_to_session_data(creds: &Credentials) -> Result<ClientSessionData<'static>> {
    let authserver_url = creds
        .authserver_url
        .as_ref()
        .ok_or_else(|| AuthCoreError::Internal(format!("{:?} has no authserver_url; not an OAuth session", creds.handle)))?
        .clone();
    let authserver_token_endpoint = creds
        .authserver_token_endpoint
        .clone()
        .ok_or_else(|| AuthCoreError::Internal(format!("{:?} has no authserver_token_endpoint", creds.handle)))?;
    let dpop_key = creds
        .dpop_key
        .clone()
        .ok_or_else(|| AuthCoreError::Internal(format!("{:?} has no dpop_key", creds.handle)))?;

    let scopes = match &creds.scope {
        Some(s) => Scope::parse_multiple_reduced(s.as_ref())
            .map_err(|e| AuthCoreError::Internal(e.to_string()))?
            .into_static(),
        None => Vec::new(),
    };

    let did = Did::new_owned(creds.did.as_ref())
        .map_err(|e| AuthCoreError::Internal(e.to_string()))?
        .into_static();
    let host_url = Url::parse(creds.pds_url.as_ref()).map_err(|e| AuthCoreError::Internal(e.to_string()))?;
    let authserver_parsed = Url::parse(authserver_url.as_ref()).map_err(|e| AuthCoreError::Internal(e.to_string()))?;

    Ok(ClientSessionData {
        account_did: did.clone(),
        session_id: CowStr::new_static(SESSION_ID),
        host_url,
        authserver_url: authserver_parsed,
        authserver_token_endpoint,
        authserver_revocation_endpoint: creds.authserver_revocation_endpoint.clone(),
        scopes,
        dpop_data: DpopClientData {
            dpop_key,
            dpop_authserver_nonce: CowStr::default(),
            dpop_host_nonce: CowStr::default(),
        },
        token_set: TokenSet {
            iss: authserver_url,
            sub: did,
            aud: creds.pds_url.clone(),
            scope: creds.scope.clone(),
            refresh_token: creds.refresh_token.clone(),
            access_token: creds.access_token.clone(),
            token_type: creds.token_type.clone(),
            expires_at: creds.expires_at.clone(),
        },
    })
}

fn session_data_to_credentials(
    handle: CowStr<'static>,
    data: &ClientSessionData<'static>,
    storage_backend: StorageBackend,
) -> Credentials {
    Credentials {
        handle,
        did: data.account_did.as_str().to_string().into(),
        pds_url: data.host_url.to_string().into(),
        token_type: data.token_set.token_type.clone(),
        access_token: data.token_set.access_token.clone(),
        refresh_token: data.token_set.refresh_token.clone(),
        expires_at: data.token_set.expires_at.clone(),
        scope: data.token_set.scope.clone(),
        dpop_key: Some(data.dpop_data.dpop_key.clone()),
        authserver_url: Some(data.authserver_url.to_string().into()),
        authserver_token_endpoint: Some(data.authserver_token_endpoint.clone()),
        authserver_revocation_endpoint: data.authserver_revocation_endpoint.clone(),
        storage_backend,
    }
}

fn app_password_tokens_to_credentials(
    tokens: &AppPasswordTokens,
    pds_url: &Url,
    storage_backend: StorageBackend,
) -> Credentials {
    Credentials {
        handle: tokens.handle.clone(),
        did: tokens.did.as_str().to_string().into(),
        pds_url: pds_url.to_string().into(),
        token_type: atcore_oauth::types::OAuthTokenType::Bearer,
        access_token: tokens.access_jwt.clone(),
        refresh_token: Some(tokens.refresh_jwt.clone()),
        expires_at: None,
        scope: None,
        dpop_key: None,
        authserver_url: None,
        authserver_token_endpoint: None,
        authserver_revocation_endpoint: None,
        storage_backend,
    }
}

/// A live, handle-addressed session: either a DPoP-bound OAuth session or
/// a Bearer app-password session. Both implement [`HttpClient`] with their
/// own refresh-on-401 retry, so callers never need to branch on which kind
/// they have.
enum Session {
    OAuth(Arc<OAuthSession<Resolver, VaultAuthStore>>),
    AppPassword(Arc<AppPasswordSession<reqwest::Client>>),
}

fn token_into_static(token: AuthorizationToken<'_>) -> AuthorizationToken<'static> {
    match token {
        AuthorizationToken::Dpop(t) => AuthorizationToken::Dpop(t.into_static()),
        AuthorizationToken::Bearer(t) => AuthorizationToken::Bearer(t.into_static()),
    }
}

impl Session {
    async fn access_token(&self) -> AuthorizationToken<'static> {
        match self {
            Self::OAuth(s) => token_into_static(s.access_token().await),
            Self::AppPassword(s) => s.access_token().await,
        }
    }
}

impl HttpClient for Session {
    type Error = atcore_common::error::TransportError;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        match self {
            Self::OAuth(s) => s.send_http(request).await,
            Self::AppPassword(s) => s.send_http(request).await,
        }
    }
}

/// Handle-keyed authenticated HTTP client. Lazily materializes one live
/// [`Session`] per handle from the vault, and serializes refreshes per
/// handle so concurrent callers never trigger duplicate refresh requests
/// for the same account.
pub struct Client {
    vault: Arc<Vault>,
    oauth: Arc<OAuthClient<Resolver, VaultAuthStore>>,
    http: Arc<reqwest::Client>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    refresh_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl Client {
    /// Open the vault at the platform config directory (or `config`'s
    /// override) and build the OAuth engine and HTTP transport on top of
    /// it.
    pub async fn open(config: VaultConfig) -> Result<Self> {
        let vault = Arc::new(Vault::open(config).await?);
        let resolver = Arc::new(Resolver::new(reqwest::Client::default(), Default::default()));
        let store = Arc::new(VaultAuthStore::new(vault.clone()));
        let client_data = ClientData {
            config: AtprotoClientMetadata::default_localhost(),
        };
        let oauth = Arc::new(OAuthClient::new_with_shared(store, resolver, client_data));
        Ok(Self {
            vault,
            oauth,
            http: Arc::new(reqwest::Client::default()),
            sessions: RwLock::new(HashMap::new()),
            refresh_locks: RwLock::new(HashMap::new()),
        })
    }

    /// Log in via the interactive OAuth flow, using a loopback HTTP
    /// listener to receive the authorization redirect. `identifier` is a
    /// handle or DID; on success the resulting session is persisted to the
    /// vault under the handle the server returns.
    pub async fn login_oauth(&self, identifier: &str, cfg: LoopbackConfig) -> Result<String> {
        self.oauth
            .registry
            .store
            .set_pending_handle(identifier.to_string().into())
            .await;
        let session = self
            .oauth
            .login_with_local_server(identifier, AuthorizeOptions::default(), cfg)
            .await?;
        let (did, _) = session.session_info().await;
        let handle = self
            .oauth
            .registry
            .store
            .handle_for(&did)
            .await
            .unwrap_or_else(|| identifier.to_string().into());
        self.sessions
            .write()
            .await
            .insert(handle.to_string(), Arc::new(Session::OAuth(Arc::new(session))));
        Ok(handle.to_string())
    }

    /// Log in with a legacy app password, bypassing the OAuth flow
    /// entirely.
    pub async fn login_app_password(&self, pds_url: &Url, identifier: &str, password: &str) -> Result<String> {
        let tokens = app_password::create_session(self.http.as_ref(), pds_url, identifier, password).await?;
        let handle = tokens.handle.clone();
        let credentials = app_password_tokens_to_credentials(&tokens, pds_url, self.vault.backend_kind());
        self.vault.save(credentials).await?;

        let session = AppPasswordSession::new(self.http.clone(), pds_url.clone(), tokens);
        self.sessions
            .write()
            .await
            .insert(handle.to_string(), Arc::new(Session::AppPassword(Arc::new(session))));
        Ok(handle.to_string())
    }

    async fn refresh_lock(&self, handle: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.refresh_locks.read().await.get(handle) {
            return lock.clone();
        }
        self.refresh_locks
            .write()
            .await
            .entry(handle.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Get (or lazily materialize from the vault) the live session for
    /// `handle`.
    async fn session_for(&self, handle: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.sessions.read().await.get(handle) {
            return Ok(session.clone());
        }

        // Single-flight: only one waiter actually hits the vault/builds the session.
        let lock = self.refresh_lock(handle).await;
        let _guard = lock.lock().await;
        if let Some(session) = self.sessions.read().await.get(handle) {
            return Ok(session.clone());
        }

        let creds = self
            .vault
            .load(handle)
            .await
            .map_err(|_| AuthCoreError::AuthRequired(handle.to_string()))?;

        let session = match creds.token_type {
            atcore_oauth::types::OAuthTokenType::DPoP => {
                let did = Did::new_owned(creds.did.as_ref())
                    .map_err(|e| AuthCoreError::Internal(e.to_string()))?
                    .into_static();
                self.oauth
                    .registry
                    .store
                    .remember(&did, CowStr::from(handle.to_string()))
                    .await;
                let oauth_session = self.oauth.restore(&did, SESSION_ID).await?;
                Arc::new(Session::OAuth(Arc::new(oauth_session)))
            }
            atcore_oauth::types::OAuthTokenType::Bearer => {
                let pds_url = Url::parse(creds.pds_url.as_ref()).map_err(|e| AuthCoreError::Internal(e.to_string()))?;
                let tokens = AppPasswordTokens {
                    did: Did::new_owned(creds.did.as_ref())
                        .map_err(|e| AuthCoreError::Internal(e.to_string()))?
                        .into_static(),
                    handle: creds.handle.clone(),
                    access_jwt: creds.access_token.clone(),
                    refresh_jwt: creds
                        .refresh_token
                        .clone()
                        .ok_or_else(|| AuthCoreError::Internal("app-password credentials missing refresh token".into()))?,
                };
                Arc::new(Session::AppPassword(Arc::new(AppPasswordSession::new(
                    self.http.clone(),
                    pds_url,
                    tokens,
                ))))
            }
        };

        self.sessions.write().await.insert(handle.to_string(), session.clone());
        Ok(session)
    }

    /// Send an authenticated request as `handle`, transparently refreshing
    /// once on an expired or rejected token.
    pub async fn send_as(&self, handle: &str, request: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>> {
        let session = self.session_for(handle).await?;
        session
            .send_http(request)
            .await
            .map_err(|e| AuthCoreError::Internal(e.to_string()))
    }

    /// The current access token for `handle`, for callers building their
    /// own requests (e.g. to attach a DPoP proof out-of-band).
    pub async fn access_token(&self, handle: &str) -> Result<AuthorizationToken<'static>> {
        Ok(self.session_for(handle).await?.access_token().await)
    }

    /// List every account the vault currently tracks.
    pub async fn list_accounts(&self) -> Vec<Account> {
        self.vault.list().await
    }

    /// Name `handle` as the default account.
    pub async fn set_default(&self, handle: &str) -> Result<()> {
        self.vault.set_default(handle).await.map_err(Into::into)
    }

    /// The current default handle, if one is set.
    pub async fn default_handle(&self) -> Option<String> {
        self.vault.get_default().await
    }

    /// Log out `handle`: revoke the session with the server when possible,
    /// then remove it from the vault.
    pub async fn logout(&self, handle: &str) -> Result<()> {
        if let Some(session) = self.sessions.write().await.remove(handle) {
            if let Session::OAuth(oauth) = session.as_ref() {
                oauth.logout().await?;
                return Ok(());
            }
        }
        self.vault.delete(handle).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atcore_oauth::types::OAuthTokenType;

    fn oauth_credentials(handle: &str) -> Credentials {
        Credentials {
            handle: handle.to_string().into(),
            did: "did:plc:alice".to_string().into(),
            pds_url: "https://pds.example".to_string().into(),
            token_type: OAuthTokenType::DPoP,
            access_token: "access-token".to_string().into(),
            refresh_token: Some("refresh-token".to_string().into()),
            expires_at: None,
            scope: Some("atproto transition:generic".to_string().into()),
            dpop_key: atcore_oauth::utils::generate_key(&[CowStr::from("ES256")]),
            authserver_url: Some("https://auth.example".to_string().into()),
            authserver_token_endpoint: Some("https://auth.example/token".to_string().into()),
            authserver_revocation_endpoint: Some("https://auth.example/revoke".to_string().into()),
            storage_backend: StorageBackend::PlaintextFile,
        }
    }

    #[test]
    fn credentials_round_trip_through_session_data() {
        let creds = oauth_credentials("alice.example.com");
        let session_data = credentials_to_session_data(&creds).expect("oauth credentials convert");

        assert_eq!(session_data.account_did.as_str(), "did:plc:alice");
        assert_eq!(session_data.host_url.as_str(), "https://pds.example/");
        assert_eq!(session_data.authserver_url.as_str(), "https://auth.example/");
        assert_eq!(session_data.authserver_token_endpoint.as_ref(), "https://auth.example/token");
        assert_eq!(session_data.scopes.len(), 2);
        assert!(session_data.dpop_data.dpop_authserver_nonce.as_ref().is_empty());

        let roundtripped = session_data_to_credentials(creds.handle.clone(), &session_data, StorageBackend::PlaintextFile);
        assert_eq!(roundtripped.handle, creds.handle);
        assert_eq!(roundtripped.did, creds.did);
        assert_eq!(roundtripped.pds_url, creds.pds_url);
        assert_eq!(roundtripped.token_type, creds.token_type);
        assert_eq!(roundtripped.access_token, creds.access_token);
        assert_eq!(roundtripped.refresh_token, creds.refresh_token);
        assert_eq!(roundtripped.scope, creds.scope);
        assert!(roundtripped.dpop_key.is_some());
        assert_eq!(roundtripped.authserver_url, creds.authserver_url);
        assert_eq!(roundtripped.authserver_token_endpoint, creds.authserver_token_endpoint);
        assert_eq!(roundtripped.authserver_revocation_endpoint, creds.authserver_revocation_endpoint);
    }

    #[test]
    fn credentials_without_authserver_fields_reject_conversion() {
        let mut creds = oauth_credentials("alice.example.com");
        creds.authserver_url = None;
        let err = credentials_to_session_data(&creds).expect_err("bearer-shaped credentials must not convert");
        assert!(matches!(err, AuthCoreError::Internal(_)));
    }

    #[test]
    fn app_password_tokens_convert_to_bearer_credentials() {
        let pds_url = Url::parse("https://pds.example").unwrap();
        let tokens = AppPasswordTokens {
            did: Did::new_owned("did:plc:bob").unwrap().into_static(),
            handle: "bob.example.com".to_string().into(),
            access_jwt: "access-jwt".to_string().into(),
            refresh_jwt: "refresh-jwt".to_string().into(),
        };
        let creds = app_password_tokens_to_credentials(&tokens, &pds_url, StorageBackend::Keychain);

        assert_eq!(creds.handle.as_ref(), "bob.example.com");
        assert_eq!(creds.did.as_ref(), "did:plc:bob");
        assert_eq!(creds.token_type, OAuthTokenType::Bearer);
        assert_eq!(creds.access_token.as_ref(), "access-jwt");
        assert_eq!(creds.refresh_token.as_deref(), Some("refresh-jwt"));
        assert!(creds.dpop_key.is_none());
        assert!(creds.authserver_url.is_none());
    }

    async fn test_vault() -> (tempfile::TempDir, Arc<Vault>) {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig::new().config_dir(dir.path().to_path_buf()).build();
        let vault = Arc::new(Vault::open(config).await.unwrap());
        (dir, vault)
    }

    #[tokio::test]
    async fn auth_store_upserts_pending_handle_then_resolves_by_did() {
        let (_dir, vault) = test_vault().await;
        let store = VaultAuthStore::new(vault.clone());

        store.set_pending_handle("alice.example.com".to_string().into()).await;

        let session_data = credentials_to_session_data(&oauth_credentials("alice.example.com")).unwrap();
        let did = session_data.account_did.clone();
        store.upsert_session(session_data).await.expect("upsert with pending handle");

        // Vault now has the record under the resolved handle.
        let loaded = vault.load("alice.example.com").await.unwrap();
        assert_eq!(loaded.did.as_ref(), "did:plc:alice");

        // A later get_session by DID alone (no pending handle set) still finds it,
        // via the did_to_handle cache populated during the upsert.
        let fetched = store.get_session(&did, SESSION_ID).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().account_did.as_str(), "did:plc:alice");
    }

    #[tokio::test]
    async fn auth_store_upsert_without_pending_handle_fails() {
        let (_dir, vault) = test_vault().await;
        let store = VaultAuthStore::new(vault.clone());

        let session_data = credentials_to_session_data(&oauth_credentials("alice.example.com")).unwrap();
        let err = store.upsert_session(session_data).await.expect_err("no handle known yet");
        assert!(matches!(err, SessionStoreError::Other(_)));
    }

    #[tokio::test]
    async fn auth_store_delete_session_removes_vault_entry() {
        let (_dir, vault) = test_vault().await;
        let store = VaultAuthStore::new(vault.clone());

        store.set_pending_handle("alice.example.com".to_string().into()).await;
        let session_data = credentials_to_session_data(&oauth_credentials("alice.example.com")).unwrap();
        let did = session_data.account_did.clone();
        store.upsert_session(session_data).await.unwrap();

        store.delete_session(&did, SESSION_ID).await.unwrap();
        assert!(vault.load("alice.example.com").await.is_err());

        // Deleting a DID the store has never heard of is a no-op, not an error.
        let unknown = Did::new_owned("did:plc:unknown").unwrap().into_static();
        store.delete_session(&unknown, SESSION_ID).await.unwrap();
    }

    #[tokio::test]
    async fn auth_store_ignores_non_primary_session_ids() {
        let (_dir, vault) = test_vault().await;
        let store = VaultAuthStore::new(vault.clone());
        let did = Did::new_owned("did:plc:alice").unwrap().into_static();

        assert!(store.get_session(&did, "not-primary").await.unwrap().is_none());
        store.delete_session(&did, "not-primary").await.unwrap();
    }

    #[tokio::test]
    async fn auth_req_info_round_trips_in_memory() {
        let (_dir, vault) = test_vault().await;
        let store = VaultAuthStore::new(vault);

        let info = AuthRequestData {
            state: "some-state".to_string().into(),
            authserver_url: Url::parse("https://auth.example").unwrap(),
            account_did: None,
            scopes: vec![Scope::Atproto],
            request_uri: "urn:ietf:params:oauth:request_uri:abc".to_string().into(),
            authserver_token_endpoint: "https://auth.example/token".to_string().into(),
            authserver_revocation_endpoint: None,
            pkce_verifier: "verifier".to_string().into(),
            dpop_data: atcore_oauth::session::DpopReqData {
                dpop_key: atcore_oauth::utils::generate_key(&[CowStr::from("ES256")]).unwrap(),
                dpop_authserver_nonce: None,
            },
        };
        store.save_auth_req_info(&info).await.unwrap();

        let fetched = store.get_auth_req_info("some-state").await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().state.as_ref(), "some-state");

        store.delete_auth_req_info("some-state").await.unwrap();
        assert!(store.get_auth_req_info("some-state").await.unwrap().is_none());
    }
}
