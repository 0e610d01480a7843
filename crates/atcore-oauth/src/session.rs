use crate::atproto::AtprotoClientMetadata;
use crate::authstore::ClientAuthStore;
use crate::dpop::DpopExt;
use crate::resolver::OAuthResolver;
use crate::scopes::Scope;
use crate::types::TokenSet;

use atcore_common::session::SessionStoreError;
use atcore_common::types::did::Did;
use atcore_common::types::datetime::Datetime;
use atcore_common::{CowStr, IntoStatic};
use jose_jwk::Key;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Errors specific to session bookkeeping, separate from transport/storage failures.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("no session found for this account")]
    #[diagnostic(code(atcore_oauth::session::not_found))]
    NotFound,
}

/// Static configuration shared by every session created through an [`crate::client::OAuthClient`].
#[derive(Clone, Debug)]
pub struct ClientData<'c> {
    pub config: AtprotoClientMetadata<'c>,
}

impl IntoStatic for ClientData<'_> {
    type Output = ClientData<'static>;

    fn into_static(self) -> Self::Output {
        ClientData {
            config: AtprotoClientMetadata {
                client_id: self.config.client_id,
                client_uri: self.config.client_uri,
                redirect_uris: self.config.redirect_uris,
                grant_types: self.config.grant_types,
                scopes: self
                    .config
                    .scopes
                    .into_iter()
                    .map(IntoStatic::into_static)
                    .collect(),
                jwks_uri: self.config.jwks_uri,
            },
        }
    }
}

/// Carries the DPoP key and the last nonce the authorization server returned,
/// while an authorization request is pending (before a session exists).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpopReqData {
    pub dpop_key: Key,
    pub dpop_authserver_nonce: Option<CowStr<'static>>,
}

/// Carries the DPoP key and the nonces seen so far for an established session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpopClientData {
    pub dpop_key: Key,
    pub dpop_authserver_nonce: CowStr<'static>,
    pub dpop_host_nonce: CowStr<'static>,
}

/// Common surface over the DPoP bookkeeping used during the request phase and
/// once a session is established, so `oauth_request` can stay generic over
/// both. `is_auth_server` selects which of the (up to) two nonce slots to use:
/// authorization-server calls and resource-server (PDS) calls track separate
/// nonces per RFC 9449.
pub trait DpopDataSource {
    fn dpop_key(&self) -> &Key;
    fn nonce(&self, is_auth_server: bool) -> Option<CowStr<'static>>;
    fn set_nonce(&mut self, is_auth_server: bool, nonce: CowStr<'static>);
}

impl DpopDataSource for DpopReqData {
    fn dpop_key(&self) -> &Key {
        &self.dpop_key
    }

    fn nonce(&self, _is_auth_server: bool) -> Option<CowStr<'static>> {
        self.dpop_authserver_nonce.clone()
    }

    fn set_nonce(&mut self, _is_auth_server: bool, nonce: CowStr<'static>) {
        self.dpop_authserver_nonce = Some(nonce);
    }
}

impl DpopDataSource for DpopClientData {
    fn dpop_key(&self) -> &Key {
        &self.dpop_key
    }

    fn nonce(&self, is_auth_server: bool) -> Option<CowStr<'static>> {
        let slot = if is_auth_server {
            &self.dpop_authserver_nonce
        } else {
            &self.dpop_host_nonce
        };
        if slot.is_empty() {
            None
        } else {
            Some(slot.clone())
        }
    }

    fn set_nonce(&mut self, is_auth_server: bool, nonce: CowStr<'static>) {
        if is_auth_server {
            self.dpop_authserver_nonce = nonce;
        } else {
            self.dpop_host_nonce = nonce;
        }
    }
}

/// Everything that needs to survive between `par()` and the redirect callback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthRequestData<'r> {
    #[serde(borrow)]
    pub state: CowStr<'r>,
    pub authserver_url: Url,
    pub account_did: Option<Did<'r>>,
    #[serde(borrow)]
    pub scopes: Vec<Scope<'r>>,
    #[serde(borrow)]
    pub request_uri: CowStr<'r>,
    #[serde(borrow)]
    pub authserver_token_endpoint: CowStr<'r>,
    #[serde(borrow)]
    pub authserver_revocation_endpoint: Option<CowStr<'r>>,
    #[serde(borrow)]
    pub pkce_verifier: CowStr<'r>,
    pub dpop_data: DpopReqData,
}

impl IntoStatic for AuthRequestData<'_> {
    type Output = AuthRequestData<'static>;

    fn into_static(self) -> Self::Output {
        AuthRequestData {
            state: self.state.into_static(),
            authserver_url: self.authserver_url,
            account_did: self.account_did.map(IntoStatic::into_static),
            scopes: self.scopes.into_iter().map(IntoStatic::into_static).collect(),
            request_uri: self.request_uri.into_static(),
            authserver_token_endpoint: self.authserver_token_endpoint.into_static(),
            authserver_revocation_endpoint: self
                .authserver_revocation_endpoint
                .map(IntoStatic::into_static),
            pkce_verifier: self.pkce_verifier.into_static(),
            dpop_data: self.dpop_data,
        }
    }
}

/// A persisted, logged-in OAuth session for one account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientSessionData<'r> {
    pub account_did: Did<'r>,
    #[serde(borrow)]
    pub session_id: CowStr<'r>,
    pub host_url: Url,
    pub authserver_url: Url,
    #[serde(borrow)]
    pub authserver_token_endpoint: CowStr<'r>,
    #[serde(borrow)]
    pub authserver_revocation_endpoint: Option<CowStr<'r>>,
    #[serde(borrow)]
    pub scopes: Vec<Scope<'r>>,
    pub dpop_data: DpopClientData,
    #[serde(borrow)]
    pub token_set: TokenSet<'r>,
}

impl<'r> ClientSessionData<'r> {
    /// Replace the token set after a refresh, keeping the rest of the session intact.
    pub fn update_with_tokens(&mut self, token_set: TokenSet<'r>) {
        self.token_set = token_set;
    }
}

impl IntoStatic for ClientSessionData<'_> {
    type Output = ClientSessionData<'static>;

    fn into_static(self) -> Self::Output {
        ClientSessionData {
            account_did: self.account_did.into_static(),
            session_id: self.session_id.into_static(),
            host_url: self.host_url,
            authserver_url: self.authserver_url,
            authserver_token_endpoint: self.authserver_token_endpoint.into_static(),
            authserver_revocation_endpoint: self
                .authserver_revocation_endpoint
                .map(IntoStatic::into_static),
            scopes: self.scopes.into_iter().map(IntoStatic::into_static).collect(),
            dpop_data: self.dpop_data,
            token_set: self.token_set.into_static(),
        }
    }
}

/// A single DPoP-bound OAuth session, kept separately from the credential vault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OauthSession<'s> {
    pub dpop_key: Key,
    #[serde(borrow)]
    pub token_set: TokenSet<'s>,
}

impl IntoStatic for OauthSession<'_> {
    type Output = OauthSession<'static>;

    fn into_static(self) -> Self::Output {
        OauthSession {
            dpop_key: self.dpop_key,
            token_set: self.token_set.into_static(),
        }
    }
}

/// Owns the persisted sessions for every account logged in through one
/// [`crate::client::OAuthClient`], refreshing tokens on demand.
pub struct SessionRegistry<T, S>
where
    T: OAuthResolver,
    S: ClientAuthStore,
{
    pub client_data: ClientData<'static>,
    pub client: Arc<T>,
    pub store: Arc<S>,
}

impl<T, S> SessionRegistry<T, S>
where
    T: OAuthResolver,
    S: ClientAuthStore,
{
    pub fn new(store: S, client: Arc<T>, client_data: ClientData<'static>) -> Self {
        Self {
            client_data,
            client,
            store: Arc::new(store),
        }
    }

    pub fn new_shared(store: Arc<S>, client: Arc<T>, client_data: ClientData<'static>) -> Self {
        Self {
            client_data,
            client,
            store,
        }
    }
}

impl<T, S> SessionRegistry<T, S>
where
    T: OAuthResolver + DpopExt + Send + Sync + 'static,
    S: ClientAuthStore + Send + Sync + 'static,
{
    pub async fn set(&self, data: ClientSessionData<'_>) -> Result<(), SessionStoreError> {
        self.store.upsert_session(data).await
    }

    pub async fn del(&self, did: &Did<'_>, session_id: &str) -> Result<(), SessionStoreError> {
        self.store.delete_session(did, session_id).await
    }

    /// Fetch a session, refreshing its token set first when `force_refresh` is
    /// set or the access token has expired.
    pub async fn get(
        &self,
        did: &Did<'_>,
        session_id: &str,
        force_refresh: bool,
    ) -> crate::error::Result<ClientSessionData<'static>> {
        let data = self
            .store
            .get_session(did, session_id)
            .await?
            .ok_or(Error::NotFound)?
            .into_static();

        let expired = data
            .token_set
            .expires_at
            .as_ref()
            .is_some_and(|exp| exp <= &Datetime::now());

        if (force_refresh || expired) && data.token_set.refresh_token.is_some() {
            let metadata =
                crate::request::OAuthMetadata::new(self.client.as_ref(), &self.client_data, &data)
                    .await?;
            let refreshed = crate::request::refresh(self.client.as_ref(), data, &metadata)
                .await?
                .into_static();
            self.store.upsert_session(refreshed.clone()).await?;
            Ok(refreshed)
        } else {
            Ok(data)
        }
    }
}
