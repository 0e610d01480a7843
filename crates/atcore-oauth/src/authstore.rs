use std::collections::HashMap;
use std::sync::Arc;

use atcore_common::{IntoStatic, session::SessionStoreError, types::did::Did};
use tokio::sync::RwLock;

use crate::session::{AuthRequestData, ClientSessionData};

#[async_trait::async_trait]
pub trait ClientAuthStore {
    async fn get_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> Result<Option<ClientSessionData<'_>>, SessionStoreError>;

    async fn upsert_session(&self, session: ClientSessionData<'_>)
    -> Result<(), SessionStoreError>;

    async fn delete_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> Result<(), SessionStoreError>;

    async fn get_auth_req_info(
        &self,
        state: &str,
    ) -> Result<Option<AuthRequestData<'_>>, SessionStoreError>;

    async fn save_auth_req_info(
        &self,
        auth_req_info: &AuthRequestData<'_>,
    ) -> Result<(), SessionStoreError>;

    async fn delete_auth_req_info(&self, state: &str) -> Result<(), SessionStoreError>;
}

fn session_key(did: &Did<'_>, session_id: &str) -> String {
    format!("{}#{}", did.as_str(), session_id)
}

/// In-memory auth store suitable for short-lived processes and tests.
///
/// Nothing here survives a restart; use a vault-backed `ClientAuthStore` for
/// anything that needs to outlive the process.
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    sessions: Arc<RwLock<HashMap<String, ClientSessionData<'static>>>>,
    auth_requests: Arc<RwLock<HashMap<String, AuthRequestData<'static>>>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ClientAuthStore for MemoryAuthStore {
    async fn get_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> Result<Option<ClientSessionData<'_>>, SessionStoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&session_key(did, session_id))
            .cloned())
    }

    async fn upsert_session(
        &self,
        session: ClientSessionData<'_>,
    ) -> Result<(), SessionStoreError> {
        let key = session_key(&session.account_did, &session.session_id);
        self.sessions
            .write()
            .await
            .insert(key, session.into_static());
        Ok(())
    }

    async fn delete_session(
        &self,
        did: &Did<'_>,
        session_id: &str,
    ) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .remove(&session_key(did, session_id));
        Ok(())
    }

    async fn get_auth_req_info(
        &self,
        state: &str,
    ) -> Result<Option<AuthRequestData<'_>>, SessionStoreError> {
        Ok(self.auth_requests.read().await.get(state).cloned())
    }

    async fn save_auth_req_info(
        &self,
        auth_req_info: &AuthRequestData<'_>,
    ) -> Result<(), SessionStoreError> {
        self.auth_requests.write().await.insert(
            auth_req_info.state.to_string(),
            auth_req_info.clone().into_static(),
        );
        Ok(())
    }

    async fn delete_auth_req_info(&self, state: &str) -> Result<(), SessionStoreError> {
        self.auth_requests.write().await.remove(state);
        Ok(())
    }
}
