//! Authorization gate: a two-state capability model over the login
//! endpoint.
//!
//! Tokens do not expire client-side; expiry is discovered reactively when a
//! request fails with an auth error, at which point the gate (bound to the
//! client's auth-failure hook) forces a transition back to
//! `Unauthenticated`.

use crate::api_client::{RestClient, TokenStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Privilege level of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standard,
    /// Elevated privileges: administrative views and fields.
    Superuser,
}

/// Gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated { username: String, role: Role },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// Invalid credentials and transport failures are reported
    /// identically, so a caller cannot tell which occurred.
    #[error("login failed")]
    LoginFailed,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
    username: String,
    is_superuser: bool,
}

/// Gates UI-level access on the authenticated role.
///
/// Cloneable; clones share state. Shares the [`TokenStore`] with the
/// [`RestClient`] so login/logout immediately affects request headers.
#[derive(Clone)]
pub struct AuthGate {
    state: Arc<RwLock<AuthState>>,
    token: TokenStore,
}

impl AuthGate {
    pub fn new(token: TokenStore) -> Self {
        Self {
            state: Arc::new(RwLock::new(AuthState::Unauthenticated)),
            token,
        }
    }

    /// Build a gate sharing the client's token store, and subscribe it to
    /// the client's auth-failure hook: any 401/403 forces logout.
    pub fn bind(client: &RestClient) -> Self {
        let gate = Self::new(client.token_store().clone());
        let hooked = gate.clone();
        client.on_auth_failure(move |status| {
            warn!(status, "auth failure: forcing logout");
            hooked.logout();
        });
        gate
    }

    /// Attempt login. On success the bearer token is stored and the gate
    /// transitions to `Authenticated`; on any failure it stays
    /// `Unauthenticated` and reports a uniform error.
    pub async fn login(
        &self,
        client: &RestClient,
        auth_path: &str,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let request = LoginRequest { username, password };
        let builder = client.post_json_builder(auth_path, &request);
        match client.send::<LoginResponse>(builder).await {
            Ok(response) => {
                self.token.set(response.access_token);
                let role = if response.is_superuser {
                    Role::Superuser
                } else {
                    Role::Standard
                };
                *self.state.write().expect("auth state lock poisoned") = AuthState::Authenticated {
                    username: response.username,
                    role,
                };
                Ok(())
            }
            Err(err) => {
                // do not leak whether credentials or transport failed
                warn!(error = %err, "login attempt failed");
                Err(AuthError::LoginFailed)
            }
        }
    }

    /// Return to `Unauthenticated` from any state, clearing token and role.
    pub fn logout(&self) {
        self.token.clear();
        *self.state.write().expect("auth state lock poisoned") = AuthState::Unauthenticated;
    }

    pub fn state(&self) -> AuthState {
        self.state.read().expect("auth state lock poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), AuthState::Authenticated { .. })
    }

    /// Pure predicate: `None` requires any authenticated state; a
    /// `Superuser` requirement is satisfied only by a superuser.
    pub fn has_capability(&self, required: Option<Role>) -> bool {
        match (self.state(), required) {
            (AuthState::Unauthenticated, _) => false,
            (AuthState::Authenticated { .. }, None) => true,
            (AuthState::Authenticated { .. }, Some(Role::Standard)) => true,
            (AuthState::Authenticated { role, .. }, Some(Role::Superuser)) => {
                role == Role::Superuser
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheSettings, ClientConfig};

    fn client(base_url: &str) -> RestClient {
        RestClient::new(&ClientConfig {
            api_base_url: base_url.to_string(),
            auth_path: "/auth/login".to_string(),
            request_timeout_ms: 1_000,
            cache: CacheSettings::default(),
        })
        .unwrap()
    }

    fn authenticated_gate(role: Role) -> AuthGate {
        let gate = AuthGate::new(TokenStore::new());
        gate.token.set("tok");
        *gate.state.write().unwrap() = AuthState::Authenticated {
            username: "anna".to_string(),
            role,
        };
        gate
    }

    #[test]
    fn test_capability_truth_table() {
        let unauthenticated = AuthGate::new(TokenStore::new());
        assert!(!unauthenticated.has_capability(None));
        assert!(!unauthenticated.has_capability(Some(Role::Standard)));
        assert!(!unauthenticated.has_capability(Some(Role::Superuser)));

        let standard = authenticated_gate(Role::Standard);
        assert!(standard.has_capability(None));
        assert!(standard.has_capability(Some(Role::Standard)));
        assert!(!standard.has_capability(Some(Role::Superuser)));

        let superuser = authenticated_gate(Role::Superuser);
        assert!(superuser.has_capability(None));
        assert!(superuser.has_capability(Some(Role::Standard)));
        assert!(superuser.has_capability(Some(Role::Superuser)));
    }

    #[test]
    fn test_logout_clears_token_and_state() {
        let gate = authenticated_gate(Role::Superuser);
        assert!(gate.token.is_present());
        gate.logout();
        assert_eq!(gate.state(), AuthState::Unauthenticated);
        assert!(!gate.token.is_present());
        // logout from any state is a no-op transition back to the start
        gate.logout();
        assert_eq!(gate.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_auth_failure_hook_forces_logout() {
        let rest = client("http://localhost:8000");
        let gate = AuthGate::bind(&rest);
        rest.token_store().set("tok");
        *gate.state.write().unwrap() = AuthState::Authenticated {
            username: "anna".to_string(),
            role: Role::Standard,
        };

        rest.notify_auth_failure(401);

        assert_eq!(gate.state(), AuthState::Unauthenticated);
        assert!(!rest.token_store().is_present());
    }

    #[tokio::test]
    async fn test_network_failure_reports_uniform_login_error() {
        // nothing listens here; the caller only learns "login failed"
        let rest = client("http://127.0.0.1:9");
        let gate = AuthGate::bind(&rest);
        let res = gate.login(&rest, "/auth/login", "anna", "pw").await;
        assert_eq!(res, Err(AuthError::LoginFailed));
        assert_eq!(gate.state(), AuthState::Unauthenticated);
        assert!(!rest.token_store().is_present());
    }
}
