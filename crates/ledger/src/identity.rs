//! Identity collaborator contract.
//!
//! The ledger only needs to know *who* is signed in and *when* that changes.
//! Providers publish an [`IdentityState`] on a `tokio::sync::watch` channel;
//! the sync engine observes it through an injected receiver rather than any
//! global.

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use tokio::sync::watch;

use crate::{AuthError, UserId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IdentityState {
    /// The identity check is still in flight.
    #[default]
    Unresolved,
    Authenticated(UserId),
    Anonymous,
}

impl IdentityState {
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Unresolved | Self::Anonymous => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

pub trait IdentityProvider: Send + Sync {
    /// Reactive identity signal.
    fn state(&self) -> watch::Receiver<IdentityState>;

    fn login(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = Result<UserId, AuthError>> + Send;

    fn logout(&self) -> impl Future<Output = ()> + Send;
}

/// Identity provider backed by an in-memory account table.
///
/// Starts `Unresolved`, like a provider still restoring a previous session;
/// call [`resolve_session`](Self::resolve_session) to finish that check.
#[derive(Clone)]
pub struct MemoryIdentity {
    accounts: Arc<HashMap<String, (String, UserId)>>,
    state: Arc<watch::Sender<IdentityState>>,
}

impl fmt::Debug for MemoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIdentity")
            .field("accounts", &self.accounts.len())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl MemoryIdentity {
    pub fn builder() -> MemoryIdentityBuilder {
        MemoryIdentityBuilder::default()
    }

    /// Complete the initial identity check with a restored session, if any.
    pub fn resolve_session(&self, user: Option<UserId>) {
        let state = match user {
            Some(user) => IdentityState::Authenticated(user),
            None => IdentityState::Anonymous,
        };
        self.state.send_replace(state);
    }
}

impl IdentityProvider for MemoryIdentity {
    fn state(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn login(&self, credentials: Credentials) -> Result<UserId, AuthError> {
        let key = credentials.email.trim().to_lowercase();
        match self.accounts.get(&key) {
            Some((password, user)) if *password == credentials.password => {
                tracing::info!(user = %user, "signed in");
                self.state
                    .send_replace(IdentityState::Authenticated(user.clone()));
                Ok(user.clone())
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn logout(&self) {
        tracing::info!("signed out");
        self.state.send_replace(IdentityState::Anonymous);
    }
}

/// The builder for `MemoryIdentity`
#[derive(Default, Debug)]
pub struct MemoryIdentityBuilder {
    accounts: HashMap<String, (String, UserId)>,
}

impl MemoryIdentityBuilder {
    /// Register an account; emails are matched case-insensitively.
    pub fn account(mut self, email: &str, password: &str, user: impl Into<UserId>) -> Self {
        self.accounts.insert(
            email.trim().to_lowercase(),
            (password.to_string(), user.into()),
        );
        self
    }

    pub fn build(self) -> MemoryIdentity {
        let (state, _) = watch::channel(IdentityState::Unresolved);
        MemoryIdentity {
            accounts: Arc::new(self.accounts),
            state: Arc::new(state),
        }
    }
}
