//! HTTP adapter for the hosted ledger store.
//!
//! [`RemoteStore`] and [`RemoteIdentity`] plug the store's REST API into the
//! ledger's collaborator traits. The API has no push channel, so a live
//! query is a polling task that forwards a snapshot whenever the owner's
//! revision changes.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use api_types::{
    ErrorResponse,
    auth::{LoginRequest, LoginResponse},
    transaction::{self as wire, InsertResponse, TransactionInsert, TransactionSnapshot},
};
use ledger::{
    AuthError, Credentials, IdentityProvider, IdentityState, MoneyCents, NewTransaction,
    SnapshotSink, SnapshotStream, StoreError, Transaction, TransactionId, TransactionKind,
    TransactionStore, UserId,
    store::{COLLECTION, snapshot_channel},
};
use reqwest::{RequestBuilder, Response, Url};
use thiserror::Error;
use tokio::{sync::watch, time::MissedTickBehavior};

use crate::error::{AppError, Result};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict(body),
            422 => Self::Validation(body),
            _ => Self::Server(body),
        }
    }

    async fn from_response(res: Response) -> Self {
        let status = res.status();
        let body = res
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| "unknown error".to_string());
        Self::from_status(status.as_u16(), body)
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound => StoreError::NotFound,
            ClientError::Unauthorized | ClientError::Forbidden => {
                StoreError::Rejected(err.to_string())
            }
            ClientError::Conflict(msg) | ClientError::Validation(msg) => StoreError::Rejected(msg),
            ClientError::Server(msg) => StoreError::Unavailable(msg),
            ClientError::Transport(err) => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    session: Arc<RwLock<Option<Credentials>>>,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| AppError::Input(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::Server(format!("invalid base_url: {err}")))
    }

    /// Attach the signed-in user's credentials, if any.
    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        match session.as_ref() {
            Some(credentials) => req.basic_auth(&credentials.email, Some(&credentials.password)),
            None => req,
        }
    }

    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<LoginResponse, ClientError> {
        let payload = LoginRequest {
            email: credentials.email.clone(),
            password: credentials.password.clone(),
        };
        let res = self
            .http
            .post(self.endpoint("auth/login")?)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::from_response(res).await);
        }
        let login = res.json::<LoginResponse>().await?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(login)
    }

    pub fn logout(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub async fn snapshot(
        &self,
        owner: &UserId,
    ) -> std::result::Result<TransactionSnapshot, ClientError> {
        let req = self
            .http
            .get(self.endpoint(COLLECTION)?)
            .query(&[("owner_id", owner.as_str())]);
        let res = self.authorized(req).send().await?;

        if !res.status().is_success() {
            return Err(ClientError::from_response(res).await);
        }
        Ok(res.json::<TransactionSnapshot>().await?)
    }

    pub async fn insert(
        &self,
        payload: &TransactionInsert,
    ) -> std::result::Result<InsertResponse, ClientError> {
        let req = self.http.post(self.endpoint(COLLECTION)?).json(payload);
        let res = self.authorized(req).send().await?;

        if !res.status().is_success() {
            return Err(ClientError::from_response(res).await);
        }
        Ok(res.json::<InsertResponse>().await?)
    }

    pub async fn delete(&self, id: &TransactionId) -> std::result::Result<(), ClientError> {
        let mut endpoint = self.endpoint(COLLECTION)?;
        endpoint
            .path_segments_mut()
            .map_err(|()| ClientError::Server("base_url cannot be a base".to_string()))?
            .push(id.as_str());
        let res = self.authorized(self.http.delete(endpoint)).send().await?;

        if !res.status().is_success() {
            return Err(ClientError::from_response(res).await);
        }
        Ok(())
    }
}

fn kind_to_wire(kind: TransactionKind) -> wire::TransactionKind {
    match kind {
        TransactionKind::Expense => wire::TransactionKind::Expense,
        TransactionKind::Investment => wire::TransactionKind::Investment,
    }
}

fn kind_from_wire(kind: wire::TransactionKind) -> TransactionKind {
    match kind {
        wire::TransactionKind::Expense => TransactionKind::Expense,
        wire::TransactionKind::Investment => TransactionKind::Investment,
    }
}

fn from_record(record: wire::TransactionRecord) -> Transaction {
    Transaction {
        id: TransactionId::new(record.id),
        owner_id: UserId::new(record.owner_id),
        kind: kind_from_wire(record.kind),
        title: record.title,
        amount: MoneyCents::new(record.amount_minor),
        category: record.category,
        created_at: record.created_at,
    }
}

fn to_insert(record: NewTransaction) -> TransactionInsert {
    TransactionInsert {
        owner_id: record.owner_id.to_string(),
        kind: kind_to_wire(record.kind),
        title: record.title,
        amount_minor: record.amount.cents(),
        category: record.category,
    }
}

/// Transaction store backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    poll_interval: Duration,
}

impl RemoteStore {
    pub fn new(client: Client, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval: poll_interval.max(Duration::from_millis(50)),
        }
    }
}

impl TransactionStore for RemoteStore {
    fn subscribe_query(&self, owner_id: &UserId) -> SnapshotStream {
        let (sink, stream) = snapshot_channel();
        tokio::spawn(poll_snapshots(
            self.client.clone(),
            owner_id.clone(),
            self.poll_interval,
            sink,
        ));
        stream
    }

    async fn insert(&self, record: NewTransaction) -> std::result::Result<TransactionId, StoreError> {
        let created = self.client.insert(&to_insert(record)).await?;
        Ok(TransactionId::new(created.id))
    }

    async fn delete_by_id(&self, id: &TransactionId) -> std::result::Result<(), StoreError> {
        Ok(self.client.delete(id).await?)
    }
}

/// Live query over polling. Runs until the consumer goes away or a request
/// fails; a failure is forwarded and ends the stream.
async fn poll_snapshots(client: Client, owner: UserId, every: Duration, sink: SnapshotSink) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut revision = None;

    loop {
        tokio::select! {
            _ = sink.closed() => {
                tracing::debug!(%owner, "live query released");
                return;
            }
            _ = ticker.tick() => {}
        }

        match client.snapshot(&owner).await {
            Ok(snapshot) => {
                if revision == Some(snapshot.revision) {
                    continue;
                }
                tracing::debug!(%owner, revision = snapshot.revision, "store revision changed");
                revision = Some(snapshot.revision);
                let transactions = snapshot.transactions.into_iter().map(from_record).collect();
                if !sink.push(transactions) {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(%owner, error = %err, "polling the store failed");
                sink.fail(err.into());
                return;
            }
        }
    }
}

/// Identity provider backed by `POST auth/login`.
#[derive(Debug, Clone)]
pub struct RemoteIdentity {
    client: Client,
    state: Arc<watch::Sender<IdentityState>>,
}

impl RemoteIdentity {
    pub fn new(client: Client) -> Self {
        let (state, _) = watch::channel(IdentityState::Unresolved);
        Self {
            client,
            state: Arc::new(state),
        }
    }
}

impl IdentityProvider for RemoteIdentity {
    fn state(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn login(&self, credentials: Credentials) -> std::result::Result<UserId, AuthError> {
        match self.client.login(&credentials).await {
            Ok(login) => {
                let user = UserId::new(login.user_id);
                tracing::info!(%user, "signed in");
                self.state
                    .send_replace(IdentityState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(ClientError::Unauthorized | ClientError::Forbidden) => {
                Err(AuthError::InvalidCredentials)
            }
            Err(err) => Err(AuthError::Unavailable(err.to_string())),
        }
    }

    async fn logout(&self) {
        self.client.logout();
        tracing::info!("signed out");
        self.state.send_replace(IdentityState::Anonymous);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn status_codes_map_to_store_errors() {
        let err: StoreError = ClientError::from_status(404, String::new()).into();
        assert_eq!(err, StoreError::NotFound);

        let err: StoreError = ClientError::from_status(403, String::new()).into();
        assert!(matches!(err, StoreError::Rejected(_)));

        let err: StoreError = ClientError::from_status(422, "amount".to_string()).into();
        assert_eq!(err, StoreError::Rejected("amount".to_string()));

        let err: StoreError = ClientError::from_status(503, "down".to_string()).into();
        assert_eq!(err, StoreError::Unavailable("down".to_string()));
    }

    #[test]
    fn records_convert_to_transactions() {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let tx = from_record(wire::TransactionRecord {
            id: "t-1".to_string(),
            owner_id: "alice".to_string(),
            kind: wire::TransactionKind::Investment,
            title: "ETF".to_string(),
            amount_minor: 10000,
            category: "Stocks".to_string(),
            created_at,
        });
        assert_eq!(tx.kind, TransactionKind::Investment);
        assert_eq!(tx.amount, MoneyCents::new(10000));
        assert_eq!(tx.created_at, created_at);
    }

    #[test]
    fn inserts_carry_minor_units() {
        let insert = to_insert(NewTransaction {
            owner_id: UserId::from("alice"),
            kind: TransactionKind::Expense,
            title: "Coffee".to_string(),
            amount: MoneyCents::new(450),
            category: "Food".to_string(),
        });
        assert_eq!(insert.amount_minor, 450);
        assert_eq!(insert.kind, wire::TransactionKind::Expense);
    }

    #[test]
    fn base_url_must_parse() {
        assert!(Client::new("not a url").is_err());
        assert!(Client::new("http://127.0.0.1:3000/api/").is_ok());
    }

    #[tokio::test]
    async fn identity_starts_unresolved() {
        let client = Client::new("http://127.0.0.1:9").unwrap();
        let identity = RemoteIdentity::new(client);
        assert_eq!(*identity.state().borrow(), IdentityState::Unresolved);

        identity.logout().await;
        assert_eq!(*identity.state().borrow(), IdentityState::Anonymous);
    }
}
