use std::{fmt::Write as _, future::Future, sync::Arc, time::Duration};

use chrono_tz::Tz;
use ledger::{
    AddError, AddTransactionCmd, CommandGateway, Credentials, IdentityProvider, LedgerSync,
    LedgerView, SyncStatus, Transaction, TransactionId, TransactionKind, TransactionStore, UserId,
    categories::canonical_category,
};

use crate::{
    config::{AppConfig, Command},
    error::{AppError, Result},
};

const RECENT_ENTRIES: usize = 10;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct App<S, I> {
    config: AppConfig,
    timezone: Tz,
    engine: LedgerSync<S>,
    gateway: CommandGateway<S>,
    identity: I,
}

impl<S: TransactionStore, I: IdentityProvider> App<S, I> {
    pub fn new(config: AppConfig, store: Arc<S>, identity: I) -> Result<Self> {
        let timezone = config.timezone()?;
        Ok(Self {
            config,
            timezone,
            engine: LedgerSync::new(Arc::clone(&store)),
            gateway: CommandGateway::new(store),
            identity,
        })
    }

    pub async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Watch => self.watch().await,
            Command::Add {
                kind,
                title,
                amount,
                category,
            } => self.add(&kind, title, amount, category).await,
            Command::Remove { id } => self.remove(TransactionId::new(id)).await,
        }
    }

    async fn sign_in(&self) -> Result<UserId> {
        if self.config.email.trim().is_empty() || self.config.password.is_empty() {
            return Err(AppError::Input(
                "email and password are required (config file, TRACKER_EMAIL, TRACKER_PASSWORD)"
                    .to_string(),
            ));
        }
        let credentials = Credentials::new(&self.config.email, &self.config.password);
        Ok(self.identity.login(credentials).await?)
    }

    async fn watch(self) -> Result<()> {
        let shutdown = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.watch_until(shutdown, |text| println!("{text}")).await
    }

    /// Follow the ledger, handing every live view to `emit`, until
    /// `shutdown` resolves.
    async fn watch_until(
        self,
        shutdown: impl Future<Output = ()>,
        mut emit: impl FnMut(String),
    ) -> Result<()> {
        // Subscribed before sign-in so the first live view is not missed.
        let mut views = self.engine.watch();
        views.mark_changed();

        let follower = tokio::spawn({
            let engine = self.engine.clone();
            let signal = self.identity.state();
            async move { engine.follow_identity(signal).await }
        });

        let user = self.sign_in().await?;
        tracing::info!(%user, "watching ledger, Ctrl-C to stop");

        tokio::pin!(shutdown);
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let view = tokio::select! {
                _ = &mut shutdown => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    views.borrow_and_update().clone()
                }
            };

            match view.status() {
                SyncStatus::Live => {
                    backoff = INITIAL_BACKOFF;
                    emit(render(&view, self.timezone));
                }
                SyncStatus::Failed(failure) => {
                    tracing::warn!(
                        %failure,
                        retry_in_ms = backoff.as_millis() as u64,
                        "ledger sync failed, retrying"
                    );
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    self.engine.resubscribe();
                }
                SyncStatus::Idle | SyncStatus::Connecting => {}
            }
        }

        self.identity.logout().await;
        drop(self.identity);
        if let Err(err) = follower.await {
            tracing::error!(error = %err, "identity follower stopped abnormally");
        }
        Ok(())
    }

    async fn add(
        self,
        kind: &str,
        title: String,
        amount: String,
        category: String,
    ) -> Result<()> {
        let kind = TransactionKind::try_from(kind).map_err(AddError::from)?;
        let category = match canonical_category(kind, &category) {
            Some(known) => known.to_string(),
            None => {
                tracing::warn!(%kind, %category, "category is not in the usual list, recording it anyway");
                category
            }
        };

        let user = self.sign_in().await?;
        let result = self
            .gateway
            .add(AddTransactionCmd::new(user, kind, title, amount, category))
            .await;
        self.identity.logout().await;

        println!("{}", result?);
        Ok(())
    }

    async fn remove(self, id: TransactionId) -> Result<()> {
        self.sign_in().await?;
        let result = self.gateway.remove(&id).await;
        self.identity.logout().await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_benign() => {
                tracing::info!(%id, "nothing to remove");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Totals followed by the newest entries, timestamps in `timezone`.
fn render(view: &LedgerView, timezone: Tz) -> String {
    let totals = view.totals();
    let mut out = format!(
        "expenses {:>12}   investments {:>12}   ({} entries)",
        totals.expenses.to_string(),
        totals.investments.to_string(),
        view.transactions().len()
    );
    for tx in view.transactions().iter().take(RECENT_ENTRIES) {
        let _ = write!(
            out,
            "\n{}  {:<10} {:>10}  {:<14} {}  [{}]",
            tx.created_at.with_timezone(&timezone).format("%Y-%m-%d %H:%M"),
            tx.kind.as_str(),
            signed_amount(tx),
            tx.category,
            tx.title,
            tx.id
        );
    }
    out
}

/// Expenses leave the balance, investments add to the portfolio.
fn signed_amount(tx: &Transaction) -> String {
    let sign = match tx.kind {
        TransactionKind::Expense => '-',
        TransactionKind::Investment => '+',
    };
    format!("{sign}{}", tx.amount)
}
