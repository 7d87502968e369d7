use crate::{AuthEvent, ChangeEvent, ChannelFilter, Select, Session};
use models::Table;
use tokio::sync::{broadcast, mpsc};

/// DataService is the table-oriented surface of the hosted backend:
/// scoped reads, inserts and updates, and change-notification channels.
#[async_trait::async_trait]
pub trait DataService: Send + Sync + 'static {
    /// Read all rows matching the Select.
    async fn select(&self, select: Select) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Insert a row, returning it as stored (with server-assigned columns).
    async fn insert(&self, table: Table, row: serde_json::Value)
        -> anyhow::Result<serde_json::Value>;

    /// Update the row having `id` with the columns of `patch`,
    /// returning the updated row.
    async fn update(
        &self,
        table: Table,
        id: uuid::Uuid,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Subscribe to changes selected by the ChannelFilter.
    async fn subscribe(&self, filter: ChannelFilter) -> anyhow::Result<Subscription>;
}

/// AuthService is the identity surface of the hosted backend.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync + 'static {
    /// Current Session, if any. This consults the local SessionStore
    /// and may refresh an expiring access token.
    async fn get_session(&self) -> anyhow::Result<Option<Session>>;

    /// Authenticate using an email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session>;

    /// Register a new identity with attached metadata.
    /// This does not authenticate the caller.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Revoke all sessions of the user of `session`, everywhere, and forget
    /// the local session. The caller captures `session` before clearing any
    /// local session artifacts.
    async fn sign_out_global(&self, session: &Session) -> anyhow::Result<()>;

    /// Receive AuthEvents of this service.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Backend is a hosted service providing both data and identity.
pub trait Backend: DataService + AuthService {}

impl<B: DataService + AuthService> Backend for B {}

/// Subscription is a live change-notification channel.
/// Dropping the Subscription unsubscribes it.
pub struct Subscription {
    filter: ChannelFilter,
    rx: mpsc::Receiver<ChangeEvent>,
    _guard: Option<Box<dyn Send + Sync>>,
}

impl Subscription {
    pub fn new(
        filter: ChannelFilter,
        rx: mpsc::Receiver<ChangeEvent>,
        guard: Option<Box<dyn Send + Sync>>,
    ) -> Self {
        Self {
            filter,
            rx,
            _guard: guard,
        }
    }

    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Next ChangeEvent of the channel, or None if the channel has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.filter)
            .finish()
    }
}

/// Read and deserialize all rows matching the Select.
pub async fn fetch<S, T>(service: &S, select: Select) -> anyhow::Result<Vec<T>>
where
    S: DataService + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let table = select.table;
    let rows = service.select(select).await?;

    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|err| anyhow::anyhow!("deserializing {table} row: {err}"))
        })
        .collect()
}

/// Insert a typed row and deserialize the stored result.
pub async fn insert<S, N, T>(service: &S, table: Table, row: &N) -> anyhow::Result<T>
where
    S: DataService + ?Sized,
    N: serde::Serialize,
    T: serde::de::DeserializeOwned,
{
    let row = serde_json::to_value(row)?;
    let stored = service.insert(table, row).await?;
    Ok(serde_json::from_value(stored)?)
}

/// Update a row from a typed patch and deserialize the stored result.
pub async fn update<S, P, T>(
    service: &S,
    table: Table,
    id: uuid::Uuid,
    patch: &P,
) -> anyhow::Result<T>
where
    S: DataService + ?Sized,
    P: serde::Serialize,
    T: serde::de::DeserializeOwned,
{
    let patch = serde_json::to_value(patch)?;
    let stored = service.update(table, id, patch).await?;
    Ok(serde_json::from_value(stored)?)
}
