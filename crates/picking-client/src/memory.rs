use crate::session::{load_session, persist_session, storage_key};
use crate::{
    AuthEvent, AuthEventKind, AuthService, ChangeEvent, ChannelFilter, DataService, EventKind,
    MemoryStore, Select, Session, SessionStore, Subscription, User,
};
use models::Table;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

/// MemoryService is an in-process implementation of the hosted backend.
///
/// It keeps tables as JSON rows, assigns ids and timestamps on insert the way
/// the database would, creates a Profile for each new identity, and delivers
/// change notifications to matching subscribers on every write. It also allows
/// read and write failures to be injected, and counts reads per table.
pub struct MemoryService {
    tables: Mutex<BTreeMap<Table, Vec<serde_json::Value>>>,
    accounts: Mutex<Vec<Account>>,
    // Access tokens of every issued Session, and those since revoked.
    issued: Mutex<Vec<Session>>,
    revoked: Mutex<HashSet<String>>,
    store: Arc<dyn SessionStore>,
    storage_key: String,
    auth_events: broadcast::Sender<AuthEvent>,
    subscribers: Mutex<Vec<(ChannelFilter, mpsc::Sender<ChangeEvent>)>>,
    faults: Mutex<Faults>,
    selects: Mutex<BTreeMap<Table, usize>>,
    read_latency: Mutex<std::time::Duration>,
}

struct Account {
    email: String,
    password: String,
    user: User,
}

#[derive(Default)]
struct Faults {
    reads: Option<String>,
    next_write: Option<String>,
    sign_out: Option<String>,
}

impl MemoryService {
    /// Build a MemoryService which persists sessions into `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (auth_events, _) = broadcast::channel(16);

        Self {
            tables: Default::default(),
            accounts: Default::default(),
            issued: Default::default(),
            revoked: Default::default(),
            store,
            storage_key: storage_key(&crate::LOCAL_API_URL),
            auth_events,
            subscribers: Default::default(),
            faults: Default::default(),
            selects: Default::default(),
            read_latency: Mutex::new(std::time::Duration::ZERO),
        }
    }

    /// Build a MemoryService with its own MemoryStore.
    pub fn standalone() -> (Arc<Self>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (Arc::new(Self::new(store.clone())), store)
    }

    /// Insert rows without notifying subscribers, filling server-assigned columns.
    /// Returns the stored rows.
    pub fn seed<T, I>(&self, table: Table, rows: I) -> Vec<serde_json::Value>
    where
        T: serde::Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut tables = self.tables.lock().unwrap();
        let stored: Vec<_> = rows
            .into_iter()
            .map(|row| fill_insert(table, serde_json::to_value(row).unwrap_or_default()))
            .collect();

        tables.entry(table).or_default().extend(stored.iter().cloned());
        stored
    }

    /// Register an account with an existing Profile id, without creating the Profile.
    pub fn seed_account(&self, email: &str, password: &str, user_id: uuid::Uuid) {
        self.accounts.lock().unwrap().push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user: User {
                id: user_id,
                email: Some(email.to_string()),
                user_metadata: serde_json::Value::Null,
            },
        });
    }

    /// Delete the row having `id`, notifying subscribers.
    pub fn delete(&self, table: Table, id: uuid::Uuid) -> Option<serde_json::Value> {
        let removed = {
            let mut tables = self.tables.lock().unwrap();
            let rows = tables.entry(table).or_default();
            let index = rows.iter().position(|row| has_id(row, id))?;
            rows.remove(index)
        };

        self.notify(ChangeEvent {
            table,
            kind: EventKind::Delete,
            record: serde_json::Value::Null,
            old_record: removed.clone(),
        });
        Some(removed)
    }

    /// Deliver a ChangeEvent to matching subscribers, as though a write occurred.
    pub fn notify(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|(_, tx)| !tx.is_closed());

        for (filter, tx) in subscribers.iter() {
            if !filter.admits(&event) {
                continue;
            }
            if let Err(err) = tx.try_send(event.clone()) {
                tracing::warn!(%filter, %err, "dropping change notification");
            }
        }
    }

    /// Number of open change subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    /// Number of reads which have been issued against `table`.
    pub fn select_count(&self, table: Table) -> usize {
        self.selects
            .lock()
            .unwrap()
            .get(&table)
            .copied()
            .unwrap_or_default()
    }

    /// Current rows of `table`.
    pub fn rows(&self, table: Table) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of sessions which have been revoked.
    pub fn revoked_sessions(&self) -> usize {
        self.revoked.lock().unwrap().len()
    }

    /// Fail all reads with `message` until cleared with None.
    pub fn fail_reads(&self, message: Option<&str>) {
        self.faults.lock().unwrap().reads = message.map(str::to_string);
    }

    /// Fail the next write with `message`.
    pub fn fail_next_write(&self, message: &str) {
        self.faults.lock().unwrap().next_write = Some(message.to_string());
    }

    /// Fail the next global sign-out with `message`.
    pub fn fail_sign_out(&self, message: &str) {
        self.faults.lock().unwrap().sign_out = Some(message.to_string());
    }

    /// Delay each read by `latency`, so that concurrent reads overlap.
    pub fn set_read_latency(&self, latency: std::time::Duration) {
        *self.read_latency.lock().unwrap() = latency;
    }

    fn take_write_fault(&self) -> anyhow::Result<()> {
        match self.faults.lock().unwrap().next_write.take() {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DataService for MemoryService {
    async fn select(&self, select: Select) -> anyhow::Result<Vec<serde_json::Value>> {
        *self.selects.lock().unwrap().entry(select.table).or_default() += 1;

        let latency = *self.read_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(message) = &self.faults.lock().unwrap().reads {
            anyhow::bail!("{message}");
        }

        let mut rows: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .get(&select.table)
            .into_iter()
            .flatten()
            .filter(|row| select.matches(row))
            .cloned()
            .collect();

        select.sort(&mut rows);
        tracing::trace!(table = %select.table, rows = rows.len(), "selected rows");

        Ok(rows)
    }

    async fn insert(
        &self,
        table: Table,
        row: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.take_write_fault()?;

        if !row.is_object() {
            anyhow::bail!("{table} row must be an object, not {row}");
        }
        let row = fill_insert(table, row);

        self.tables
            .lock()
            .unwrap()
            .entry(table)
            .or_default()
            .push(row.clone());

        self.notify(ChangeEvent {
            table,
            kind: EventKind::Insert,
            record: row.clone(),
            old_record: serde_json::Value::Null,
        });
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        id: uuid::Uuid,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.take_write_fault()?;

        let serde_json::Value::Object(patch) = patch else {
            anyhow::bail!("{table} patch must be an object, not {patch}");
        };

        let (old, new) = {
            let mut tables = self.tables.lock().unwrap();
            let Some(row) = tables
                .entry(table)
                .or_default()
                .iter_mut()
                .find(|row| has_id(row, id))
            else {
                anyhow::bail!("{table} row {id} was not found");
            };
            let old = row.clone();

            if let serde_json::Value::Object(fields) = row {
                fields.extend(patch);

                if table.has_updated_at() {
                    fields.insert("updated_at".to_string(), now().into());
                }
            }
            (old, row.clone())
        };

        self.notify(ChangeEvent {
            table,
            kind: EventKind::Update,
            record: new.clone(),
            old_record: old,
        });
        Ok(new)
    }

    async fn subscribe(&self, filter: ChannelFilter) -> anyhow::Result<Subscription> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().unwrap().push((filter.clone(), tx));

        tracing::debug!(%filter, "subscribed to changes");
        Ok(Subscription::new(filter, rx, None))
    }
}

#[async_trait::async_trait]
impl AuthService for MemoryService {
    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        let Some(session) = load_session(self.store.as_ref(), &self.storage_key) else {
            return Ok(None);
        };

        if self.revoked.lock().unwrap().contains(&session.access_token) {
            persist_session(self.store.as_ref(), &self.storage_key, None);
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let user = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password)
            .map(|a| a.user.clone());

        let Some(user) = user else {
            anyhow::bail!("Invalid login credentials");
        };

        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: Some(uuid::Uuid::new_v4().to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            user,
        };
        persist_session(self.store.as_ref(), &self.storage_key, Some(&session));
        self.issued.lock().unwrap().push(session.clone());

        let _ = self.auth_events.send(AuthEvent {
            kind: AuthEventKind::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()> {
        let profile: models::ProfileMetadata = serde_json::from_value(metadata.clone())
            .map_err(|err| anyhow::anyhow!("invalid sign-up metadata: {err}"))?;

        let user = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
                anyhow::bail!("User already registered");
            }
            let user = User {
                id: uuid::Uuid::new_v4(),
                email: Some(email.to_string()),
                user_metadata: metadata,
            };
            accounts.push(Account {
                email: email.to_string(),
                password: password.to_string(),
                user: user.clone(),
            });
            user
        };

        // Mirror the server-side trigger which creates a Profile for each new identity.
        self.seed(
            Table::Profiles,
            [serde_json::json!({
                "id": user.id,
                "employee_id": profile.employee_id,
                "full_name": profile.full_name,
                "role": profile.role,
                "warehouse_id": null,
            })],
        );
        Ok(())
    }

    async fn sign_out_global(&self, session: &Session) -> anyhow::Result<()> {
        persist_session(self.store.as_ref(), &self.storage_key, None);
        let _ = self.auth_events.send(AuthEvent {
            kind: AuthEventKind::SignedOut,
            session: None,
        });

        if let Some(message) = self.faults.lock().unwrap().sign_out.take() {
            anyhow::bail!("{message}");
        }
        if self.revoked.lock().unwrap().contains(&session.access_token) {
            anyhow::bail!("invalid JWT: token has been revoked");
        }

        // Revocation is global: every session of the user is revoked.
        let tokens: Vec<String> = self
            .issued
            .lock()
            .unwrap()
            .iter()
            .filter(|issued| issued.user.id == session.user.id)
            .map(|issued| issued.access_token.clone())
            .collect();

        let mut revoked = self.revoked.lock().unwrap();
        revoked.insert(session.access_token.clone());
        revoked.extend(tokens);

        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

fn has_id(row: &serde_json::Value, id: uuid::Uuid) -> bool {
    row.get("id").and_then(|v| v.as_str()) == Some(id.to_string().as_str())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

// Fill columns which the database assigns on insert.
fn fill_insert(table: Table, mut row: serde_json::Value) -> serde_json::Value {
    let serde_json::Value::Object(fields) = &mut row else {
        return row;
    };
    let now = now();

    if fields.get("id").map_or(true, serde_json::Value::is_null) {
        fields.insert("id".to_string(), uuid::Uuid::new_v4().to_string().into());
    }
    for column in table.insert_timestamps() {
        if fields.get(*column).map_or(true, serde_json::Value::is_null) {
            fields.insert(column.to_string(), now.clone().into());
        }
    }
    row
}
