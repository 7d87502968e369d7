use crate::session::{load_session, persist_session, storage_key};
use crate::{
    api_exec, api_exec_paginated, realtime, AuthEvent, AuthEventKind, AuthService, ChannelFilter,
    DataService, Filter, Select, Session, SessionStore, Subscription, User,
};
use models::Table;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use url::Url;

/// Client of a hosted backend project, which serves a PostgREST API under
/// `rest/v1`, an auth API under `auth/v1`, and a Realtime websocket
/// under `realtime/v1`.
#[derive(Clone)]
pub struct Client {
    // Base URL of the project.
    endpoint: Url,
    // Public (shared) anonymous token of the project.
    public_token: String,
    // HTTP client to use for auth requests.
    http_client: reqwest::Client,
    // Keep a single Postgrest and hand out clones of it in order to maintain
    // a single connection pool. The clones can have different headers while
    // still re-using the same connection pool.
    pg_parent: postgrest::Postgrest,
    // Store which holds the persisted Session.
    store: Arc<dyn SessionStore>,
    storage_key: String,
    auth_events: broadcast::Sender<AuthEvent>,
    // Serializes token refreshes.
    refresh_lock: Arc<Mutex<()>>,
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    // Seconds to expiry of access_token.
    expires_in: i64,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(resp: TokenResponse) -> Self {
        Session {
            access_token: resp.access_token,
            refresh_token: Some(resp.refresh_token),
            expires_at: Some(chrono::Utc::now().timestamp() + resp.expires_in),
            user: resp.user,
        }
    }
}

impl Client {
    /// Build a new Client of the project at `endpoint`.
    pub fn new(endpoint: Url, public_token: String, store: Arc<dyn SessionStore>) -> Self {
        let (auth_events, _) = broadcast::channel(16);
        let rest = join_path(&endpoint, "rest/v1");

        Self {
            storage_key: storage_key(&endpoint),
            pg_parent: postgrest::Postgrest::new(rest.as_str())
                .insert_header("apikey", public_token.as_str()),
            endpoint,
            public_token,
            http_client: reqwest::Client::new(),
            store,
            auth_events,
            refresh_lock: Default::default(),
        }
    }

    /// Postgrest client which authorizes as `access_token`,
    /// or as the anonymous role if there is none.
    pub fn pg_client(&self, access_token: Option<&str>) -> postgrest::Postgrest {
        let token = access_token.unwrap_or(&self.public_token);

        self.pg_parent
            .clone()
            .insert_header("Authorization", format!("Bearer {token}"))
    }

    async fn from(&self, table: Table) -> anyhow::Result<postgrest::Builder> {
        let session = self.get_session().await?;
        let token = session.as_ref().map(|s| s.access_token.as_str());

        Ok(self.pg_client(token).from(table.as_str()))
    }

    fn realtime_url(&self) -> Url {
        let mut url = join_path(&self.endpoint, "realtime/v1/websocket");
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        let _ = url.set_scheme(scheme);

        url.query_pairs_mut()
            .append_pair("apikey", &self.public_token)
            .append_pair("vsn", "1.0.0");
        url
    }

    // POST to the auth API, returning the deserialized response body.
    async fn auth_post<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
        access_token: Option<&str>,
    ) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = join_path(&self.endpoint, &format!("auth/v1/{path}"));
        let builder = self
            .http_client
            .post(url)
            .query(query)
            .header("apikey", &self.public_token)
            .bearer_auth(access_token.unwrap_or(&self.public_token))
            .json(body);

        let request = builder.build()?;
        tracing::debug!(url = %request.url(), method = "POST", "sending request");

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("{}", auth_error_message(status, &body));
        }
        if body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_str(&body)?)
    }

    // Exchange the refresh token of `session` for a new Session.
    async fn refresh(&self, session: &Session) -> anyhow::Result<Session> {
        let Some(refresh_token) = &session.refresh_token else {
            anyhow::bail!("session has expired and is not refreshable");
        };

        let resp: TokenResponse = self
            .auth_post(
                "token",
                &[("grant_type", "refresh_token")],
                &serde_json::json!({ "refresh_token": refresh_token }),
                None,
            )
            .await?;

        Ok(resp.into())
    }

    fn remember(&self, session: Option<&Session>) {
        persist_session(self.store.as_ref(), &self.storage_key, session);
    }

    fn broadcast(&self, kind: AuthEventKind, session: Option<Session>) {
        // Send fails only if there are no receivers.
        let _ = self.auth_events.send(AuthEvent { kind, session });
    }
}

#[async_trait::async_trait]
impl DataService for Client {
    async fn select(&self, select: Select) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut builder = self.from(select.table).await?.select("*");

        for filter in &select.filters {
            builder = match filter {
                Filter::Eq(column, value) => builder.eq(*column, value),
                Filter::In(column, values) => builder.in_(*column, values),
            };
        }
        if let Some(order) = select.order_param() {
            builder = builder.order(order);
        }

        api_exec_paginated(builder).await
    }

    async fn insert(
        &self,
        table: Table,
        row: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let builder = self.from(table).await?.insert(row.to_string()).single();
        api_exec(builder).await
    }

    async fn update(
        &self,
        table: Table,
        id: uuid::Uuid,
        patch: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let builder = self
            .from(table)
            .await?
            .eq("id", id.to_string())
            .update(patch.to_string())
            .single();

        api_exec(builder).await
    }

    async fn subscribe(&self, filter: ChannelFilter) -> anyhow::Result<Subscription> {
        Ok(realtime::subscribe(
            self.realtime_url(),
            Arc::new(self.clone()),
            self.public_token.clone(),
            filter,
        ))
    }
}

#[async_trait::async_trait]
impl AuthService for Client {
    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        let _guard = self.refresh_lock.lock().await;

        let Some(session) = load_session(self.store.as_ref(), &self.storage_key) else {
            return Ok(None);
        };
        if !session.expires_within(chrono::Duration::seconds(60)) {
            return Ok(Some(session));
        }

        tracing::debug!("refreshing access token");
        let session = self.refresh(&session).await?;
        self.remember(Some(&session));
        self.broadcast(AuthEventKind::TokenRefreshed, Some(session.clone()));

        Ok(Some(session))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let resp: TokenResponse = self
            .auth_post(
                "token",
                &[("grant_type", "password")],
                &serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await?;

        let session = Session::from(resp);
        self.remember(Some(&session));
        self.broadcast(AuthEventKind::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()> {
        let _user: serde_json::Value = self
            .auth_post(
                "signup",
                &[],
                &serde_json::json!({ "email": email, "password": password, "data": metadata }),
                None,
            )
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(user_id = %session.user.id), err)]
    async fn sign_out_global(&self, session: &Session) -> anyhow::Result<()> {
        self.remember(None);
        self.broadcast(AuthEventKind::SignedOut, None);

        let _: serde_json::Value = self
            .auth_post(
                "logout",
                &[("scope", "global")],
                &serde_json::Value::Null,
                Some(&session.access_token),
            )
            .await?;

        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

// Join `path` onto the path of `base`, which may itself have a path prefix.
fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{path}"));
    url
}

// Extract the human-readable message of an auth API error response.
fn auth_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();

    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|field| parsed.get(*field).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{status}: {body}"))
}
