//! Data-synchronization layer of the warehouse picking system.
//!
//! An [`AuthProvider`] owns the session and Profile of the current user.
//! Resource hooks (see [`hooks`]) read warehouse-scoped tables through a shared
//! [`QueryClient`] cache, which is invalidated by remote change notifications,
//! polling, and successful mutations.

mod auth;
pub use auth::{AuthProvider, AuthState};

pub mod dashboard;
pub use dashboard::{Dashboard, Screen};

mod error;
pub use error::Error;

pub mod hooks;

mod mutation;
pub use mutation::{Messages, Mutation};

mod query;
pub use query::{Entry, Query, QueryClient, QueryKey};

mod subscriptions;
pub use subscriptions::{Channel, Poller, Subscriptions, Trigger};

pub mod toast;
pub use toast::{Toast, Toaster};

pub mod widgets;

use models::Profile;
use picking_client::Backend;
use std::sync::Arc;
use tokio::sync::watch;

/// Context is passed to mounted hooks. Clones share the same query cache,
/// change channels, and toaster.
#[derive(Clone)]
pub struct Context {
    pub backend: Arc<dyn Backend>,
    pub query: QueryClient,
    pub subscriptions: Subscriptions,
    pub toaster: Toaster,
    auth: watch::Receiver<AuthState>,
}

/// Scope of the current profile. Hooks are disabled until a Scope is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub warehouse_id: uuid::Uuid,
    pub profile: Profile,
}

impl Context {
    pub fn new(auth: &AuthProvider) -> Self {
        let backend = auth.backend().clone();
        let query = QueryClient::new();

        Self {
            subscriptions: Subscriptions::new(backend.clone(), query.clone()),
            backend,
            query,
            toaster: auth.toaster().clone(),
            auth: auth.subscribe(),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.auth.borrow().profile().cloned()
    }

    /// Scope of the current profile, or None if there's no profile
    /// or it has no assigned warehouse.
    pub fn scope(&self) -> Option<Scope> {
        let profile = self.profile()?;

        Some(Scope {
            warehouse_id: profile.warehouse_id?,
            profile,
        })
    }
}
