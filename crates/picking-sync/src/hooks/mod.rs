//! Resource hooks. Each hook is mounted against a [`Context`] and observes one
//! warehouse-scoped query for as long as it lives. A hook mounted without a
//! known warehouse is disabled: it never fetches, reads as empty, and is
//! not loading.

use crate::{Context, Poller, Query, QueryKey, Trigger};
use std::future::Future;

// Hooks dereference to their Query, for access to its data and loading state.
macro_rules! deref_query {
    ($hook:ty, $data:ty) => {
        impl std::ops::Deref for $hook {
            type Target = crate::Query<$data>;

            fn deref(&self) -> &Self::Target {
                &self.query
            }
        }

        impl std::ops::DerefMut for $hook {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.query
            }
        }
    };
}
pub(crate) use deref_query;

pub mod activity;
pub mod chat;
pub mod inventory;
pub mod performance;
pub mod pick_lists;
pub mod pickers;
pub mod tasks;

pub use activity::DamageReports;
pub use chat::Chat;
pub use inventory::InventoryHook;
pub use performance::{CategoryPerformanceHook, PerformanceMetrics};
pub use pick_lists::PickLists;
pub use pickers::{PickerActivity, PickerStatus, RealTimePickers};
pub use tasks::TaskAssignments;

/// Mount an observer of the query `key`, which is invalidated by each of `triggers`.
/// If `key` is None, the returned Query is disabled and no trigger is started.
pub(crate) async fn mount_query<T, F, Fut>(
    ctx: &Context,
    key: Option<QueryKey>,
    triggers: Vec<Trigger>,
    fetch: F,
) -> Query<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let Some(key) = key else {
        return Query::disabled();
    };

    // Start triggers before the first fetch, so that no change falls between them.
    let mut guards: Vec<Box<dyn Send + Sync>> = Vec::new();
    for trigger in triggers {
        match trigger {
            Trigger::Push(filter) => match ctx.subscriptions.open(filter.clone(), key.resource).await {
                Ok(channel) => guards.push(Box::new(channel)),
                Err(err) => {
                    tracing::warn!(%filter, ?err, "failed to open change channel (data may be stale)")
                }
            },
            Trigger::Interval(period) => guards.push(Box::new(Poller::spawn(
                ctx.query.clone(),
                key.clone(),
                period,
            ))),
        }
    }

    let mut query = Query::observe(ctx.query.entry(key, fetch));
    for guard in guards {
        query.attach(guard);
    }
    query
}
