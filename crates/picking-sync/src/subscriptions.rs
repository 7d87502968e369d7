use crate::{QueryClient, QueryKey};
use picking_client::{Backend, ChannelFilter};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Trigger is an independent cause of invalidation of a mounted query.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Invalidate when the remote service pushes a change matching the filter.
    Push(ChannelFilter),
    /// Invalidate on a fixed interval, regardless of pushed changes.
    Interval(Duration),
}

type ChannelKey = (ChannelFilter, &'static str);

/// Subscriptions is a registry of open change channels. Each channel
/// invalidates one query resource, and is shared by all of its observers.
/// A channel is closed when its last Channel handle is dropped.
#[derive(Clone)]
pub struct Subscriptions {
    backend: Arc<dyn Backend>,
    query: QueryClient,
    channels: Arc<tokio::sync::Mutex<HashMap<ChannelKey, Weak<Channel>>>>,
}

/// Channel is a shared handle to an open change channel.
#[derive(Debug)]
pub struct Channel {
    filter: ChannelFilter,
    resource: &'static str,
    task: AbortHandle,
}

impl Channel {
    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        tracing::debug!(filter = %self.filter, resource = self.resource, "closing change channel");
        self.task.abort();
    }
}

impl Subscriptions {
    pub fn new(backend: Arc<dyn Backend>, query: QueryClient) -> Self {
        Self {
            backend,
            query,
            channels: Default::default(),
        }
    }

    /// Open a channel which invalidates `resource` upon each change matching `filter`,
    /// or share the channel which is already open.
    pub async fn open(
        &self,
        filter: ChannelFilter,
        resource: &'static str,
    ) -> anyhow::Result<Arc<Channel>> {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, channel| channel.strong_count() != 0);

        let key = (filter.clone(), resource);
        if let Some(channel) = channels.get(&key).and_then(Weak::upgrade) {
            return Ok(channel);
        }

        let mut subscription = self.backend.subscribe(filter.clone()).await?;
        let query = self.query.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                tracing::debug!(
                    table = %event.table,
                    kind = ?event.kind,
                    resource,
                    "received change notification"
                );
                query.invalidate_resource(resource);
            }
            tracing::debug!(resource, "change channel ended");
        });

        tracing::debug!(%filter, resource, "opened change channel");
        let channel = Arc::new(Channel {
            filter,
            resource,
            task: task.abort_handle(),
        });
        channels.insert(key, Arc::downgrade(&channel));

        Ok(channel)
    }

    /// Number of open channels.
    pub async fn open_channels(&self) -> usize {
        self.channels
            .lock()
            .await
            .values()
            .filter(|channel| channel.strong_count() != 0)
            .count()
    }
}

/// Poller invalidates a query on a fixed interval, until dropped.
#[derive(Debug)]
pub struct Poller {
    task: AbortHandle,
}

impl Poller {
    pub fn spawn(query: QueryClient, key: QueryKey, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                tracing::debug!(%key, "polling interval elapsed");
                query.invalidate(&key);
            }
        });

        Self {
            task: task.abort_handle(),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
