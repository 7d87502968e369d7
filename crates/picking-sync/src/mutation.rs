use crate::{Error, QueryClient, Toaster};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Messages of the toasts shown when a Mutation completes.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub success: Option<(&'static str, &'static str)>,
    pub failure: (&'static str, &'static str),
}

/// Mutation is a remote write which invalidates query resources on success.
/// It never writes the query cache directly: readers observe the write
/// only through the refetch which follows invalidation.
#[derive(Clone)]
pub struct Mutation {
    query: QueryClient,
    toaster: Toaster,
    invalidates: &'static [&'static str],
    pending: Arc<AtomicUsize>,
}

impl Mutation {
    pub fn new(query: QueryClient, toaster: Toaster, invalidates: &'static [&'static str]) -> Self {
        Self {
            query,
            toaster,
            invalidates,
            pending: Default::default(),
        }
    }

    /// Returns true while any run of this Mutation is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) != 0
    }

    /// Run the remote write `fut`. On success, invalidate this Mutation's
    /// resources and show the success toast, if any. On failure, show a
    /// destructive toast and return Error::RemoteWrite.
    pub async fn run<T, Fut>(&self, messages: Messages, fut: Fut) -> Result<T, Error>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let result = fut.await;
        self.pending.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(value) => {
                for resource in self.invalidates {
                    let count = self.query.invalidate_resource(resource);
                    tracing::debug!(resource, count, "invalidated after mutation");
                }
                if let Some((title, description)) = messages.success {
                    self.toaster.info(title, description);
                }
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(?err, "mutation failed");
                let (title, description) = messages.failure;
                self.toaster.error(title, description);
                Err(Error::RemoteWrite(Arc::new(err)))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::QueryKey;
    use crate::toast::Variant;

    const MESSAGES: Messages = Messages {
        success: Some(("Saved", "The thing was saved.")),
        failure: ("Save Failed", "Failed to save the thing."),
    };

    #[tokio::test]
    async fn test_success_invalidates_and_toasts() {
        let client = QueryClient::new();
        let toaster = Toaster::new();
        let mut toasts = toaster.subscribe();

        let entry = client.entry(QueryKey::new("things"), || async { Ok(1) });
        let other = client.entry(QueryKey::new("others"), || async { Ok(1) });
        entry.read().await.unwrap();
        other.read().await.unwrap();

        let mutation = Mutation::new(client.clone(), toaster, &["things"]);
        assert_eq!(mutation.run(MESSAGES, async { Ok(42) }).await.unwrap(), 42);

        assert!(entry.is_stale());
        assert!(!other.is_stale());
        assert!(!mutation.is_pending());

        let toast = toasts.recv().await.unwrap();
        assert_eq!(toast.title, "Saved");
        assert_eq!(toast.variant, Variant::Default);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_and_toasts() {
        let client = QueryClient::new();
        let toaster = Toaster::new();
        let mut toasts = toaster.subscribe();

        let entry = client.entry(QueryKey::new("things"), || async { Ok(1) });
        entry.read().await.unwrap();

        let mutation = Mutation::new(client, toaster, &["things"]);
        let err = mutation
            .run(MESSAGES, async { Err::<(), _>(anyhow::anyhow!("permission denied")) })
            .await
            .unwrap_err();

        assert_eq!(err.name(), "RemoteWriteFailure");
        assert!(!entry.is_stale());

        let toast = toasts.recv().await.unwrap();
        assert_eq!(toast.title, "Save Failed");
        assert_eq!(toast.variant, Variant::Destructive);
    }
}
