use tokio::sync::broadcast;

/// Toast is a transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Default,
    Destructive,
}

/// Toaster publishes Toasts to any number of subscribers.
/// Toasts published while there are no subscribers are only logged.
#[derive(Debug, Clone)]
pub struct Toaster {
    tx: broadcast::Sender<Toast>,
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Toaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn show(&self, toast: Toast) {
        match toast.variant {
            Variant::Default => tracing::info!(title = %toast.title, description = %toast.description, "toast"),
            Variant::Destructive => tracing::warn!(title = %toast.title, description = %toast.description, "toast"),
        }
        let _ = self.tx.send(toast);
    }

    pub fn info(&self, title: impl Into<String>, description: impl Into<String>) {
        self.show(Toast {
            title: title.into(),
            description: description.into(),
            variant: Variant::Default,
        })
    }

    pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
        self.show(Toast {
            title: title.into(),
            description: description.into(),
            variant: Variant::Destructive,
        })
    }
}
