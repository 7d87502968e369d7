use super::performance::profiles_by_id;
use super::{deref_query, mount_query};
use crate::{Context, Error, Messages, Mutation, Query, QueryKey, Scope, Trigger};
use models::{ChatMessage, NewChatMessage, Profile, ProfileSummary, Table};
use picking_client::{fetch, insert, Backend, ChannelFilter, EventKind, Select};

pub const RESOURCE: &str = "chatMessages";

/// Default `message_type` of a sent message.
pub const GENERAL: &str = "general";

const SEND_MESSAGES: Messages = Messages {
    success: None,
    failure: ("Message Failed", "Failed to send message. Please try again."),
};

/// Chat observes the messages of the warehouse which are visible to the
/// current profile, oldest first.
pub struct Chat {
    query: Query<Vec<ChatMessage>>,
    ctx: Context,
    send: Mutation,
}

deref_query!(Chat, Vec<ChatMessage>);

impl Chat {
    pub async fn mount(ctx: &Context) -> Self {
        let scope = ctx.scope();
        // Visibility depends on the reader, so the reader is part of the key.
        let key = scope.as_ref().map(|scope| {
            QueryKey::new(RESOURCE)
                .scoped(scope.warehouse_id)
                .scoped(scope.profile.id)
        });
        let triggers = scope
            .as_ref()
            .map(|scope| {
                Trigger::Push(
                    ChannelFilter::warehouse(Table::ChatMessages, scope.warehouse_id)
                        .only(EventKind::Insert),
                )
            })
            .into_iter()
            .collect();

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, triggers, move || {
            let backend = backend.clone();
            let scope = scope.clone();

            async move {
                match scope {
                    Some(scope) => fetch_messages(backend.as_ref(), &scope).await,
                    None => Ok(Vec::new()),
                }
            }
        })
        .await;

        Self {
            query,
            ctx: ctx.clone(),
            send: Mutation::new(ctx.query.clone(), ctx.toaster.clone(), &[RESOURCE]),
        }
    }

    /// Send a message. A message without a recipient is visible to the whole warehouse.
    pub async fn send(
        &self,
        message_text: String,
        recipient_id: Option<uuid::Uuid>,
        message_type: Option<String>,
        is_broadcast: bool,
    ) -> Result<ChatMessage, Error> {
        let scope = self.ctx.scope().ok_or(Error::ScopeUnavailable)?;
        let backend = self.ctx.backend.clone();

        let message = NewChatMessage {
            warehouse_id: scope.warehouse_id,
            sender_id: scope.profile.id,
            recipient_id,
            message_text,
            message_type: message_type.unwrap_or_else(|| GENERAL.to_string()),
            is_broadcast,
        };

        self.send
            .run(SEND_MESSAGES, async move {
                insert(backend.as_ref(), Table::ChatMessages, &message).await
            })
            .await
    }

    pub fn is_sending(&self) -> bool {
        self.send.is_pending()
    }
}

async fn fetch_messages(backend: &dyn Backend, scope: &Scope) -> anyhow::Result<Vec<ChatMessage>> {
    let messages: Vec<ChatMessage> = fetch(
        backend,
        Select::from(Table::ChatMessages)
            .eq("warehouse_id", scope.warehouse_id)
            .order_asc("created_at"),
    )
    .await?;

    let mut messages: Vec<ChatMessage> = messages
        .into_iter()
        .filter(|message| message.is_visible_to(scope.profile.id))
        .collect();

    let profiles = profiles_by_id(
        backend,
        scope.warehouse_id,
        messages
            .iter()
            .flat_map(|m| std::iter::once(m.sender_id).chain(m.recipient_id)),
    )
    .await?;

    for message in &mut messages {
        message.sender = profiles.get(&message.sender_id).map(summary);
        message.recipient = message
            .recipient_id
            .and_then(|id| profiles.get(&id))
            .map(summary);
    }
    Ok(messages)
}

fn summary(profile: &Profile) -> ProfileSummary {
    ProfileSummary {
        full_name: profile.full_name.clone(),
        employee_id: profile.employee_id.clone(),
        role: profile.role,
    }
}
