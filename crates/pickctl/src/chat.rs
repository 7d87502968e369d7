use crate::output::CliOutput;
use models::ChatMessage;
use picking_sync::hooks;
use picking_sync::widgets::{ChatFields, Form};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Chat {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List messages sent by you, to you, or to the whole warehouse.
    List,
    /// Send a message to a single recipient, or broadcast it.
    Send(SendMessage),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct SendMessage {
    /// Text of the message.
    #[clap(long)]
    message: String,
    /// Profile ID of the recipient.
    #[clap(long, conflicts_with = "broadcast", required_unless_present = "broadcast")]
    to: Option<uuid::Uuid>,
    /// Send the message to everyone in the warehouse.
    #[clap(long)]
    broadcast: bool,
    /// Type of the message, such as "general" or "urgent".
    #[clap(long = "type", default_value = hooks::chat::GENERAL)]
    message_type: String,
}

impl Chat {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;
        let chat = hooks::Chat::mount(&sync).await;

        match &self.cmd {
            Command::List => {
                let messages = chat.read().await?;
                ctx.write_all(messages.iter().cloned())
            }
            Command::Send(send) => {
                let mut form = Form::<ChatFields>::new();
                *form.fields_mut() = ChatFields {
                    message_text: send.message.clone(),
                    recipient_id: send.to,
                    message_type: send.message_type.clone(),
                    is_broadcast: send.broadcast,
                };

                let sent = form.send(&chat).await;
                ctx.flush_toasts();

                ctx.write_all(Some(sent?))
            }
        }
    }
}

impl CliOutput for ChatMessage {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec!["Sent", "From", "To", "Type", "Message"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        let to = match (&self.recipient, self.is_broadcast) {
            (_, true) => "everyone".to_string(),
            (Some(recipient), false) => recipient.full_name.clone(),
            (None, false) => self
                .recipient_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "everyone".to_string()),
        };
        let from = self
            .sender
            .as_ref()
            .map(|sender| sender.full_name.clone())
            .unwrap_or_else(|| self.sender_id.to_string());

        vec![
            crate::format_time(self.created_at),
            from,
            to,
            self.message_type,
            self.message_text,
        ]
    }
}
