//! The proxy operations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use cogkit_core::{ChannelId, Cog, CogError, MessageId, Messenger, PlatformError};

use crate::error::ProxyError;

const COG_NAME: &str = "proxy";
const PLACEHOLDER: &str = "Placeholder";

/// A file attached to the invoking message, re-uploaded on send.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

fn edit_command(prefix: &str, channel: ChannelId, message: MessageId, content: &str) -> String {
    format!("{prefix}msg edit <#{channel}> {message} ```\n{content}```")
}

pub struct ProxyCog<M: Messenger + ?Sized> {
    messenger: Arc<M>,
    http: reqwest::Client,
}

impl<M: Messenger + ?Sized> ProxyCog<M> {
    pub fn new(messenger: Arc<M>) -> Self {
        Self {
            messenger,
            http: reqwest::Client::new(),
        }
    }

    /// Send a message as the bot. With content, the reply is the pre-formed
    /// edit command for the new message and the invoking message is
    /// deleted; attachment-only sends just confirm.
    pub async fn send(
        &self,
        invoking: (ChannelId, MessageId),
        prefix: &str,
        channel: ChannelId,
        content: Option<&str>,
        attachment: Option<&Attachment>,
    ) -> Result<String, ProxyError> {
        let message = match attachment {
            Some(att) => {
                let bytes = self.download(att).await?;
                let text = if content.is_some() { PLACEHOLDER } else { "" };
                self.messenger
                    .send_file(channel, &att.filename, bytes, text)
                    .await?
            }
            None => self.messenger.send_message(channel, PLACEHOLDER).await?,
        };
        match content {
            Some(content) => {
                self.messenger.edit_message(channel, message, content).await?;
                self.delete_invoking(invoking).await;
                Ok(edit_command(prefix, channel, message, content))
            }
            None => Ok(format!(
                ":white_check_mark: Sent message {message} in <#{channel}>."
            )),
        }
    }

    /// Edit an existing bot message. A missing message is a reply, not an
    /// error.
    pub async fn edit(
        &self,
        invoking: (ChannelId, MessageId),
        prefix: &str,
        channel: ChannelId,
        message: MessageId,
        new_content: &str,
    ) -> Result<String, ProxyError> {
        match self
            .messenger
            .edit_message(channel, message, new_content)
            .await
        {
            Ok(()) => {
                self.delete_invoking(invoking).await;
                Ok(edit_command(prefix, channel, message, new_content))
            }
            Err(PlatformError::NotFound(_)) => Ok(format!(
                ":x: Failed to find the message with id {message} in <#{channel}>."
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, ProxyError> {
        let bytes = self
            .http
            .get(&attachment.url)
            .header(reqwest::header::USER_AGENT, "Mozilla")
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    /// The command message is noise once proxied; a missing permission only
    /// warrants a warning.
    async fn delete_invoking(&self, (channel, message): (ChannelId, MessageId)) {
        if let Err(e) = self.messenger.delete_message(channel, message).await {
            warn!(%channel, %message, error = %e, "failed to delete the invoking message");
        }
    }
}

#[async_trait]
impl<M: Messenger + ?Sized + 'static> Cog for ProxyCog<M> {
    fn name(&self) -> &str {
        COG_NAME
    }

    async fn load(&self) -> Result<(), CogError> {
        Ok(())
    }

    async fn unload(&self) {}
}
