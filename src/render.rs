//! Presentation boundary between the flows and the chat transport.
//!
//! Flow handlers produce [`Reply`] values; a [`Render`] implementation
//! turns them into channel messages (keyboards, buttons). Flow logic
//! never sees a transport type.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::session::SessionId;

/// One outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Text plus tappable options, rendered as a reply keyboard. The
    /// option strings are exactly what comes back as the user's text.
    Prompt { text: String, options: Vec<String> },
    /// Like `Prompt`, but the channel also offers its native
    /// share-contact affordance for the phone step. `share_label` is
    /// the localized caption of the contact button.
    RequestContact {
        text: String,
        share_label: String,
        options: Vec<String>,
    },
    /// Text with a single URL button.
    Link {
        text: String,
        label: String,
        url: String,
    },
}

impl Reply {
    pub fn prompt(text: impl Into<String>, options: Vec<String>) -> Self {
        Self::Prompt {
            text: text.into(),
            options,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Prompt {
            text: text.into(),
            options: Vec::new(),
        }
    }
}

/// Delivers replies to one conversation.
#[async_trait]
pub trait Render: Send + Sync {
    async fn deliver(&self, session_id: SessionId, replies: &[Reply]) -> Result<(), ChannelError>;
}
