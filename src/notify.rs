//! Notification dispatch.
//!
//! The aggregated drift report fans out to every configured channel
//! independently and best-effort: a mail channel composes one message for all
//! recipients in a single submission, a chat channel opens one session per
//! recipient. A failure on one channel never prevents delivery attempts on
//! the others, and a failed chat recipient never blocks the rest.

use crate::config::{ChannelConfig, ChannelKind};
use crate::error::NotificationError;
use std::collections::HashMap;
use std::io::Write as _;
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Subject line used for every drift report.
pub const NOTIFICATION_SUBJECT: &str = "driftrec notification";

/// One delivery, constructed per channel (mail) or per recipient (chat)
/// from the accumulated diff text. Never persisted.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Channel kind the event is bound for.
    pub kind: ChannelKind,

    /// Recipients of this delivery.
    pub recipients: Vec<String>,

    /// Subject line.
    pub subject: String,

    /// Plain-text body: the aggregated drift report.
    pub body: String,

    /// Sender identity (mail from address or chat account).
    pub sender: String,

    /// Server the transport should talk to, when configured.
    pub server: Option<String>,

    /// Credential for transports that authenticate.
    pub password: Option<String>,
}

/// Transport mechanics behind one channel kind. The dispatcher owns the
/// fan-out policy; transports only move one event.
pub trait ChannelTransport {
    /// Delivers one event.
    ///
    /// # Errors
    /// Returns a [`NotificationError`] describing the failed delivery.
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

/// Fans the drift report out to configured channels.
pub struct Dispatcher {
    transports: HashMap<ChannelKind, Box<dyn ChannelTransport>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher wired with the production subprocess transports.
    #[must_use]
    pub fn new() -> Self {
        let mut dispatcher = Self {
            transports: HashMap::new(),
        };
        dispatcher.set_transport(ChannelKind::Mail, Box::new(SendmailTransport));
        dispatcher.set_transport(ChannelKind::Chat, Box::new(SendxmppTransport));
        dispatcher
    }

    /// Replaces the transport for one channel kind (used by tests and by
    /// alternative deployments).
    pub fn set_transport(&mut self, kind: ChannelKind, transport: Box<dyn ChannelTransport>) {
        self.transports.insert(kind, transport);
    }

    /// Sends `message` over every configured channel. No-op when the message
    /// is empty. Failures are logged and isolated per channel and, for chat,
    /// per recipient; this never returns an error.
    pub fn dispatch(&self, channels: &[ChannelConfig], message: &str) {
        if message.is_empty() {
            return;
        }
        for channel in channels {
            let Some(transport) = self.transports.get(&channel.kind) else {
                warn!(kind = channel.kind.as_str(), "no transport for channel, skipping");
                continue;
            };
            match channel.kind {
                ChannelKind::Mail => {
                    let event = event_for(channel, channel.recipients.clone(), message);
                    match transport.deliver(&event) {
                        Ok(()) => info!(
                            recipients = channel.recipients.len(),
                            "mail notification sent"
                        ),
                        Err(e) => warn!(error = %e, "mail notification failed"),
                    }
                }
                ChannelKind::Chat => {
                    for recipient in &channel.recipients {
                        let event = event_for(channel, vec![recipient.clone()], message);
                        match transport.deliver(&event) {
                            Ok(()) => info!(recipient = %recipient, "chat notification sent"),
                            Err(e) => {
                                warn!(recipient = %recipient, error = %e, "chat notification failed");
                            }
                        }
                    }
                }
            }
        }
    }
}

fn event_for(channel: &ChannelConfig, recipients: Vec<String>, message: &str) -> NotificationEvent {
    let sender = match channel.kind {
        ChannelKind::Mail => channel.from.clone(),
        ChannelKind::Chat => channel.username.clone(),
    };
    NotificationEvent {
        kind: channel.kind,
        recipients,
        subject: NOTIFICATION_SUBJECT.to_string(),
        body: message.to_string(),
        sender: sender.unwrap_or_default(),
        server: channel.server.clone(),
        password: channel.password.clone(),
    }
}

/// Mail transport submitting through the local `sendmail` binary.
pub struct SendmailTransport;

impl ChannelTransport for SendmailTransport {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let sendmail = which::which("sendmail")
            .or_else(|_| which::which("/usr/sbin/sendmail"))
            .map_err(|_| NotificationError::MissingTransport("sendmail".to_string()))?;

        let mut payload = String::new();
        payload.push_str(&format!("From: {}\n", event.sender));
        payload.push_str(&format!("To: {}\n", event.recipients.join(", ")));
        payload.push_str(&format!("Subject: {}\n\n", event.subject));
        payload.push_str(&event.body);

        let mut child = Command::new(sendmail)
            .arg("-i")
            .arg("-f")
            .arg(&event.sender)
            .args(&event.recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(payload.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(NotificationError::Delivery(format!(
                "sendmail exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Chat transport delivering through the `sendxmpp` helper, one invocation
/// per recipient session.
pub struct SendxmppTransport;

impl ChannelTransport for SendxmppTransport {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let sendxmpp = which::which("sendxmpp")
            .map_err(|_| NotificationError::MissingTransport("sendxmpp".to_string()))?;
        let server = event.server.as_deref().unwrap_or_default();

        for recipient in &event.recipients {
            let mut cmd = Command::new(&sendxmpp);
            cmd.arg("-u")
                .arg(&event.sender)
                .arg("-j")
                .arg(server)
                .arg(recipient)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            if let Some(password) = &event.password {
                cmd.arg("-p").arg(password);
            }
            let mut child = cmd.spawn()?;
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(event.body.as_bytes())?;
            }
            let output = child.wait_with_output()?;
            if !output.status.success() {
                return Err(NotificationError::Delivery(format!(
                    "sendxmpp to {recipient} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }
        Ok(())
    }
}
