//! Prefixed messages to command senders.

use serde::{Deserialize, Serialize};

/// Whoever invoked a command.
pub trait CommandSender: Send + Sync {
    fn name(&self) -> &str;

    /// Interactive senders get chat-style messages; everyone else is logged.
    fn is_interactive(&self) -> bool;

    fn send_message(&self, text: &str);
}

/// The host console. Never interactive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSender;

impl CommandSender for ConsoleSender {
    fn name(&self) -> &str {
        "CONSOLE"
    }

    fn is_interactive(&self) -> bool {
        false
    }

    fn send_message(&self, text: &str) {
        tracing::info!(target: "modhost::console", "{}", text);
    }
}

/// Message severities, each with its own prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
    Question,
    Announce,
}

/// Prefix per severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePrefixes {
    pub info: String,
    pub success: String,
    pub warn: String,
    pub error: String,
    pub question: String,
    pub announce: String,
}

impl Default for MessagePrefixes {
    fn default() -> Self {
        Self {
            info: "[i] ".to_string(),
            success: "[+] ".to_string(),
            warn: "[!] ".to_string(),
            error: "[X] ".to_string(),
            question: "[?] ".to_string(),
            announce: "[!!] ".to_string(),
        }
    }
}

impl MessagePrefixes {
    pub fn for_severity(&self, severity: Severity) -> &str {
        match severity {
            Severity::Info => &self.info,
            Severity::Success => &self.success,
            Severity::Warn => &self.warn,
            Severity::Error => &self.error,
            Severity::Question => &self.question,
            Severity::Announce => &self.announce,
        }
    }
}

/// Sentinel text that is never delivered.
pub const NONE_SENTINEL: &str = "none";

/// Sends prefixed text to senders.
#[derive(Debug, Clone, Default)]
pub struct Messenger {
    prefixes: MessagePrefixes,
}

impl Messenger {
    pub fn new(prefixes: MessagePrefixes) -> Self {
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &MessagePrefixes {
        &self.prefixes
    }

    /// Send `text` with the prefix for `severity`. Returns whether anything was sent.
    pub fn send(&self, recipient: &dyn CommandSender, severity: Severity, text: &str) -> bool {
        if text.is_empty() || text == NONE_SENTINEL {
            return false;
        }
        let prefix = self.prefixes.for_severity(severity);
        recipient.send_message(&format!("{}{}", prefix, text));
        true
    }

    pub fn info(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Info, text);
    }

    pub fn success(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Success, text);
    }

    pub fn warn(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Warn, text);
    }

    pub fn error(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Error, text);
    }

    /// Send every message at error severity.
    pub fn error_all<S: AsRef<str>>(&self, recipient: &dyn CommandSender, messages: &[S]) {
        for message in messages {
            self.send(recipient, Severity::Error, message.as_ref());
        }
    }

    pub fn question(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Question, text);
    }

    pub fn announce(&self, recipient: &dyn CommandSender, text: &str) {
        self.send(recipient, Severity::Announce, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Player {
        inbox: Mutex<Vec<String>>,
    }

    impl CommandSender for Player {
        fn name(&self) -> &str {
            "alex"
        }

        fn is_interactive(&self) -> bool {
            true
        }

        fn send_message(&self, text: &str) {
            self.inbox.lock().push(text.to_string());
        }
    }

    #[test]
    fn test_send_applies_prefix() {
        let player = Player::default();
        let messenger = Messenger::default();

        messenger.error(&player, "Not enough permissions");
        messenger.success(&player, "Healed");

        let inbox = player.inbox.lock();
        assert_eq!(inbox[0], "[X] Not enough permissions");
        assert_eq!(inbox[1], "[+] Healed");
    }

    #[test]
    fn test_empty_and_sentinel_ignored() {
        let player = Player::default();
        let messenger = Messenger::default();

        assert!(!messenger.send(&player, Severity::Info, ""));
        assert!(!messenger.send(&player, Severity::Info, "none"));
        messenger.error_all(&player, &["", "none", "real"]);

        assert_eq!(player.inbox.lock().as_slice(), ["[X] real"]);
    }
}
