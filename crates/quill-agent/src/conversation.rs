//! Conversation state: message history and the context file set.

use std::collections::BTreeSet;

use quill_ai::Message;

/// History plus the files attached to every request.
///
/// History is append-only apart from [`Conversation::clear_history`].
/// The file set only records membership.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    context_files: BTreeSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append one request/reply exchange.
    pub fn record_exchange(&mut self, request: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(Message::user(request));
        self.messages.push(Message::assistant(reply));
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    /// Context files in sorted order.
    pub fn context_files(&self) -> impl Iterator<Item = &str> {
        self.context_files.iter().map(String::as_str)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.context_files.contains(path)
    }

    /// Returns `false` if the file was already present.
    pub fn add_file(&mut self, path: impl Into<String>) -> bool {
        self.context_files.insert(path.into())
    }

    /// Returns `false` if the file was not present.
    pub fn drop_file(&mut self, path: &str) -> bool {
        self.context_files.remove(path)
    }
}
