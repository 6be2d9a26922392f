use serde::{Deserialize, Serialize};

/// A chat message handed to the LLM executor, containing a role and text
/// content.
///
/// Messages are the payload of a compiled prompt task: the buddy's system
/// message first, then one user message per resolved input node, then the
/// prompt node's own text.
///
/// # Examples
///
/// ```
/// use loomcanvas::message::Message;
///
/// let system = Message::system("You are a careful summarizer.");
/// let user = Message::user("Summarize: the quick brown fox");
/// assert_eq!(system.role, "system");
/// assert_eq!(user.role, "user");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }
}
