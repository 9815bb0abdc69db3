pub mod chat;
pub mod client;

pub use chat::ConversationSession;
pub use client::{
    ChatCompletion, GptClient, GptClientError, GptClientOption, Message, OpenAIKey, OpenAIModel,
    Role, Usage,
};
