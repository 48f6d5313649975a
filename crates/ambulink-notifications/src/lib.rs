pub mod error;
pub mod llm;
pub mod telephony;

pub use error::NotificationError;
pub use llm::{
    ChatMessage, ChatRole, CompletionClient, CompletionRequest, LlmConfig, OpenAiCompatibleClient,
};
pub use telephony::{
    CallAdapter, CallReceipt, CallRequest, TelephonyConfig, TwilioAdapter, say_twiml,
};
