//! Vision model integration.
//!
//! Every field on a card is read by a remote vision model. This module owns
//! the request shape (system text plus one user turn with an inline JPEG),
//! the providers, the prompt texts and the lenient reply parser.
//!
//! # Example
//!
//! ```no_run
//! use kartka::llm::{ChatRequest, OpenAICompatibleModel, VisionModel};
//! use kartka::ModelConfig;
//!
//! let model = OpenAICompatibleModel::new(&ModelConfig::default()).unwrap();
//! let request = ChatRequest::vision("system", "user", "data:image/jpeg;base64,...", 32);
//! let text = model.complete(&request).unwrap();
//! ```

mod call;
mod encode;
mod mock;
mod openai;
mod parse;
pub mod prompts;
mod provider;

pub use call::ask_json;
pub use encode::{jpeg_bytes, jpeg_data_url, REQUEST_JPEG_QUALITY};
pub use mock::ScriptedModel;
pub use openai::OpenAICompatibleModel;
pub use parse::{first_json_object, parse_reply, MalformedReply, ModelReply, BAD_JSON};
pub(crate) use parse::lenient;
pub use provider::{
    ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent, ModelIdentity, Role,
    VisionModel,
};
