//! One image, one question, one JSON answer.

use image::DynamicImage;
use serde::de::DeserializeOwned;

use crate::error::Result;

use super::encode::jpeg_data_url;
use super::parse::{parse_reply, ModelReply};
use super::provider::{ChatRequest, VisionModel};

/// Show `image` to the model with the given instructions and parse the reply.
///
/// Only transport failures are errors; unreadable text comes back as
/// [`ModelReply::Malformed`].
pub fn ask_json<T: DeserializeOwned>(
    model: &dyn VisionModel,
    system: &str,
    user: &str,
    image: &DynamicImage,
    max_tokens: usize,
) -> Result<ModelReply<T>> {
    let request = ChatRequest::vision(system, user, jpeg_data_url(image)?, max_tokens);
    let text = model.complete(&request)?;
    Ok(parse_reply(&text))
}
