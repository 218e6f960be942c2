//! Scripted vision model for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{KartkaError, Result};

use super::provider::{ChatRequest, ModelIdentity, VisionModel};

/// Mock model that replays a fixed script of replies in call order and
/// records every request it receives.
pub struct ScriptedModel {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// Create an empty script. Calls beyond the script fail.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply text.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a transport failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Queue the four replies of one well-behaved pipeline run.
    pub fn with_pipeline_replies(
        self,
        variant: &str,
        nationality: &str,
        band: &str,
        fio: &str,
    ) -> Self {
        self.with_reply(variant)
            .with_reply(nationality)
            .with_reply(band)
            .with_reply(fio)
    }

    fn push(&self, entry: std::result::Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionModel for ScriptedModel {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .script
            .lock()
            .map_err(|_| KartkaError::Model("script lock poisoned".to_string()))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(KartkaError::Http(message)),
            None => Err(KartkaError::Model("scripted model has no replies left".to_string())),
        }
    }

    fn identity(&self) -> ModelIdentity {
        ModelIdentity {
            endpoint: "mock://scripted".to_string(),
            model: "scripted".to_string(),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
