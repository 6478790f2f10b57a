//! Scripted fakes shared by the unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::llm::{ChatMessage, ChatModel, Completion};

type Reply = Box<dyn Fn(&[ChatMessage]) -> Result<Completion> + Send + Sync>;

/// Chat model that answers through a closure and records every call.
pub struct ScriptedModel {
    reply: Reply,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<Completion> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text.
    pub fn fixed(text: &'static str) -> Self {
        Self::new(move |_| Ok(Completion::text(text)))
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<Completion> {
        self.calls.lock().unwrap().push(messages.to_vec());
        (self.reply)(messages)
    }
}
