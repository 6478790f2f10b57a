//! Chat orchestration: style injection, history windows, the answer call,
//! and follow-up question suggestions.
//!
//! One call to [`ChatOrchestrator::respond`] is stateless beyond the
//! message list the caller supplies:
//!
//! 1. prepend the style system message unless the caller sent one
//! 2. answer over the last `answer_window` messages
//! 3. ask for suggestions over the last `suggestion_window` messages
//! 4. parse the suggestions as a JSON string array, or fall back to `[]`
//!
//! Suggestion failures never fail the request.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel, Role};

/// Default style policy: polite Korean, quantities and symbols preserved,
/// uncertain content labelled.
pub const DEFAULT_STYLE: &str = "한국어 존댓말을 사용합니다. 말투는 친절하고 전문적으로 유지합니다. \
핵심은 간결하게 전달하되, 전력·에너지·모빌리티 분야의 수치/단위/기호(η, THD, pf, pu, kW, kWh, °C 등)는 보존합니다. \
불확실하거나 기억이 모호한 내용은 '불확실'으로 표시하고 추정·일반론은 명확히 구분합니다. 과장 표현은 지양합니다.";

/// Window sizes and suggestion tuning.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub answer_window: usize,
    pub suggestion_window: usize,
    /// How many follow-up questions to ask for. Not enforced on the reply.
    pub suggestion_count: usize,
    pub suggestion_temperature: f32,
    /// Style system message used when the caller supplies none.
    pub style: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            answer_window: 20,
            suggestion_window: 4,
            suggestion_count: 3,
            suggestion_temperature: 0.5,
            style: DEFAULT_STYLE.to_string(),
        }
    }
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub output: String,
    pub suggestions: Vec<String>,
}

/// Prepends a system message with `style` unless one is already present.
pub fn normalize(mut messages: Vec<ChatMessage>, style: &str) -> Vec<ChatMessage> {
    if !messages.iter().any(|m| m.role == Role::System) {
        messages.insert(0, ChatMessage::system(style));
    }
    messages
}

/// The last `max` messages, oldest first.
pub fn window(messages: &[ChatMessage], max: usize) -> &[ChatMessage] {
    &messages[messages.len().saturating_sub(max)..]
}

/// Parses a model reply that should be a JSON array of strings.
///
/// A surrounding Markdown code fence is tolerated; anything else that is
/// not a string array is [`Error::Parse`].
pub fn parse_suggestions(raw: &str) -> Result<Vec<String>> {
    let body = strip_code_fence(raw.trim());
    let items: Vec<String> = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("suggestions are not a JSON string array: {}", e)))?;
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as ```json
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Runs chat turns against one [`ChatModel`].
pub struct ChatOrchestrator<'a> {
    model: &'a dyn ChatModel,
    settings: ChatSettings,
}

impl<'a> ChatOrchestrator<'a> {
    pub fn new(model: &'a dyn ChatModel, settings: ChatSettings) -> Self {
        Self { model, settings }
    }

    /// Answers the conversation and suggests follow-up questions.
    ///
    /// `style` replaces the configured style message for this call only.
    ///
    /// # Errors
    ///
    /// [`Error::CompletionProvider`] if the answer call fails. Suggestion
    /// failures are logged and yield an empty list.
    pub async fn respond(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        style: Option<&str>,
    ) -> Result<ChatReply> {
        let style = style
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.settings.style);
        let normalized = normalize(messages, style);

        let answer_window = window(&normalized, self.settings.answer_window);
        debug!(
            total = normalized.len(),
            window = answer_window.len(),
            model = self.model.model_name(),
            "chat answer call"
        );
        let output = self
            .model
            .complete(answer_window, temperature)
            .await
            .map_err(Error::completion)?
            .into_text();

        let recent = window(&normalized, self.settings.suggestion_window);
        let suggestions = match self.suggest(recent).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to generate suggestions");
                Vec::new()
            }
        };

        Ok(ChatReply {
            output,
            suggestions,
        })
    }

    async fn suggest(&self, recent: &[ChatMessage]) -> Result<Vec<String>> {
        let recent_json = serde_json::to_string(recent)
            .map_err(|e| Error::Parse(format!("encoding recent chat: {}", e)))?;
        let prompt = suggestion_prompt(self.settings.suggestion_count, &recent_json);

        let raw = self
            .model
            .complete(&[ChatMessage::user(prompt)], self.settings.suggestion_temperature)
            .await
            .map_err(Error::completion)?
            .into_text();

        parse_suggestions(&raw)
    }
}

fn suggestion_prompt(count: usize, recent_json: &str) -> String {
    format!(
        "Based on the most recent conversation, suggest {count} questions the user \
         would naturally ask next. Each question must relate closely to the conversation \
         and be very short. Write them in the language of the conversation. \
         Reply only with a JSON array of strings, e.g. [\"Question 1\", \"Question 2\", \"Question 3\"].\n\
         \n\
         [Recent conversation]\n\
         {recent}",
        count = count,
        recent = recent_json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::testing::ScriptedModel;

    fn history(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect()
    }

    fn is_suggestion_call(messages: &[ChatMessage]) -> bool {
        messages.len() == 1 && messages[0].content.contains("[Recent conversation]")
    }

    #[test]
    fn test_normalize_prepends_style_once() {
        let normalized = normalize(history(2), "style");
        assert_eq!(normalized[0], ChatMessage::system("style"));
        assert_eq!(normalized.len(), 3);

        let mut supplied = vec![ChatMessage::system("mine")];
        supplied.extend(history(2));
        let normalized = normalize(supplied, "style");
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(normalized[0].content, "mine");
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let msgs = history(30);
        let w = window(&msgs, 20);
        assert_eq!(w.len(), 20);
        assert_eq!(w[0].content, "q10");
        assert_eq!(w[19].content, "a29");
        assert_eq!(window(&msgs[..3], 20).len(), 3);
        assert!(window(&[], 4).is_empty());
    }

    #[test]
    fn test_parse_suggestions() {
        assert_eq!(
            parse_suggestions(r#"["역률이란?", "THD 기준은?"]"#).unwrap(),
            vec!["역률이란?", "THD 기준은?"]
        );
        assert_eq!(
            parse_suggestions("```json\n[\"a\", \" \", \"b\"]\n```").unwrap(),
            vec!["a", "b"]
        );
        assert!(matches!(parse_suggestions("not json"), Err(Error::Parse(_))));
        assert!(matches!(parse_suggestions(r#"{"q": 1}"#), Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn test_respond_windows_and_suggestions() {
        let model = ScriptedModel::new(|messages| {
            if is_suggestion_call(messages) {
                Ok(Completion::text(r#"["Next?", "Why?", "How?"]"#))
            } else {
                Ok(Completion::text("answer"))
            }
        });
        let chat = ChatOrchestrator::new(&model, ChatSettings::default());

        let reply = chat.respond(history(40), 0.3, None).await.unwrap();
        assert_eq!(reply.output, "answer");
        assert_eq!(reply.suggestions, vec!["Next?", "Why?", "How?"]);

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 20);
        assert_eq!(calls[0].last().unwrap().content, "a39");

        let prompt = &calls[1][0].content;
        assert!(prompt.contains("a39"));
        assert!(prompt.contains("q36"));
        assert!(!prompt.contains("a35"));
    }

    #[tokio::test]
    async fn test_short_history_gets_style_message() {
        let model = ScriptedModel::fixed("[]");
        let chat = ChatOrchestrator::new(&model, ChatSettings::default());
        chat.respond(history(1), 0.3, Some("custom style")).await.unwrap();

        let first = &model.calls()[0];
        assert_eq!(first[0], ChatMessage::system("custom style"));
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_suggestions_degrade_to_empty() {
        let model = ScriptedModel::new(|messages| {
            if is_suggestion_call(messages) {
                Ok(Completion::text("not json"))
            } else {
                Ok(Completion::text("5 Ω 입니다."))
            }
        });
        let chat = ChatOrchestrator::new(&model, ChatSettings::default());
        let reply = chat.respond(history(1), 0.3, None).await.unwrap();
        assert_eq!(reply.output, "5 Ω 입니다.");
        assert!(reply.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_suggestion_call_failure_degrades_to_empty() {
        let model = ScriptedModel::new(|messages| {
            if is_suggestion_call(messages) {
                anyhow::bail!("429 Too Many Requests")
            }
            Ok(Completion::text("ok"))
        });
        let chat = ChatOrchestrator::new(&model, ChatSettings::default());
        let reply = chat.respond(history(3), 0.3, None).await.unwrap();
        assert_eq!(reply.output, "ok");
        assert!(reply.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_answer_failure_is_an_error() {
        let model = ScriptedModel::new(|_| anyhow::bail!("401 Unauthorized"));
        let chat = ChatOrchestrator::new(&model, ChatSettings::default());
        let err = chat.respond(history(1), 0.3, None).await.unwrap_err();
        assert!(matches!(err, Error::CompletionProvider(_)));
        assert_eq!(model.call_count(), 1);
    }
}
