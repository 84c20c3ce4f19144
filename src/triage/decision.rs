//! Per-turn decision engine — reply, escalate, ask, or acknowledge.
//!
//! Behavior is a pure function of (message, prior history, retrieval
//! context); no cross-turn state exists beyond the session history itself.
//!
//! Order of evaluation:
//! 1. Force-escalate phrase check (skips retrieval entirely)
//! 2. High-confidence retrieval bypass (strictly above `REPLY_CONFIDENCE`)
//! 3. Delegated LLM decision over a bounded history window
//! 4. Loop prevention — never ask the same clarifying question twice

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::RetrievalError;
use crate::knowledge::retrieval::{KnowledgeRetriever, SearchHit};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::traits::{ChatTurn, Role};
use crate::triage::parse::extract_json_object;
use crate::triage::types::Decision;

/// Low gating threshold for retrieval: anything under this is treated as
/// "knowledge base has nothing relevant".
pub const RETRIEVAL_GATE: f32 = 0.2;

/// A match must score strictly above this to answer without classification.
pub const REPLY_CONFIDENCE: f32 = 0.82;

/// How many trailing turns of history the LLM decision sees.
pub const HISTORY_WINDOW: usize = 6;

/// Phrases that force an escalation regardless of retrieval quality:
/// explicit requests for a human, or statements that a prior answer failed.
/// "support" is deliberately absent — it triggers false positives on
/// messages like "do you provide support?".
const FORCE_ESCALATE_PHRASES: &[&str] = &[
    "human",
    "agent",
    "didn't work",
    "not helpful",
    "escalate",
    "speak to",
];

/// Max tokens for the decision LLM call (runs on most turns).
const DECIDE_MAX_TOKENS: u32 = 400;

/// Temperature for the decision call.
const DECIDE_TEMPERATURE: f32 = 0.2;

/// Decides what to do with one customer turn.
pub struct DecisionEngine {
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn KnowledgeRetriever>,
    llm_timeout: Duration,
}

impl DecisionEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn KnowledgeRetriever>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            retriever,
            llm_timeout,
        }
    }

    /// Decide the outcome for `message`, given the session's prior history
    /// (oldest first, not including the current message).
    ///
    /// Never fails: internal errors degrade to `Escalate` so a human picks
    /// the conversation up.
    pub async fn decide(&self, message: &str, history: &[ChatTurn]) -> Decision {
        // 1. Explicit request for a human or complaint about a prior answer
        //    wins over everything, including a would-be confident retrieval.
        if contains_force_escalate(message) {
            debug!("Force-escalate phrase matched");
            return Decision::Escalate;
        }

        // 2. Retrieval. Backend unavailability is not fatal — continue with
        //    the classification-only path.
        let hit = match self.retriever.search(message, RETRIEVAL_GATE).await {
            Ok(hit) => hit,
            Err(RetrievalError::Unavailable(reason)) => {
                warn!(reason = %reason, "Retrieval unavailable, continuing without knowledge context");
                None
            }
            Err(e) => {
                warn!(error = %e, "Retrieval failed, continuing without knowledge context");
                None
            }
        };

        if let Some(ref hit) = hit
            && exceeds_reply_confidence(hit.score)
        {
            debug!(doc_id = hit.document.id, score = hit.score, "Confident knowledge match");
            return Decision::Reply {
                text: hit.document.text.clone(),
            };
        }

        // 3. Delegate to the LLM with the bounded history window and any
        //    below-threshold knowledge context.
        let decision = match self.decide_llm(message, history, hit.as_ref()).await {
            Ok(decision) => decision,
            Err(reason) => {
                warn!(reason = %reason, "Decision call failed, escalating");
                return Decision::Escalate;
            }
        };

        // 4. Never ask the same clarifying question twice in one session.
        if let Decision::AskQuestion { ref text } = decision
            && already_asked(history, text)
        {
            debug!("Clarifying question repeated, escalating instead");
            return Decision::Escalate;
        }

        decision
    }

    async fn decide_llm(
        &self,
        message: &str,
        history: &[ChatTurn],
        hit: Option<&SearchHit>,
    ) -> Result<Decision, String> {
        let mut messages = vec![ChatMessage::system(build_decision_prompt(hit))];

        let window_start = history.len().saturating_sub(HISTORY_WINDOW);
        for turn in &history[window_start..] {
            match turn.role {
                Role::User => messages.push(ChatMessage::user(turn.content.clone())),
                Role::Assistant => messages.push(ChatMessage::assistant(turn.content.clone())),
            }
        }
        messages.push(ChatMessage::user(message.to_string()));

        let request = CompletionRequest::new(messages)
            .with_temperature(DECIDE_TEMPERATURE)
            .with_max_tokens(DECIDE_MAX_TOKENS);

        let response = match tokio::time::timeout(self.llm_timeout, self.llm.complete(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(format!("LLM call failed: {e}")),
            Err(_) => return Err(format!("LLM call timed out after {:?}", self.llm_timeout)),
        };

        parse_decision(&response.content)
    }
}

/// True if the message contains any force-escalate phrase.
fn contains_force_escalate(message: &str) -> bool {
    let lower = message.to_lowercase();
    FORCE_ESCALATE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Strict comparison: a score of exactly `REPLY_CONFIDENCE` does NOT bypass.
fn exceeds_reply_confidence(score: f32) -> bool {
    score > REPLY_CONFIDENCE
}

/// Normalize a question for repeat detection: lowercase, alphanumerics and
/// single spaces only.
fn normalize_question(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if an assistant turn in the history already asked this question.
fn already_asked(history: &[ChatTurn], question: &str) -> bool {
    let normalized = normalize_question(question);
    if normalized.is_empty() {
        return false;
    }
    history
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .any(|t| normalize_question(&t.content) == normalized)
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_decision_prompt(hit: Option<&SearchHit>) -> String {
    let knowledge = match hit {
        Some(hit) => hit.document.text.as_str(),
        None => "No specific knowledge found for this query.",
    };

    format!(
        "You are a customer service coordinator. Decide what to do with the \
         customer's latest message given the conversation so far.\n\n\
         Actions:\n\
         - \"escalate\": the issue is technical or commercial and the customer has \
         supplied concrete detail (an error code, a failing page, a named feature) — \
         a human should take over.\n\
         - \"answer\": the KNOWLEDGE BASE below plausibly answers the question, or a \
         direct generic answer is appropriate. Provide the answer text.\n\
         - \"ask_question\": the request is vague or missing key details. Provide ONE \
         clarifying question.\n\
         - \"acknowledge\": this conversation was already escalated and the new \
         message adds no decision-relevant information. Provide a short \
         acknowledgement telling the customer the team has been updated.\n\n\
         === KNOWLEDGE BASE ===\n\
         {knowledge}\n\n\
         === LOOP PREVENTION ===\n\
         If you already asked the same clarification earlier in the conversation, do \
         NOT ask it again — escalate instead.\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"action\": \"<escalate|answer|ask_question|acknowledge>\", \
         \"text\": \"<message to show the customer>\", \
         \"reasoning\": \"<brief intent analysis>\"}}"
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Raw decision payload from the LLM.
#[derive(Debug, serde::Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    reasoning: String,
}

/// Parse the decision payload. The boundary is untrusted: anything that does
/// not conform to the four-action schema is an error (callers escalate).
fn parse_decision(raw: &str) -> Result<Decision, String> {
    let json_str = extract_json_object(raw);
    let parsed: RawDecision =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    debug!(action = %parsed.action, reasoning = %parsed.reasoning, "LLM decision");

    match parsed.action.as_str() {
        "escalate" => Ok(Decision::Escalate),
        "answer" => {
            if parsed.text.trim().is_empty() {
                Err("answer action requires a text field".into())
            } else {
                Ok(Decision::Reply { text: parsed.text })
            }
        }
        "ask_question" => {
            if parsed.text.trim().is_empty() {
                Err("ask_question action requires a text field".into())
            } else {
                Ok(Decision::AskQuestion { text: parsed.text })
            }
        }
        "acknowledge" => Ok(Decision::Acknowledge {
            text: if parsed.text.trim().is_empty() {
                "Thanks — I've passed this along to the team handling your issue.".to_string()
            } else {
                parsed.text
            },
        }),
        other => Err(format!("unknown decision action: '{other}'")),
    }
}
