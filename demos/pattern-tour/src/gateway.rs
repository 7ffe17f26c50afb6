//! Offline gateway that decides by keyword so the tour runs without a model.

use agent_adapters::traits::{
    GatewayMetadata, GatewayRequest, GatewayResult, Message, ModelGateway, ModelResponse,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::patterns::{
    AGGREGATOR, ASSISTANT, BILLING, EDITOR, GENERAL, GUARDED, ORCHESTRATOR, RESEARCHER, SALES,
    SENTIMENT, SUMMARIZER, SUPPORT_TRIAGE, TECH, TECHNICAL, TOPICS, TRIAGE, WRITER,
};

const BILLING_WORDS: &[&str] = &[
    "price",
    "pricing",
    "billing",
    "subscription",
    "upgrade",
    "plan",
    "refund",
    "invoice",
    "charged",
];
const TECH_WORDS: &[&str] = &["bug", "error", "crash", "api", "integration", "broken"];
const POSITIVE_WORDS: &[&str] = &["love", "great", "excellent", "happy", "fast", "good"];
const NEGATIVE_WORDS: &[&str] = &["hate", "slow", "bad", "broken", "angry", "poor"];

/// Keyword-driven stand-in for a model backend.
#[derive(Debug)]
pub struct TourGateway {
    metadata: GatewayMetadata,
}

impl TourGateway {
    pub fn new() -> Self {
        Self {
            metadata: GatewayMetadata::new("tour", "keyword-router"),
        }
    }
}

#[async_trait]
impl ModelGateway for TourGateway {
    fn metadata(&self) -> &GatewayMetadata {
        &self.metadata
    }

    async fn complete(&self, request: GatewayRequest) -> GatewayResult<ModelResponse> {
        let input = request.last_user_message().unwrap_or_default();
        let results = tool_results_since_input(request.messages());

        let response = match request.agent().as_str() {
            TRIAGE => ModelResponse::handoff(match classify(input) {
                Topic::Billing => SALES,
                Topic::Technical => TECH,
                Topic::General => GENERAL,
            }),
            SUPPORT_TRIAGE => ModelResponse::handoff(match classify(ticket_message(input)) {
                Topic::Billing => BILLING,
                Topic::Technical => TECHNICAL,
                Topic::General => GENERAL,
            }),
            ORCHESTRATOR => orchestrate(input, &results),
            ASSISTANT => assist(input, &results),
            AGGREGATOR => ModelResponse::final_text(aggregate(input)),
            agent => ModelResponse::final_text(answer(agent, input)),
        };
        debug!(agent = %request.agent(), "tour gateway decided");
        Ok(response)
    }
}

fn tool_results_since_input(messages: &[Message]) -> Vec<String> {
    let mut results: Vec<String> = messages
        .iter()
        .rev()
        .take_while(|message| !matches!(message, Message::User { .. }))
        .filter_map(|message| match message {
            Message::ToolResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect();
    results.reverse();
    results
}

fn mentions(text: &str, words: &[&str]) -> usize {
    let lower = text.to_lowercase();
    words.iter().filter(|word| lower.contains(**word)).count()
}

#[derive(Debug, PartialEq, Eq)]
enum Topic {
    Billing,
    Technical,
    General,
}

fn classify(input: &str) -> Topic {
    if mentions(input, BILLING_WORDS) > 0 {
        Topic::Billing
    } else if mentions(input, TECH_WORDS) > 0 {
        Topic::Technical
    } else {
        Topic::General
    }
}

/// Body of a rendered support ticket, or the whole input.
fn ticket_message(input: &str) -> &str {
    input
        .split_once("Message:\n")
        .map_or(input, |(_, message)| message)
        .trim()
}

fn orchestrate(input: &str, results: &[String]) -> ModelResponse {
    let step = match results.len() {
        0 => ("research_topic", input),
        1 => ("write_content", results[0].as_str()),
        2 => ("edit_text", results[1].as_str()),
        _ => {
            return ModelResponse::final_text(results.last().cloned().unwrap_or_default());
        }
    };
    let (tool, text) = step;
    ModelResponse::tool_call(&format!("{tool}-1"), tool, json!({ "input": text }))
}

fn assist(input: &str, results: &[String]) -> ModelResponse {
    if !results.is_empty() {
        return ModelResponse::final_text(results.join("\n"));
    }

    let lower = input.to_lowercase();
    let call =
        |tool: &str, arguments| ModelResponse::tool_call(&format!("{tool}-1"), tool, arguments);
    if let Some(rest) = lower.strip_prefix("add ") {
        let (title, due) = match rest.split_once(" due ") {
            Some((title, due)) => (title, Some(due.trim())),
            None => (rest, None),
        };
        let priority = if title.contains("urgent") { "high" } else { "medium" };
        let mut arguments = json!({ "title": title.trim(), "priority": priority });
        if let Some(due) = due {
            arguments["due_date"] = json!(due);
        }
        call("add_task", arguments)
    } else if let Some(id) = lower.strip_prefix("done ") {
        call("complete_task", json!({ "task_id": id.trim() }))
    } else if let Some(content) = input.strip_prefix("note ") {
        call("take_note", json!({ "content": content }))
    } else if lower.starts_with("notes") {
        call("list_notes", json!({}))
    } else if lower.starts_with("tasks") {
        call("list_tasks", json!({ "status": "pending" }))
    } else if lower.starts_with("summary") {
        call("daily_summary", json!({}))
    } else {
        ModelResponse::final_text(
            "I can add tasks, mark them done, take notes, list them, or summarise your day.",
        )
    }
}

fn aggregate(input: &str) -> String {
    let sections: Vec<&str> = input
        .lines()
        .filter(|line| line.ends_with(':') && line.chars().any(char::is_uppercase))
        .filter(|line| line.chars().all(|ch| !ch.is_lowercase()))
        .map(|line| line.trim_end_matches(':'))
        .collect();
    format!(
        "Unified report built from {} analyses ({}).",
        sections.len(),
        sections.join(", ")
    )
}

fn answer(agent: &str, input: &str) -> String {
    match agent {
        SALES => format!(
            "Happy to help with your plan. Regarding \"{input}\": \
             the Pro tier includes priority billing support."
        ),
        TECH => format!(
            "Let's troubleshoot \"{input}\". \
             Please share the error message and your client version."
        ),
        GENERAL => format!(
            "Thanks for reaching out about \"{}\". I've noted it on your account.",
            ticket_message(input)
        ),
        BILLING => format!(
            "Sorry about the trouble with \"{}\". I've opened a billing review; \
             any refund lands within 5 to 7 business days.",
            ticket_message(input)
        ),
        TECHNICAL => format!(
            "Thanks for the report: \"{}\". Please update to the latest version and \
             reinstall; if it still happens, reply with your device and OS version.",
            ticket_message(input)
        ),
        GUARDED => {
            if input.to_lowercase().contains("reveal") {
                "Sorry, I cannot share my system prompt.".to_owned()
            } else {
                format!("Here is a short, safe answer to: {input}")
            }
        }
        SENTIMENT => {
            let positive = mentions(input, POSITIVE_WORDS);
            let negative = mentions(input, NEGATIVE_WORDS);
            let label = match positive.cmp(&negative) {
                std::cmp::Ordering::Greater => "positive",
                std::cmp::Ordering::Less => "negative",
                std::cmp::Ordering::Equal => "neutral",
            };
            format!("Overall sentiment: {label} ({positive} positive, {negative} negative cues).")
        }
        TOPICS => {
            let mut topics: Vec<String> = input
                .split(|ch: char| !ch.is_alphanumeric())
                .filter(|word| word.len() > 5)
                .map(str::to_lowercase)
                .collect();
            topics.dedup();
            topics.truncate(3);
            format!("Main topics: {}.", topics.join(", "))
        }
        SUMMARIZER => {
            let first = input.split_terminator('.').next().unwrap_or(input).trim();
            format!("Summary: {first}.")
        }
        RESEARCHER => format!(
            "Findings. {input} Key points: lowers stress, sharpens focus, improves sleep."
        ),
        WRITER => format!("Draft post. {input}"),
        EDITOR => format!("Final version. {input}"),
        other => format!("{other} received: {input}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_keyword() {
        assert_eq!(classify("How much is the Pro plan?"), Topic::Billing);
        assert_eq!(classify("The API returns an error"), Topic::Technical);
        assert_eq!(classify("Where is your office?"), Topic::General);
    }

    #[test]
    fn ticket_body_is_extracted() {
        let ticket = "Customer: Ana\nEmail: ana@example.com\n\nMessage:\nApp crashes on start";
        assert_eq!(ticket_message(ticket), "App crashes on start");
        assert_eq!(ticket_message("plain text"), "plain text");
    }

    #[test]
    fn aggregate_counts_sections() {
        let text = "Please synthesize these analysis results into a unified report:\n\n\
                    SENTIMENT ANALYZER:\nok\n\nTOPIC EXTRACTOR:\nok";
        assert_eq!(
            aggregate(text),
            "Unified report built from 2 analyses (SENTIMENT ANALYZER, TOPIC EXTRACTOR)."
        );
    }
}
