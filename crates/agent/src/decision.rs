//! Decision parsing: turning free model text into control-flow choices.
//!
//! Every parser here has the same three tiers:
//!
//! 1. **Structured**: a JSON object or array somewhere in the text
//!    (bare, inside a ```json fence, or between the first `{` and last `}`)
//! 2. **Pattern**: line-oriented text conventions (enumerated steps,
//!    `key: value` lines, names of known units)
//! 3. **Default**: treat the whole text as the answer
//!
//! Model output is never trusted to be well-formed; nothing here fails.

use agentweave_core::{query_args, Arguments};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

// ── JSON extraction ───────────────────────────────────────────────────────

/// Find the first JSON value embedded in `text`.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    span_between(trimmed, '{', '}').or_else(|| span_between(trimmed, '[', ']'))
}

fn span_between(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

// ── Reactive-loop decisions ───────────────────────────────────────────────

/// What a reactive loop should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Stop with this content.
    Answer(String),
    /// Invoke a named unit.
    ToolCall { name: String, arguments: Arguments },
    /// The reply claimed to be a tool call but was unusable.
    Malformed(String),
}

/// Parse a model reply.
///
/// `sub_agents` enables the pattern tier: an unstructured reply that
/// mentions a sub-agent by name is routed to it with the reply as query.
pub fn parse_decision(reply: &str, sub_agents: &[String]) -> Decision {
    if let Some(Value::Object(object)) = extract_json(reply) {
        match object.get("type").and_then(Value::as_str) {
            Some("tool_call") => {
                let name = object
                    .get("tool_name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or_default();
                if name.is_empty() {
                    return Decision::Malformed("tool_call without tool_name".into());
                }
                let arguments = match object.get("arguments") {
                    Some(Value::Object(map)) => map.clone(),
                    Some(Value::String(query)) => query_args(query.clone()),
                    _ => Arguments::new(),
                };
                return Decision::ToolCall {
                    name: name.to_string(),
                    arguments,
                };
            }
            Some("answer") => {
                return match object.get("content") {
                    Some(Value::String(content)) => Decision::Answer(content.clone()),
                    Some(Value::Null) | None => Decision::Answer(reply.trim().to_string()),
                    Some(other) => Decision::Answer(other.to_string()),
                };
            }
            _ => {}
        }
    }

    if let Some(name) = sub_agents.iter().find(|name| reply.contains(name.as_str())) {
        return Decision::ToolCall {
            name: name.clone(),
            arguments: query_args(reply.trim()),
        };
    }

    Decision::Answer(reply.trim().to_string())
}

// ── Plans ─────────────────────────────────────────────────────────────────

static ENUMERATED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\s*[.:：、)]\s*(.+?)\s*$").ok());

/// Parse planner output into ordered steps.
///
/// Accepts `{"steps": [...]}`, a bare JSON array, enumerated lines
/// (`1. a`, `2: b`, `3、c`) or, failing those, the whole text as one step.
/// Empty output yields no steps.
pub fn parse_plan(output: &str) -> Vec<String> {
    if let Some(steps) = extract_json(output).and_then(|value| json_steps(&value)) {
        if !steps.is_empty() {
            return steps;
        }
    }

    let enumerated = enumerated_lines(output);
    if !enumerated.is_empty() {
        return enumerated;
    }

    let whole = output.trim();
    if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    }
}

fn json_steps(value: &Value) -> Option<Vec<String>> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(object) => object.get("steps")?.as_array()?,
        _ => return None,
    };
    Some(
        list.iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn enumerated_lines(text: &str) -> Vec<String> {
    let Some(pattern) = ENUMERATED.as_ref() else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Render steps as `1. a\n2. b`.
pub fn format_plan(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render steps as `{"steps": [...]}`.
pub fn plan_to_json(steps: &[String]) -> String {
    serde_json::json!({ "steps": steps }).to_string()
}

// ── Replanning ────────────────────────────────────────────────────────────

/// What a replanner decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplanAction {
    /// The goal is met; answer the user with this.
    Respond(String),
    /// Continue with these remaining steps.
    Replan(Vec<String>),
}

/// Parse replanner output.
///
/// Structured: `{"action": {"response": ..}}` or `{"action": {"steps": [..]}}`
/// (the `action` wrapper is optional). Text: a leading `Response:`/`Answer:`
/// marker responds, enumerated lines replan, anything else responds.
pub fn parse_replan(output: &str) -> ReplanAction {
    if let Some(Value::Object(object)) = extract_json(output) {
        let action = match object.get("action") {
            Some(Value::Object(inner)) => inner,
            _ => &object,
        };
        if let Some(response) = action.get("response") {
            let text = response
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| response.to_string());
            return ReplanAction::Respond(text);
        }
        if let Some(steps) = action.get("steps").and_then(json_steps) {
            return ReplanAction::Replan(steps);
        }
    }

    let trimmed = output.trim();
    let lower = trimmed.to_lowercase();
    for marker in ["response:", "answer:", "**response**:", "**response**"] {
        if lower.starts_with(marker) {
            return ReplanAction::Respond(trimmed[marker.len()..].trim().to_string());
        }
    }

    let steps = enumerated_lines(trimmed);
    if !steps.is_empty() {
        return ReplanAction::Replan(steps);
    }
    ReplanAction::Respond(trimmed.to_string())
}

// ── Reviews ───────────────────────────────────────────────────────────────

/// A reviewer's verdict on a candidate answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_satisfactory: bool,
    pub evaluation_reason: String,
    pub improvement_suggestions: String,
}

impl Evaluation {
    /// Suggestions if any were given, otherwise the reason.
    pub fn feedback(&self) -> &str {
        if self.improvement_suggestions.trim().is_empty() {
            &self.evaluation_reason
        } else {
            &self.improvement_suggestions
        }
    }
}

/// Parse reviewer output. Without an explicit positive signal the answer
/// is judged unsatisfactory.
pub fn parse_evaluation(output: &str) -> Evaluation {
    if let Some(Value::Object(object)) = extract_json(output) {
        let verdict_key = ["is_satisfactory", "satisfactory"]
            .into_iter()
            .find(|key| object.contains_key(*key));
        if let Some(verdict_key) = verdict_key {
            let is_satisfactory = match object.get(verdict_key) {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => truthy(s).unwrap_or(false),
                _ => false,
            };
            let text = |key: &str| match object.get(key) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            return Evaluation {
                is_satisfactory,
                evaluation_reason: text("evaluation_reason"),
                improvement_suggestions: text("improvement_suggestions"),
            };
        }
    }

    #[derive(PartialEq)]
    enum Section {
        None,
        Reason,
        Suggestions,
    }

    let mut evaluation = Evaluation::default();
    let mut verdict: Option<bool> = None;
    let mut section = Section::None;
    let mut reason = Vec::new();
    let mut suggestions = Vec::new();

    for raw in output.lines() {
        let line = raw.trim().trim_start_matches(['-', '*', ' ']).trim();
        let lower = line.to_lowercase();
        let value = line.split_once([':', '：']).map(|(_, v)| v.trim()).unwrap_or("");

        if lower.starts_with("evaluation_reason") {
            section = Section::Reason;
            if !value.is_empty() {
                reason.push(value.to_string());
            }
        } else if lower.starts_with("improvement_suggestions") {
            section = Section::Suggestions;
            if !value.is_empty() {
                suggestions.push(value.to_string());
            }
        } else if lower.starts_with("is_satisfactory")
            || (verdict.is_none() && section == Section::None && lower.contains("satisfactory"))
        {
            let mention = if lower.starts_with("is_satisfactory") {
                value.to_lowercase()
            } else {
                lower.clone()
            };
            verdict = truthy(value).or_else(|| satisfactory_mention(&mention));
            section = Section::None;
        } else if !line.is_empty() {
            match section {
                Section::Reason => reason.push(line.to_string()),
                Section::Suggestions => suggestions.push(line.to_string()),
                Section::None => {}
            }
        }
    }

    evaluation.is_satisfactory = verdict.unwrap_or(false);
    evaluation.evaluation_reason = if reason.is_empty() {
        output.trim().to_string()
    } else {
        reason.join("\n")
    };
    evaluation.improvement_suggestions = suggestions.join("\n");
    evaluation
}

const NEGATIONS: &[&str] = &[
    "not", "isn't", "wasn't", "aren't", "never", "no", "hardly", "barely", "insufficiently",
];

/// Verdict implied by free text mentioning "satisfactory", reading any
/// negation earlier in the same clause.
fn satisfactory_mention(lower: &str) -> Option<bool> {
    let at = lower.find("satisfactory")?;
    let before = &lower[..at];
    if before.ends_with("un") {
        return Some(false);
    }
    let clause = before.rsplit([',', '.', ';', ':']).next().unwrap_or(before);
    let negated = clause
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .any(|word| NEGATIONS.contains(&word));
    Some(!negated)
}

fn truthy(value: &str) -> Option<bool> {
    let lower = value.trim().to_lowercase();
    if lower.starts_with("true") || lower.starts_with("yes") {
        Some(true)
    } else if lower.starts_with("false") || lower.starts_with("no") {
        Some(false)
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
