//! Activity summaries and secret redaction.
//!
//! Summaries are rule-based and deterministic: the brief is
//! `"<verb> <object>"` (1-12 words), the detail adds the outcome and the
//! principal argument path (12-20 words). An LLM-backed summarizer can sit
//! in front as an adapter but is never required.

pub mod redact;

use serde_json::Value;

use crate::types::{ActivityInput, CommandScope};

/// Both summary strings for one activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summaries {
    /// 1-12 words
    pub brief: String,
    /// 12-20 words
    pub detail: String,
}

/// Analytics projections extracted from a tool call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projections {
    /// Slash/shell command name
    pub command_name: Option<String>,
    /// Where the command came from
    pub command_scope: Option<CommandScope>,
    /// MCP server, for `mcp__server__tool` names
    pub mcp_server: Option<String>,
    /// Skill name, for Skill invocations
    pub skill_name: Option<String>,
}

/// Verb for a tool name
fn verb_for(tool_name: &str) -> &'static str {
    if tool_name.starts_with("mcp__") {
        return "called";
    }
    match tool_name {
        "Read" | "NotebookRead" => "read",
        "Write" => "wrote",
        "Edit" | "MultiEdit" | "NotebookEdit" => "edited",
        "Bash" | "BashOutput" => "ran",
        "Grep" | "Glob" | "LS" => "searched",
        "WebFetch" | "WebSearch" => "fetched",
        "Task" | "Agent" => "delegated",
        "Skill" => "invoked",
        "TodoWrite" => "updated",
        _ => "used",
    }
}

/// Principal object of a tool call: the file path when present, otherwise a
/// canonical argument pulled from the input.
fn object_for(input: &ActivityInput) -> String {
    if let Some(path) = &input.file_path {
        return short_path(path);
    }

    let Some(args) = &input.tool_input else {
        return input
            .tool_name
            .clone()
            .unwrap_or_else(|| "tool".to_string());
    };

    for key in ["file_path", "path", "url", "pattern", "query", "skill"] {
        if let Some(Value::String(s)) = args.get(key) {
            return short_path(s);
        }
    }
    if let Some(Value::String(command)) = args.get("command") {
        if let Some(first) = command.split_whitespace().next() {
            return short_path(first);
        }
    }
    if let Some(Value::String(prompt)) = args.get("prompt") {
        let mut words: Vec<&str> = prompt.split_whitespace().take(4).collect();
        if !words.is_empty() {
            if prompt.split_whitespace().count() > 4 {
                words.push("...");
            }
            return words.join(" ");
        }
    }

    input
        .tool_name
        .clone()
        .unwrap_or_else(|| "tool".to_string())
}

/// Last two components of a path, or the whole string when it is short
fn short_path(path: &str) -> String {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.len() > 2 {
        components[components.len() - 2..].join("/")
    } else {
        path.to_string()
    }
}

/// Clamp a summary to at most `max` words
fn clamp_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        words.join(" ")
    } else {
        words[..max].join(" ")
    }
}

/// Pad a summary up to at least `min` words with neutral trailing context
fn pad_words(text: String, min: usize, filler: &[&str]) -> String {
    let mut words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let mut extra = filler.iter();
    while words.len() < min {
        match extra.next() {
            Some(w) => words.push((*w).to_string()),
            None => break,
        }
    }
    words.join(" ")
}

/// Produce both summaries for an activity
pub fn summarize(input: &ActivityInput) -> Summaries {
    let tool = input.tool_name.as_deref().unwrap_or("event");
    let verb = verb_for(tool);
    let object = object_for(input);

    let brief = clamp_words(&format!("{verb} {object}"), 12);

    let outcome = if input.success {
        "succeeded".to_string()
    } else {
        let reason = input
            .error_message
            .as_deref()
            .map(|m| clamp_words(m, 5))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "an error".to_string());
        format!("failed with {reason}")
    };

    let place = input
        .file_path
        .as_deref()
        .map(short_path)
        .unwrap_or_else(|| object.clone());

    let detail = clamp_words(
        &format!("the {tool} call {outcome}; {verb} {place} during this assistant turn"),
        20,
    );
    let detail = pad_words(detail, 12, &["while", "handling", "the", "current", "task"]);

    Summaries { brief, detail }
}

/// Derive the analytics projections for a tool call
pub fn project(tool_name: Option<&str>, tool_input: Option<&Value>) -> Projections {
    let mut out = Projections::default();

    let Some(name) = tool_name else {
        return out;
    };

    // mcp__<server>__<tool>
    if let Some(rest) = name.strip_prefix("mcp__") {
        if let Some((server, _tool)) = rest.split_once("__") {
            out.mcp_server = Some(server.to_string());
        } else {
            out.mcp_server = Some(rest.to_string());
        }
    }

    if name == "Skill" {
        if let Some(Value::String(skill)) = tool_input.and_then(|v| v.get("skill")) {
            out.skill_name = Some(skill.clone());
        }
    }

    if name == "Bash" {
        if let Some(Value::String(command)) = tool_input.and_then(|v| v.get("command")) {
            if let Some(first) = command.split_whitespace().next() {
                let base = first.rsplit('/').next().unwrap_or(first);
                out.command_name = Some(base.to_string());
                out.command_scope = Some(if first.contains(".claude/commands") {
                    CommandScope::Project
                } else if !first.contains('/') {
                    CommandScope::Universal
                } else {
                    CommandScope::Unknown
                });
            }
        }
    }

    out
}
