//! Core entity types: memories, activities, sessions, links, user messages.
//!
//! All timestamps are UTC with second precision on the wire. Identifiers are
//! opaque strings allocated by [`crate::clock::new_id`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// MEMORY
// ============================================================================

/// Kind of knowledge a memory holds
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// A choice that was made, and usually why
    Decision,
    /// A working fix or approach to a problem
    Solution,
    /// Something learned along the way
    Insight,
    /// An error and its circumstances
    Error,
    /// Background knowledge about the project
    Context,
    /// A user or team preference
    Preference,
    /// Something still to do
    Todo,
    /// A pointer to external material
    Reference,
    /// A repeatable process
    Workflow,
    /// Knowledge about an API surface
    Api,
    /// A captured exchange
    Conversation,
    /// Anything else
    #[default]
    Other,
}

impl MemoryType {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Solution => "solution",
            MemoryType::Insight => "insight",
            MemoryType::Error => "error",
            MemoryType::Context => "context",
            MemoryType::Preference => "preference",
            MemoryType::Todo => "todo",
            MemoryType::Reference => "reference",
            MemoryType::Workflow => "workflow",
            MemoryType::Api => "api",
            MemoryType::Conversation => "conversation",
            MemoryType::Other => "other",
        }
    }

    /// Parse from the catalog string form; unknown values land on `Other`
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "decision" => MemoryType::Decision,
            "solution" => MemoryType::Solution,
            "insight" => MemoryType::Insight,
            "error" => MemoryType::Error,
            "context" => MemoryType::Context,
            "preference" => MemoryType::Preference,
            "todo" => MemoryType::Todo,
            "reference" => MemoryType::Reference,
            "workflow" => MemoryType::Workflow,
            "api" => MemoryType::Api,
            "conversation" => MemoryType::Conversation,
            _ => MemoryType::Other,
        }
    }

    /// Strict parse for validated tool input
    pub fn try_parse(s: &str) -> Option<Self> {
        let parsed = Self::parse_name(s);
        if parsed == MemoryType::Other && !s.eq_ignore_ascii_case("other") {
            None
        } else {
            Some(parsed)
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    /// Recently touched and trusted
    #[default]
    Fresh,
    /// Flagged for a second look
    NeedsReview,
    /// Likely stale
    Outdated,
    /// Logically deleted; excluded from default queries
    Archived,
}

impl MemoryStatus {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Fresh => "fresh",
            MemoryStatus::NeedsReview => "needs_review",
            MemoryStatus::Outdated => "outdated",
            MemoryStatus::Archived => "archived",
        }
    }

    /// Parse from the catalog string form
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fresh" => Some(MemoryStatus::Fresh),
            "needs_review" => Some(MemoryStatus::NeedsReview),
            "outdated" => Some(MemoryStatus::Outdated),
            "archived" => Some(MemoryStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable unit of knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique identifier (`mem-...`)
    pub id: String,
    /// The knowledge itself; non-empty after trimming
    pub content: String,
    /// Optional surrounding context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Kind of knowledge
    pub memory_type: MemoryType,
    /// Lifecycle status
    pub status: MemoryStatus,
    /// Importance in [0, 100]; defaults to 50
    pub importance_score: u8,
    /// Times this memory was returned to a caller
    pub access_count: u32,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last modification instant; always >= created_at
    pub updated_at: DateTime<Utc>,
    /// Last instant it was returned to a caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Deduplicated tag set
    pub tags: Vec<String>,
    /// Whether a vector is stored for this memory
    pub has_embedding: bool,
}

/// Default importance when the caller does not supply one
pub const DEFAULT_IMPORTANCE: u8 = 50;

/// Input for creating a memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RememberInput {
    /// The content to store
    pub content: String,
    /// Kind of knowledge; defaults to `other`
    #[serde(default)]
    pub memory_type: MemoryType,
    /// Optional surrounding context
    #[serde(default)]
    pub context: Option<String>,
    /// Tags; duplicates collapse
    #[serde(default)]
    pub tags: Vec<String>,
    /// Importance in [0, 100]
    #[serde(default)]
    pub importance: Option<u8>,
    /// Existing memories to link with `relates_to`
    #[serde(default)]
    pub related_ids: Vec<String>,
}

/// Partial update for a memory; only supplied fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPatch {
    /// Replacement content (triggers re-embedding)
    #[serde(default)]
    pub content: Option<String>,
    /// Replacement context
    #[serde(default)]
    pub context: Option<Option<String>>,
    /// Replacement type
    #[serde(default)]
    pub memory_type: Option<MemoryType>,
    /// Replacement status
    #[serde(default)]
    pub status: Option<MemoryStatus>,
    /// Replacement importance
    #[serde(default)]
    pub importance: Option<u8>,
    /// Replacement tag set
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl MemoryPatch {
    /// True when no field is supplied
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.context.is_none()
            && self.memory_type.is_none()
            && self.status.is_none()
            && self.importance.is_none()
            && self.tags.is_none()
    }
}

// ============================================================================
// FRESHNESS
// ============================================================================

/// Derived freshness classification of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Accessed within 30 days and status fresh
    Fresh,
    /// 30-90 days since last access, or explicitly marked
    NeedsReview,
    /// More than 90 days since last access
    Outdated,
    /// Archived passthrough
    Archived,
}

// ============================================================================
// LINKS
// ============================================================================

/// Kind of a directed relationship between two memories
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// General association (cycles are legitimate)
    #[default]
    RelatesTo,
    /// The source replaces the target
    Supersedes,
    /// The two disagree
    Contradicts,
    /// The source needs the target
    DependsOn,
    /// The target caused the source
    CausedBy,
    /// Anything else
    Other,
}

impl LinkKind {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::RelatesTo => "relates_to",
            LinkKind::Supersedes => "supersedes",
            LinkKind::Contradicts => "contradicts",
            LinkKind::DependsOn => "depends_on",
            LinkKind::CausedBy => "caused_by",
            LinkKind::Other => "other",
        }
    }

    /// Parse from the catalog string form
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "relates_to" => Some(LinkKind::RelatesTo),
            "supersedes" => Some(LinkKind::Supersedes),
            "contradicts" => Some(LinkKind::Contradicts),
            "depends_on" => Some(LinkKind::DependsOn),
            "caused_by" => Some(LinkKind::CausedBy),
            "other" => Some(LinkKind::Other),
            _ => None,
        }
    }
}

/// A directed, typed relationship between two memories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Source memory id
    pub from_id: String,
    /// Target memory id
    pub to_id: String,
    /// Relationship kind
    pub kind: LinkKind,
}

/// A tag with its usage count across non-archived memories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    /// The tag
    pub tag: String,
    /// Number of non-archived memories carrying it
    pub count: u32,
}

// ============================================================================
// ACTIVITY
// ============================================================================

/// Kind of hook event that produced an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Before the host assistant runs a tool
    PreToolUse,
    /// After the host assistant ran a tool
    PostToolUse,
    /// The assistant finished its turn
    Stop,
    /// A subagent finished
    SubagentStop,
}

impl EventType {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PreToolUse => "pre_tool_use",
            EventType::PostToolUse => "post_tool_use",
            EventType::Stop => "stop",
            EventType::SubagentStop => "subagent_stop",
        }
    }

    /// Parse from the catalog string form
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pre_tool_use" => Some(EventType::PreToolUse),
            "post_tool_use" => Some(EventType::PostToolUse),
            "stop" => Some(EventType::Stop),
            "subagent_stop" => Some(EventType::SubagentStop),
            _ => None,
        }
    }
}

/// Scope of a slash command observed in an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandScope {
    /// Installed for all projects
    Universal,
    /// Installed in the current project
    Project,
    /// Could not be determined
    Unknown,
}

impl CommandScope {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandScope::Universal => "universal",
            CommandScope::Project => "project",
            CommandScope::Unknown => "unknown",
        }
    }

    /// Parse from the catalog string form
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "universal" => Some(CommandScope::Universal),
            "project" => Some(CommandScope::Project),
            "unknown" => Some(CommandScope::Unknown),
            _ => None,
        }
    }
}

/// An observation of a tool call made by the host assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Unique identifier (`act-...`)
    pub id: String,
    /// Owning session, when one was current at ingest time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Hook event kind
    pub event_type: EventType,
    /// Tool that was called
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Redacted tool input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    /// Redacted, possibly truncated tool output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    /// Whether the tool call succeeded
    pub success: bool,
    /// Error text; non-empty whenever success is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall time of the tool call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Principal file path, when the tool touched one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Ingest instant
    pub timestamp: DateTime<Utc>,
    /// Analytics projection: slash command name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,
    /// Analytics projection: slash command scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_scope: Option<CommandScope>,
    /// Analytics projection: MCP server name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_server: Option<String>,
    /// Analytics projection: skill name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    /// Brief natural-language summary (1-12 words)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer summary with outcome (12-20 words)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_detail: Option<String>,
}

/// Input for logging an activity. Raw tool I/O enters here and is redacted
/// before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInput {
    /// Hook event kind
    pub event_type: EventType,
    /// Tool that was called
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Raw tool input as structured JSON
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    /// Raw tool output (string or structured JSON)
    #[serde(default)]
    pub tool_output: Option<serde_json::Value>,
    /// Whether the tool call succeeded
    pub success: bool,
    /// Error text; required when success is false
    #[serde(default)]
    pub error_message: Option<String>,
    /// Wall time of the tool call
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Principal file path
    #[serde(default)]
    pub file_path: Option<String>,
}

// ============================================================================
// SESSION
// ============================================================================

/// A contiguous stretch of activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier (`ses-...`)
    pub id: String,
    /// Project the session belongs to
    pub project_path: String,
    /// Start instant
    pub started_at: DateTime<Utc>,
    /// End instant; NULL marks the current session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Summary derived at close time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Number of referencing activities
    pub activity_count: u32,
}

// ============================================================================
// USER MESSAGE
// ============================================================================

/// Tone indicator derived from a captured user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneIndicator {
    /// Time pressure markers
    Urgent,
    /// Politeness markers
    Polite,
    /// Imperative phrasing
    Direct,
    /// Question-heavy
    Inquisitive,
    /// Technical vocabulary
    Technical,
    /// Informal register
    Casual,
}

impl ToneIndicator {
    /// String form used in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneIndicator::Urgent => "urgent",
            ToneIndicator::Polite => "polite",
            ToneIndicator::Direct => "direct",
            ToneIndicator::Inquisitive => "inquisitive",
            ToneIndicator::Technical => "technical",
            ToneIndicator::Casual => "casual",
        }
    }

    /// Parse from the catalog string form
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "urgent" => Some(ToneIndicator::Urgent),
            "polite" => Some(ToneIndicator::Polite),
            "direct" => Some(ToneIndicator::Direct),
            "inquisitive" => Some(ToneIndicator::Inquisitive),
            "technical" => Some(ToneIndicator::Technical),
            "casual" => Some(ToneIndicator::Casual),
            _ => None,
        }
    }
}

/// A captured human utterance to the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    /// Unique identifier (`msg-...`)
    pub id: String,
    /// Owning session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Verbatim message text
    pub content: String,
    /// Whitespace-separated word count
    pub word_count: u32,
    /// Character count
    pub char_count: u32,
    /// Line count
    pub line_count: u32,
    /// Contains fenced code blocks
    pub has_code_blocks: bool,
    /// Contains question marks
    pub has_questions: bool,
    /// Contains shell-command markers
    pub has_commands: bool,
    /// Derived tone indicators
    pub tone_indicators: Vec<ToneIndicator>,
    /// Capture instant
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// FILTERS / SORTING
// ============================================================================

/// Filter set shared by recall and list operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFilter {
    /// Restrict to these types
    #[serde(default)]
    pub memory_type: Option<Vec<MemoryType>>,
    /// Restrict to these statuses; when absent, archived rows are excluded
    #[serde(default)]
    pub status: Option<Vec<MemoryStatus>>,
    /// Require at least one of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lower importance bound, inclusive
    #[serde(default)]
    pub min_importance: Option<u8>,
    /// Upper importance bound, inclusive
    #[serde(default)]
    pub max_importance: Option<u8>,
    /// Only memories last accessed at or after this instant
    #[serde(default)]
    pub accessed_after: Option<DateTime<Utc>>,
    /// Only memories last accessed at or before this instant
    #[serde(default)]
    pub accessed_before: Option<DateTime<Utc>>,
}

/// Sort key for list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// By creation instant
    #[default]
    CreatedAt,
    /// By last access instant
    LastAccessed,
    /// By importance
    ImportanceScore,
    /// By access count
    AccessCount,
}

impl SortBy {
    /// Column name in the catalog
    pub fn column(&self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::LastAccessed => "last_accessed",
            SortBy::ImportanceScore => "importance_score",
            SortBy::AccessCount => "access_count",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

/// Filter set for activity queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    /// Restrict to one session
    #[serde(default)]
    pub session_id: Option<String>,
    /// Restrict to one tool
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Restrict to these event types
    #[serde(default)]
    pub event_type: Option<Vec<EventType>>,
    /// Only activities at or after this instant
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Only failed calls
    #[serde(default)]
    pub failed_only: bool,
}

/// Default page size for list/recall operations
pub const DEFAULT_LIMIT: u32 = 20;
/// Hard cap on page size; larger requests are silently clamped
pub const MAX_LIMIT: u32 = 200;

/// Clamp a caller-supplied limit to [1, MAX_LIMIT], defaulting when absent
pub fn effective_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
