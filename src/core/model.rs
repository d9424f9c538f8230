//! Records passed between analysis stages.
//!
//! Every record is produced fresh per analysis and handed to the next stage by
//! value. JSON names are camelCase to match what issue trackers and editor
//! integrations exchange.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::sections::IssueTextExtractor;

/// Raw issue as delivered by an issue tracker. Only the key, summary and
/// description are required; everything else defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInput
{
    pub issue_key: String,
    pub summary: String,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps_to_reproduce: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_behavior: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actual_behavior: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub environment: String,
    #[serde(default)]
    pub stack_trace_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
}

impl IssueInput
{
    /// Minimal input with just the required fields
    pub fn new(
        issue_key: impl Into<String>,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self
    {
        Self {
            issue_key: issue_key.into(),
            summary: summary.into(),
            description: description.into(),
            steps_to_reproduce: Vec::new(),
            expected_behavior: String::new(),
            actual_behavior: String::new(),
            environment: String::new(),
            stack_trace_text: None,
            severity: String::new(),
        }
    }
}

/// Trackers send `null` for unset fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Structured defect report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BugReport
{
    pub issue_key: String,
    pub summary: String,
    pub description: String,
    pub steps_to_reproduce: Vec<String>,
    pub expected_behavior: String,
    pub actual_behavior: String,
    pub environment: String,
    pub stack_trace_text: Option<String>,
    pub severity: String,
}

impl BugReport
{
    /// Build a report, filling every field the tracker left empty from the
    /// sections found in the free-text description.
    pub fn from_input(input: IssueInput) -> Self
    {
        let sections = IssueTextExtractor::extract(&input.description);

        let stack_trace_text = input
            .stack_trace_text
            .filter(|t| !t.trim().is_empty())
            .or(sections.stack_trace_text);

        Self {
            issue_key: input.issue_key,
            summary: input.summary,
            description: input.description,
            steps_to_reproduce: if input.steps_to_reproduce.is_empty()
            {
                sections.steps_to_reproduce
            }
            else
            {
                input.steps_to_reproduce
            },
            expected_behavior: or_extracted(input.expected_behavior, sections.expected_behavior),
            actual_behavior: or_extracted(input.actual_behavior, sections.actual_behavior),
            environment: or_extracted(input.environment, sections.environment),
            stack_trace_text,
            severity: input.severity,
        }
    }
}

fn or_extracted(
    given: String,
    extracted: String,
) -> String
{
    if given.trim().is_empty() { extracted } else { given }
}

/// Which branch of the pipeline produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin
{
    Keyword,
    StackFrame,
}

/// A source line suspected to be relevant to the bug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateLocation
{
    /// Path relative to the workspace root
    pub file_path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    pub snippet: String,
    pub relevance_score: u32,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub origin: Origin,
}

impl CandidateLocation
{
    /// `path:line` label used in prompts and terminal output
    pub fn label(&self) -> String
    {
        format!("{}:{}", self.file_path.display(), self.line_number)
    }
}

/// Stable sort descending by score and cap. Ties keep encounter order.
pub fn rank_locations(
    mut locations: Vec<CandidateLocation>,
    cap: usize,
) -> Vec<CandidateLocation>
{
    locations.sort_by(|a, b| {
        b.relevance_score
            .cmp(&a.relevance_score)
    });
    locations.truncate(cap);
    locations
}

/// One parsed stack-trace entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame
{
    pub file_name: String,
    pub line_number: usize,
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Normalized version-control log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord
{
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
    pub files: Vec<String>,
    pub suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType
{
    Simple,
    Complex,
}

/// A concrete edit proposed by the reasoning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange
{
    pub file: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

/// Terminal recommendation. Every required field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion
{
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub description: String,
    pub root_cause: String,
    pub fix_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_changes: Option<Vec<CodeChange>>,
    pub test_suggestions: Vec<String>,
    pub risks: Vec<String>,
}

/// Whether the suggestion came from the reasoner or the deterministic fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionSource
{
    Parsed,
    Fallback,
}

/// Full output of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis
{
    pub issue_key: String,
    pub keywords: Vec<String>,
    pub frames: Vec<StackFrame>,
    pub locations: Vec<CandidateLocation>,
    pub commits: Vec<CommitRecord>,
    pub suggestion: FixSuggestion,
    pub suggestion_source: SuggestionSource,
    pub generated_at: DateTime<Utc>,
}
