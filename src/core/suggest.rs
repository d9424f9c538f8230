//! Fix-suggestion assembly
//!
//! Builds one prompt from the report, the top candidates and the most
//! telling commits, hands it to the reasoner, and turns the completion into a
//! [`FixSuggestion`]. Completions that cannot be parsed degrade to a
//! deterministic fallback; only a failing reasoner call is an error.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::core::model::{
    BugReport, CandidateLocation, CodeChange, CommitRecord, FixSuggestion, SuggestionSource,
    SuggestionType,
};
use crate::core::reasoner::{Reasoner, ReasonerError};

/// Candidates quoted in the prompt
pub const PROMPT_LOCATIONS: usize = 5;

/// Commits quoted in the prompt
pub const PROMPT_COMMITS: usize = 3;

const FALLBACK_STEP: &str = "manual investigation required";
const FALLBACK_TEST: &str = "add regression test";
const FALLBACK_RISK: &str = "needs human review";

const RESPONSE_SCHEMA: &str = r#"Respond with exactly one JSON object and nothing else:
{
  "type": "simple" | "complex",
  "description": "one-line summary of the fix",
  "rootCause": "why the bug happens",
  "fixSteps": ["step", "..."],
  "codeChanges": [{"file": "path", "description": "what changes", "original": "old code", "replacement": "new code"}],
  "testSuggestions": ["test", "..."],
  "risks": ["risk", "..."]
}"#;

/// Outcome of interpreting a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSuggestion
{
    /// The completion carried a valid suggestion
    Structured(FixSuggestion),
    /// The completion was unusable; `reason` says why
    Fallback
    {
        suggestion: FixSuggestion,
        reason: String,
    },
}

impl ParsedSuggestion
{
    pub fn source(&self) -> SuggestionSource
    {
        match self
        {
            Self::Structured(_) => SuggestionSource::Parsed,
            Self::Fallback { .. } => SuggestionSource::Fallback,
        }
    }

    pub fn suggestion(&self) -> &FixSuggestion
    {
        match self
        {
            Self::Structured(s) | Self::Fallback { suggestion: s, .. } => s,
        }
    }

    pub fn into_suggestion(self) -> FixSuggestion
    {
        match self
        {
            Self::Structured(s) | Self::Fallback { suggestion: s, .. } => s,
        }
    }
}

/// Prompt building and completion parsing
#[derive(Debug, Clone)]
pub struct FixSuggestionAssembler
{
    max_locations: usize,
    max_commits: usize,
}

impl Default for FixSuggestionAssembler
{
    fn default() -> Self
    {
        Self { max_locations: PROMPT_LOCATIONS, max_commits: PROMPT_COMMITS }
    }
}

impl FixSuggestionAssembler
{
    /// Ask the reasoner and interpret its answer
    #[instrument(skip_all, fields(issue = %report.issue_key))]
    pub fn assemble(
        &self,
        report: &BugReport,
        locations: &[CandidateLocation],
        commits: &[CommitRecord],
        reasoner: &dyn Reasoner,
    ) -> Result<ParsedSuggestion, ReasonerError>
    {
        let prompt = self.build_prompt(report, locations, commits);
        debug!(chars = prompt.len(), "prompt built");

        let completion = reasoner.complete(&prompt)?;
        let parsed = parse_suggestion(&completion, report, locations);
        if let ParsedSuggestion::Fallback { reason, .. } = &parsed
        {
            warn!(%reason, "completion unusable; using fallback suggestion");
        }
        Ok(parsed)
    }

    /// The exact text sent to the reasoner
    pub fn build_prompt(
        &self,
        report: &BugReport,
        locations: &[CandidateLocation],
        commits: &[CommitRecord],
    ) -> String
    {
        let mut p = String::new();

        p.push_str("You are diagnosing a software defect. Use the evidence below.\n\n");
        let _ = writeln!(p, "## Bug {}", report.issue_key);
        let _ = writeln!(p, "Summary: {}", report.summary);
        let _ = writeln!(p, "Description:\n{}", report.description.trim());

        if !report
            .steps_to_reproduce
            .is_empty()
        {
            let _ = writeln!(
                p,
                "Steps to reproduce:\n{}",
                report
                    .steps_to_reproduce
                    .iter()
                    .join("\n")
            );
        }
        for (label, value) in [
            ("Expected", &report.expected_behavior),
            ("Actual", &report.actual_behavior),
            ("Environment", &report.environment),
        ]
        {
            if !value
                .trim()
                .is_empty()
            {
                let _ = writeln!(p, "{label}: {}", value.trim());
            }
        }

        p.push_str("\n## Suspect locations\n");
        if locations.is_empty()
        {
            p.push_str("(none found)\n");
        }
        for loc in locations
            .iter()
            .take(self.max_locations)
        {
            let _ = writeln!(p, "- {} (score {}) {}", loc.label(), loc.relevance_score, loc.snippet);
        }

        p.push_str("\n## Recent commits\n");
        if commits.is_empty()
        {
            p.push_str("(none found)\n");
        }
        for c in commits
            .iter()
            .sorted_by_key(|c| !c.suspicious)
            .take(self.max_commits)
        {
            let _ = writeln!(p, "- {} {} {}: {}", c.date, c.author, c.hash, c.message);
        }

        p.push('\n');
        p.push_str(RESPONSE_SCHEMA);
        p.push('\n');
        p
    }
}

/// Interpret a completion. Never fails: unusable text yields the fallback.
pub fn parse_suggestion(
    completion: &str,
    report: &BugReport,
    locations: &[CandidateLocation],
) -> ParsedSuggestion
{
    let degrade = |reason: String| ParsedSuggestion::Fallback {
        suggestion: fallback_suggestion(locations),
        reason,
    };

    let Some(snippet) = extract_json_snippet(completion)
    else
    {
        return degrade("no JSON object in completion".to_string());
    };

    let raw: RawSuggestion = match serde_json::from_str(snippet)
    {
        Ok(r) => r,
        Err(err) => return degrade(format!("schema mismatch: {err}")),
    };

    match raw.normalize(report)
    {
        Ok(s) => ParsedSuggestion::Structured(s),
        Err(reason) => degrade(reason),
    }
}

/// Deterministic suggestion used when the completion is unusable
pub fn fallback_suggestion(locations: &[CandidateLocation]) -> FixSuggestion
{
    let root_cause = locations
        .first()
        .map_or_else(
            || "Unknown".to_string(),
            |best| format!("Suspected fault near {}: {}", best.label(), best.snippet),
        );

    FixSuggestion {
        kind: SuggestionType::Complex,
        description: root_cause.clone(),
        root_cause,
        fix_steps: vec![FALLBACK_STEP.to_string()],
        code_changes: None,
        test_suggestions: vec![FALLBACK_TEST.to_string()],
        risks: vec![FALLBACK_RISK.to_string()],
    }
}

/// A fenced ```json block if present, else the outermost `{...}` span
pub fn extract_json_snippet(text: &str) -> Option<&str>
{
    if let Some(start) = text.find("```json")
    {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```")
        {
            let inner = body[..end].trim();
            if !inner.is_empty()
            {
                return Some(inner);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion
{
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(alias = "root_cause")]
    root_cause: String,
    #[serde(alias = "fix_steps")]
    fix_steps: Vec<String>,
    #[serde(default, alias = "code_changes")]
    code_changes: Option<Vec<RawCodeChange>>,
    #[serde(default, alias = "test_suggestions")]
    test_suggestions: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCodeChange
{
    #[serde(alias = "filePath", alias = "file_path")]
    file: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "originalCode", alias = "original_code")]
    original: Option<String>,
    #[serde(default, alias = "suggestedCode", alias = "suggested_code")]
    replacement: Option<String>,
}

impl RawSuggestion
{
    fn normalize(
        self,
        report: &BugReport,
    ) -> Result<FixSuggestion, String>
    {
        let root_cause = self
            .root_cause
            .trim()
            .to_string();
        if root_cause.is_empty()
        {
            return Err("empty rootCause".to_string());
        }

        let fix_steps = non_blank(self.fix_steps);
        if fix_steps.is_empty()
        {
            return Err("no fix steps".to_string());
        }

        let code_changes: Option<Vec<CodeChange>> = self
            .code_changes
            .map(|changes| {
                changes
                    .into_iter()
                    .map(|c| CodeChange {
                        file: c.file,
                        description: c.description,
                        original: c.original,
                        replacement: c.replacement,
                    })
                    .collect()
            });

        let kind = match self
            .kind
            .as_deref()
            .map(|k| {
                k.trim()
                    .to_lowercase()
            })
            .as_deref()
        {
            Some("simple") => SuggestionType::Simple,
            Some("complex") => SuggestionType::Complex,
            _ => infer_kind(&fix_steps, code_changes.as_deref()),
        };

        let description = self
            .description
            .map(|d| {
                d.trim()
                    .to_string()
            })
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| {
                report
                    .summary
                    .clone()
            });

        Ok(FixSuggestion {
            kind,
            description,
            root_cause,
            fix_steps,
            code_changes,
            test_suggestions: or_default(non_blank(self.test_suggestions), FALLBACK_TEST),
            risks: or_default(non_blank(self.risks), FALLBACK_RISK),
        })
    }
}

/// Simple when the fix is short and stays within one file
fn infer_kind(
    steps: &[String],
    changes: Option<&[CodeChange]>,
) -> SuggestionType
{
    let files: BTreeSet<&str> = changes
        .unwrap_or_default()
        .iter()
        .map(|c| c.file.as_str())
        .collect();

    if steps.len() <= 3 && files.len() <= 1
    {
        SuggestionType::Simple
    }
    else
    {
        SuggestionType::Complex
    }
}

fn non_blank(items: Vec<String>) -> Vec<String>
{
    items
        .into_iter()
        .map(|s| {
            s.trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn or_default(
    items: Vec<String>,
    default: &str,
) -> Vec<String>
{
    if items.is_empty() { vec![default.to_string()] } else { items }
}
