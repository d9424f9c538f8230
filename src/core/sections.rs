//! Heuristic section splitting for free-text bug descriptions.
//!
//! Recognizes bilingual (English/Chinese) headings such as "Steps to
//! Reproduce" / "复现步骤" and collects the lines under each one. The parse is
//! best-effort: unknown text is ignored and missing sections stay empty.

use serde::{Deserialize, Serialize};

use crate::core::stack_trace::is_frame_line;

/// Longest heading (text before the first colon) still treated as a heading
const MAX_HEADING_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field
{
    Steps,
    Expected,
    Actual,
    Environment,
    StackTrace,
}

/// Synonyms per field, checked in this order. First hit wins.
const HEADINGS: &[(Field, &[&str])] = &[
    (
        Field::Steps,
        &[
            "steps to reproduce",
            "steps to reproduction",
            "reproduction steps",
            "how to reproduce",
            "repro steps",
            "重现步骤",
            "复现步骤",
        ],
    ),
    (
        Field::Expected,
        &[
            "expected behavior",
            "expected behaviour",
            "expected result",
            "expected",
            "期望结果",
            "预期结果",
            "期望行为",
            "预期",
        ],
    ),
    (
        Field::Actual,
        &[
            "actual behavior",
            "actual behaviour",
            "actual result",
            "actual",
            "实际结果",
            "实际行为",
            "实际",
        ],
    ),
    (Field::Environment, &["environment", "运行环境", "环境"]),
    (
        Field::StackTrace,
        &["stack trace", "stacktrace", "traceback", "异常堆栈", "堆栈信息", "堆栈"],
    ),
];

/// Sections pulled out of a description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSections
{
    pub steps_to_reproduce: Vec<String>,
    pub expected_behavior: String,
    pub actual_behavior: String,
    pub environment: String,
    pub stack_trace_text: Option<String>,
}

/// Splits descriptions into sections
pub struct IssueTextExtractor;

impl IssueTextExtractor
{
    /// Split `raw` into known sections. Never fails.
    pub fn extract(raw: &str) -> ExtractedSections
    {
        let mut steps = Vec::new();
        let mut expected = Vec::new();
        let mut actual = Vec::new();
        let mut environment = Vec::new();
        let mut trace = Vec::new();

        let mut current: Option<Field> = None;

        for raw_line in raw.lines()
        {
            let line = raw_line.trim();

            // List items are content, never headings; so are frames inside a trace
            let in_trace = current == Some(Field::StackTrace);
            if !is_list_item(line)
                && !(in_trace && is_frame_line(line))
                && let Some((field, rest)) = match_heading(line)
            {
                current = Some(field);
                if rest.is_empty()
                {
                    continue;
                }

                let bucket = match field
                {
                    Field::Steps => &mut steps,
                    Field::Expected => &mut expected,
                    Field::Actual => &mut actual,
                    Field::Environment => &mut environment,
                    Field::StackTrace => &mut trace,
                };
                bucket.push(rest.to_string());
                continue;
            }

            if line.is_empty()
            {
                continue;
            }

            match current
            {
                Some(Field::Steps) => steps.push(line.to_string()),
                Some(Field::Expected) => expected.push(line.to_string()),
                Some(Field::Actual) => actual.push(line.to_string()),
                Some(Field::Environment) => environment.push(line.to_string()),
                // Keep indentation, frames are often nested
                Some(Field::StackTrace) => trace.push(
                    raw_line
                        .trim_end()
                        .to_string(),
                ),
                None =>
                {}
            }
        }

        ExtractedSections {
            steps_to_reproduce: steps,
            expected_behavior: expected.join("\n"),
            actual_behavior: actual.join("\n"),
            environment: environment.join("\n"),
            stack_trace_text: if trace.is_empty() { None } else { Some(trace.join("\n")) },
        }
    }
}

/// `- item`, `* item`, `1. item`, `2) item`
fn is_list_item(line: &str) -> bool
{
    if line.starts_with('-') || line.starts_with("* ")
    {
        return true;
    }

    let digits = line
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();

    digits > 0 && matches!(line[digits..].chars().next(), Some('.') | Some(')'))
}

/// Match a heading line. Returns the field and any text after the colon.
fn match_heading(line: &str) -> Option<(Field, &str)>
{
    let (head, rest) = match line.find([':', '：'])
    {
        Some(pos) =>
        {
            let sep_len = line[pos..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            (&line[..pos], line[pos + sep_len..].trim())
        }
        None => (line, ""),
    };

    // Markdown decorations around the heading
    let head = head.trim_matches(|c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace());
    if head.is_empty()
        || head
            .chars()
            .count()
            > MAX_HEADING_CHARS
    {
        return None;
    }

    let lowered = head.to_lowercase();
    HEADINGS
        .iter()
        .find(|(_, synonyms)| {
            synonyms
                .iter()
                .any(|s| lowered.contains(s))
        })
        .map(|(field, _)| (*field, rest))
}
