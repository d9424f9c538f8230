//! Stack-trace parsing
//!
//! Turn raw stack-trace text into structured frames, top frame first.
//! Each line is offered to an ordered list of frame grammars; the first
//! grammar that recognizes the line claims it. Unrecognized lines are
//! skipped.
//!
//! The default registry knows Java and JS/TS frames. Further dialects
//! (e.g. Python tracebacks) are opt-in registrations.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;

use crate::core::model::StackFrame;

/// Java: `at com.acme.Foo.bar(Foo.java:42)`, optional JPMS module prefix
static JAVA_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+(?:[\w$.@-]*/+)?([\w$.<>]+)\(([^():]+):(\d+)\)")
        .expect("static regex is valid")
});

/// JS/TS: `at doThing (src/utils.js:10:5)`
static JS_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bat\s+(?:async\s+)?(?:new\s+)?([^\s()]+)(?:\s+\[as\s+[^\]]+\])?\s+\((.+?):(\d+):(\d+)\)",
    )
    .expect("static regex is valid")
});

/// Python: `File "/app/views.py", line 12, in handler`
static PY_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File "([^"]+)", line (\d+)(?:, in (\S+))?"#).expect("static regex is valid")
});

/// One stack-trace dialect
pub trait FrameGrammar: Send + Sync
{
    /// Frames recognized on a single line, in order of appearance
    fn parse_line(
        &self,
        line: &str,
    ) -> Vec<StackFrame>;

    /// Registry name for this grammar
    fn name(&self) -> &'static str;
}

/// Java/JVM frames
pub struct JavaGrammar;

impl FrameGrammar for JavaGrammar
{
    fn parse_line(
        &self,
        line: &str,
    ) -> Vec<StackFrame>
    {
        JAVA_FRAME
            .captures_iter(line)
            .filter_map(|caps| {
                let qualified = caps.get(1)?.as_str();
                let line_number = parse_line_number(caps.get(3)?.as_str())?;

                let (class_name, function_name) = match qualified.rfind('.')
                {
                    Some(dot) => (Some(qualified[..dot].to_string()), &qualified[dot + 1..]),
                    None => (None, qualified),
                };
                if function_name.is_empty()
                {
                    return None;
                }

                Some(StackFrame {
                    file_name: caps
                        .get(2)?
                        .as_str()
                        .trim()
                        .to_string(),
                    line_number,
                    function_name: function_name.to_string(),
                    class_name,
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str
    {
        "java"
    }
}

/// Node/V8 frames (JavaScript and TypeScript)
pub struct JsGrammar;

impl FrameGrammar for JsGrammar
{
    fn parse_line(
        &self,
        line: &str,
    ) -> Vec<StackFrame>
    {
        JS_FRAME
            .captures_iter(line)
            .filter_map(|caps| {
                Some(StackFrame {
                    file_name: base_name(caps.get(2)?.as_str()).to_string(),
                    line_number: parse_line_number(caps.get(3)?.as_str())?,
                    function_name: caps
                        .get(1)?
                        .as_str()
                        .to_string(),
                    class_name: None,
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str
    {
        "js"
    }
}

/// CPython traceback frames. Not registered by default.
pub struct PythonGrammar;

impl FrameGrammar for PythonGrammar
{
    fn parse_line(
        &self,
        line: &str,
    ) -> Vec<StackFrame>
    {
        PY_FRAME
            .captures_iter(line)
            .filter_map(|caps| {
                Some(StackFrame {
                    file_name: base_name(caps.get(1)?.as_str()).to_string(),
                    line_number: parse_line_number(caps.get(2)?.as_str())?,
                    function_name: caps
                        .get(3)
                        .map_or("<module>", |m| m.as_str())
                        .to_string(),
                    class_name: None,
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str
    {
        "python"
    }
}

/// Look up an opt-in grammar by registry name
pub fn grammar_by_name(name: &str) -> Option<Box<dyn FrameGrammar>>
{
    match name
    {
        "java" => Some(Box::new(JavaGrammar)),
        "js" | "javascript" | "typescript" => Some(Box::new(JsGrammar)),
        "python" => Some(Box::new(PythonGrammar)),
        _ => None,
    }
}

/// True when any built-in grammar recognizes a frame on `line`
pub fn is_frame_line(line: &str) -> bool
{
    line.trim_start()
        .starts_with("at ")
        || [&JavaGrammar as &dyn FrameGrammar, &JsGrammar, &PythonGrammar]
            .iter()
            .any(|g| {
                !g.parse_line(line)
                    .is_empty()
            })
}

/// Ordered registry of grammars
pub struct StackTraceParser
{
    grammars: Vec<Box<dyn FrameGrammar>>,
}

impl Default for StackTraceParser
{
    fn default() -> Self
    {
        Self { grammars: vec![Box::new(JavaGrammar), Box::new(JsGrammar)] }
    }
}

impl StackTraceParser
{
    /// Parser with exactly the given grammars, tried in order
    pub fn with_grammars(grammars: Vec<Box<dyn FrameGrammar>>) -> Self
    {
        Self { grammars }
    }

    /// Register one more grammar after the existing ones
    pub fn register(
        mut self,
        grammar: Box<dyn FrameGrammar>,
    ) -> Self
    {
        self.grammars
            .push(grammar);
        self
    }

    /// Default registry plus named extras (config `stack_trace.extra_grammars`)
    pub fn with_extra_names(extra: &[String]) -> Result<Self>
    {
        let mut parser = Self::default();
        for name in extra
        {
            if parser
                .grammar_names()
                .contains(&name.as_str())
            {
                continue;
            }
            match grammar_by_name(name)
            {
                Some(g) => parser = parser.register(g),
                None => bail!("Unknown stack-trace grammar: {}", name),
            }
        }
        Ok(parser)
    }

    /// Names of registered grammars, in order
    pub fn grammar_names(&self) -> Vec<&'static str>
    {
        self.grammars
            .iter()
            .map(|g| g.name())
            .collect()
    }

    /// Parse a trace. Never fails; unrecognized text yields no frames.
    pub fn parse(
        &self,
        text: &str,
    ) -> Vec<StackFrame>
    {
        let mut frames = Vec::new();

        for line in text.lines()
        {
            // First grammar that recognizes the line claims it
            if let Some(found) = self
                .grammars
                .iter()
                .map(|g| g.parse_line(line))
                .find(|f| !f.is_empty())
            {
                frames.extend(found);
            }
        }

        frames
    }
}

/// Frames must point at a real line
fn parse_line_number(s: &str) -> Option<usize>
{
    s.parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
}

/// Strip directories, URL schemes and bundler query suffixes
fn base_name(path: &str) -> &str
{
    let path = path
        .split('?')
        .next()
        .unwrap_or(path);
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
}
