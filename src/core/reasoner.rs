//! Reasoning collaborator boundary
//!
//! A single request/response text completion: prompt in, completion out.
//! Two adapters ship with the crate: an OpenAI-compatible HTTP endpoint and
//! an external command fed on stdin. Both are bounded by a timeout.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::infra::process::{ProcessError, run_with_timeout};

/// Default bound on one completion call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Hard ceiling regardless of configuration
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("request to {endpoint} failed")]
    Http {
        endpoint: String,
        #[source]
        source: ureq::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("unexpected completion response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// Text completion: `(prompt) -> completion`
pub trait Reasoner: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, ReasonerError>;
}

impl<F> Reasoner for F
where
    F: Fn(&str) -> Result<String, ReasonerError> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> Result<String, ReasonerError> {
        self(prompt)
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.min(MAX_TIMEOUT)
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct HttpReasoner {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpReasoner {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Read the bearer key from `var`; missing is an error
    pub fn with_api_key_from_env(self, var: &str) -> Result<Self, ReasonerError> {
        let key = std::env::var(var).map_err(|_| ReasonerError::MissingApiKey(var.to_string()))?;
        Ok(self.with_api_key(Some(key)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = clamp_timeout(timeout);
        self
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }
}

impl Reasoner for HttpReasoner {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %self.model))]
    fn complete(&self, prompt: &str) -> Result<String, ReasonerError> {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .new_agent();

        let mut request = agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {key}"));
        }

        let http_err = |source| ReasonerError::Http {
            endpoint: self.endpoint.clone(),
            source,
        };
        let mut response = request
            .send(self.request_body(prompt).to_string())
            .map_err(http_err)?;
        let body = response.body_mut().read_to_string().map_err(http_err)?;

        debug!(bytes = body.len(), "completion received");
        extract_completion(&body)
    }
}

/// Pull the completion text out of a chat-completions response body
pub fn extract_completion(body: &str) -> Result<String, ReasonerError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ReasonerError::Malformed(e.to_string()))?;

    let choice = &value["choices"][0];
    choice["message"]["content"]
        .as_str()
        .or_else(|| choice["text"].as_str())
        .map(str::to_string)
        .ok_or_else(|| ReasonerError::Malformed("no choices[0].message.content".to_string()))
}

/// External command that reads the prompt on stdin and prints the completion
#[derive(Debug, Clone)]
pub struct CommandReasoner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReasoner {
    /// `argv[0]` is the program, the rest are its arguments
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = clamp_timeout(timeout);
        self
    }
}

impl Reasoner for CommandReasoner {
    #[instrument(skip_all, fields(program = %self.program))]
    fn complete(&self, prompt: &str) -> Result<String, ReasonerError> {
        let out = run_with_timeout(&self.program, &self.args, None, Some(prompt), self.timeout)?;
        Ok(out.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_reasoner() {
        let echo = |p: &str| -> Result<String, ReasonerError> { Ok(p.to_uppercase()) };
        assert_eq!(echo.complete("hi").unwrap(), "HI");
    }

    #[test]
    fn test_extract_completion_chat_shape() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"rootCause\":\"x\"}"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), r#"{"rootCause":"x"}"#);
    }

    #[test]
    fn test_extract_completion_legacy_shape() {
        let body = r#"{"choices":[{"text":"plain"}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "plain");
    }

    #[test]
    fn test_extract_completion_rejects_other_shapes() {
        assert!(matches!(
            extract_completion(r#"{"error":"quota"}"#),
            Err(ReasonerError::Malformed(_))
        ));
        assert!(extract_completion("not json").is_err());
    }

    #[test]
    fn test_timeouts_are_clamped() {
        let r = HttpReasoner::new("http://localhost:1", "m").with_timeout(Duration::from_secs(3600));
        assert_eq!(r.timeout, MAX_TIMEOUT);
    }

    #[test]
    fn test_request_body_shape() {
        let body = HttpReasoner::new("http://x", "gpt-test").request_body("hello");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_missing_api_key_env() {
        let r = HttpReasoner::new("http://x", "m")
            .with_api_key_from_env("FAULTLINE_TEST_KEY_THAT_IS_NOT_SET");
        assert!(matches!(r, Err(ReasonerError::MissingApiKey(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_reasoner_round_trip() {
        let argv = vec!["cat".to_string()];
        let r = CommandReasoner::from_argv(&argv).unwrap();
        assert_eq!(r.complete("  answer \n").unwrap(), "answer");
    }

    #[test]
    fn test_command_reasoner_needs_program() {
        assert!(CommandReasoner::from_argv(&[]).is_none());
    }
}
