//! Code generation collaborator.
//!
//! A [`CodeGenerator`] turns a command name and description into candidate
//! command source plus optional test source. Nothing it returns is trusted:
//! every artifact goes through the validator before it reaches disk.

pub mod anthropic;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use anthropic::AnthropicGenerator;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub name: String,
    pub description: String,
}

/// Candidate artifact, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub source: String,
    pub test_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Timeouts, dropped connections, rate limits and server errors.
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Service(String),
    #[error("failed to generate code after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    #[error("generation service returned no code")]
    Empty,
    #[error("code generation is not configured: {0}")]
    NotConfigured(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GenerationError>;
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (```rust) on the opening line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => "",
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

pub fn command_prompt(request: &GenerationRequest) -> String {
    let name = &request.name;
    let description = &request.description;
    format!(
        r#"You are helping to generate a chat bot command written in Rust. Generate the source of one command module with the following details:

Command name: {name}
Description: {description}

Requirements:
1. Define exactly one handler with this signature: `pub async fn {name}_handler(body: &str) -> CoreResult<Option<String>>`
2. `body` is the full, trimmed message text
3. Return `Ok(Some(reply))` to answer, `Ok(None)` for no reply, `Err(CoreError::InvalidInput(..))` for bad input
4. Keep replies under 4000 characters
5. Register the handler with the `command!` macro, arguments in this exact order: name, description, pattern, handler
6. The pattern must match `!{name}` followed by any arguments
7. Do not touch the filesystem, spawn processes or load libraries; only the standard library, `regex` and `rand` are available

Example structure:
```rust
use crate::commands::prelude::*;

command! {{
    name: "{name}",
    description: "{description}",
    pattern: r"^!{name}\s*(.*)$",
    handler: {name}_handler,
}}

pub async fn {name}_handler(body: &str) -> CoreResult<Option<String>> {{
    let args = body.trim_start_matches("!{name}").trim();
    Ok(Some(format!("you said: {{args}}")))
}}
```

Generate ONLY the Rust code, no explanations or markdown."#
    )
}

pub fn test_prompt(request: &GenerationRequest, source: &str) -> String {
    let name = &request.name;
    format!(
        r#"Generate Rust integration tests for this chat bot command:

```rust
{source}
```

Requirements:
1. Import the handler with `use architect::commands::{name}::{name}_handler;`
2. Use `#[tokio::test]` async test functions
3. Test basic functionality and edge cases
4. Do not touch the filesystem or spawn processes

Generate ONLY the Rust test code, no explanations or markdown."#
    )
}

/// Test source used when test generation fails.
pub fn fallback_test(name: &str) -> String {
    format!(
        r#"use architect::commands::{name}::{name}_handler;

#[tokio::test]
async fn {name}_basic() {{
    let reply = {name}_handler("!{name}").await;
    assert!(reply.is_ok());
}}
"#
    )
}
