//! Schema-constrained model calls with a validation/repair loop.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::schema::{StructuredOutput, ValidationIssue, parse_response};
use crate::util::truncate_chars;

/// Longest slice of a bad reply echoed back to the model during repair
const MAX_ECHOED_REPLY_CHARS: usize = 12_000;

/// A validated response together with how much repair it needed
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    /// Model calls made, including the first one
    pub calls: u32,
}

/// Repair instruction appended after a reply that failed validation
fn repair_prompt(contract: &str, issues: &[ValidationIssue]) -> String {
    let list = issues
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your previous reply did not satisfy the {contract} schema. Problems found:\n{list}\n\n\
         Reply again with the complete corrected JSON object only. Keep every part that was \
         already correct, fix only the problems listed, and do not add commentary."
    )
}

/// Ask the model for a `T`, re-prompting with the validation problems until
/// the reply satisfies the contract or `max_repairs` extra calls are spent.
pub async fn request_structured<T: StructuredOutput>(
    client: &dyn LlmClient,
    messages: Vec<ChatMessage>,
    ctx: &T::Context,
    max_repairs: u32,
) -> Result<Structured<T>> {
    let mut request = ChatRequest::new(messages).with_schema(T::response_schema());
    let total_calls = max_repairs.saturating_add(1);
    let mut last_issues = Vec::new();

    for call in 1..=total_calls {
        let raw = client.complete(&request).await?;

        match parse_response::<T>(&raw, ctx) {
            Ok(value) => {
                if call > 1 {
                    debug!("{} response repaired after {} calls", T::NAME, call);
                }
                return Ok(Structured { value, calls: call });
            }
            Err(issues) => {
                warn!(
                    "{} response failed validation (call {}/{}): {}",
                    T::NAME,
                    call,
                    total_calls,
                    issues
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                );

                if call < total_calls {
                    request
                        .messages
                        .push(ChatMessage::assistant(truncate_chars(&raw, MAX_ECHOED_REPLY_CHARS)));
                    request
                        .messages
                        .push(ChatMessage::user(repair_prompt(T::NAME, &issues)));
                    // Repairs should be conservative
                    request.temperature = Some(0.0);
                }
                last_issues = issues;
            }
        }
    }

    Err(Error::SchemaValidation {
        contract: T::NAME,
        attempts: total_calls,
        issues: last_issues.iter().map(ToString::to_string).collect(),
    })
}
