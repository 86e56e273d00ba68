//! Lenient JSON recovery for model output.

use super::{StructuredOutput, ValidationIssue};

/// Pull the JSON object out of a model reply.
///
/// Handles Markdown code fences and prose around the object.
pub fn extract_json(text: &str) -> String {
    let mut text = text.trim();

    // ```json ... ``` wrapper
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.find('\n').map_or(rest, |i| &rest[i + 1..]);
        text = rest.rfind("```").map_or(rest, |end| &rest[..end]).trim();
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        return text[start..=end].to_string();
    }

    text.to_string()
}

/// Remove commas that directly precede `}` or `]`, ignoring string contents.
pub fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Parse, normalize and validate a raw model reply.
///
/// Returns every issue found when the reply does not satisfy the contract.
pub fn parse_response<T: StructuredOutput>(
    raw: &str,
    ctx: &T::Context,
) -> std::result::Result<T, Vec<ValidationIssue>> {
    let candidate = extract_json(raw);

    let mut value: T = match serde_json::from_str(&candidate) {
        Ok(v) => v,
        Err(first) => {
            let repaired = remove_trailing_commas(&candidate);
            serde_json::from_str(&repaired).map_err(|_| {
                vec![ValidationIssue::new(
                    "",
                    format!("response does not match the {} schema: {first}", T::NAME),
                )]
            })?
        }
    };

    value.normalize(ctx);

    let issues = value.validate(ctx);
    if issues.is_empty() {
        Ok(value)
    } else {
        Err(issues)
    }
}
