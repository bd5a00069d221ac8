//! Response validator (§4.5). The model's raw text is parsed once as JSON,
//! then checked against a per-operation shape. Anything that fails is a
//! permanent error (`INVALID_AI_RESPONSE`) — a malformed response will not
//! fix itself on retry, and retrying it would just burn another call against
//! the same prompt.
//!
//! §9 Open Question decision: the persona batch array length check is
//! tolerant rather than exact — at least one persona is accepted, extras
//! beyond the requested count are dropped, and an undershoot only warns
//! via `tracing` rather than failing the call. Feedback and aggregation
//! keep the spec's exact bounds (2..4 key concerns, 5..7 themes) since
//! those aren't covered by the tolerant-alternative language.

use serde::Deserialize;

use crate::error::LlmError;

/// §4.3: "the gateway extracts the first JSON object or array" from the
/// model's free-form text. Models asked to emit bare JSON still sometimes
/// wrap it in a sentence or a markdown fence, so this scans for the first
/// `{` or `[` and returns the text up to its matching closer (bracket
/// depth tracked across the whole string, ignoring bytes inside quoted
/// strings so a `}` in prose data doesn't close early).
pub fn extract_json(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return std::str::from_utf8(&bytes[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_permanent<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<T, LlmError> {
    let json = extract_json(raw)
        .ok_or_else(|| LlmError::Permanent(format!("{what}: no JSON object or array found in response")))?;
    serde_json::from_str(json).map_err(|e| LlmError::Permanent(format!("{what}: not valid JSON ({e})")))
}

#[derive(Debug, Deserialize)]
pub struct PersonaDraft {
    pub name: String,
    pub detailed_description: String,
}

/// §4.5: a non-empty array of `{name, detailed_description}`, both fields
/// non-empty after trimming. `requested_count` drives the tolerant policy:
/// extra elements are truncated away, a shortfall is logged but still
/// accepted.
pub fn validate_persona_batch(raw: &str, requested_count: usize) -> Result<Vec<PersonaDraft>, LlmError> {
    let mut drafts: Vec<PersonaDraft> = parse_permanent(raw, "persona batch response")?;
    if drafts.is_empty() {
        return Err(LlmError::Permanent(
            "persona batch response contained no personas".into(),
        ));
    }
    for draft in &drafts {
        if draft.name.trim().is_empty() {
            return Err(LlmError::Permanent("persona name was empty".into()));
        }
        if draft.detailed_description.trim().is_empty() {
            return Err(LlmError::Permanent(
                "persona detailed_description was empty".into(),
            ));
        }
    }
    if drafts.len() > requested_count {
        drafts.truncate(requested_count);
    } else if drafts.len() < requested_count {
        tracing::warn!(
            requested = requested_count,
            received = drafts.len(),
            "persona batch response returned fewer personas than requested"
        );
    }
    Ok(drafts)
}

#[derive(Debug, Deserialize)]
pub struct FeedbackDraft {
    pub feedback: String,
    pub purchase_intent: i64,
    pub key_concerns: Vec<String>,
}

/// §4.5: `feedback` non-empty, `purchase_intent` an integer in 1..=10,
/// `key_concerns` with 2 to 4 entries.
pub fn validate_feedback(raw: &str) -> Result<FeedbackDraft, LlmError> {
    let draft: FeedbackDraft = parse_permanent(raw, "feedback response")?;
    if draft.feedback.trim().is_empty() {
        return Err(LlmError::Permanent("feedback text was empty".into()));
    }
    if !(1..=10).contains(&draft.purchase_intent) {
        return Err(LlmError::Permanent(format!(
            "purchase_intent {} out of range 1..=10",
            draft.purchase_intent
        )));
    }
    if !(2..=4).contains(&draft.key_concerns.len()) {
        return Err(LlmError::Permanent(format!(
            "key_concerns had {} entries, expected 2 to 4",
            draft.key_concerns.len()
        )));
    }
    Ok(draft)
}

#[derive(Debug, Deserialize)]
pub struct ThemeDraft {
    pub theme: String,
    pub mentions: i64,
}

/// §4.5: 5 to 7 `{theme, mentions >= 1}` entries.
pub fn validate_aggregation(raw: &str) -> Result<Vec<ThemeDraft>, LlmError> {
    let themes: Vec<ThemeDraft> = parse_permanent(raw, "aggregation response")?;
    if !(5..=7).contains(&themes.len()) {
        return Err(LlmError::Permanent(format!(
            "aggregation response had {} themes, expected 5 to 7",
            themes.len()
        )));
    }
    for theme in &themes {
        if theme.theme.trim().is_empty() {
            return Err(LlmError::Permanent("theme name was empty".into()));
        }
        if theme.mentions < 1 {
            return Err(LlmError::Permanent(format!(
                "theme \"{}\" had non-positive mentions {}",
                theme.theme, theme.mentions
            )));
        }
    }
    Ok(themes)
}
