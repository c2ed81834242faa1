use serde_json::Value;
use tracing::warn;

use crate::genetics::Rule;

/// Strip a surrounding markdown code fence, if any.
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Extract rules from a completion. Accepts a JSON array of rules or an
/// object with a `rules` array, optionally fenced or surrounded by prose.
/// Entries that are not valid rules are skipped.
pub fn parse_rule_suggestions(text: &str) -> Vec<Rule> {
    let body = unfence(text);

    let parsed = serde_json::from_str::<Value>(body).ok().or_else(|| {
        let start = body.find('[')?;
        let end = body.rfind(']')?;
        (start < end)
            .then(|| serde_json::from_str::<Value>(&body[start..=end]).ok())
            .flatten()
    });

    let items = match parsed {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut obj)) => match obj.remove("rules") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => {
            warn!("No rule list found in completion");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Rule>(item) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!("Skipping malformed rule suggestion: {}", e);
                None
            }
        })
        .collect()
}
