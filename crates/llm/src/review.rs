//! Shape check for review-mode completions.

use coachdesk_models::Scorecard;
use validator::Validate;

/// Parse and validate a scorecard from raw completion text.
///
/// Tolerates a surrounding markdown fence or leading prose; everything else
/// (missing field, wrong type, out-of-range score) is an `Err` carrying a
/// human-readable reason.
pub fn parse_scorecard(raw: &str) -> Result<Scorecard, String> {
    let json = extract_object(raw).ok_or_else(|| "no JSON object in reply".to_string())?;

    let scorecard: Scorecard =
        serde_json::from_str(json).map_err(|e| format!("invalid scorecard: {}", e))?;

    scorecard
        .validate()
        .map_err(|e| format!("invalid scorecard: {}", e))?;

    Ok(scorecard)
}

/// Slice from the first `{` to its matching `}`, skipping braces in strings
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
