use serde_json::Value;
use tracing::debug;

use crate::{DiagnosticResponse, FormatError};

/// Coerce a collaborator payload into a `DiagnosticResponse`.
///
/// Accepts the canonical shape, or the canonical shape nested one level under
/// `data` or `result`. Only one level is unwrapped. Apart from checking that
/// `diagnostics` is an array, fields are read as typed. Status and severity
/// labels match case-insensitively and fractional scores are rounded; any
/// other field deviation is `FormatError::Malformed`.
pub fn normalize(raw: &Value) -> Result<DiagnosticResponse, FormatError> {
    let candidate = select_candidate(raw)?;

    match candidate.get("diagnostics") {
        Some(Value::Array(_)) => {}
        _ => return Err(FormatError::DiagnosticsNotSequence),
    }

    serde_json::from_value(candidate.clone()).map_err(|e| FormatError::Malformed(e.to_string()))
}

/// Extract the outermost JSON object from free-form model output and normalize it.
pub fn normalize_text(raw: &str) -> Result<DiagnosticResponse, FormatError> {
    let value = extract_json_object(raw).ok_or(FormatError::UnrecognizedShape)?;
    normalize(&value)
}

/// Find the first `{ ... }` span in `raw` that parses as JSON.
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    if let Ok(val) = serde_json::from_str::<Value>(&raw[start..=end]) {
        return Some(val);
    }
    // Trailing prose with braces; fall back to the first balanced object.
    balanced_object(&raw[start..]).and_then(|s| serde_json::from_str(s).ok())
}

fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
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
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn select_candidate(raw: &Value) -> Result<&Value, FormatError> {
    let Value::Object(map) = raw else {
        return Err(FormatError::UnrecognizedShape);
    };

    if map.contains_key("overall_health_score") && is_present(map.get("diagnostics")) {
        debug!("diagnostic payload is canonical");
        return Ok(raw);
    }
    for key in ["data", "result"] {
        if let Some(nested) = map.get(key).filter(|v| is_present(Some(*v))) {
            debug!(key, "diagnostic payload nested one level");
            return Ok(nested);
        }
    }
    Err(FormatError::UnrecognizedShape)
}

/// Present and truthy: not missing, null, false, zero or the empty string.
fn is_present(val: Option<&Value>) -> bool {
    match val {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
