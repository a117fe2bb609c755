//! Conversion of heterogeneous JSON values into sample values.

use serde_json::Value;

/// Semantic hint for fields whose string values encode a boolean state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticHint {
    /// VM power state: `on` is 1, `off` is 0.
    PowerState,
    /// Generic enabled/disabled flag.
    Enabled,
}

impl SemanticHint {
    /// String variants that map to 1.0.
    pub fn true_variants(self) -> &'static [&'static str] {
        match self {
            SemanticHint::PowerState => &["on"],
            SemanticHint::Enabled => &["true", "enabled", "yes", "active"],
        }
    }

    /// String variants that map to 0.0.
    pub fn false_variants(self) -> &'static [&'static str] {
        match self {
            SemanticHint::PowerState => &["off"],
            SemanticHint::Enabled => &["false", "disabled", "no", "inactive"],
        }
    }

    fn classify(self, s: &str) -> Option<f64> {
        let s = s.trim();
        if self.true_variants().iter().any(|v| v.eq_ignore_ascii_case(s)) {
            Some(1.0)
        } else if self.false_variants().iter().any(|v| v.eq_ignore_ascii_case(s)) {
            Some(0.0)
        } else {
            None
        }
    }
}

/// Converts a raw value into a sample value.
///
/// Returns `None` when the value has no numeric representation; callers skip
/// the series for that entity instead of emitting a placeholder.
pub fn coerce(value: &Value, hint: Option<SemanticHint>) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            if let Some(v) = hint.and_then(|h| h.classify(s)) {
                return Some(v);
            }
            s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Renders a raw value as a label value.
///
/// Strings are used verbatim, null becomes the empty string and everything
/// else uses its JSON text.
pub fn label_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
