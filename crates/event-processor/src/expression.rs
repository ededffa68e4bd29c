//! EXPRESSION-mode formula evaluation.
//!
//! A stored formula looks like `{100} and ({101} or {102})`. Each
//! `{conditionid}` token is replaced in-place with `true` or `false`
//! (the evaluator's boolean literals, analogous to the original's
//! in-buffer `'1'`/`'0'` substitution), `and`/`or` are rewritten to
//! `&&`/`||`, and the result is handed to an arithmetic/boolean
//! expression evaluator.

use evalexpr::Value;
use std::collections::HashMap;

/// Epsilon used when the evaluated expression yields a float, mirroring
/// the original's `zbx_double_compare` tolerance against zero.
const EPSILON: f64 = 1e-6;

/// Evaluate `formula`, substituting each `{conditionid}` with its match
/// result from `results`. A `{conditionid}` missing from `results` is
/// treated as a no-match, the same fallback the per-condition evaluator
/// uses for any other configuration-class failure.
pub fn evaluate_formula(formula: &str, results: &HashMap<i64, bool>) -> anyhow::Result<bool> {
    let substituted = substitute_conditions(formula, results);
    let translated = translate_operators(&substituted);
    let value = evalexpr::eval(&translated)?;
    Ok(match value {
        Value::Boolean(b) => b,
        Value::Int(n) => n != 0,
        Value::Float(f) => f.abs() > EPSILON,
        other => anyhow::bail!("formula evaluated to unsupported type: {other:?}"),
    })
}

fn substitute_conditions(formula: &str, results: &HashMap<i64, bool>) -> String {
    let mut out = String::with_capacity(formula.len());
    let bytes = formula.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = formula[i..].find('}') {
                let end = i + end;
                let token = &formula[i + 1..end];
                if let Ok(conditionid) = token.parse::<i64>() {
                    let matched = results.get(&conditionid).copied().unwrap_or(false);
                    let replacement = if matched { "true" } else { "false" };
                    let token_width = end + 1 - i;
                    out.push_str(replacement);
                    for _ in 0..token_width.saturating_sub(replacement.len()) {
                        out.push(' ');
                    }
                    i = end + 1;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn translate_operators(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    for token in tokenize_words(expr) {
        match token {
            "and" => out.push_str("&&"),
            "or" => out.push_str("||"),
            other => out.push_str(other),
        }
    }
    out
}

/// Splits `expr` preserving whitespace and punctuation as their own
/// tokens, splitting alphabetic runs (`and`, `or`) into words so they can
/// be translated without touching digits inside braces-free numeric
/// literals.
fn tokenize_words(expr: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let bytes = expr.as_bytes();
    let mut start = 0;
    let mut in_word = false;
    for (i, &b) in bytes.iter().enumerate() {
        let is_alpha = b.is_ascii_alphabetic();
        if is_alpha != in_word {
            if i > start {
                tokens.push(&expr[start..i]);
            }
            start = i;
            in_word = is_alpha;
        }
    }
    if start < bytes.len() {
        tokens.push(&expr[start..]);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_matched_and_unmatched_conditions() {
        let mut results = HashMap::new();
        results.insert(100, true);
        results.insert(101, false);
        results.insert(102, true);
        let out = substitute_conditions("{100} and ({101} or {102})", &results);
        assert_eq!(out, "true and (false or true)");
    }

    #[test]
    fn translates_and_or_keywords() {
        assert_eq!(
            translate_operators("true and (false or true)"),
            "true && (false || true)"
        );
    }

    #[test]
    fn scenario_and_of_or_evaluates_true() {
        let mut results = HashMap::new();
        results.insert(100, true);
        results.insert(101, false);
        results.insert(102, true);
        assert!(evaluate_formula("{100} and ({101} or {102})", &results).unwrap());
    }

    #[test]
    fn scenario_and_of_or_evaluates_false_when_and_branch_fails() {
        let mut results = HashMap::new();
        results.insert(100, false);
        results.insert(101, false);
        results.insert(102, true);
        assert!(!evaluate_formula("{100} and ({101} or {102})", &results).unwrap());
    }

    #[test]
    fn missing_condition_id_defaults_to_no_match() {
        let results = HashMap::new();
        assert!(!evaluate_formula("{999}", &results).unwrap());
    }
}
