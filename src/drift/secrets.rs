//! Secret detection in record payloads
//!
//! The drift monitor treats any credential stored in the memory fabric as a
//! critical governance violation. Detection is a pluggable strategy; the
//! default combines field-name heuristics with regex value patterns.

use crate::config::{DriftConfig, SecretRule};
use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;

/// A secret-shaped field or value inside a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFinding {
    /// JSON path of the offending value, e.g. `$.config.apiKey`
    pub path: String,
    /// Rule that matched (`field_name` for name heuristics)
    pub rule: String,
    /// Redacted preview of the value
    pub redacted: String,
}

/// Strategy for finding secrets in a JSON payload
pub trait SecretDetector: Send + Sync {
    fn scan(&self, value: &Value) -> Vec<SecretFinding>;
}

struct CompiledRule {
    name: String,
    pattern: Regex,
}

/// Regex and field-name based detector
pub struct RegexSecretDetector {
    rules: Vec<CompiledRule>,
    field_names: Vec<String>,
    max_depth: usize,
}

impl RegexSecretDetector {
    /// Create a detector from value rules and field-name fragments
    pub fn new(rules: Vec<SecretRule>, field_names: Vec<String>, max_depth: usize) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Config(format!(
                        "Invalid regex pattern for secret rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok(CompiledRule {
                    name: rule.name,
                    pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            field_names: field_names.iter().map(|f| normalize_field(f)).collect(),
            max_depth,
        })
    }

    pub fn from_config(config: &DriftConfig) -> Result<Self> {
        Self::new(
            config.secret_rules.clone(),
            config.secret_field_names.clone(),
            config.max_scan_depth,
        )
    }

    fn is_secret_field(&self, name: &str) -> bool {
        let normalized = normalize_field(name);
        self.field_names.iter().any(|f| normalized.contains(f.as_str()))
    }

    fn walk(&self, value: &Value, path: &str, depth: usize, out: &mut Vec<SecretFinding>) {
        if depth > self.max_depth {
            return;
        }
        match value {
            Value::Object(map) => {
                for (name, child) in map {
                    let child_path = format!("{}.{}", path, name);
                    if let Value::String(s) = child {
                        if self.is_secret_field(name) && looks_like_credential(s) {
                            out.push(SecretFinding {
                                path: child_path.clone(),
                                rule: "field_name".to_string(),
                                redacted: redact(s),
                            });
                        }
                    }
                    self.walk(child, &child_path, depth + 1, out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    self.walk(child, &format!("{}[{}]", path, i), depth + 1, out);
                }
            }
            Value::String(s) => {
                for rule in &self.rules {
                    if let Some(m) = rule.pattern.find(s) {
                        out.push(SecretFinding {
                            path: path.to_string(),
                            rule: rule.name.clone(),
                            redacted: redact(m.as_str()),
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

impl SecretDetector for RegexSecretDetector {
    fn scan(&self, value: &Value) -> Vec<SecretFinding> {
        let mut findings = Vec::new();
        self.walk(value, "$", 0, &mut findings);
        findings
    }
}

fn normalize_field(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Values under a secret-named field that are references, not credentials.
fn looks_like_credential(value: &str) -> bool {
    let v = value.trim();
    if v.chars().count() < 8 || v.chars().all(|c| c == '*') {
        return false;
    }
    let lower = v.to_ascii_lowercase();
    !(v.starts_with("${")
        || (v.starts_with('<') && v.ends_with('>'))
        || lower.starts_with("env:")
        || lower.starts_with("vault:")
        || lower.contains("redacted"))
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{}****", prefix)
}
