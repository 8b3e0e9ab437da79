//! Opposite-action contradiction heuristic
//!
//! Architecture decisions are scanned for directives such as
//! "require module billing" and "remove module billing". A require and a
//! remove directive on the same component contradict each other.

use crate::config::ContradictionConfig;
use crate::error::{Error, Result};
use regex::Regex;

/// Directive polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Require,
    Remove,
}

/// A parsed directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub action: Action,
    pub component: String,
}

/// How closely the component names matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchStrength {
    /// One name contains the other
    Substring,
    /// Same name, ignoring case
    Exact,
}

/// A detected contradiction between two sets of statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contradiction {
    pub component: String,
    pub strength: MatchStrength,
    /// e.g. "require billing vs remove billing"
    pub summary: String,
}

/// Strategy for detecting contradicting decisions
pub trait ContradictionDetector: Send + Sync {
    /// Strongest contradiction between the statements of two decisions.
    fn detect(&self, left: &[&str], right: &[&str]) -> Option<Contradiction>;
}

/// Regex-based opposite-action detector
pub struct RegexContradictionDetector {
    require: Regex,
    remove: Regex,
}

impl RegexContradictionDetector {
    pub fn new(config: &ContradictionConfig) -> Result<Self> {
        Ok(Self {
            require: directive_regex(&config.require_verbs)?,
            remove: directive_regex(&config.remove_verbs)?,
        })
    }

    /// Parse every directive in `statement`.
    pub fn directives(&self, statement: &str) -> Vec<Directive> {
        let mut out = Vec::new();
        for (regex, action) in [(&self.require, Action::Require), (&self.remove, Action::Remove)] {
            for caps in regex.captures_iter(statement) {
                if let Some(component) = caps.get(1) {
                    out.push(Directive {
                        action,
                        component: component.as_str().to_string(),
                    });
                }
            }
        }
        out
    }

    fn collect(&self, statements: &[&str]) -> Vec<Directive> {
        statements.iter().flat_map(|s| self.directives(s)).collect()
    }
}

impl ContradictionDetector for RegexContradictionDetector {
    fn detect(&self, left: &[&str], right: &[&str]) -> Option<Contradiction> {
        let left = self.collect(left);
        let right = self.collect(right);
        let mut best: Option<Contradiction> = None;

        for a in &left {
            for b in &right {
                if a.action == b.action {
                    continue;
                }
                let Some(strength) = compare(&a.component, &b.component) else {
                    continue;
                };
                if best.as_ref().map_or(true, |c| strength > c.strength) {
                    best = Some(Contradiction {
                        component: a.component.clone(),
                        strength,
                        summary: format!(
                            "{} {} vs {} {}",
                            verb(a.action),
                            a.component,
                            verb(b.action),
                            b.component
                        ),
                    });
                }
            }
        }
        best
    }
}

fn verb(action: Action) -> &'static str {
    match action {
        Action::Require => "require",
        Action::Remove => "remove",
    }
}

fn compare(a: &str, b: &str) -> Option<MatchStrength> {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return Some(MatchStrength::Exact);
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    (short.len() >= 3 && long.contains(short.as_str())).then_some(MatchStrength::Substring)
}

fn directive_regex(verbs: &[String]) -> Result<Regex> {
    if verbs.is_empty() {
        return Err(Error::Config(
            "contradiction verb list must not be empty".to_string(),
        ));
    }
    let mut verbs: Vec<&String> = verbs.iter().collect();
    // Longest first so "requires" is preferred over "require"
    verbs.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = verbs
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?i)\b(?:{})\s+(?:the\s+)?(?:(?:module|component|service|library|package)\s+)?([A-Za-z0-9][A-Za-z0-9_.\-/]*)",
        alternation
    );
    Regex::new(&pattern).map_err(|e| Error::Config(format!("Invalid contradiction verbs: {}", e)))
}
