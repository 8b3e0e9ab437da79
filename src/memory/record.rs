//! Memory records: the unit of the memory fabric
//!
//! A record is identified by `id`. `scope` + `key` need not be unique.
//! Records are never rewritten once archived; only the `_retired` overlay
//! may be applied afterwards.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Tag and value key of the retirement overlay
pub const RETIRED_MARKER: &str = "_retired";

/// Scope kind without the project id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Agent,
    Project,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Agent => "agent",
            ScopeKind::Project => "project",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition a record lives in.
///
/// Serialised as `"global"`, `"agent"` or `"project:<id>"`. A bare
/// `"project"` is accepted for imported documents; the project id is then
/// inferred from tags or the key (see [`MemoryRecord::project_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Agent,
    Project(String),
}

impl Scope {
    /// Project scope for the given id
    pub fn project(id: impl Into<String>) -> Self {
        Scope::Project(id.into())
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Global => ScopeKind::Global,
            Scope::Agent => ScopeKind::Agent,
            Scope::Project(_) => ScopeKind::Project,
        }
    }

    /// Backend collection holding records of this scope.
    pub fn collection(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Agent => "agent".to_string(),
            Scope::Project(id) if id.is_empty() => "project-unassigned".to_string(),
            Scope::Project(id) => format!("project-{}", sanitize_segment(id)),
        }
    }

    /// Whether a backend collection name is a record partition.
    pub fn is_partition(collection: &str) -> bool {
        collection == "global" || collection == "agent" || collection.starts_with("project-")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Agent => f.write_str("agent"),
            Scope::Project(id) if id.is_empty() => f.write_str("project"),
            Scope::Project(id) => write!(f, "project:{}", id),
        }
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "global" => Ok(Scope::Global),
            "agent" => Ok(Scope::Agent),
            "project" => Ok(Scope::Project(String::new())),
            other => match other.strip_prefix("project:") {
                Some(id) => Ok(Scope::Project(id.trim().to_string())),
                None => Err(Error::Schema(format!("Unknown scope: {}", other))),
            },
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Replace characters that are unsafe in a file or collection name.
pub(crate) fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A single entry in the memory fabric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    pub scope: Scope,
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    /// `None` when the stored document had no usable numeric version
    #[serde(default, deserialize_with = "lenient_version")]
    pub version: Option<i64>,
}

fn lenient_version<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    })
}

impl MemoryRecord {
    /// Build a fresh record at version 1.
    pub fn new(
        scope: Scope,
        key: impl Into<String>,
        value: Value,
        tags: impl IntoIterator<Item = impl Into<String>>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scope,
            key: key.into(),
            value,
            tags: tags.into_iter().map(Into::into).collect(),
            created_at: now,
            updated_at: now,
            created_by: created_by.into(),
            version: Some(1),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether any tag is in `tags`.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }

    /// Whether the retirement overlay is applied.
    pub fn is_retired(&self) -> bool {
        self.has_tag(RETIRED_MARKER)
            || self.value.get(RETIRED_MARKER).and_then(Value::as_bool) == Some(true)
    }

    /// Look up a string field of the value.
    pub fn value_str(&self, field: &str) -> Option<&str> {
        self.value.get(field).and_then(Value::as_str)
    }

    /// Human-readable description of the payload.
    ///
    /// Tries `description`, `summary`, `title`, `lesson`, then a bare string
    /// value.
    pub fn description(&self) -> Option<&str> {
        ["description", "summary", "title", "lesson"]
            .iter()
            .find_map(|field| self.value_str(field))
            .or_else(|| self.value.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Project the record belongs to.
    ///
    /// Uses the scope id, then a `project:<id>` tag, then a `<id>/...` or
    /// `<id>:...` key prefix.
    pub fn project_id(&self) -> Option<String> {
        if let Scope::Project(id) = &self.scope {
            if !id.is_empty() {
                return Some(id.clone());
            }
        }
        if let Some(tag) = self.tags.iter().find_map(|t| t.strip_prefix("project:")) {
            if !tag.is_empty() {
                return Some(tag.to_string());
            }
        }
        if self.scope.kind() == ScopeKind::Project {
            return self
                .key
                .split(['/', ':'])
                .next()
                .filter(|prefix| !prefix.is_empty() && *prefix != self.key)
                .map(str::to_string);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MemoryRecord {
        MemoryRecord::new(
            Scope::project("alpha"),
            "alpha/login-bug",
            json!({"description": "Login fails on refresh"}),
            ["issue", "bug"],
            "builder",
            Utc::now(),
        )
    }

    #[test]
    fn test_scope_round_trip() {
        for raw in ["global", "agent", "project:alpha"] {
            let scope: Scope = raw.parse().unwrap();
            assert_eq!(scope.to_string(), raw);
        }
        assert!("team".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_collection_is_filesystem_safe() {
        assert_eq!(Scope::project("a/b c").collection(), "project-a_b_c");
        assert!(Scope::is_partition("project-alpha"));
        assert!(!Scope::is_partition("knowledge"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = sample();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["scope"], "project:alpha");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("createdBy").is_some());
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn test_lenient_version() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["version"] = json!("one");
        let record: MemoryRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.version, None);

        json["version"] = json!(0);
        let record: MemoryRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.version, Some(0));

        json.as_object_mut().unwrap().remove("version");
        let record: MemoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.version, None);
    }

    #[test]
    fn test_retired_overlay() {
        let mut record = sample();
        assert!(!record.is_retired());
        record.value["_retired"] = json!(true);
        assert!(record.is_retired());

        let mut record = sample();
        record.tags.insert(RETIRED_MARKER.to_string());
        assert!(record.is_retired());
    }

    #[test]
    fn test_project_id_inference() {
        assert_eq!(sample().project_id().as_deref(), Some("alpha"));

        let mut record = sample();
        record.scope = Scope::Project(String::new());
        record.key = "beta/deploy".to_string();
        assert_eq!(record.project_id().as_deref(), Some("beta"));

        record.tags.insert("project:gamma".to_string());
        assert_eq!(record.project_id().as_deref(), Some("gamma"));

        let global = MemoryRecord::new(Scope::Global, "x/y", json!({}), ["note"], "t", Utc::now());
        assert_eq!(global.project_id(), None);
    }

    #[test]
    fn test_description_fallbacks() {
        let mut record = sample();
        assert_eq!(record.description(), Some("Login fails on refresh"));
        record.value = json!({"title": "Title only"});
        assert_eq!(record.description(), Some("Title only"));
        record.value = json!("plain text");
        assert_eq!(record.description(), Some("plain text"));
        record.value = json!({"count": 3});
        assert_eq!(record.description(), None);
    }
}
