use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Irrecoverable problems with a features document
#[derive(Debug, Error)]
pub enum FeaturesError {
    #[error("Features document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Features document must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Unparseable repository identifier: {0}")]
    InvalidRepository(String),
}

/// Repository identifier in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name`, an https clone URL or an ssh remote
    pub fn parse(raw: &str) -> Result<Self, FeaturesError> {
        static REPO_RE: OnceLock<Regex> = OnceLock::new();
        let re = REPO_RE.get_or_init(|| {
            Regex::new(
                r"^(?:(?:https?://|git@)[A-Za-z0-9.\-]+[/:])?([A-Za-z0-9_.\-]+)/([A-Za-z0-9_.\-]+?)(?:\.git)?/?$",
            )
            .expect("repository pattern is valid")
        });

        let trimmed = raw.trim();
        let caps = re
            .captures(trimmed)
            .ok_or_else(|| FeaturesError::InvalidRepository(raw.to_string()))?;

        Ok(Self::new(&caps[1], &caps[2]))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Container and deployment indicators reported by the analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerIndicators {
    pub dockerfile: bool,
    pub compose: bool,
    pub registry: Option<String>,
}

/// Existing CI configuration in the repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiIndicators {
    pub workflow_count: u32,
}

/// Canonical evidence about one repository
///
/// Produced once per analysis by [`FeaturesDocument::from_value`] and read-only
/// afterwards. Every collection may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturesDocument {
    pub repository: Option<RepoId>,
    pub detected_files: Vec<String>,
    pub file_type_counts: BTreeMap<String, u64>,
    /// Language name to share of repository bytes, in percent
    pub languages: BTreeMap<String, f64>,
    pub dominant_language: Option<String>,
    pub frameworks: Vec<String>,
    pub package_managers: Vec<String>,
    pub recommended_templates: Vec<String>,
    pub container: ContainerIndicators,
    pub ci: CiIndicators,
    pub description: Option<String>,
    pub default_branch: Option<String>,
    /// Selected file contents keyed by repository path
    pub manifests: BTreeMap<String, String>,
}

impl FeaturesDocument {
    pub fn from_json(raw: &str) -> Result<Self, FeaturesError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Maps an arbitrarily shaped analyzer document onto the canonical fields.
    ///
    /// Keys are accepted in snake_case and camelCase, at the root or inside a
    /// `metadata` object. Optional sections of the wrong type are treated as
    /// absent. Only a non-object root or a malformed repository identifier is
    /// an error.
    pub fn from_value(value: &Value) -> Result<Self, FeaturesError> {
        let root = match value {
            Value::Object(map) => map,
            other => return Err(FeaturesError::NotAnObject(json_type_name(other))),
        };
        let metadata = root.get("metadata").and_then(Value::as_object);
        let lookup = |keys: &[&str]| -> Option<&Value> {
            find_key(root, keys).or_else(|| metadata.and_then(|m| find_key(m, keys)))
        };

        let repository = match lookup(&["repository", "repo", "full_name", "fullName"]) {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_repository(v)?),
        };

        let detected_files = lookup(&["detectedFiles", "detected_files", "files", "tree"])
            .map(string_list)
            .unwrap_or_default();

        let file_type_counts = lookup(&["fileTypes", "file_types", "fileTypeCounts", "file_type_counts"])
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(k, v)| (k.clone(), v.as_u64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();

        let languages = lookup(&["languages", "language_breakdown", "languageBreakdown"])
            .map(language_shares)
            .unwrap_or_default();

        let dominant_language = lookup(&[
            "dominant_language",
            "dominantLanguage",
            "primary_language",
            "primaryLanguage",
            "language",
        ])
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| dominant_from_shares(&languages));

        let mut frameworks = lookup(&["frameworks", "framework"])
            .map(string_list)
            .unwrap_or_default();
        frameworks.extend(lookup(&["runtimes", "runtime"]).map(string_list).unwrap_or_default());

        let package_managers = lookup(&["packageManagers", "package_managers", "packageManager"])
            .map(string_list)
            .unwrap_or_default();

        let recommended_templates = lookup(&[
            "recommended_templates",
            "recommendedTemplates",
            "recommendations",
        ])
        .map(string_list)
        .unwrap_or_default();

        let container = container_indicators(root, lookup(&["container", "docker"]));

        let ci = CiIndicators {
            workflow_count: lookup(&["ci"])
                .and_then(|ci| find_key(ci.as_object()?, &["workflow_count", "workflowCount", "workflows"]))
                .or_else(|| lookup(&["workflow_count", "workflowCount", "existingWorkflows"]))
                .map(count_of)
                .unwrap_or(0),
        };

        let description = lookup(&["description"])
            .and_then(Value::as_str)
            .map(str::to_string);
        let default_branch = lookup(&["default_branch", "defaultBranch"])
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty());

        let mut manifests: BTreeMap<String, String> = lookup(&[
            "manifests",
            "file_contents",
            "fileContents",
            "key_files",
            "keyFiles",
        ])
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(path, content)| match content {
                    Value::String(s) => Some((path.clone(), s.clone())),
                    Value::Null => None,
                    other => Some((path.clone(), other.to_string())),
                })
                .collect()
        })
        .unwrap_or_default();

        if let Some(pkg) = lookup(&["package_json", "packageJson"]).filter(|v| v.is_object()) {
            manifests
                .entry("package.json".to_string())
                .or_insert_with(|| pkg.to_string());
        }

        let doc = Self {
            repository,
            detected_files,
            file_type_counts,
            languages,
            dominant_language,
            frameworks,
            package_managers,
            recommended_templates,
            container,
            ci,
            description,
            default_branch,
            manifests,
        };

        debug!(
            files = doc.detected_files.len(),
            languages = doc.languages.len(),
            manifests = doc.manifests.len(),
            "Normalized features document"
        );

        Ok(doc)
    }

    /// Content of a manifest by exact path, falling back to a case-insensitive match
    pub fn manifest(&self, path: &str) -> Option<&str> {
        self.manifests.get(path).map(String::as_str).or_else(|| {
            self.manifests
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(path))
                .map(|(_, v)| v.as_str())
        })
    }

    /// Default branch, or `main` when the analyzer did not report one
    pub fn branch_or_default(&self) -> &str {
        self.default_branch.as_deref().unwrap_or("main")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn find_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

fn parse_repository(value: &Value) -> Result<RepoId, FeaturesError> {
    match value {
        Value::String(s) => RepoId::parse(s),
        Value::Object(map) => {
            if let Some(full) = find_key(map, &["full_name", "fullName"]).and_then(Value::as_str) {
                return RepoId::parse(full);
            }
            let owner = match map.get("owner") {
                Some(Value::String(s)) => Some(s.as_str()),
                Some(Value::Object(o)) => o.get("login").and_then(Value::as_str),
                _ => None,
            };
            let name = map.get("name").and_then(Value::as_str);
            match (owner, name) {
                (Some(owner), Some(name)) => RepoId::parse(&format!("{}/{}", owner, name)),
                _ => Err(FeaturesError::InvalidRepository(value.to_string())),
            }
        }
        other => Err(FeaturesError::InvalidRepository(other.to_string())),
    }
}

/// Accepts a list of strings, a list of `{path|name}` objects, or an object whose keys are the items
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => find_key(o, &["path", "name", "file"])
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn count_of(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32,
        Value::Array(items) => items.len() as u32,
        _ => 0,
    }
}

/// Language shares as percentages; byte counts (sum above 100) are rescaled
fn language_shares(value: &Value) -> BTreeMap<String, f64> {
    let raw: Vec<(String, f64)> = match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some((s.clone(), 0.0)),
                Value::Object(o) => {
                    let name = o.get("name").and_then(Value::as_str)?;
                    let amount = find_key(o, &["percentage", "percent", "bytes", "size"])
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                    Some((name.to_string(), amount))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let raw: Vec<(String, f64)> = raw.into_iter().filter(|(_, n)| *n >= 0.0).collect();
    let total: f64 = raw.iter().map(|(_, n)| n).sum();
    let is_bytes = total > 100.5;

    raw.into_iter()
        .map(|(name, n)| {
            let pct = if is_bytes { n * 100.0 / total } else { n };
            (name, pct)
        })
        .collect()
}

fn dominant_from_shares(languages: &BTreeMap<String, f64>) -> Option<String> {
    languages
        .iter()
        .filter(|(_, pct)| **pct > 0.0)
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.clone())
}

fn container_indicators(root: &Map<String, Value>, section: Option<&Value>) -> ContainerIndicators {
    let section = section.and_then(Value::as_object);
    let flag = |keys: &[&str]| -> bool {
        section
            .and_then(|s| find_key(s, keys))
            .or_else(|| find_key(root, keys))
            .map(|v| match v {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_u64().unwrap_or(0) > 0,
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                _ => false,
            })
            .unwrap_or(false)
    };

    let dockerfile = flag(&["dockerfile", "has_dockerfile", "hasDockerfile"]);
    let compose = flag(&["compose", "has_compose", "hasCompose", "docker_compose"]);
    let registry = section
        .and_then(|s| find_key(s, &["registry", "registries"]))
        .or_else(|| find_key(root, &["registry", "container_registry", "containerRegistry"]))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(|i| i.as_str().map(str::to_string)),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty());

    ContainerIndicators {
        dockerfile,
        compose,
        registry,
    }
}
