use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline parameters handed to the template renderer
///
/// Every field is always serialized, empty when not applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDocument {
    pub project_type: String,
    pub language: String,
    pub package_manager: String,
    pub install_command: String,
    pub lint_command: String,
    pub test_command: String,
    pub build_command: String,
    pub artifact_path: String,
    pub matrix: MatrixSpec,
    pub cache: CacheSpec,
    pub secrets_required: Vec<String>,
    pub deploy: DeploySpec,
    pub container: ContainerSpec,
    pub triggers: TriggerSpec,
    /// Sub-project directory -> path globs
    pub path_filters: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSpec {
    /// Matrix axis name, e.g. `node-version`
    pub name: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    pub enabled: bool,
    pub tool: String,
    pub paths: Vec<String>,
    /// Files whose hash keys the cache
    pub key_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub enabled: bool,
    pub provider: String,
    pub config_file: String,
    /// `static` or `spa`
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub enabled: bool,
    pub image: String,
    pub registry: String,
    pub platforms: Vec<String>,
    pub cache: bool,
    pub tags: Vec<String>,
    pub provenance: bool,
    pub sbom: bool,
    pub sign: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub branches: Vec<String>,
    pub push: bool,
    pub pull_request: bool,
    pub release_on_tag: bool,
}

impl Default for TriggerSpec {
    fn default() -> Self {
        Self {
            branches: vec!["main".to_string()],
            push: true,
            pull_request: true,
            release_on_tag: true,
        }
    }
}

impl Default for ParameterDocument {
    /// The generic base document: no ecosystem, no-op commands
    fn default() -> Self {
        Self {
            project_type: "generic".to_string(),
            language: String::new(),
            package_manager: String::new(),
            install_command: String::new(),
            lint_command: noop("No linter configured"),
            test_command: noop("No tests configured"),
            build_command: noop("No build configured"),
            artifact_path: String::new(),
            matrix: MatrixSpec::default(),
            cache: CacheSpec::default(),
            secrets_required: Vec::new(),
            deploy: DeploySpec::default(),
            container: ContainerSpec::default(),
            triggers: TriggerSpec::default(),
            path_filters: BTreeMap::new(),
        }
    }
}

impl ParameterDocument {
    /// Adds secret names, keeping the list sorted and unique
    pub fn require_secrets<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets_required.extend(names.into_iter().map(Into::into));
        self.secrets_required.sort();
        self.secrets_required.dedup();
    }

    /// Top-level keys of the serialized form
    pub fn field_names() -> &'static [&'static str] {
        &[
            "project_type",
            "language",
            "package_manager",
            "install_command",
            "lint_command",
            "test_command",
            "build_command",
            "artifact_path",
            "matrix",
            "cache",
            "secrets_required",
            "deploy",
            "container",
            "triggers",
            "path_filters",
        ]
    }
}

/// A command that succeeds without doing anything, so CI does not fail on a
/// missing step.
pub fn noop(message: &str) -> String {
    format!("echo \"{}\" && exit 0", message)
}
