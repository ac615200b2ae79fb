//! Parsed views of the manifest contents carried by a features document
//!
//! Parsers are lenient: malformed content produces `None` (or an empty
//! summary) rather than an error, because manifests are optional evidence.

use roxmltree::Document;
use serde_json::Value;
use std::collections::BTreeSet;

/// Subset of `package.json` relevant to pipeline generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageJson {
    pub name: Option<String>,
    pub scripts: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
    /// Value of the `packageManager` field, e.g. `pnpm@8.15.0`
    pub package_manager: Option<String>,
    pub workspaces: bool,
}

impl PackageJson {
    pub fn parse(content: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(content).ok()?;
        let obj = value.as_object()?;

        let keys_of = |field: &str| -> BTreeSet<String> {
            obj.get(field)
                .and_then(Value::as_object)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default()
        };

        let mut dependencies = keys_of("dependencies");
        dependencies.extend(keys_of("devDependencies"));

        Some(Self {
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
            scripts: keys_of("scripts"),
            dependencies,
            package_manager: obj
                .get("packageManager")
                .and_then(Value::as_str)
                .map(str::to_string),
            workspaces: obj.get("workspaces").is_some(),
        })
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains(name)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.contains(name)
    }

    /// Tool name from the `packageManager` field (`pnpm@8` -> `pnpm`)
    pub fn declared_manager(&self) -> Option<&str> {
        self.package_manager
            .as_deref()
            .and_then(|s| s.split('@').next())
            .filter(|s| !s.is_empty())
    }
}

/// Subset of `pyproject.toml`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PyProject {
    pub uses_poetry: bool,
    pub build_backend: Option<String>,
    pub dependencies: BTreeSet<String>,
}

impl PyProject {
    pub fn parse(content: &str) -> Option<Self> {
        let parsed: toml::Value = toml::from_str(content).ok()?;

        let poetry = parsed.get("tool").and_then(|t| t.get("poetry"));
        let build_backend = parsed
            .get("build-system")
            .and_then(|b| b.get("build-backend"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut dependencies = BTreeSet::new();

        // PEP 621 lists, including optional groups such as `dev`
        let project = parsed.get("project");
        let pep621 = project
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
            .into_iter()
            .flatten();
        let optional = project
            .and_then(|p| p.get("optional-dependencies"))
            .and_then(|d| d.as_table())
            .into_iter()
            .flat_map(|t| t.values())
            .filter_map(|v| v.as_array())
            .flatten();
        for spec in pep621.chain(optional).filter_map(|v| v.as_str()) {
            if let Some(name) = requirement_name(spec) {
                dependencies.insert(name);
            }
        }

        // Poetry tables, including dependency groups
        if let Some(poetry) = poetry {
            let tables = ["dependencies", "dev-dependencies"]
                .iter()
                .filter_map(|k| poetry.get(*k).and_then(|v| v.as_table()))
                .chain(
                    poetry
                        .get("group")
                        .and_then(|g| g.as_table())
                        .into_iter()
                        .flat_map(|groups| groups.values())
                        .filter_map(|g| g.get("dependencies").and_then(|d| d.as_table())),
                );
            for table in tables {
                dependencies.extend(
                    table
                        .keys()
                        .filter(|k| k.as_str() != "python")
                        .map(|k| k.to_ascii_lowercase()),
                );
            }
        }

        Some(Self {
            uses_poetry: poetry.is_some(),
            build_backend,
            dependencies,
        })
    }
}

/// Package names declared in a `requirements*.txt` file
pub fn parse_requirements(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(requirement_name)
        .collect()
}

/// Normalized distribution name from a PEP 508 requirement string
fn requirement_name(spec: &str) -> Option<String> {
    let name: String = spec
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase().replace('_', "-"))
    }
}

/// Subset of a Maven `pom.xml`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PomXml {
    pub artifact_id: Option<String>,
    pub packaging: Option<String>,
    pub dependency_artifacts: BTreeSet<String>,
    pub plugin_artifacts: BTreeSet<String>,
    pub has_modules: bool,
}

impl PomXml {
    pub fn parse(content: &str) -> Option<Self> {
        let doc = Document::parse(content).ok()?;
        let project = doc.root_element();
        if project.tag_name().name() != "project" {
            return None;
        }

        let mut pom = Self {
            artifact_id: child_text(project, "artifactId"),
            packaging: child_text(project, "packaging"),
            ..Default::default()
        };

        for node in project.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "dependency" => {
                    if let Some(id) = child_text(node, "artifactId") {
                        pom.dependency_artifacts.insert(id);
                    }
                }
                "plugin" => {
                    if let Some(id) = child_text(node, "artifactId") {
                        pom.plugin_artifacts.insert(id);
                    }
                }
                "modules" => pom.has_modules = true,
                _ => {}
            }
        }

        Some(pom)
    }

    pub fn uses_artifact_prefix(&self, prefix: &str) -> bool {
        self.dependency_artifacts
            .iter()
            .chain(self.plugin_artifacts.iter())
            .any(|a| a.starts_with(prefix))
    }
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
}
