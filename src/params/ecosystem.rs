//! Ecosystem decision and per-ecosystem defaults

use super::document::{noop, CacheSpec, MatrixSpec, ParameterDocument};
use crate::features::manifests::{parse_requirements, PackageJson, PomXml, PyProject};
use crate::features::FeaturesDocument;
use crate::label::PipelineLabel;
use crate::rules::Evidence;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const NODE_VERSIONS: &[&str] = &["18.x", "20.x", "22.x"];
pub const PYTHON_VERSIONS: &[&str] = &["3.10", "3.11", "3.12"];
pub const JAVA_VERSIONS: &[&str] = &["17", "21"];
pub const GO_VERSIONS: &[&str] = &["1.21", "1.22"];
pub const TERRAFORM_VERSIONS: &[&str] = &["1.6", "1.7", "1.8"];

const PYTHON_MARKERS: &[&str] = &[
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "pipfile",
    "poetry.lock",
];
const JAVA_MARKERS: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "gradlew",
    "settings.gradle",
];

/// The base decision tree's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    Node,
    Python,
    Java,
    Go,
    Terraform,
    DockerOnly,
    Static,
    Generic,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ecosystem::Node => "node",
            Ecosystem::Python => "python",
            Ecosystem::Java => "java",
            Ecosystem::Go => "go",
            Ecosystem::Terraform => "terraform",
            Ecosystem::DockerOnly => "docker",
            Ecosystem::Static => "static",
            Ecosystem::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Picks the ecosystem whose defaults populate the base document.
///
/// Language labels among `chosen` decide first; when none was chosen the
/// files decide. Precedence is Node, Python, Java, Go, Terraform. Docker only
/// wins when no language ecosystem is plausible at all.
pub fn decide(ev: &Evidence, chosen: &[PipelineLabel], static_site: bool) -> Ecosystem {
    let from_labels = chosen.iter().any(|l| l.is_language());

    let (node, python, java, go, terraform) = if from_labels {
        (
            chosen.contains(&PipelineLabel::Node),
            chosen.contains(&PipelineLabel::Python),
            chosen.contains(&PipelineLabel::Java),
            chosen.contains(&PipelineLabel::Go),
            chosen.contains(&PipelineLabel::Terraform),
        )
    } else {
        (
            ev.has_node_indicator(),
            ev.has_any(PYTHON_MARKERS),
            ev.has_any(JAVA_MARKERS),
            ev.has("go.mod"),
            ev.has_suffix(".tf"),
        )
    };

    if node {
        Ecosystem::Node
    } else if python {
        Ecosystem::Python
    } else if java {
        Ecosystem::Java
    } else if go {
        Ecosystem::Go
    } else if terraform {
        Ecosystem::Terraform
    } else if chosen.contains(&PipelineLabel::Docker) || ev.dockerfile || ev.compose {
        Ecosystem::DockerOnly
    } else if chosen.contains(&PipelineLabel::Static) || static_site {
        Ecosystem::Static
    } else {
        Ecosystem::Generic
    }
}

/// Base document populated with the ecosystem's defaults
pub fn defaults_for(
    ecosystem: Ecosystem,
    features: &FeaturesDocument,
    ev: &Evidence,
) -> ParameterDocument {
    match ecosystem {
        Ecosystem::Node => node_defaults(features, ev),
        Ecosystem::Python => python_defaults(features, ev),
        Ecosystem::Java => java_defaults(features, ev),
        Ecosystem::Go => go_defaults(ev),
        Ecosystem::Terraform => terraform_defaults(ev),
        Ecosystem::DockerOnly => ParameterDocument {
            project_type: "docker".to_string(),
            build_command: "docker build .".to_string(),
            ..ParameterDocument::default()
        },
        Ecosystem::Static => ParameterDocument {
            project_type: "static".to_string(),
            language: "html".to_string(),
            artifact_path: static_publish_dir(ev).to_string(),
            ..ParameterDocument::default()
        },
        Ecosystem::Generic => ParameterDocument::default(),
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|v| v.to_string()).collect()
}

/// Root manifest, else the shallowest one outside vendored trees
fn find_manifest<'a>(features: &'a FeaturesDocument, file: &str) -> Option<&'a str> {
    features.manifest(file).or_else(|| {
        features
            .manifests
            .iter()
            .filter(|(path, _)| {
                let lower = path.to_ascii_lowercase();
                lower.ends_with(&format!("/{}", file)) && !lower.contains("node_modules/")
            })
            .min_by_key(|(path, _)| path.matches('/').count())
            .map(|(_, content)| content.as_str())
    })
}

fn node_defaults(features: &FeaturesDocument, ev: &Evidence) -> ParameterDocument {
    let pkg = find_manifest(features, "package.json")
        .and_then(PackageJson::parse)
        .unwrap_or_default();

    let manager = match pkg.declared_manager() {
        Some(m @ ("npm" | "yarn" | "pnpm" | "bun")) => m.to_string(),
        _ if ev.has("pnpm-lock.yaml") => "pnpm".to_string(),
        _ if ev.has("yarn.lock") => "yarn".to_string(),
        _ if ev.has("bun.lockb") || ev.has("bun.lock") => "bun".to_string(),
        _ => "npm".to_string(),
    };

    let (install, lockfile, cache_paths): (String, Option<&str>, Vec<String>) = match manager.as_str() {
        "pnpm" => {
            let locked = ev.has("pnpm-lock.yaml");
            (
                if locked { "pnpm install --frozen-lockfile" } else { "pnpm install" }.to_string(),
                locked.then_some("pnpm-lock.yaml"),
                strings(&["~/.local/share/pnpm/store"]),
            )
        }
        "yarn" => {
            let locked = ev.has("yarn.lock");
            (
                if locked { "yarn install --frozen-lockfile" } else { "yarn install" }.to_string(),
                locked.then_some("yarn.lock"),
                strings(&["~/.cache/yarn"]),
            )
        }
        "bun" => (
            "bun install".to_string(),
            if ev.has("bun.lockb") {
                Some("bun.lockb")
            } else if ev.has("bun.lock") {
                Some("bun.lock")
            } else {
                None
            },
            strings(&["~/.bun/install/cache"]),
        ),
        _ => {
            let lockfile = if ev.has("package-lock.json") {
                Some("package-lock.json")
            } else if ev.has("npm-shrinkwrap.json") {
                Some("npm-shrinkwrap.json")
            } else {
                None
            };
            (
                if lockfile.is_some() { "npm ci" } else { "npm install" }.to_string(),
                lockfile,
                strings(&["~/.npm"]),
            )
        }
    };

    let run = |script: &str| -> String {
        match manager.as_str() {
            "npm" if script == "test" => "npm test".to_string(),
            "npm" => format!("npm run {}", script),
            "yarn" => format!("yarn {}", script),
            other => format!("{} run {}", other, script),
        }
    };

    let script_or_noop = |script: &str, message: &str| {
        if pkg.has_script(script) {
            run(script)
        } else {
            noop(message)
        }
    };

    let artifact_path = if pkg.has_script("build") {
        if pkg.depends_on("react-scripts") {
            "build/"
        } else {
            "dist/"
        }
    } else {
        ""
    };

    let typescript = ev.has("tsconfig.json")
        || pkg.depends_on("typescript")
        || ev.dominant_language
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case("typescript"));

    ParameterDocument {
        project_type: "node".to_string(),
        language: if typescript { "typescript" } else { "javascript" }.to_string(),
        install_command: install,
        lint_command: script_or_noop("lint", "No lint script defined"),
        test_command: script_or_noop("test", "No test script defined"),
        build_command: script_or_noop("build", "No build script defined"),
        artifact_path: artifact_path.to_string(),
        matrix: MatrixSpec {
            name: "node-version".to_string(),
            versions: strings(NODE_VERSIONS),
        },
        cache: CacheSpec {
            enabled: true,
            tool: manager.clone(),
            paths: cache_paths,
            key_files: vec![lockfile.unwrap_or("package.json").to_string()],
        },
        package_manager: manager,
        ..ParameterDocument::default()
    }
}

fn python_dependencies(features: &FeaturesDocument, pyproject: Option<&PyProject>) -> BTreeSet<String> {
    let mut deps = pyproject
        .map(|p| p.dependencies.clone())
        .unwrap_or_default();
    for (path, content) in &features.manifests {
        let name = crate::rules::basename(path).to_ascii_lowercase();
        if name.starts_with("requirements") && name.ends_with(".txt") {
            deps.extend(parse_requirements(content));
        }
    }
    deps
}

fn python_defaults(features: &FeaturesDocument, ev: &Evidence) -> ParameterDocument {
    let pyproject = find_manifest(features, "pyproject.toml").and_then(PyProject::parse);
    let deps = python_dependencies(features, pyproject.as_ref());

    let manager = if ev.has("poetry.lock") || pyproject.as_ref().is_some_and(|p| p.uses_poetry) {
        "poetry"
    } else if ev.has_any(&["pipfile", "pipfile.lock"]) {
        "pipenv"
    } else if ev.has("uv.lock") {
        "uv"
    } else {
        "pip"
    };

    let packaged = ev.has_any(&["pyproject.toml", "setup.py"]);

    let install = match manager {
        "poetry" => "poetry install --no-interaction".to_string(),
        "pipenv" => "pipenv install --dev".to_string(),
        "uv" => "uv sync".to_string(),
        _ => {
            let mut parts = vec!["python -m pip install --upgrade pip".to_string()];
            if ev.has("requirements.txt") {
                parts.push("pip install -r requirements.txt".to_string());
            } else if packaged {
                parts.push("pip install .".to_string());
            }
            if ev.has("requirements-dev.txt") {
                parts.push("pip install -r requirements-dev.txt".to_string());
            }
            parts.join(" && ")
        }
    };

    let prefix = match manager {
        "poetry" => "poetry run ",
        "pipenv" => "pipenv run ",
        "uv" => "uv run ",
        _ => "",
    };

    let lint_command = if deps.contains("ruff") || ev.has("ruff.toml") {
        format!("{}ruff check .", prefix)
    } else if deps.contains("flake8") || ev.has(".flake8") {
        format!("{}flake8 .", prefix)
    } else {
        noop("No linter configured")
    };

    let has_tests = deps.contains("pytest")
        || ev.has_any(&["pytest.ini", "conftest.py"])
        || ev.has_path_prefix("tests/");
    let test_command = if has_tests {
        format!("{}pytest", prefix)
    } else {
        noop("No tests configured")
    };

    let (build_command, artifact_path) = if packaged {
        let cmd = match manager {
            "poetry" => "poetry build",
            "uv" => "uv build",
            _ => "python -m build",
        };
        (cmd.to_string(), "dist/".to_string())
    } else {
        (noop("No packaging metadata"), String::new())
    };

    let (cache_paths, key_files): (Vec<String>, Vec<String>) = match manager {
        "poetry" => (strings(&["~/.cache/pypoetry"]), strings(&["poetry.lock"])),
        "pipenv" => (strings(&["~/.cache/pipenv"]), strings(&["Pipfile.lock"])),
        "uv" => (strings(&["~/.cache/uv"]), strings(&["uv.lock"])),
        _ => {
            let keys: Vec<String> = ev
                .paths
                .iter()
                .filter(|p| {
                    let n = crate::rules::basename(p);
                    (n.starts_with("requirements") && n.ends_with(".txt")) || n == "pyproject.toml"
                })
                .cloned()
                .collect();
            (
                strings(&["~/.cache/pip"]),
                if keys.is_empty() {
                    strings(&["requirements.txt"])
                } else {
                    keys
                },
            )
        }
    };

    ParameterDocument {
        project_type: "python".to_string(),
        language: "python".to_string(),
        package_manager: manager.to_string(),
        install_command: install,
        lint_command,
        test_command,
        build_command,
        artifact_path,
        matrix: MatrixSpec {
            name: "python-version".to_string(),
            versions: strings(PYTHON_VERSIONS),
        },
        cache: CacheSpec {
            enabled: true,
            tool: manager.to_string(),
            paths: cache_paths,
            key_files,
        },
        ..ParameterDocument::default()
    }
}

fn java_defaults(features: &FeaturesDocument, ev: &Evidence) -> ParameterDocument {
    let matrix = MatrixSpec {
        name: "java-version".to_string(),
        versions: strings(JAVA_VERSIONS),
    };

    if ev.has("pom.xml") {
        let pom = find_manifest(features, "pom.xml").and_then(PomXml::parse);
        let mvn = if ev.has("mvnw") { "./mvnw" } else { "mvn" };
        let lint_command = match pom {
            Some(ref p) if p.uses_artifact_prefix("maven-checkstyle") => {
                format!("{} -B checkstyle:check", mvn)
            }
            Some(ref p) if p.uses_artifact_prefix("spotless") => format!("{} -B spotless:check", mvn),
            _ => noop("No linter configured"),
        };
        return ParameterDocument {
            project_type: "java".to_string(),
            language: "java".to_string(),
            package_manager: "maven".to_string(),
            install_command: format!("{} -B dependency:go-offline", mvn),
            lint_command,
            test_command: format!("{} -B test", mvn),
            build_command: format!("{} -B package -DskipTests", mvn),
            artifact_path: "target/".to_string(),
            matrix,
            cache: CacheSpec {
                enabled: true,
                tool: "maven".to_string(),
                paths: strings(&["~/.m2/repository"]),
                key_files: strings(&["pom.xml"]),
            },
            ..ParameterDocument::default()
        };
    }

    if ev.has_any(&["build.gradle", "build.gradle.kts", "gradlew", "settings.gradle"]) {
        let gradle = if ev.has("gradlew") { "./gradlew" } else { "gradle" };
        let script = find_manifest(features, "build.gradle")
            .or_else(|| find_manifest(features, "build.gradle.kts"))
            .unwrap_or("");
        let lint_command = if script.contains("checkstyle") {
            format!("{} checkstyleMain --no-daemon", gradle)
        } else if script.contains("spotless") {
            format!("{} spotlessCheck --no-daemon", gradle)
        } else {
            noop("No linter configured")
        };
        let kotlin = ev.has("build.gradle.kts")
            || ev
                .dominant_language
                .as_deref()
                .is_some_and(|l| l.eq_ignore_ascii_case("kotlin"));
        let key = if ev.has("build.gradle.kts") {
            "build.gradle.kts"
        } else {
            "build.gradle"
        };
        return ParameterDocument {
            project_type: "java".to_string(),
            language: if kotlin { "kotlin" } else { "java" }.to_string(),
            package_manager: "gradle".to_string(),
            install_command: format!("{} dependencies --no-daemon", gradle),
            lint_command,
            test_command: format!("{} test --no-daemon", gradle),
            build_command: format!("{} build -x test --no-daemon", gradle),
            artifact_path: "build/libs/".to_string(),
            matrix,
            cache: CacheSpec {
                enabled: true,
                tool: "gradle".to_string(),
                paths: strings(&["~/.gradle/caches", "~/.gradle/wrapper"]),
                key_files: vec![key.to_string()],
            },
            ..ParameterDocument::default()
        };
    }

    ParameterDocument {
        project_type: "java".to_string(),
        language: "java".to_string(),
        lint_command: noop("No linter configured"),
        test_command: noop("Unknown Java build tool, skipping tests"),
        build_command: noop("Unknown Java build tool, skipping build"),
        matrix,
        ..ParameterDocument::default()
    }
}

fn go_defaults(ev: &Evidence) -> ParameterDocument {
    let key = if ev.has("go.sum") { "go.sum" } else { "go.mod" };
    ParameterDocument {
        project_type: "go".to_string(),
        language: "go".to_string(),
        package_manager: "go".to_string(),
        install_command: "go mod download".to_string(),
        lint_command: "go vet ./...".to_string(),
        test_command: "go test ./...".to_string(),
        build_command: "go build ./...".to_string(),
        matrix: MatrixSpec {
            name: "go-version".to_string(),
            versions: strings(GO_VERSIONS),
        },
        cache: CacheSpec {
            enabled: true,
            tool: "go".to_string(),
            paths: strings(&["~/go/pkg/mod", "~/.cache/go-build"]),
            key_files: vec![key.to_string()],
        },
        ..ParameterDocument::default()
    }
}

fn terraform_defaults(ev: &Evidence) -> ParameterDocument {
    let locked = ev.has(".terraform.lock.hcl");
    ParameterDocument {
        project_type: "terraform".to_string(),
        language: "hcl".to_string(),
        package_manager: "terraform".to_string(),
        install_command: "terraform init -backend=false".to_string(),
        lint_command: "terraform fmt -check -recursive".to_string(),
        test_command: "terraform validate".to_string(),
        build_command: noop("Nothing to build for Terraform"),
        matrix: MatrixSpec {
            name: "terraform-version".to_string(),
            versions: strings(TERRAFORM_VERSIONS),
        },
        cache: CacheSpec {
            enabled: locked,
            tool: if locked { "terraform" } else { "" }.to_string(),
            paths: if locked {
                strings(&["~/.terraform.d/plugin-cache"])
            } else {
                Vec::new()
            },
            key_files: if locked {
                strings(&[".terraform.lock.hcl"])
            } else {
                Vec::new()
            },
        },
        ..ParameterDocument::default()
    }
}

fn static_publish_dir(ev: &Evidence) -> &'static str {
    if ev.has_path_prefix("public/") {
        "public/"
    } else if ev.has_path_prefix("site/") {
        "site/"
    } else if ev.has_path_prefix("docs/") && !ev.has("index.html") {
        "docs/"
    } else {
        "."
    }
}
