use crate::features::manifests::{parse_requirements, PackageJson, PomXml, PyProject};
use crate::features::FeaturesDocument;
use std::collections::BTreeSet;

const NODE_FRAMEWORK_DEPS: &[(&str, &str)] = &[
    ("express", "express"),
    ("react", "react"),
    ("react-scripts", "create-react-app"),
    ("next", "next"),
    ("vue", "vue"),
    ("@angular/core", "angular"),
    ("@nestjs/core", "nestjs"),
    ("fastify", "fastify"),
    ("svelte", "svelte"),
];

const PYTHON_FRAMEWORK_DEPS: &[&str] = &["django", "flask", "fastapi"];

const JAVA_FRAMEWORK_PREFIXES: &[(&str, &str)] = &[
    ("spring-boot", "spring-boot"),
    ("quarkus", "quarkus"),
    ("micronaut", "micronaut"),
];

/// Normalized, lowercase view over a features document
///
/// All rule evaluation reads from this struct so that shape differences in
/// the input document never reach the rules themselves.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    /// Lowercase file names, file-type keys and declared package managers
    pub names: BTreeSet<String>,
    /// Lowercase repository paths as reported
    pub paths: BTreeSet<String>,
    /// Languages by descending share, ties broken by name
    pub languages: Vec<(String, f64)>,
    pub dominant_language: Option<String>,
    /// Declared frameworks plus frameworks derived from manifest contents
    pub frameworks: BTreeSet<String>,
    /// Recommended templates in analyzer order, deduplicated
    pub recommended: Vec<String>,
    pub dockerfile: bool,
    pub compose: bool,
}

impl Evidence {
    pub fn from_features(features: &FeaturesDocument) -> Self {
        let mut evidence = Self::default();

        for file in &features.detected_files {
            let path = file.trim().trim_start_matches("./").to_ascii_lowercase();
            if path.is_empty() {
                continue;
            }
            evidence.names.insert(basename(&path).to_string());
            evidence.paths.insert(path);
        }
        for path in features.manifests.keys() {
            let path = path.trim_start_matches("./").to_ascii_lowercase();
            evidence.names.insert(basename(&path).to_string());
            evidence.paths.insert(path);
        }
        evidence.names.extend(
            features
                .file_type_counts
                .keys()
                .map(|k| k.trim().to_ascii_lowercase()),
        );
        evidence.names.extend(
            features
                .package_managers
                .iter()
                .map(|pm| pm.trim().to_ascii_lowercase()),
        );
        evidence.names.remove("");

        let mut languages: Vec<(String, f64)> = features
            .languages
            .iter()
            .map(|(name, pct)| (name.clone(), *pct))
            .collect();
        languages.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        evidence.languages = languages;
        evidence.dominant_language = features
            .dominant_language
            .as_ref()
            .map(|l| l.trim().to_ascii_lowercase());

        evidence.frameworks = features
            .frameworks
            .iter()
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        evidence.frameworks.extend(derived_frameworks(features));

        for template in &features.recommended_templates {
            let template = template.trim().to_ascii_lowercase();
            if !template.is_empty() && !evidence.recommended.contains(&template) {
                evidence.recommended.push(template);
            }
        }

        evidence.dockerfile = features.container.dockerfile
            || evidence.names.iter().any(|n| {
                n == "dockerfile" || n == "containerfile" || n.ends_with(".dockerfile")
            });
        evidence.compose = features.container.compose
            || evidence.has_any(&[
                "docker-compose.yml",
                "docker-compose.yaml",
                "compose.yml",
                "compose.yaml",
            ]);

        evidence
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.names.contains(*n))
    }

    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.names.iter().any(|n| n.ends_with(suffix))
    }

    /// Number of reported paths whose file name is `name`
    pub fn count_named(&self, name: &str) -> usize {
        self.paths.iter().filter(|p| basename(p) == name).count()
    }

    pub fn has_path_prefix(&self, prefix: &str) -> bool {
        self.paths.iter().any(|p| p.starts_with(prefix))
    }

    pub fn has_node_indicator(&self) -> bool {
        self.has_any(&[
            "package.json",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            "bun.lockb",
            "npm-shrinkwrap.json",
        ])
    }

    /// Combined HTML, CSS and SCSS share in percent
    pub fn markup_share(&self) -> f64 {
        MARKUP_LANGUAGES.iter().map(|l| self.language_share(l)).sum()
    }

    /// True when markup alone makes the repository look like a static site
    pub fn is_markup_heavy(&self) -> bool {
        self.markup_share() >= MARKUP_HEAVY_PCT
    }

    pub fn language_share(&self, name: &str) -> f64 {
        self.languages
            .iter()
            .filter(|(l, _)| l.eq_ignore_ascii_case(name))
            .map(|(_, pct)| *pct)
            .sum()
    }
}

/// Markup share (percent) at which a repository counts as a static frontend
pub const MARKUP_HEAVY_PCT: f64 = 40.0;

const MARKUP_LANGUAGES: &[&str] = &["html", "css", "scss"];

pub(crate) fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn derived_frameworks(features: &FeaturesDocument) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    for (path, content) in &features.manifests {
        let name = basename(path).to_ascii_lowercase();
        match name.as_str() {
            "package.json" => {
                if let Some(pkg) = PackageJson::parse(content) {
                    for (dep, framework) in NODE_FRAMEWORK_DEPS {
                        if pkg.depends_on(dep) {
                            found.insert(framework.to_string());
                        }
                    }
                }
            }
            "pyproject.toml" => {
                if let Some(py) = PyProject::parse(content) {
                    found.extend(
                        PYTHON_FRAMEWORK_DEPS
                            .iter()
                            .filter(|f| py.dependencies.contains(**f))
                            .map(|f| f.to_string()),
                    );
                }
            }
            "pom.xml" => {
                if let Some(pom) = PomXml::parse(content) {
                    for (prefix, framework) in JAVA_FRAMEWORK_PREFIXES {
                        if pom.uses_artifact_prefix(prefix) {
                            found.insert(framework.to_string());
                        }
                    }
                }
            }
            n if n.starts_with("requirements") && n.ends_with(".txt") => {
                let reqs = parse_requirements(content);
                found.extend(
                    PYTHON_FRAMEWORK_DEPS
                        .iter()
                        .filter(|f| reqs.contains(**f))
                        .map(|f| f.to_string()),
                );
            }
            _ => {}
        }
    }

    found
}
