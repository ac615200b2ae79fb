//! Ordered table of independent detection rules
//!
//! Each rule inspects the normalized [`Evidence`] and emits zero or more
//! candidates. Rules never consult each other's output; the only coupling is
//! the Java rule lowering its confidence when Node indicators co-occur.

use super::evidence::{basename, Evidence};
use super::Candidate;
use crate::label::PipelineLabel;

/// Confidence tiers, strongest first
pub mod tier {
    pub const MANIFEST_NODE: f64 = 0.98;
    pub const MANIFEST_GO: f64 = 0.98;
    pub const MANIFEST_PYTHON: f64 = 0.97;
    pub const LOCKFILE: f64 = 0.96;
    pub const MANIFEST_JAVA: f64 = 0.95;
    pub const MANIFEST_JAVA_WITH_NODE: f64 = 0.75;
    pub const MANIFEST_TERRAFORM: f64 = 0.95;
    pub const DOCKERFILE: f64 = 0.92;
    pub const COMPOSE: f64 = 0.90;
    pub const PACKAGE_MANAGER: f64 = 0.90;
    pub const FRAMEWORK: f64 = 0.88;
    pub const FRAMEWORK_GO: f64 = 0.85;
    pub const STATIC_SITE_CONFIG: f64 = 0.75;
    pub const RECOMMENDED_FIRST: f64 = 0.70;
    pub const RECOMMENDED_STEP: f64 = 0.05;
    pub const RECOMMENDED_FLOOR: f64 = 0.50;
    pub const MONOREPO: f64 = 0.70;
    pub const DOMINANT_LANGUAGE: f64 = 0.65;
    pub const DOMINANT_LANGUAGE_WEAK: f64 = 0.60;
    pub const HTML_HEAVY: f64 = 0.60;
    pub const POLYGLOT_BASE: f64 = 0.55;
    pub const POLYGLOT_STEP: f64 = 0.10;
    pub const POLYGLOT_CAP: f64 = 0.75;
    pub const GENERIC: f64 = 0.30;
}

/// Share of repository bytes a language needs to count towards polyglot
pub const POLYGLOT_MATERIALITY_PCT: f64 = 20.0;

type RuleFn = fn(&Evidence, &mut Vec<Candidate>);

/// Evaluation order of the rule table
pub const RULES: &[(&str, RuleFn)] = &[
    ("node-manifest", node_manifest),
    ("python-manifest", python_manifest),
    ("java-build-descriptor", java_build_descriptor),
    ("go-module", go_module),
    ("terraform", terraform),
    ("container", container),
    ("package-managers", package_managers),
    ("frameworks", frameworks),
    ("monorepo", monorepo),
    ("static-site", static_site),
    ("recommended-templates", recommended_templates),
    ("dominant-language", dominant_language),
    ("polyglot", polyglot),
];

const NODE_LOCKFILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
];

const PYTHON_MANIFESTS: &[&str] = &["requirements.txt", "pyproject.toml", "setup.py", "pipfile"];
const PYTHON_LOCKFILES: &[&str] = &["poetry.lock", "pipfile.lock", "uv.lock"];

const JAVA_DESCRIPTORS: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "gradlew",
];

const MONOREPO_MARKERS: &[&str] = &[
    "lerna.json",
    "pnpm-workspace.yaml",
    "nx.json",
    "turbo.json",
    "rush.json",
];

const STATIC_SITE_CONFIGS: &[&str] = &[
    "netlify.toml",
    "vercel.json",
    "firebase.json",
    "_config.yml",
    "mkdocs.yml",
];

const FRAMEWORK_LABELS: &[(&str, PipelineLabel)] = &[
    ("express", PipelineLabel::Node),
    ("react", PipelineLabel::Node),
    ("create-react-app", PipelineLabel::Node),
    ("next", PipelineLabel::Node),
    ("nextjs", PipelineLabel::Node),
    ("vue", PipelineLabel::Node),
    ("angular", PipelineLabel::Node),
    ("nestjs", PipelineLabel::Node),
    ("fastify", PipelineLabel::Node),
    ("svelte", PipelineLabel::Node),
    ("node", PipelineLabel::Node),
    ("django", PipelineLabel::Python),
    ("flask", PipelineLabel::Python),
    ("fastapi", PipelineLabel::Python),
    ("spring", PipelineLabel::Java),
    ("spring-boot", PipelineLabel::Java),
    ("quarkus", PipelineLabel::Java),
    ("micronaut", PipelineLabel::Java),
    ("gin", PipelineLabel::Go),
    ("echo", PipelineLabel::Go),
    ("fiber", PipelineLabel::Go),
];

fn node_manifest(ev: &Evidence, out: &mut Vec<Candidate>) {
    if ev.has("package.json") {
        out.push(Candidate::new(
            PipelineLabel::Node,
            tier::MANIFEST_NODE,
            "package.json present",
        ));
    }
    if let Some(lock) = NODE_LOCKFILES.iter().find(|l| ev.has(l)) {
        out.push(Candidate::new(
            PipelineLabel::Node,
            tier::LOCKFILE,
            format!("{} lockfile present", lock),
        ));
    }
}

fn python_manifest(ev: &Evidence, out: &mut Vec<Candidate>) {
    let extra_requirements = ev
        .names
        .iter()
        .find(|n| n.starts_with("requirements") && n.ends_with(".txt"));

    if let Some(manifest) = PYTHON_MANIFESTS.iter().find(|m| ev.has(m)) {
        out.push(Candidate::new(
            PipelineLabel::Python,
            tier::MANIFEST_PYTHON,
            format!("{} present", manifest),
        ));
    } else if let Some(reqs) = extra_requirements {
        out.push(Candidate::new(
            PipelineLabel::Python,
            tier::LOCKFILE,
            format!("{} present", reqs),
        ));
    }
    if let Some(lock) = PYTHON_LOCKFILES.iter().find(|l| ev.has(l)) {
        out.push(Candidate::new(
            PipelineLabel::Python,
            tier::LOCKFILE,
            format!("{} lockfile present", lock),
        ));
    }
}

fn java_build_descriptor(ev: &Evidence, out: &mut Vec<Candidate>) {
    let Some(descriptor) = JAVA_DESCRIPTORS.iter().find(|d| ev.has(d)) else {
        return;
    };

    if ev.has_node_indicator() {
        out.push(Candidate::new(
            PipelineLabel::Java,
            tier::MANIFEST_JAVA_WITH_NODE,
            format!("{} present alongside Node indicators", descriptor),
        ));
    } else {
        out.push(Candidate::new(
            PipelineLabel::Java,
            tier::MANIFEST_JAVA,
            format!("{} present", descriptor),
        ));
    }
}

fn go_module(ev: &Evidence, out: &mut Vec<Candidate>) {
    if ev.has("go.mod") {
        out.push(Candidate::new(
            PipelineLabel::Go,
            tier::MANIFEST_GO,
            "go.mod present",
        ));
    } else if ev.has("go.sum") {
        out.push(Candidate::new(PipelineLabel::Go, tier::LOCKFILE, "go.sum present"));
    }
}

fn terraform(ev: &Evidence, out: &mut Vec<Candidate>) {
    if ev.has_suffix(".tf") || ev.has(".terraform.lock.hcl") {
        out.push(Candidate::new(
            PipelineLabel::Terraform,
            tier::MANIFEST_TERRAFORM,
            "Terraform configuration present",
        ));
    }
}

fn container(ev: &Evidence, out: &mut Vec<Candidate>) {
    if ev.dockerfile {
        out.push(Candidate::new(
            PipelineLabel::Docker,
            tier::DOCKERFILE,
            "Dockerfile present",
        ));
    }
    if ev.compose {
        out.push(Candidate::new(
            PipelineLabel::Docker,
            tier::COMPOSE,
            "compose file present",
        ));
    }
}

fn package_managers(ev: &Evidence, out: &mut Vec<Candidate>) {
    let table: &[(&[&str], PipelineLabel)] = &[
        (&["npm", "yarn", "pnpm", "bun"], PipelineLabel::Node),
        (&["pip", "poetry", "pipenv", "uv"], PipelineLabel::Python),
        (&["maven", "gradle"], PipelineLabel::Java),
    ];
    for (managers, label) in table {
        if let Some(pm) = managers.iter().find(|m| ev.has(m)) {
            out.push(Candidate::new(
                *label,
                tier::PACKAGE_MANAGER,
                format!("{} package manager declared", pm),
            ));
        }
    }
}

fn frameworks(ev: &Evidence, out: &mut Vec<Candidate>) {
    for framework in &ev.frameworks {
        let key = framework.trim_end_matches(".js").replace(' ', "-");
        if let Some((_, label)) = FRAMEWORK_LABELS.iter().find(|(name, _)| *name == key) {
            let confidence = if *label == PipelineLabel::Go {
                tier::FRAMEWORK_GO
            } else {
                tier::FRAMEWORK
            };
            out.push(Candidate::new(
                *label,
                confidence,
                format!("{} framework detected", framework),
            ));
        }
    }
}

fn monorepo(ev: &Evidence, out: &mut Vec<Candidate>) {
    if let Some(marker) = MONOREPO_MARKERS.iter().find(|m| ev.has(m)) {
        out.push(Candidate::new(
            PipelineLabel::Monorepo,
            tier::MONOREPO,
            format!("{} workspace marker present", marker),
        ));
        return;
    }

    let nested_manifests = ev
        .paths
        .iter()
        .filter(|p| p.starts_with("packages/") || p.starts_with("apps/"))
        .filter(|p| basename(p) == "package.json")
        .count();
    if nested_manifests >= 2 {
        out.push(Candidate::new(
            PipelineLabel::Monorepo,
            tier::MONOREPO,
            format!("{} workspace packages found", nested_manifests),
        ));
    }
}

fn static_site(ev: &Evidence, out: &mut Vec<Candidate>) {
    if let Some(config) = STATIC_SITE_CONFIGS.iter().find(|c| ev.has(c)) {
        out.push(Candidate::new(
            PipelineLabel::Static,
            tier::STATIC_SITE_CONFIG,
            format!("{} static hosting config present", config),
        ));
    } else if ev.paths.contains("index.html") && !ev.has_node_indicator() {
        out.push(Candidate::new(
            PipelineLabel::Static,
            tier::STATIC_SITE_CONFIG,
            "root index.html without a build manifest",
        ));
    }

    if ev.is_markup_heavy() {
        out.push(Candidate::new(
            PipelineLabel::Static,
            tier::HTML_HEAVY,
            format!("HTML/CSS make up {:.1}% of the repository", ev.markup_share()),
        ));
    }
}

fn recommended_templates(ev: &Evidence, out: &mut Vec<Candidate>) {
    let labels = ev
        .recommended
        .iter()
        .filter_map(|r| PipelineLabel::parse(r).map(|l| (r, l)));
    for (rank, (raw, label)) in labels.enumerate() {
        let confidence =
            (tier::RECOMMENDED_FIRST - tier::RECOMMENDED_STEP * rank as f64).max(tier::RECOMMENDED_FLOOR);
        out.push(Candidate::new(
            label,
            confidence,
            format!("analyzer recommended the {} template", raw),
        ));
    }
}

fn dominant_language(ev: &Evidence, out: &mut Vec<Candidate>) {
    let Some(lang) = ev.dominant_language.as_deref() else {
        return;
    };
    let hit = match lang {
        "javascript" | "typescript" => Some((PipelineLabel::Node, tier::DOMINANT_LANGUAGE)),
        "python" => Some((PipelineLabel::Python, tier::DOMINANT_LANGUAGE)),
        "go" => Some((PipelineLabel::Go, tier::DOMINANT_LANGUAGE)),
        "java" | "kotlin" | "groovy" | "scala" => {
            Some((PipelineLabel::Java, tier::DOMINANT_LANGUAGE_WEAK))
        }
        "hcl" => Some((PipelineLabel::Terraform, tier::DOMINANT_LANGUAGE_WEAK)),
        "dockerfile" => Some((PipelineLabel::Docker, tier::DOMINANT_LANGUAGE_WEAK)),
        "html" | "css" | "scss" => Some((PipelineLabel::Static, tier::DOMINANT_LANGUAGE_WEAK)),
        _ => None,
    };
    if let Some((label, confidence)) = hit {
        out.push(Candidate::new(
            label,
            confidence,
            format!("dominant language is {}", lang),
        ));
    }
}

fn polyglot(ev: &Evidence, out: &mut Vec<Candidate>) {
    let material: Vec<&str> = ev
        .languages
        .iter()
        .filter(|(_, pct)| *pct > POLYGLOT_MATERIALITY_PCT)
        .map(|(name, _)| name.as_str())
        .collect();
    if material.len() < 2 {
        return;
    }

    let confidence = (tier::POLYGLOT_BASE + tier::POLYGLOT_STEP * (material.len() - 2) as f64)
        .min(tier::POLYGLOT_CAP);
    out.push(Candidate::new(
        PipelineLabel::Polyglot,
        confidence,
        format!(
            "{} languages above {}%: {}",
            material.len(),
            POLYGLOT_MATERIALITY_PCT,
            material.join(", ")
        ),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeaturesDocument;
    use serde_json::json;

    fn run(rule: RuleFn, value: serde_json::Value) -> Vec<Candidate> {
        let features = FeaturesDocument::from_value(&value).unwrap();
        let ev = Evidence::from_features(&features);
        let mut out = Vec::new();
        rule(&ev, &mut out);
        out
    }

    #[test]
    fn test_java_lowered_when_node_present() {
        let alone = run(java_build_descriptor, json!({"files": ["pom.xml"]}));
        assert_eq!(alone[0].confidence, tier::MANIFEST_JAVA);

        let with_node = run(
            java_build_descriptor,
            json!({"files": ["pom.xml", "package.json"]}),
        );
        assert_eq!(with_node[0].confidence, tier::MANIFEST_JAVA_WITH_NODE);
        assert!(with_node[0].reason.contains("Node"));
    }

    #[test]
    fn test_python_manifest_outranks_java_descriptor() {
        assert!(tier::MANIFEST_PYTHON >= tier::MANIFEST_JAVA);
        let out = run(python_manifest, json!({"files": ["requirements-dev.txt"]}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, PipelineLabel::Python);
    }

    #[test]
    fn test_dockerfile_and_compose_both_emit_docker() {
        let out = run(container, json!({"files": ["Dockerfile", "docker-compose.yml"]}));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.label == PipelineLabel::Docker));
    }

    #[test]
    fn test_recommended_templates_step_down() {
        let out = run(
            recommended_templates,
            json!({"recommended_templates": ["python", "unknown", "docker", "node", "go", "java", "static"]}),
        );
        let confidences: Vec<f64> = out.iter().map(|c| c.confidence).collect();
        assert_eq!(out[0].label, PipelineLabel::Python);
        assert!((confidences[0] - 0.70).abs() < 1e-9);
        assert!((confidences[1] - 0.65).abs() < 1e-9);
        assert!(confidences.iter().all(|c| *c >= tier::RECOMMENDED_FLOOR));
    }

    #[test]
    fn test_polyglot_scales_with_language_count() {
        let two = run(polyglot, json!({"languages": {"Go": 50, "Python": 40, "Shell": 10}}));
        assert!((two[0].confidence - 0.55).abs() < 1e-9);

        let four = run(
            polyglot,
            json!({"languages": {"A": 24, "B": 24, "C": 24, "D": 24, "E": 4}}),
        );
        assert!((four[0].confidence - tier::POLYGLOT_CAP).abs() < 1e-9);

        let one = run(polyglot, json!({"languages": {"Go": 90, "Shell": 10}}));
        assert!(one.is_empty());
    }

    #[test]
    fn test_monorepo_from_nested_packages() {
        let out = run(
            monorepo,
            json!({"files": ["package.json", "packages/a/package.json", "packages/b/package.json"]}),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, PipelineLabel::Monorepo);
    }

    #[test]
    fn test_static_site_from_html_share() {
        let out = run(static_site, json!({"languages": {"HTML": 55, "CSS": 30, "JavaScript": 15}}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, tier::HTML_HEAVY);
    }

    #[test]
    fn test_framework_names_map_to_ecosystems() {
        let out = run(frameworks, json!({"frameworks": ["Next.js", "Gin", "Unknown"]}));
        let labels: Vec<PipelineLabel> = out.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![PipelineLabel::Go, PipelineLabel::Node]);
    }
}
