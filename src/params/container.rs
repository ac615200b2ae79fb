use super::document::ContainerSpec;
use crate::features::FeaturesDocument;
use crate::rules::Evidence;

pub const DEFAULT_REGISTRY: &str = "ghcr.io";
const DEFAULT_PLATFORMS: &[&str] = &["linux/amd64", "linux/arm64"];
const DEFAULT_TAGS: &[&str] = &["latest", "sha"];

/// Known container registries and the secrets they need for a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registry {
    Ghcr,
    DockerHub,
    Quay,
    Ecr(String),
    Gcr(String),
    Other(String),
}

impl Registry {
    /// Splits a registry reference such as `quay.io/acme` into the registry
    /// and its namespace, if any.
    pub fn parse_reference(reference: &str) -> (Self, Option<String>) {
        let trimmed = strip_scheme(reference.trim()).trim_matches('/');
        let (host, namespace) = match trimmed.split_once('/') {
            Some((host, rest)) => (host, Some(rest.trim_matches('/'))),
            None => (trimmed, None),
        };
        let namespace = namespace
            .filter(|n| !n.is_empty())
            .map(str::to_ascii_lowercase);
        (Self::from_host(host), namespace)
    }

    pub fn from_host(host: &str) -> Self {
        let host = strip_scheme(host.trim())
            .trim_end_matches('/')
            .to_ascii_lowercase();
        match host.as_str() {
            "" | "ghcr.io" => Registry::Ghcr,
            "docker.io" | "docker.com" | "hub.docker.com" | "index.docker.io" | "dockerhub" => {
                Registry::DockerHub
            }
            "quay.io" => Registry::Quay,
            h if h.contains(".dkr.ecr.") || h.ends_with("amazonaws.com") => Registry::Ecr(h.to_string()),
            h if h == "gcr.io" || h.ends_with(".gcr.io") || h.ends_with("-docker.pkg.dev") => {
                Registry::Gcr(h.to_string())
            }
            h => Registry::Other(h.to_string()),
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Registry::Ghcr => DEFAULT_REGISTRY,
            Registry::DockerHub => "docker.io",
            Registry::Quay => "quay.io",
            Registry::Ecr(h) | Registry::Gcr(h) | Registry::Other(h) => h,
        }
    }

    pub fn secrets(&self) -> &'static [&'static str] {
        match self {
            Registry::Ghcr => &["GITHUB_TOKEN"],
            Registry::DockerHub => &["DOCKERHUB_USERNAME", "DOCKERHUB_TOKEN"],
            Registry::Quay => &["QUAY_USERNAME", "QUAY_PASSWORD"],
            Registry::Ecr(_) => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
            Registry::Gcr(_) => &["GCP_SA_KEY"],
            Registry::Other(_) => &["REGISTRY_USERNAME", "REGISTRY_PASSWORD"],
        }
    }
}

fn strip_scheme(raw: &str) -> &str {
    raw.trim_start_matches("https://").trim_start_matches("http://")
}

/// Container build settings plus the secrets they imply.
///
/// Returns `None` when the repository has no container indicators.
pub fn container_settings(
    features: &FeaturesDocument,
    ev: &Evidence,
) -> Option<(ContainerSpec, Vec<String>)> {
    if !(ev.dockerfile || ev.compose) {
        return None;
    }

    let (registry, namespace) =
        Registry::parse_reference(features.container.registry.as_deref().unwrap_or(""));

    let (owner, name) = match &features.repository {
        Some(repo) => (repo.owner.to_ascii_lowercase(), repo.name.to_ascii_lowercase()),
        None => (String::new(), String::new()),
    };
    let owner = namespace.unwrap_or(owner);
    let name = if name.is_empty() { "app".to_string() } else { name };
    let image = if owner.is_empty() {
        format!("{}/{}", registry.host(), name)
    } else {
        format!("{}/{}/{}", registry.host(), owner, name)
    };

    let sign = ev.has("cosign.pub");
    let mut secrets: Vec<String> = registry.secrets().iter().map(|s| s.to_string()).collect();
    if sign {
        secrets.push("COSIGN_PRIVATE_KEY".to_string());
        secrets.push("COSIGN_PASSWORD".to_string());
    }

    let spec = ContainerSpec {
        enabled: true,
        image,
        registry: registry.host().to_string(),
        platforms: DEFAULT_PLATFORMS.iter().map(|s| s.to_string()).collect(),
        cache: true,
        tags: DEFAULT_TAGS.iter().map(|s| s.to_string()).collect(),
        provenance: true,
        sbom: true,
        sign,
    };

    Some((spec, secrets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    fn settings(value: serde_json::Value) -> Option<(ContainerSpec, Vec<String>)> {
        let features = FeaturesDocument::from_value(&value).unwrap();
        let ev = Evidence::from_features(&features);
        container_settings(&features, &ev)
    }

    #[parameterized(
        ghcr = { "ghcr.io", "ghcr.io" },
        empty = { "", "ghcr.io" },
        dockerhub = { "docker.io", "docker.io" },
        quay = { "https://quay.io/", "quay.io" },
        ecr = { "123456789.dkr.ecr.us-east-1.amazonaws.com", "123456789.dkr.ecr.us-east-1.amazonaws.com" },
        gar = { "europe-docker.pkg.dev", "europe-docker.pkg.dev" },
        other = { "registry.example.com", "registry.example.com" },
    )]
    fn test_registry_host(input: &str, expected: &str) {
        assert_eq!(Registry::from_host(input).host(), expected);
    }

    #[parameterized(
        quay_namespace = { "quay.io/acme", "quay.io", Some("acme") },
        dockerhub_org = { "docker.io/org", "docker.io", Some("org") },
        ghcr_trailing_slash = { "https://ghcr.io/Acme/", "ghcr.io", Some("acme") },
        nested = { "registry.example.com/team/sub", "registry.example.com", Some("team/sub") },
        bare_host = { "quay.io", "quay.io", None },
    )]
    fn test_registry_reference(input: &str, host: &str, namespace: Option<&str>) {
        let (registry, ns) = Registry::parse_reference(input);
        assert_eq!(registry.host(), host);
        assert_eq!(ns.as_deref(), namespace);
    }

    #[test]
    fn test_namespaced_registry_sets_owner() {
        let (spec, secrets) = settings(json!({
            "repository": "someone/api",
            "files": ["go.mod", "Dockerfile"],
            "container": {"registry": "quay.io/acme"}
        }))
        .unwrap();
        assert_eq!(spec.registry, "quay.io");
        assert_eq!(spec.image, "quay.io/acme/api");
        assert_eq!(secrets, vec!["QUAY_USERNAME", "QUAY_PASSWORD"]);

        let (spec, secrets) = settings(json!({
            "repository": "someone/web",
            "files": ["Dockerfile"],
            "container": {"registry": "docker.io/org"}
        }))
        .unwrap();
        assert_eq!(spec.image, "docker.io/org/web");
        assert_eq!(secrets, vec!["DOCKERHUB_USERNAME", "DOCKERHUB_TOKEN"]);
    }

    #[test]
    fn test_registry_secrets() {
        assert_eq!(Registry::Ghcr.secrets(), &["GITHUB_TOKEN"]);
        assert_eq!(
            Registry::from_host("gcr.io").secrets(),
            &["GCP_SA_KEY"]
        );
        assert_eq!(
            Registry::from_host("registry.example.com").secrets(),
            &["REGISTRY_USERNAME", "REGISTRY_PASSWORD"]
        );
    }

    #[test]
    fn test_no_container_without_dockerfile() {
        assert!(settings(json!({"files": ["package.json"]})).is_none());
    }

    #[test]
    fn test_default_ghcr_image() {
        let (spec, secrets) = settings(json!({
            "repository": "Acme/Web-App",
            "files": ["Dockerfile", "package.json"]
        }))
        .unwrap();
        assert!(spec.enabled);
        assert_eq!(spec.image, "ghcr.io/acme/web-app");
        assert_eq!(spec.platforms, vec!["linux/amd64", "linux/arm64"]);
        assert!(spec.provenance && spec.sbom && spec.cache);
        assert!(!spec.sign);
        assert_eq!(secrets, vec!["GITHUB_TOKEN"]);
    }

    #[test]
    fn test_signing_adds_cosign_secrets() {
        let (spec, secrets) = settings(json!({
            "files": ["Dockerfile", "cosign.pub"],
            "container": {"registry": "docker.io"}
        }))
        .unwrap();
        assert!(spec.sign);
        assert_eq!(spec.image, "docker.io/app");
        assert!(secrets.contains(&"DOCKERHUB_TOKEN".to_string()));
        assert!(secrets.contains(&"COSIGN_PRIVATE_KEY".to_string()));
    }
}
