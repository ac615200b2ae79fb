use super::document::DeploySpec;
use crate::rules::Evidence;

const PROVIDERS: &[(&str, &str, &str)] = &[
    ("netlify.toml", "netlify", "NETLIFY_AUTH_TOKEN"),
    ("vercel.json", "vercel", "VERCEL_TOKEN"),
    ("firebase.json", "firebase", "FIREBASE_TOKEN"),
];

const SPA_FRAMEWORKS: &[&str] = &[
    "react",
    "create-react-app",
    "vue",
    "angular",
    "svelte",
    "next",
];

/// Deployment settings and the token they need, when the repository looks
/// deployable as a static or single-page site.
pub fn deploy_settings(ev: &Evidence) -> Option<(DeploySpec, &'static str)> {
    let mode = if SPA_FRAMEWORKS.iter().any(|f| ev.frameworks.contains(*f)) {
        "spa"
    } else {
        "static"
    };

    let found = PROVIDERS.iter().find(|(file, _, _)| ev.has(file));
    let (config_file, provider, secret) = match found {
        Some((file, provider, secret)) => (*file, *provider, *secret),
        None if ev.is_markup_heavy() => ("", "netlify", "NETLIFY_AUTH_TOKEN"),
        None => return None,
    };

    Some((
        DeploySpec {
            enabled: true,
            provider: provider.to_string(),
            config_file: config_file.to_string(),
            mode: mode.to_string(),
        },
        secret,
    ))
}
