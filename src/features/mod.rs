//! Repository features: the input document and its manifest views

mod document;
pub mod manifests;

pub use document::{CiIndicators, ContainerIndicators, FeaturesDocument, FeaturesError, RepoId};
pub use manifests::{PackageJson, PomXml, PyProject};
