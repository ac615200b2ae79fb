//! Pipeline label identifiers
//!
//! Labels are the shared vocabulary between the rule engine, the external
//! classifier and the parameter extractor. The set is closed: classifier
//! output outside of it is dropped during merging.

macro_rules! define_label_enum {
    (
        $(#[$enum_meta:meta])*
        $enum_name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $tag:literal $( | $alias:literal )*
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $enum_name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl serde::Serialize for $enum_name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $enum_name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown pipeline label: {}", s))
                })
            }
        }

        impl $enum_name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant => $tag,
                    )*
                }
            }

            /// Case-insensitive lookup by tag or alias
            pub fn parse(name: &str) -> Option<Self> {
                match name.trim().to_ascii_lowercase().as_str() {
                    $(
                        $tag $(| $alias)* => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }

            pub fn all_variants() -> &'static [Self] {
                &[
                    $(
                        Self::$variant,
                    )*
                ]
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_label_enum! {
    /// Pipeline template label
    PipelineLabel {
        Node => "node" | "nodejs" | "javascript" | "typescript",
        Python => "python",
        Java => "java" | "maven" | "gradle",
        Go => "go" | "golang",
        Docker => "docker" | "container",
        Terraform => "terraform" | "hcl",
        Monorepo => "monorepo",
        Static => "static" | "static-site",
        Polyglot => "polyglot",
        Generic => "generic",
    }
}

impl PipelineLabel {
    /// Whether the label names a language ecosystem rather than a packaging or layout signal
    pub fn is_language(&self) -> bool {
        matches!(
            self,
            PipelineLabel::Node
                | PipelineLabel::Python
                | PipelineLabel::Java
                | PipelineLabel::Go
                | PipelineLabel::Terraform
        )
    }

    /// Labels offered to the classifier when the rule engine proposes nothing specific
    pub fn classifier_label_space() -> Vec<PipelineLabel> {
        Self::all_variants()
            .iter()
            .copied()
            .filter(|l| *l != PipelineLabel::Polyglot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_string(&PipelineLabel::Node).unwrap(),
            "\"node\""
        );
        assert_eq!(
            serde_json::to_string(&PipelineLabel::Terraform).unwrap(),
            "\"terraform\""
        );
    }

    #[test]
    fn test_label_parse_aliases() {
        assert_eq!(PipelineLabel::parse("NodeJS"), Some(PipelineLabel::Node));
        assert_eq!(PipelineLabel::parse(" golang "), Some(PipelineLabel::Go));
        assert_eq!(PipelineLabel::parse("maven"), Some(PipelineLabel::Java));
        assert_eq!(PipelineLabel::parse("cobol"), None);
    }

    #[test]
    fn test_label_deserialization_rejects_unknown() {
        let ok: PipelineLabel = serde_json::from_str("\"docker\"").unwrap();
        assert_eq!(ok, PipelineLabel::Docker);
        assert!(serde_json::from_str::<PipelineLabel>("\"cobol\"").is_err());
    }

    #[test]
    fn test_language_labels() {
        assert!(PipelineLabel::Python.is_language());
        assert!(!PipelineLabel::Docker.is_language());
        assert!(!PipelineLabel::Generic.is_language());
    }

    #[test]
    fn test_classifier_label_space_excludes_polyglot() {
        let space = PipelineLabel::classifier_label_space();
        assert!(!space.contains(&PipelineLabel::Polyglot));
        assert!(space.contains(&PipelineLabel::Generic));
    }
}
