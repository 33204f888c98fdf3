// cvcheck-core/src/infrastructure/adapters/vocabulary.rs

use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

use crate::infrastructure::error::InfrastructureError;
use crate::ports::{VocabularyClient, VocabularyError};

/// One controlled-vocabulary collection: literal terms plus full-match patterns.
#[derive(Debug, Clone, Default)]
struct Collection {
    terms: BTreeSet<String>,
    patterns: Vec<Regex>,
}

impl Collection {
    fn contains(&self, value: &str) -> bool {
        self.terms.contains(value) || self.patterns.iter().any(|p| p.is_match(value))
    }
}

#[derive(Deserialize)]
struct CollectionFile {
    #[serde(default)]
    terms: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Vocabulary backed by local YAML files, immutable once loaded so it can be
/// shared between workers.
#[derive(Debug, Clone)]
pub struct LocalVocabulary {
    project_id: String,
    collections: BTreeMap<String, Collection>,
}

impl LocalVocabulary {
    /// Reads every `<dir>/<project_id>/<collection>.yaml` (or `.yml`).
    #[instrument(skip(dir), fields(dir = %dir.display()))]
    pub fn load(dir: &Path, project_id: &str) -> Result<Self, InfrastructureError> {
        let project_dir = dir.join(project_id);
        if !project_dir.is_dir() {
            return Err(InfrastructureError::ConfigNotFound(format!(
                "no vocabulary for project '{}' under {}",
                project_id,
                dir.display()
            )));
        }

        let mut collections = BTreeMap::new();
        for entry in fs::read_dir(&project_dir)? {
            let path = entry?.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_yaml || !path.is_file() {
                continue;
            }

            let file: CollectionFile = serde_yaml::from_str(&fs::read_to_string(&path)?)?;
            let patterns = file
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                        InfrastructureError::ConfigError(format!(
                            "invalid pattern in {}: {}",
                            path.display(),
                            e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            collections.insert(
                name.to_string(),
                Collection {
                    terms: file.terms.into_iter().collect(),
                    patterns,
                },
            );
        }

        info!(
            project = project_id,
            collections = collections.len(),
            "Vocabulary loaded"
        );
        Ok(Self {
            project_id: project_id.to_string(),
            collections,
        })
    }

    /// Builds a vocabulary from literal term lists.
    pub fn from_terms<I, C, T>(project_id: &str, collections: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<T>)>,
        C: Into<String>,
        T: Into<String>,
    {
        let collections = collections
            .into_iter()
            .map(|(name, terms)| {
                (
                    name.into(),
                    Collection {
                        terms: terms.into_iter().map(Into::into).collect(),
                        patterns: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            project_id: project_id.to_string(),
            collections,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

impl VocabularyClient for LocalVocabulary {
    fn valid_term(
        &self,
        value: &str,
        project_id: &str,
        collection_id: &str,
    ) -> Result<bool, VocabularyError> {
        if !project_id.eq_ignore_ascii_case(&self.project_id) {
            return Err(VocabularyError::UnknownProject(project_id.to_string()));
        }
        let collection =
            self.collections
                .get(collection_id)
                .ok_or_else(|| VocabularyError::UnknownCollection {
                    project: project_id.to_string(),
                    collection: collection_id.to_string(),
                })?;
        Ok(collection.contains(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_load_terms_and_patterns() -> Result<()> {
        let dir = tempdir()?;
        let project = dir.path().join("CMIP6");
        fs::create_dir(&project)?;
        fs::write(project.join("experiment_id.yaml"), "terms: [historical, ssp585]\n")?;
        fs::write(
            project.join("member_id.yml"),
            "patterns: ['r\\d+i\\d+p\\d+f\\d+']\n",
        )?;
        fs::write(project.join("README.md"), "not a collection")?;

        let vocab = LocalVocabulary::load(dir.path(), "CMIP6")?;

        assert_eq!(vocab.collection_names().count(), 2);
        assert!(vocab.valid_term("historical", "CMIP6", "experiment_id")?);
        assert!(!vocab.valid_term("Historical", "CMIP6", "experiment_id")?);
        assert!(vocab.valid_term("r1i1p1f1", "cmip6", "member_id")?);
        // patterns are anchored
        assert!(!vocab.valid_term("xr1i1p1f1", "CMIP6", "member_id")?);
        Ok(())
    }

    #[test]
    fn test_unknown_project_and_collection_are_typed() {
        let vocab = LocalVocabulary::from_terms("CMIP6", [("activity_id", vec!["CMIP"])]);
        assert_eq!(
            vocab.valid_term("CMIP", "CORDEX", "activity_id"),
            Err(VocabularyError::UnknownProject("CORDEX".into()))
        );
        assert!(matches!(
            vocab.valid_term("CMIP", "CMIP6", "nominal_resolution"),
            Err(VocabularyError::UnknownCollection { .. })
        ));
    }

    #[test]
    fn test_missing_project_directory() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LocalVocabulary::load(dir.path(), "CMIP6"),
            Err(InfrastructureError::ConfigNotFound(_))
        ));
    }
}
