// cvcheck-core/src/domain/tokens/resolver.rs

use crate::domain::error::ConfigurationError;
use crate::domain::project::{DerivationRule, DrsSchema};
use crate::ports::{DatasetAccessor, DatasetError};
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

const PLACEHOLDER: &str = r"\{([A-Za-z0-9_]+)\}";
const TIME_RANGE: &str = "time_range";

/// The path or filename does not follow the DRS layout. Reported as a failed
/// assertion by the directory checks, never as an execution error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TokenParseError(pub String);

/// Tokens extracted from a path, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTokens {
    entries: Vec<(String, String)>,
}

impl ParsedTokens {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Attribute(String),
}

/// A derivation rule checked against the schema and ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledRule {
    FilenameToken(usize),
    DirectoryToken(usize),
    Attribute {
        attribute: String,
        strip_prefix: Option<String>,
    },
    Compose(Vec<Segment>),
}

/// Result of deriving an expected value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Resolved(String),
    /// A source the rule depends on is missing. Carries the reason.
    Unresolvable(String),
}

#[derive(Debug, Clone)]
pub struct TokenResolver {
    schema: DrsSchema,
    rules: BTreeMap<String, CompiledRule>,
}

impl TokenResolver {
    pub fn new(
        schema: &DrsSchema,
        derivations: &BTreeMap<String, DerivationRule>,
    ) -> Result<Self, ConfigurationError> {
        validate_schema(schema)?;

        let mut rules = BTreeMap::new();
        for (attribute, rule) in derivations {
            rules.insert(attribute.clone(), compile_rule(schema, attribute, rule)?);
        }

        Ok(Self {
            schema: schema.clone(),
            rules,
        })
    }

    pub fn schema(&self) -> &DrsSchema {
        &self.schema
    }

    pub fn rule(&self, attribute: &str) -> Option<&CompiledRule> {
        self.rules.get(attribute)
    }

    /// Compiles a rule declared inline on a check, against this resolver's schema.
    pub fn compile(
        &self,
        attribute: &str,
        rule: &DerivationRule,
    ) -> Result<CompiledRule, ConfigurationError> {
        compile_rule(&self.schema, attribute, rule)
    }

    pub fn parse_filename(&self, file_name: &str) -> Result<ParsedTokens, TokenParseError> {
        let stem = file_name
            .strip_suffix(self.schema.extension.as_str())
            .ok_or_else(|| {
                TokenParseError(format!(
                    "filename '{}' does not end with '{}'",
                    file_name, self.schema.extension
                ))
            })?;

        let parts: Vec<&str> = stem.split(self.schema.separator.as_str()).collect();
        let keys = &self.schema.filename;
        let has_time_range = keys.iter().any(|k| k == TIME_RANGE);

        let keys: Vec<&String> = if parts.len() == keys.len() {
            keys.iter().collect()
        } else if has_time_range && parts.len() + 1 == keys.len() {
            // Time-invariant file: no time range token.
            keys.iter().filter(|k| k.as_str() != TIME_RANGE).collect()
        } else {
            return Err(TokenParseError(format!(
                "filename '{}' has {} tokens, expected {}",
                file_name,
                parts.len(),
                keys.len()
            )));
        };

        Ok(ParsedTokens {
            entries: keys
                .into_iter()
                .zip(parts)
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        })
    }

    pub fn parse_directory(&self, file_path: &str) -> Result<ParsedTokens, TokenParseError> {
        let segments: Vec<&str> = file_path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((_, dirs)) = segments.split_last() else {
            return Err(TokenParseError(format!("empty path '{}'", file_path)));
        };

        let root = &self.schema.project_root;
        let start = dirs
            .iter()
            .rposition(|s| s.eq_ignore_ascii_case(root))
            .ok_or_else(|| {
                TokenParseError(format!(
                    "project root '{}' not found in path '{}'",
                    root, file_path
                ))
            })?;

        let tokens = &dirs[start..];
        if tokens.len() != self.schema.directory.len() {
            return Err(TokenParseError(format!(
                "directory has {} DRS segments from '{}', expected {}",
                tokens.len(),
                root,
                self.schema.directory.len()
            )));
        }

        Ok(ParsedTokens {
            entries: self
                .schema
                .directory
                .iter()
                .zip(tokens)
                .map(|(k, v)| (k.clone(), (*v).to_string()))
                .collect(),
        })
    }

    /// Derives the expected value of an attribute from a compiled rule.
    pub fn expected_value(
        &self,
        rule: &CompiledRule,
        dataset: &dyn DatasetAccessor,
    ) -> Result<Expectation, DatasetError> {
        match rule {
            CompiledRule::FilenameToken(position) => {
                let key = &self.schema.filename[*position];
                Ok(match self.parse_filename(dataset.file_name()) {
                    Ok(tokens) => match tokens.get(key) {
                        Some(v) => Expectation::Resolved(v.to_string()),
                        None => Expectation::Unresolvable(format!(
                            "filename has no '{}' token",
                            key
                        )),
                    },
                    Err(e) => Expectation::Unresolvable(e.0),
                })
            }
            CompiledRule::DirectoryToken(position) => {
                let key = &self.schema.directory[*position];
                Ok(match self.parse_directory(dataset.file_path()) {
                    Ok(tokens) => match tokens.get(key) {
                        Some(v) => Expectation::Resolved(v.to_string()),
                        None => Expectation::Unresolvable(format!(
                            "directory has no '{}' token",
                            key
                        )),
                    },
                    Err(e) => Expectation::Unresolvable(e.0),
                })
            }
            CompiledRule::Attribute {
                attribute,
                strip_prefix,
            } => Ok(match dataset.find_global_attribute(attribute)? {
                Some(value) => {
                    let text = value.as_text();
                    let stripped = match strip_prefix {
                        Some(prefix) => text.strip_prefix(prefix.as_str()).unwrap_or(&text),
                        None => &text,
                    };
                    Expectation::Resolved(stripped.to_string())
                }
                None => Expectation::Unresolvable(format!(
                    "global attribute '{}' is missing",
                    attribute
                )),
            }),
            CompiledRule::Compose(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(s) => out.push_str(s),
                        Segment::Attribute(name) => match dataset.find_global_attribute(name)? {
                            Some(v) => out.push_str(&v.as_text()),
                            None => {
                                return Ok(Expectation::Unresolvable(format!(
                                    "global attribute '{}' is missing",
                                    name
                                )));
                            }
                        },
                    }
                }
                Ok(Expectation::Resolved(out))
            }
        }
    }
}

/// Splits a multi-term attribute value on whitespace.
pub fn split_terms(value: &str) -> Vec<&str> {
    value.split_whitespace().collect()
}

fn validate_schema(schema: &DrsSchema) -> Result<(), ConfigurationError> {
    if schema.separator.is_empty() {
        return Err(ConfigurationError::InvalidTokenSchema(
            "filename separator cannot be empty".to_string(),
        ));
    }
    if !schema.directory.is_empty() && schema.project_root.is_empty() {
        return Err(ConfigurationError::InvalidTokenSchema(
            "a directory layout requires `project_root`".to_string(),
        ));
    }
    for keys in [&schema.directory, &schema.filename] {
        let mut seen = std::collections::HashSet::new();
        for key in keys {
            if key.is_empty() {
                return Err(ConfigurationError::InvalidTokenSchema(
                    "empty token name".to_string(),
                ));
            }
            if !seen.insert(key) {
                return Err(ConfigurationError::InvalidTokenSchema(format!(
                    "token '{}' appears twice",
                    key
                )));
            }
        }
    }
    Ok(())
}

fn compile_rule(
    schema: &DrsSchema,
    attribute: &str,
    rule: &DerivationRule,
) -> Result<CompiledRule, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidDerivation {
        attribute: attribute.to_string(),
        reason,
    };

    match rule {
        DerivationRule::FilenameToken { position } => {
            if *position >= schema.filename.len() {
                return Err(invalid(format!(
                    "filename position {} outside schema of {} tokens",
                    position,
                    schema.filename.len()
                )));
            }
            Ok(CompiledRule::FilenameToken(*position))
        }
        DerivationRule::DirectoryToken { position } => {
            if *position >= schema.directory.len() {
                return Err(invalid(format!(
                    "directory position {} outside schema of {} tokens",
                    position,
                    schema.directory.len()
                )));
            }
            Ok(CompiledRule::DirectoryToken(*position))
        }
        DerivationRule::Attribute {
            attribute: source,
            strip_prefix,
        } => {
            if source.is_empty() {
                return Err(invalid("source attribute cannot be empty".to_string()));
            }
            Ok(CompiledRule::Attribute {
                attribute: source.clone(),
                strip_prefix: strip_prefix.clone(),
            })
        }
        DerivationRule::Compose { template } => {
            compile_template(template).map(CompiledRule::Compose).map_err(invalid)
        }
    }
}

fn compile_template(template: &str) -> Result<Vec<Segment>, String> {
    let re = Regex::new(PLACEHOLDER).map_err(|e| e.to_string())?;

    let mut segments = Vec::new();
    let mut cursor = 0;
    for caps in re.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_literal(&mut segments, &template[cursor..whole.start()])?;
        segments.push(Segment::Attribute(name.as_str().to_string()));
        cursor = whole.end();
    }
    push_literal(&mut segments, &template[cursor..])?;

    if !segments.iter().any(|s| matches!(s, Segment::Attribute(_))) {
        return Err(format!("template '{}' has no {{attribute}} placeholder", template));
    }
    Ok(segments)
}

fn push_literal(segments: &mut Vec<Segment>, literal: &str) -> Result<(), String> {
    if literal.contains('{') || literal.contains('}') {
        return Err(format!("unbalanced braces in '{}'", literal));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::memory::InMemoryDataset;
    use crate::ports::AttrValue;

    fn schema() -> DrsSchema {
        DrsSchema {
            project_root: "CMIP6".into(),
            directory: vec![
                "mip_era".into(),
                "activity_id".into(),
                "source_id".into(),
                "version".into(),
            ],
            filename: vec![
                "variable_id".into(),
                "table_id".into(),
                "source_id".into(),
                "time_range".into(),
            ],
            ..DrsSchema::default()
        }
    }

    fn resolver(derivations: BTreeMap<String, DerivationRule>) -> TokenResolver {
        TokenResolver::new(&schema(), &derivations).unwrap()
    }

    #[test]
    fn test_parse_filename_with_and_without_time_range() -> anyhow::Result<()> {
        let r = resolver(BTreeMap::new());

        let tokens = r.parse_filename("tas_Amon_MPI-ESM1-2-LR_185001-201412.nc")?;
        assert_eq!(tokens.get("table_id"), Some("Amon"));
        assert_eq!(tokens.get("time_range"), Some("185001-201412"));

        let fixed = r.parse_filename("orog_fx_MPI-ESM1-2-LR.nc")?;
        assert_eq!(fixed.len(), 3);
        assert_eq!(fixed.get("time_range"), None);

        assert!(r.parse_filename("tas_Amon.nc").is_err());
        assert!(r.parse_filename("tas_Amon_MPI_185001-201412.zarr").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_directory_uses_last_root_occurrence() -> anyhow::Result<()> {
        let r = resolver(BTreeMap::new());
        let tokens = r.parse_directory(
            "/archive/cmip6/CMIP6/CMIP/MPI-ESM1-2-LR/v20190710/tas_Amon_MPI-ESM1-2-LR_185001-201412.nc",
        )?;
        assert_eq!(tokens.get("mip_era"), Some("CMIP6"));
        assert_eq!(tokens.get("activity_id"), Some("CMIP"));
        assert_eq!(tokens.get("version"), Some("v20190710"));

        let err = r
            .parse_directory("/data/CMIP6/CMIP/v1/tas_Amon_X_1850-1900.nc")
            .unwrap_err();
        assert!(err.0.contains("expected 4"));
        Ok(())
    }

    #[test]
    fn test_compose_template_resolves_variant_label() -> anyhow::Result<()> {
        let mut derivations = BTreeMap::new();
        derivations.insert(
            "variant_label".to_string(),
            DerivationRule::Compose {
                template: "r{realization_index}i{initialization_index}p{physics_index}f{forcing_index}"
                    .into(),
            },
        );
        let r = resolver(derivations);
        let ds = InMemoryDataset::builder("/x/tas_Amon_M_1850-1900.nc")
            .global("realization_index", AttrValue::Int(1))
            .global("initialization_index", AttrValue::Int(1))
            .global("physics_index", AttrValue::Int(1))
            .global("forcing_index", AttrValue::Int(2))
            .build();

        let rule = r.rule("variant_label").unwrap();
        assert_eq!(
            r.expected_value(rule, &ds)?,
            Expectation::Resolved("r1i1p1f2".into())
        );

        let partial = InMemoryDataset::builder("/x/tas_Amon_M_1850-1900.nc")
            .global("realization_index", AttrValue::Int(1))
            .build();
        assert!(matches!(
            r.expected_value(rule, &partial)?,
            Expectation::Unresolvable(_)
        ));
        Ok(())
    }

    #[test]
    fn test_rule_attributes_match_names_case_insensitively() -> anyhow::Result<()> {
        let mut derivations = BTreeMap::new();
        derivations.insert(
            "variant_label".to_string(),
            DerivationRule::Compose {
                template: "r{realization_index}i{initialization_index}".into(),
            },
        );
        derivations.insert(
            "source".to_string(),
            DerivationRule::Attribute {
                attribute: "source_id".into(),
                strip_prefix: None,
            },
        );
        let r = resolver(derivations);
        let ds = InMemoryDataset::builder("/x/tas_Amon_M_1850-1900.nc")
            .global("Realization_Index", AttrValue::Int(3))
            .global("INITIALIZATION_INDEX", AttrValue::Int(1))
            .global("Source_ID", AttrValue::Str("MPI-ESM1-2-LR".into()))
            .build();

        assert_eq!(
            r.expected_value(r.rule("variant_label").unwrap(), &ds)?,
            Expectation::Resolved("r3i1".into())
        );
        assert_eq!(
            r.expected_value(r.rule("source").unwrap(), &ds)?,
            Expectation::Resolved("MPI-ESM1-2-LR".into())
        );
        Ok(())
    }

    #[test]
    fn test_attribute_rule_strips_prefix() -> anyhow::Result<()> {
        let mut derivations = BTreeMap::new();
        derivations.insert(
            "sub_experiment".to_string(),
            DerivationRule::Attribute {
                attribute: "sub_experiment_id".into(),
                strip_prefix: Some("s".into()),
            },
        );
        let r = resolver(derivations);
        let ds = InMemoryDataset::builder("/x/a_b_c_d.nc")
            .global("sub_experiment_id", AttrValue::Str("s1960".into()))
            .build();
        assert_eq!(
            r.expected_value(r.rule("sub_experiment").unwrap(), &ds)?,
            Expectation::Resolved("1960".into())
        );
        Ok(())
    }

    #[test]
    fn test_invalid_rules_are_configuration_errors() {
        let mut out_of_range = BTreeMap::new();
        out_of_range.insert(
            "table_id".to_string(),
            DerivationRule::FilenameToken { position: 9 },
        );
        assert!(matches!(
            TokenResolver::new(&schema(), &out_of_range),
            Err(ConfigurationError::InvalidDerivation { .. })
        ));

        let mut broken = BTreeMap::new();
        broken.insert(
            "variant_label".to_string(),
            DerivationRule::Compose {
                template: "r{realization_index".into(),
            },
        );
        assert!(TokenResolver::new(&schema(), &broken).is_err());

        let bad_schema = DrsSchema {
            project_root: String::new(),
            ..schema()
        };
        assert!(matches!(
            TokenResolver::new(&bad_schema, &BTreeMap::new()),
            Err(ConfigurationError::InvalidTokenSchema(_))
        ));
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(split_terms("historical  rcp85"), vec!["historical", "rcp85"]);
        assert!(split_terms("   ").is_empty());
    }
}
