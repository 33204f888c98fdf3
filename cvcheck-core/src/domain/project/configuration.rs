// cvcheck-core/src/domain/project/configuration.rs

use crate::domain::scoring::{Category, Severity};
use crate::ports::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Project rule set. Loaded once per run, read-only afterwards.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[validate(length(min = 1, message = "project_id cannot be empty"))]
    pub project_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "config-paths", default)]
    pub config_paths: Vec<String>,

    #[serde(default)]
    pub default_severity: Severity,

    #[serde(default)]
    pub drs: DrsSchema,

    #[serde(default)]
    pub derivations: BTreeMap<String, DerivationRule>,

    #[validate(nested)]
    #[serde(default)]
    pub reporting: ReportingConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Severity>,

    #[validate(nested)]
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl ProjectConfig {
    pub fn check(&self, id: &str) -> Option<&CheckConfig> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Override table first, then the check's own severity, then the project default.
    pub fn severity_for(&self, check: &CheckConfig) -> Severity {
        self.severity_overrides
            .get(&check.id)
            .copied()
            .or(check.severity)
            .unwrap_or(self.default_severity)
    }
}

/// Positional token layout of directory paths and filenames.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DrsSchema {
    #[serde(default)]
    pub project_root: String,

    #[serde(default)]
    pub directory: Vec<String>,

    #[serde(default)]
    pub filename: Vec<String>,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Tokens never compared against global attributes.
    #[serde(default = "default_skip_compare")]
    pub skip_compare: Vec<String>,
}

impl Default for DrsSchema {
    fn default() -> Self {
        Self {
            project_root: String::new(),
            directory: vec![],
            filename: vec![],
            separator: default_separator(),
            extension: default_extension(),
            skip_compare: default_skip_compare(),
        }
    }
}

/// How the expected value of a derived attribute is obtained.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum DerivationRule {
    FilenameToken {
        position: usize,
    },
    DirectoryToken {
        position: usize,
    },
    Attribute {
        attribute: String,
        #[serde(default)]
        strip_prefix: Option<String>,
    },
    /// e.g. `r{realization_index}i{initialization_index}p{physics_index}f{forcing_index}`
    Compose {
        template: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ReportingConfig {
    /// How many offending indices a data check lists before truncating.
    #[validate(range(min = 1, message = "max_reported_violations must be at least 1"))]
    #[serde(default = "default_max_reported")]
    pub max_reported_violations: usize,

    #[validate(range(min = 1, message = "slab_size must be at least 1"))]
    #[serde(default = "default_slab_size")]
    pub slab_size: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            max_reported_violations: default_max_reported(),
            slab_size: default_slab_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DataConfig {
    #[serde(default)]
    pub constant_tolerance: f64,
}

// --- CHECK CATALOG ---

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct CheckConfig {
    #[validate(length(min = 1, message = "check id cannot be empty"))]
    pub id: String,

    #[serde(default)]
    pub severity: Option<Severity>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: CheckKind,
}

impl CheckConfig {
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    pub fn describe(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.kind.default_description())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum CheckKind {
    File(FileCheck),
    Dimension(DimensionCheck),
    Variable(VariableCheck),
    Attribute(AttributeCheck),
    Directory(DirectoryCheck),
    Data(DataCheck),
}

impl CheckKind {
    pub fn category(&self) -> Category {
        match self {
            Self::File(_) => Category::File,
            Self::Dimension(_) => Category::Dimension,
            Self::Variable(_) => Category::Variable,
            Self::Attribute(_) => Category::Attribute,
            Self::Directory(_) => Category::Directory,
            Self::Data(_) => Category::Data,
        }
    }

    pub fn default_description(&self) -> String {
        match self {
            Self::File(FileCheck::Format { expected_format, .. }) => {
                format!("File format is {}", expected_format)
            }
            Self::File(FileCheck::Compression { expected_codec, .. }) => {
                format!("Variable compressed with {}", expected_codec)
            }
            Self::Dimension(DimensionCheck::Existence { dimension, .. }) => {
                format!("Dimension '{}' exists", dimension)
            }
            Self::Dimension(DimensionCheck::Size { dimension, .. }) => {
                format!("Dimension '{}' size", dimension)
            }
            Self::Variable(VariableCheck::Existence { variable, .. }) => {
                format!("Variable '{}' exists", variable)
            }
            Self::Variable(VariableCheck::Shape { variable, .. }) => {
                format!("Variable '{}' shape matches dimensions", variable)
            }
            Self::Variable(VariableCheck::Type { variable, .. }) => {
                format!("Variable '{}' data type", variable)
            }
            Self::Variable(VariableCheck::Bounds { variable, .. }) => {
                format!("Variable '{}' within its bounds", variable)
            }
            Self::Variable(VariableCheck::TimeAxis { variable, .. }) => {
                format!("Time axis '{}'", variable)
            }
            Self::Variable(VariableCheck::BoundsContiguity { variable, .. }) => {
                format!("Bounds of '{}' are contiguous", variable)
            }
            Self::Variable(VariableCheck::BoundsMonotonicity { variable, .. }) => {
                format!("Bounds of '{}' are monotonic", variable)
            }
            Self::Variable(VariableCheck::TimeSquareness { variable, .. }) => {
                format!("Time squareness of '{}'", variable)
            }
            Self::Attribute(AttributeCheck::Attribute(spec)) => match &spec.variable {
                Some(var) => format!("Variable attribute '{}:{}'", var, spec.attribute),
                None => format!("Global attribute '{}'", spec.attribute),
            },
            Self::Attribute(AttributeCheck::Consistency { attribute, .. }) => {
                format!("Consistency of '{}'", attribute)
            }
            Self::Attribute(AttributeCheck::FrequencyTable { .. }) => {
                "Consistency: frequency vs table_id".to_string()
            }
            Self::Directory(DirectoryCheck::Structure) => "DRS directory structure".to_string(),
            Self::Directory(DirectoryCheck::FilenameAttributes) => {
                "Filename tokens match global attributes".to_string()
            }
            Self::Directory(DirectoryCheck::Vocabulary) => {
                "DRS tokens are controlled vocabulary terms".to_string()
            }
            Self::Data(DataCheck::NanInf { variable, .. }) => {
                format!("No NaN/Inf in '{}'", variable)
            }
            Self::Data(DataCheck::Constant { variable, .. }) => {
                format!("Field '{}' is not constant", variable)
            }
            Self::Data(DataCheck::FillValue { variable }) => {
                format!("Fill value of '{}' outside valid range", variable)
            }
            Self::Data(DataCheck::Outlier { variable, .. }) => {
                format!("Physically plausible values in '{}'", variable)
            }
            Self::Data(DataCheck::ChunkSize { variable, .. }) => {
                format!("Chunk size of '{}'", variable)
            }
            Self::Data(DataCheck::ActualRange { variable }) => {
                format!("Data of '{}' within actual_range", variable)
            }
            Self::Data(DataCheck::StatisticalOutlier {
                variable, method, ..
            }) => {
                format!("Spatial {} outliers in '{}'", method.as_str(), variable)
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum FileCheck {
    Format {
        expected_format: String,
        #[serde(default)]
        expected_data_model: Option<String>,
    },
    Compression {
        #[serde(default)]
        variable: Option<String>,
        #[serde(default = "default_codec")]
        expected_codec: String,
        #[serde(default)]
        expected_level: Option<u8>,
        #[serde(default)]
        expected_shuffle: Option<bool>,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum DimensionCheck {
    Existence {
        dimension: String,
        #[serde(default = "default_true")]
        required: bool,
    },
    Size {
        dimension: String,
        #[serde(default)]
        expected_size: Option<u64>,
        #[serde(default)]
        min_size: Option<u64>,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Monotonic {
    #[default]
    Increasing,
    Decreasing,
}

/// One data type or a list of acceptable ones.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TypeSet {
    One(DataType),
    Many(Vec<DataType>),
}

impl TypeSet {
    pub fn as_slice(&self) -> &[DataType] {
        match self {
            Self::One(t) => std::slice::from_ref(t),
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum VariableCheck {
    Existence {
        variable: String,
        #[serde(default = "default_true")]
        required: bool,
    },
    Shape {
        variable: String,
        dimensions: Vec<String>,
    },
    Type {
        variable: String,
        expected: TypeSet,
    },
    Bounds {
        variable: String,
        #[serde(default)]
        bounds_variable: Option<String>,
    },
    TimeAxis {
        #[serde(default = "default_time")]
        variable: String,
        #[serde(default)]
        monotonic: Monotonic,
        #[serde(default = "default_true")]
        check_bounds: bool,
        #[serde(default = "default_true")]
        check_filename_range: bool,
    },
    /// Each upper bound equals the next lower bound.
    BoundsContiguity {
        variable: String,
        #[serde(default)]
        bounds_variable: Option<String>,
    },
    BoundsMonotonicity {
        variable: String,
        #[serde(default)]
        bounds_variable: Option<String>,
    },
    /// Rebuilds the expected time axis from the filename start, the
    /// `frequency` attribute and the calendar, then compares it step by step.
    TimeSquareness {
        #[serde(default = "default_time")]
        variable: String,
        #[serde(default)]
        calendar: Option<String>,
        #[serde(default)]
        ref_time_units: Option<String>,
        /// `frequency` value to step token (`30m`, `6h`, `1D`, `1M`, `10Y`).
        /// Entries replace the built-in ones with the same key.
        #[serde(default)]
        increments: BTreeMap<String, String>,
        /// Frequencies whose averaged values sit at interval midpoints.
        #[serde(default = "default_midpoint_frequencies")]
        midpoint_frequencies: Vec<String>,
    },
}

impl VariableCheck {
    /// Built-in step per `frequency`, overlaid with the configured entries.
    pub fn increment_table(overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut table: BTreeMap<String, String> = [
            ("subhrPt", "30m"),
            ("1hr", "1h"),
            ("1hrPt", "1h"),
            ("3hr", "3h"),
            ("3hrPt", "3h"),
            ("6hr", "6h"),
            ("6hrPt", "6h"),
            ("day", "1D"),
            ("dayPt", "1D"),
            ("mon", "1M"),
            ("monPt", "1M"),
            ("yr", "1Y"),
            ("yrPt", "1Y"),
            ("dec", "10Y"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        table.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        table
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Str,
    Int,
    Float,
    StrArray,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::StrArray => "str_array",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AttributeSpec {
    pub attribute: String,
    /// Owning variable; `None` means a global attribute.
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub expected_type: Option<ValueType>,
    /// Full-match regular expression.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub vocabulary: bool,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub multi_term: bool,
}

impl AttributeSpec {
    /// CV collection the value is validated against. A literal `parent_`
    /// prefix is dropped so `parent_activity_id` maps onto `activity_id`.
    pub fn collection_id(&self) -> &str {
        let name = self.collection.as_deref().unwrap_or(&self.attribute);
        name.strip_prefix("parent_").unwrap_or(name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AttributeCheck {
    Attribute(AttributeSpec),
    Consistency {
        attribute: String,
        #[serde(default)]
        rule: Option<DerivationRule>,
    },
    FrequencyTable {
        mapping: BTreeMap<String, Vec<String>>,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum DirectoryCheck {
    Structure,
    FilenameAttributes,
    Vocabulary,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum DataCheck {
    NanInf {
        variable: String,
        #[serde(default)]
        allow_nan: bool,
        #[serde(default)]
        allow_inf: bool,
    },
    Constant {
        variable: String,
        #[serde(default)]
        tolerance: Option<f64>,
    },
    FillValue {
        variable: String,
    },
    Outlier {
        variable: String,
        min: f64,
        max: f64,
    },
    ChunkSize {
        variable: String,
        #[serde(default)]
        max_chunk_shape: Option<Vec<u64>>,
        #[serde(default)]
        max_chunk_elements: Option<u64>,
    },
    /// Data extremes stay inside the variable's `actual_range` attribute.
    ActualRange {
        variable: String,
    },
    /// Per grid point extremes over time, screened across the grid.
    StatisticalOutlier {
        variable: String,
        #[serde(default)]
        method: OutlierMethod,
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default = "default_time")]
        time_dimension: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    #[default]
    ZScore,
    Iqr,
}

impl OutlierMethod {
    pub fn default_threshold(&self) -> f64 {
        match self {
            Self::ZScore => 5.0,
            Self::Iqr => 1.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "z-score",
            Self::Iqr => "IQR",
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_version() -> String {
    "1.0".to_string()
}
fn default_separator() -> String {
    "_".to_string()
}
fn default_extension() -> String {
    ".nc".to_string()
}
fn default_skip_compare() -> Vec<String> {
    vec!["version".to_string()]
}
fn default_max_reported() -> usize {
    1
}
fn default_slab_size() -> usize {
    1_048_576
}
fn default_codec() -> String {
    "deflate".to_string()
}
fn default_time() -> String {
    "time".to_string()
}
fn default_midpoint_frequencies() -> Vec<String> {
    ["1hr", "3hr", "6hr", "day", "mon", "yr", "dec"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
project_id: CMIP6
name: cmip6-archive
drs:
  project_root: CMIP6
  directory: [activity_id, institution_id, source_id, version]
  filename: [variable_id, table_id, source_id, time_range]
derivations:
  variant_label:
    from: compose
    template: "r{realization_index}i{initialization_index}p{physics_index}f{forcing_index}"
severity_overrides:
  dim_time: low
checks:
  - id: dim_time
    category: dimension
    check: existence
    dimension: time
    severity: high
  - id: parent_activity
    category: attribute
    check: attribute
    attribute: parent_activity_id
    expected_type: str
    vocabulary: true
  - id: tas_type
    category: variable
    check: type
    variable: tas
    expected: [real, double]
  - id: tas_outliers
    category: data
    check: outlier
    variable: tas
    min: 150
    max: 350.5
"#;

    #[test]
    fn test_parse_project_config() -> anyhow::Result<()> {
        let config: ProjectConfig = serde_yaml::from_str(SAMPLE)?;
        config.validate()?;

        assert_eq!(config.project_id, "CMIP6");
        assert_eq!(config.drs.separator, "_");
        assert_eq!(config.drs.extension, ".nc");
        assert_eq!(config.drs.skip_compare, vec!["version"]);
        assert_eq!(config.reporting.max_reported_violations, 1);
        assert_eq!(config.checks.len(), 4);

        let dim = config.check("dim_time").unwrap();
        assert_eq!(dim.category(), Category::Dimension);
        assert_eq!(config.severity_for(dim), Severity::Low);

        let parent = config.check("parent_activity").unwrap();
        assert_eq!(config.severity_for(parent), Severity::Medium);
        match &parent.kind {
            CheckKind::Attribute(AttributeCheck::Attribute(spec)) => {
                assert_eq!(spec.collection_id(), "activity_id");
                assert!(spec.required);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        match &config.check("tas_type").unwrap().kind {
            CheckKind::Variable(VariableCheck::Type { expected, .. }) => {
                assert_eq!(expected.as_slice(), &[DataType::Float, DataType::Double]);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        match &config.check("tas_outliers").unwrap().kind {
            CheckKind::Data(DataCheck::Outlier { min, max, .. }) => {
                assert_eq!(*min, 150.0);
                assert_eq!(*max, 350.5);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_validation_rejects_empty_project_id() -> anyhow::Result<()> {
        let config: ProjectConfig = serde_yaml::from_str("project_id: ''")?;
        assert!(config.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_validation_rejects_zero_violation_limit() -> anyhow::Result<()> {
        let config: ProjectConfig =
            serde_yaml::from_str("project_id: X\nreporting:\n  max_reported_violations: 0\n")?;
        assert!(config.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_time_and_statistics_check_defaults() -> anyhow::Result<()> {
        let config: ProjectConfig = serde_yaml::from_str(
            r#"
project_id: CMIP6
checks:
  - {id: sq, category: variable, check: time_squareness, increments: {mon: 2M, fx: 1Y}}
  - {id: so, category: data, check: statistical_outlier, variable: tas, method: iqr}
"#,
        )?;
        match &config.check("sq").unwrap().kind {
            CheckKind::Variable(VariableCheck::TimeSquareness {
                variable,
                increments,
                midpoint_frequencies,
                ..
            }) => {
                assert_eq!(variable, "time");
                assert!(midpoint_frequencies.contains(&"mon".to_string()));
                let table = VariableCheck::increment_table(increments);
                assert_eq!(table["mon"], "2M");
                assert_eq!(table["fx"], "1Y");
                assert_eq!(table["day"], "1D");
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &config.check("so").unwrap().kind {
            CheckKind::Data(DataCheck::StatisticalOutlier {
                method, threshold, ..
            }) => {
                assert_eq!(*method, OutlierMethod::Iqr);
                assert_eq!(threshold.unwrap_or(method.default_threshold()), 1.5);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_explicit_collection_wins_over_attribute_name() -> anyhow::Result<()> {
        let spec: AttributeSpec = serde_yaml::from_str(
            "attribute: driving_experiment_id\ncollection: experiment_id\nmulti_term: true\n",
        )?;
        assert_eq!(spec.collection_id(), "experiment_id");
        assert!(spec.multi_term);
        Ok(())
    }
}
