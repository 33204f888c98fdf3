// cvcheck-core/src/infrastructure/adapters/memory.rs

// A dataset held entirely in memory. It is what the JSON dataset descriptors
// deserialize into, and what the unit tests build by hand.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

use crate::domain::calendar;
use crate::ports::{
    AttrValue, CalendarDate, Compression, DataType, DatasetAccessor, DatasetError, DatasetOpener,
    StorageFormat, VariableInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryDataset {
    /// Logical path of the file, used for DRS parsing.
    #[serde(default)]
    pub path: String,

    #[serde(default = "default_format")]
    pub format: StorageFormat,

    #[serde(default)]
    pub global_attributes: BTreeMap<String, AttrValue>,

    #[serde(default)]
    pub dimensions: BTreeMap<String, u64>,

    /// Declaration order is kept.
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    pub dtype: DataType,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
    /// Flattened row-major values. `"NaN"`, `"Inf"` and `"-Inf"` are
    /// accepted as strings since JSON has no literal for them.
    #[serde(default, with = "samples")]
    pub data: Vec<f64>,
    /// Explicit shape. Derived from the dimension sizes when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
}

fn default_format() -> StorageFormat {
    StorageFormat {
        disk_format: "HDF5".to_string(),
        data_model: "NETCDF4".to_string(),
    }
}

mod samples {
    use super::*;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Sample {
        Number(f64),
        Special(String),
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Sample> = values
            .iter()
            .map(|v| match *v {
                v if v.is_nan() => Sample::Special("NaN".into()),
                v if v == f64::INFINITY => Sample::Special("Inf".into()),
                v if v == f64::NEG_INFINITY => Sample::Special("-Inf".into()),
                v => Sample::Number(v),
            })
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Sample>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|s| match s {
                Sample::Number(v) => Ok(v),
                Sample::Special(text) => match text.to_ascii_lowercase().as_str() {
                    "nan" => Ok(f64::NAN),
                    "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                    "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                    _ => Err(serde::de::Error::custom(format!(
                        "invalid sample '{}' (expected a number, NaN, Inf or -Inf)",
                        text
                    ))),
                },
            })
            .collect()
    }
}

impl InMemoryDataset {
    pub fn builder(path: impl Into<String>) -> InMemoryDatasetBuilder {
        InMemoryDatasetBuilder {
            dataset: InMemoryDataset {
                path: path.into(),
                format: default_format(),
                global_attributes: BTreeMap::new(),
                dimensions: BTreeMap::new(),
                variables: Vec::new(),
            },
        }
    }

    /// Parses a JSON dataset descriptor.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    fn entry(&self, name: &str) -> Option<&VariableEntry> {
        self.variables.iter().find(|v| v.name == name)
    }

    fn resolve_shape(&self, entry: &VariableEntry) -> Result<Vec<u64>, DatasetError> {
        if let Some(shape) = &entry.shape {
            return Ok(shape.clone());
        }
        entry
            .dimensions
            .iter()
            .map(|d| {
                self.dimensions.get(d).copied().ok_or_else(|| {
                    DatasetError::Malformed(format!(
                        "variable '{}' uses undeclared dimension '{}'",
                        entry.name, d
                    ))
                })
            })
            .collect()
    }
}

impl DatasetAccessor for InMemoryDataset {
    fn file_path(&self) -> &str {
        &self.path
    }

    fn global_attribute(&self, name: &str) -> Result<Option<AttrValue>, DatasetError> {
        Ok(self.global_attributes.get(name).cloned())
    }

    fn global_attribute_names(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self.global_attributes.keys().cloned().collect())
    }

    fn dimension_size(&self, name: &str) -> Result<Option<u64>, DatasetError> {
        Ok(self.dimensions.get(name).copied())
    }

    fn dimension_names(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self.dimensions.keys().cloned().collect())
    }

    fn variable(&self, name: &str) -> Result<Option<VariableInfo>, DatasetError> {
        let Some(entry) = self.entry(name) else {
            return Ok(None);
        };
        Ok(Some(VariableInfo {
            name: entry.name.clone(),
            dimensions: entry.dimensions.clone(),
            shape: self.resolve_shape(entry)?,
            dtype: entry.dtype,
            attributes: entry.attributes.clone(),
        }))
    }

    fn variable_names(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self.variables.iter().map(|v| v.name.clone()).collect())
    }

    fn read_values(
        &self,
        name: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<f64>, DatasetError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DatasetError::NoData(name.to_string()))?;
        if entry.data.is_empty() && count > 0 {
            return Err(DatasetError::NoData(name.to_string()));
        }
        let end = start.checked_add(count).filter(|e| *e <= entry.data.len());
        match end {
            Some(end) => Ok(entry.data[start..end].to_vec()),
            None => Err(DatasetError::OutOfRange {
                variable: name.to_string(),
                start,
                count,
                len: entry.data.len(),
            }),
        }
    }

    fn decode_time(&self, name: &str) -> Result<Vec<CalendarDate>, DatasetError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DatasetError::NoData(name.to_string()))?;
        let decoding_error = |reason: String| DatasetError::TimeDecoding {
            variable: name.to_string(),
            reason,
        };

        let units = entry
            .attributes
            .get("units")
            .map(AttrValue::as_text)
            .ok_or_else(|| decoding_error("no 'units' attribute".to_string()))?;
        let calendar = entry
            .attributes
            .get("calendar")
            .map(AttrValue::as_text)
            .unwrap_or_else(|| calendar::DEFAULT_CALENDAR.to_string());

        calendar::decode(&entry.data, &units, &calendar).map_err(decoding_error)
    }

    fn storage(&self) -> Result<StorageFormat, DatasetError> {
        Ok(self.format.clone())
    }

    fn chunking(&self, name: &str) -> Result<Option<Vec<u64>>, DatasetError> {
        Ok(self.entry(name).and_then(|e| e.chunking.clone()))
    }

    fn compression(&self, name: &str) -> Result<Option<Compression>, DatasetError> {
        Ok(self.entry(name).and_then(|e| e.compression.clone()))
    }
}

/// Fluent construction of in-memory datasets. Calls naming a variable that
/// was not declared yet are ignored.
#[derive(Debug, Clone)]
pub struct InMemoryDatasetBuilder {
    dataset: InMemoryDataset,
}

impl InMemoryDatasetBuilder {
    pub fn global(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.dataset.global_attributes.insert(name.into(), value);
        self
    }

    pub fn dimension(mut self, name: impl Into<String>, size: u64) -> Self {
        self.dataset.dimensions.insert(name.into(), size);
        self
    }

    pub fn variable(
        mut self,
        name: impl Into<String>,
        dimensions: &[&str],
        dtype: DataType,
        data: Vec<f64>,
    ) -> Self {
        self.dataset.variables.push(VariableEntry {
            name: name.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            dtype,
            attributes: BTreeMap::new(),
            data,
            shape: None,
            chunking: None,
            compression: None,
        });
        self
    }

    pub fn var_attr(mut self, variable: &str, name: impl Into<String>, value: AttrValue) -> Self {
        if let Some(entry) = self.entry_mut(variable) {
            entry.attributes.insert(name.into(), value);
        }
        self
    }

    pub fn shape(mut self, variable: &str, shape: Vec<u64>) -> Self {
        if let Some(entry) = self.entry_mut(variable) {
            entry.shape = Some(shape);
        }
        self
    }

    pub fn chunking(mut self, variable: &str, chunks: Vec<u64>) -> Self {
        if let Some(entry) = self.entry_mut(variable) {
            entry.chunking = Some(chunks);
        }
        self
    }

    pub fn compression(mut self, variable: &str, compression: Compression) -> Self {
        if let Some(entry) = self.entry_mut(variable) {
            entry.compression = Some(compression);
        }
        self
    }

    pub fn storage(mut self, disk_format: &str, data_model: &str) -> Self {
        self.dataset.format = StorageFormat {
            disk_format: disk_format.to_string(),
            data_model: data_model.to_string(),
        };
        self
    }

    pub fn build(self) -> InMemoryDataset {
        self.dataset
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut VariableEntry> {
        self.dataset.variables.iter_mut().find(|v| v.name == name)
    }
}

/// Opens `*.json` dataset descriptors from disk.
///
/// A descriptor without a `path` gets the descriptor's own path with the
/// `.json` suffix removed, so `tas_..._185001-201412.nc.json` checks as
/// `tas_..._185001-201412.nc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDatasetOpener;

impl DatasetOpener for JsonDatasetOpener {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn open(&self, path: &Path) -> Result<Box<dyn DatasetAccessor>, DatasetError> {
        let unreadable = |reason: String| DatasetError::Unreadable {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let mut dataset =
            InMemoryDataset::from_json(&content).map_err(|e| unreadable(e.to_string()))?;

        if dataset.path.is_empty() {
            let full = path.display().to_string();
            dataset.path = full.strip_suffix(".json").unwrap_or(&full).to_string();
        }
        debug!(
            logical_path = %dataset.path,
            variables = dataset.variables.len(),
            "Dataset descriptor loaded"
        );
        Ok(Box::new(dataset))
    }
}
