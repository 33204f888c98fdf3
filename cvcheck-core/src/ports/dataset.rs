// cvcheck-core/src/ports/dataset.rs

// Read-only view over one dataset file. The engine never parses the binary
// format itself: an adapter (see infrastructure::adapters) does it and hands
// the checks this contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Failure raised by a dataset reader. Checks never turn this into a failed
/// assertion: the engine records it as an `Error` outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("Dataset could not be opened at '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Malformed dataset: {0}")]
    Malformed(String),

    #[error("Variable '{0}' has no readable data")]
    NoData(String),

    #[error("Read of '{variable}' out of range ({start}+{count} > {len})")]
    OutOfRange {
        variable: String,
        start: usize,
        count: usize,
        len: usize,
    },

    #[error("Time axis '{variable}' could not be decoded: {reason}")]
    TimeDecoding { variable: String, reason: String },
}

/// A netCDF-style attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    /// Raw character data that may not be valid UTF-8.
    Bytes { bytes: Vec<u8> },
}

impl AttrValue {
    /// Text view of the value. Bytes are decoded lossily.
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::Str(s) => s.clone(),
            Self::IntArray(v) => v
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Self::FloatArray(v) => v
                .iter()
                .map(|x| format_float(*x))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Bytes { bytes } => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Numeric values carried by the attribute (scalars become a one-element vec).
    pub fn as_numbers(&self) -> Vec<f64> {
        match self {
            Self::Int(v) => vec![*v as f64],
            Self::Float(v) => vec![*v],
            Self::IntArray(v) => v.iter().map(|x| *x as f64).collect(),
            Self::FloatArray(v) => v.clone(),
            Self::Str(_) | Self::Bytes { .. } => vec![],
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Bytes { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::IntArray(_) => "int array",
            Self::FloatArray(_) => "float array",
            Self::Bytes { .. } => "bytes",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// On-disk element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Byte,
    UByte,
    Char,
    Short,
    UShort,
    #[serde(alias = "integer")]
    Int,
    UInt,
    #[serde(alias = "long")]
    Int64,
    UInt64,
    #[serde(alias = "real")]
    Float,
    Double,
    #[serde(alias = "character")]
    String,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::UByte => "ubyte",
            Self::Char => "char",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Char | Self::String)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    /// Accepts netCDF names as well as the CMOR table names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "byte" => Ok(Self::Byte),
            "ubyte" => Ok(Self::UByte),
            "char" => Ok(Self::Char),
            "short" => Ok(Self::Short),
            "ushort" => Ok(Self::UShort),
            "int" | "integer" => Ok(Self::Int),
            "uint" => Ok(Self::UInt),
            "int64" | "long" => Ok(Self::Int64),
            "uint64" => Ok(Self::UInt64),
            "float" | "real" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "string" | "character" => Ok(Self::String),
            _ => Err(format!("Unknown data type: {}", s)),
        }
    }
}

/// Header information of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<u64>,
    pub dtype: DataType,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl VariableInfo {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product::<u64>() as usize
    }

    /// Declared `_FillValue` and `missing_value` entries, in that order.
    pub fn fill_values(&self) -> Vec<f64> {
        ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|k| self.attributes.get(*k))
            .flat_map(|v| v.as_numbers())
            .collect()
    }
}

/// A decoded calendar instant. Kept as plain fields so non-Gregorian
/// calendars (360_day, noleap) round-trip without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    pub fn with_time(mut self, hour: u32, minute: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self
    }

    pub fn with_second(mut self, second: u32) -> Self {
        self.second = second;
        self
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )?;
        if self.second != 0 {
            write!(f, ":{:02}", self.second)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFormat {
    pub disk_format: String,
    pub data_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compression {
    pub codec: String,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub shuffle: bool,
}

pub trait DatasetAccessor: Send + Sync {
    /// Full path of the file, used for DRS token extraction.
    fn file_path(&self) -> &str;

    fn global_attribute(&self, name: &str) -> Result<Option<AttrValue>, DatasetError>;

    fn global_attribute_names(&self) -> Result<Vec<String>, DatasetError>;

    fn dimension_size(&self, name: &str) -> Result<Option<u64>, DatasetError>;

    fn dimension_names(&self) -> Result<Vec<String>, DatasetError>;

    fn variable(&self, name: &str) -> Result<Option<VariableInfo>, DatasetError>;

    fn variable_names(&self) -> Result<Vec<String>, DatasetError>;

    /// Reads `count` elements of the flattened (row-major) array starting at `start`.
    fn read_values(&self, name: &str, start: usize, count: usize)
    -> Result<Vec<f64>, DatasetError>;

    /// Decodes a time coordinate using its units and calendar attributes.
    fn decode_time(&self, name: &str) -> Result<Vec<CalendarDate>, DatasetError>;

    fn storage(&self) -> Result<StorageFormat, DatasetError>;

    /// Chunk shape, or `None` for contiguous storage.
    fn chunking(&self, name: &str) -> Result<Option<Vec<u64>>, DatasetError>;

    /// Compression filter, or `None` when the variable is stored uncompressed.
    fn compression(&self, name: &str) -> Result<Option<Compression>, DatasetError>;

    /// Global attribute lookup that falls back to a case-insensitive name
    /// match. Every derived or compared attribute goes through this.
    fn find_global_attribute(&self, name: &str) -> Result<Option<AttrValue>, DatasetError> {
        if let Some(value) = self.global_attribute(name)? {
            return Ok(Some(value));
        }
        let names = self.global_attribute_names()?;
        match names.iter().find(|n| n.eq_ignore_ascii_case(name)) {
            Some(actual) => self.global_attribute(actual),
            None => Ok(None),
        }
    }

    fn file_name(&self) -> &str {
        Path::new(self.file_path())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Opens dataset files for the batch runner.
pub trait DatasetOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DatasetAccessor>, DatasetError>;
}
