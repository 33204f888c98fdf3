// cvcheck-core/src/domain/checks/context.rs

use crate::domain::project::ProjectConfig;
use crate::domain::tokens::TokenResolver;
use crate::ports::{AttrValue, DatasetAccessor, DatasetError, VariableInfo, VocabularyClient};

/// Everything a check may read while it runs. Borrowed for the duration of
/// one file; checks never mutate any of it.
pub struct CheckContext<'a> {
    pub dataset: &'a dyn DatasetAccessor,
    pub vocabulary: &'a dyn VocabularyClient,
    pub config: &'a ProjectConfig,
    pub resolver: &'a TokenResolver,
}

impl<'a> CheckContext<'a> {
    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    pub fn max_reported(&self) -> usize {
        self.config.reporting.max_reported_violations.max(1)
    }

    /// Global attribute lookup. Falls back to a case-insensitive name match.
    pub fn global_attribute(&self, name: &str) -> Result<Option<AttrValue>, DatasetError> {
        self.dataset.find_global_attribute(name)
    }

    pub fn variable(&self, name: &str) -> Result<Option<VariableInfo>, DatasetError> {
        self.dataset.variable(name)
    }

    /// Streams a variable's flattened data in slabs of `reporting.slab_size`,
    /// calling `visit(index, value)` for each element.
    pub fn for_each_value<F>(&self, var: &VariableInfo, mut visit: F) -> Result<(), DatasetError>
    where
        F: FnMut(usize, f64),
    {
        let total = var.element_count();
        let slab = self.config.reporting.slab_size.max(1);
        let mut start = 0;
        while start < total {
            let count = slab.min(total - start);
            let values = self.dataset.read_values(&var.name, start, count)?;
            for (offset, value) in values.into_iter().enumerate() {
                visit(start + offset, value);
            }
            start += count;
        }
        Ok(())
    }
}

/// Formats a flat index as a multi-dimensional one, e.g. `[2, 0, 13]`.
pub fn unravel(index: usize, shape: &[u64]) -> String {
    if shape.is_empty() {
        return format!("[{}]", index);
    }
    let mut rest = index as u64;
    let mut coords = vec![0u64; shape.len()];
    for (i, dim) in shape.iter().enumerate().rev() {
        let dim = (*dim).max(1);
        coords[i] = rest % dim;
        rest /= dim;
    }
    format!(
        "[{}]",
        coords
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}
