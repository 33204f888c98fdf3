// cvcheck-core/src/domain/scoring/category.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// Variant order is the execution order: structural checks run before the
// checks that depend on them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    File,
    Dimension,
    Variable,
    Attribute,
    Directory,
    Data,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dimension => "dimension",
            Self::Variable => "variable",
            Self::Attribute => "attribute",
            Self::Directory => "directory",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_execution_order() {
        let mut cats = vec![
            Category::Data,
            Category::Directory,
            Category::Attribute,
            Category::Variable,
            Category::Dimension,
            Category::File,
        ];
        cats.sort();
        assert_eq!(cats.first(), Some(&Category::File));
        assert_eq!(cats.last(), Some(&Category::Data));
        assert!(Category::Dimension < Category::Variable);
    }
}
