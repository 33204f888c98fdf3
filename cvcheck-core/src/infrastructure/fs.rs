// cvcheck-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use std::io::Write;
use std::path::Path;

/// Writes `content` to `path` through a temporary sibling file, so a reader
/// never sees a half-written report.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_ref())?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_replaces_previous_report() -> Result<()> {
        let dir = tempdir()?;
        let report = dir.path().join("report.json");

        atomic_write(&report, r#"{"scored_points":1}"#)?;
        atomic_write(&report, r#"{"scored_points":2}"#)?;

        assert_eq!(fs::read_to_string(&report)?, r#"{"scored_points":2}"#);
        // Only the report itself is left behind.
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_atomic_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nope").join("report.json");
        assert!(matches!(
            atomic_write(&target, "x"),
            Err(InfrastructureError::Io(_))
        ));
    }
}
