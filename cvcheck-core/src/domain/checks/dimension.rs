// cvcheck-core/src/domain/checks/dimension.rs

use super::CheckContext;
use crate::domain::error::CollaboratorError;
use crate::domain::project::DimensionCheck;
use crate::domain::scoring::OutcomeBuilder;

pub fn run(
    ctx: &CheckContext<'_>,
    check: &DimensionCheck,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    match check {
        DimensionCheck::Existence {
            dimension,
            required,
        } => {
            match ctx.dataset.dimension_size(dimension)? {
                Some(_) => out.add_pass(format!("Dimension '{}' exists", dimension)),
                None if *required => {
                    out.add_failure(format!("Required dimension '{}' is missing", dimension))
                }
                None => out.skip(format!("optional dimension '{}' is absent", dimension)),
            }
            Ok(())
        }
        DimensionCheck::Size {
            dimension,
            expected_size,
            min_size,
        } => {
            let Some(size) = ctx.dataset.dimension_size(dimension)? else {
                out.skip(format!("dimension '{}' is absent", dimension));
                return Ok(());
            };

            if size > 0 {
                out.add_pass(format!("Dimension '{}' has positive size {}", dimension, size));
            } else {
                out.add_failure(format!("Dimension '{}' has size 0", dimension));
            }

            if let Some(expected) = expected_size {
                if size == *expected {
                    out.add_pass(format!("Dimension '{}' has size {}", dimension, expected));
                } else {
                    out.add_failure(format!(
                        "Dimension '{}': expected size {}, found {}",
                        dimension, expected, size
                    ));
                }
            }

            if let Some(min) = min_size {
                if size >= *min {
                    out.add_pass(format!("Dimension '{}' has at least {} entries", dimension, min));
                } else {
                    out.add_failure(format!(
                        "Dimension '{}': size {} is below the minimum {}",
                        dimension, size, min
                    ));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{cmip6_project, run_check, vocabulary};
    use crate::domain::scoring::CheckStatus;
    use crate::infrastructure::adapters::memory::InMemoryDataset;

    fn dataset() -> InMemoryDataset {
        InMemoryDataset::builder("/data/tas.nc")
            .dimension("time", 12)
            .dimension("bnds", 2)
            .dimension("empty", 0)
            .build()
    }

    #[test]
    fn test_existence() {
        let p = cmip6_project();
        let ds = dataset();
        let v = vocabulary();
        let ok = run_check(&p, "{id: x, category: dimension, check: existence, dimension: time}", &ds, &v);
        assert_eq!(ok.status, CheckStatus::Passed);

        let missing = run_check(&p, "{id: x, category: dimension, check: existence, dimension: lev}", &ds, &v);
        assert_eq!(missing.status, CheckStatus::Failed);

        let optional = run_check(
            &p,
            "{id: x, category: dimension, check: existence, dimension: lev, required: false}",
            &ds,
            &v,
        );
        assert_eq!(optional.status, CheckStatus::Skipped);
    }

    #[test]
    fn test_size() {
        let p = cmip6_project();
        let ds = dataset();
        let v = vocabulary();
        let ok = run_check(
            &p,
            "{id: x, category: dimension, check: size, dimension: bnds, expected_size: 2}",
            &ds,
            &v,
        );
        assert_eq!(ok.status, CheckStatus::Passed);
        assert_eq!(ok.total_count(), 2);

        let short = run_check(
            &p,
            "{id: x, category: dimension, check: size, dimension: time, min_size: 24}",
            &ds,
            &v,
        );
        assert_eq!(short.status, CheckStatus::Failed);
        assert_eq!(short.passed_count(), 1);

        let empty = run_check(&p, "{id: x, category: dimension, check: size, dimension: empty}", &ds, &v);
        assert_eq!(empty.status, CheckStatus::Failed);

        let absent = run_check(&p, "{id: x, category: dimension, check: size, dimension: lev}", &ds, &v);
        assert_eq!(absent.status, CheckStatus::Skipped);
    }
}
