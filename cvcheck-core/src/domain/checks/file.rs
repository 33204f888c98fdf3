// cvcheck-core/src/domain/checks/file.rs

use super::CheckContext;
use crate::domain::error::CollaboratorError;
use crate::domain::project::FileCheck;
use crate::domain::scoring::OutcomeBuilder;
use crate::ports::DatasetError;

pub fn run(
    ctx: &CheckContext<'_>,
    check: &FileCheck,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    match check {
        FileCheck::Format {
            expected_format,
            expected_data_model,
        } => {
            let storage = ctx.dataset.storage()?;
            if storage.disk_format.eq_ignore_ascii_case(expected_format) {
                out.add_pass(format!("Disk format is {}", storage.disk_format));
            } else {
                out.add_failure(format!(
                    "Disk format: expected '{}', found '{}'",
                    expected_format, storage.disk_format
                ));
            }
            if let Some(model) = expected_data_model {
                if storage.data_model.eq_ignore_ascii_case(model) {
                    out.add_pass(format!("Data model is {}", storage.data_model));
                } else {
                    out.add_failure(format!(
                        "Data model: expected '{}', found '{}'",
                        model, storage.data_model
                    ));
                }
            }
            Ok(())
        }
        FileCheck::Compression {
            variable,
            expected_codec,
            expected_level,
            expected_shuffle,
        } => {
            let name = match variable {
                Some(v) => Some(v.clone()),
                None => first_data_variable(ctx)?,
            };
            let Some(name) = name else {
                out.skip("no data variable found");
                return Ok(());
            };
            if ctx.dataset.variable(&name)?.is_none() {
                out.skip(format!("variable '{}' is absent", name));
                return Ok(());
            }

            let Some(compression) = ctx.dataset.compression(&name)? else {
                out.add_failure(format!(
                    "'{}' appears uncompressed, expected {}",
                    name, expected_codec
                ));
                return Ok(());
            };

            if compression.codec.eq_ignore_ascii_case(expected_codec) {
                out.add_pass(format!("'{}' is compressed with {}", name, compression.codec));
            } else {
                out.add_failure(format!(
                    "'{}': expected codec '{}', found '{}'",
                    name, expected_codec, compression.codec
                ));
            }

            if let Some(level) = expected_level {
                match compression.level {
                    Some(actual) if actual == *level => {
                        out.add_pass(format!("'{}' uses compression level {}", name, level))
                    }
                    Some(actual) => {
                        let hint = if actual > *level {
                            " (a higher level can slow down data access)"
                        } else {
                            ""
                        };
                        out.add_failure(format!(
                            "'{}': expected compression level {}, found {}{}",
                            name, level, actual, hint
                        ));
                    }
                    None => out.add_failure(format!(
                        "'{}': expected compression level {}, none recorded",
                        name, level
                    )),
                }
            }

            if let Some(shuffle) = expected_shuffle {
                if compression.shuffle == *shuffle {
                    out.add_pass(format!("'{}' shuffle filter is {}", name, on_off(*shuffle)));
                } else {
                    out.add_failure(format!(
                        "'{}': shuffle filter should be {}",
                        name,
                        on_off(*shuffle)
                    ));
                }
            }
            Ok(())
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}

/// First variable that is not a coordinate (its name is not a dimension).
fn first_data_variable(ctx: &CheckContext<'_>) -> Result<Option<String>, DatasetError> {
    let dims = ctx.dataset.dimension_names()?;
    Ok(ctx
        .dataset
        .variable_names()?
        .into_iter()
        .find(|v| !dims.contains(v)))
}
