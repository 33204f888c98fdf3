// cvcheck-core/src/domain/checks/directory.rs

use super::CheckContext;
use crate::domain::error::CollaboratorError;
use crate::domain::project::DirectoryCheck;
use crate::domain::scoring::OutcomeBuilder;
use crate::domain::tokens::ParsedTokens;
use crate::ports::VocabularyError;
use std::collections::BTreeSet;

const TIME_RANGE: &str = "time_range";

pub fn run(
    ctx: &CheckContext<'_>,
    check: &DirectoryCheck,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    match check {
        DirectoryCheck::Structure => structure(ctx, out),
        DirectoryCheck::FilenameAttributes => filename_attributes(ctx, out),
        DirectoryCheck::Vocabulary => vocabulary(ctx, out),
    }
}

fn parse_directory(ctx: &CheckContext<'_>, out: &mut OutcomeBuilder) -> Option<ParsedTokens> {
    match ctx.resolver.parse_directory(ctx.dataset.file_path()) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            out.add_failure(format!("Directory does not follow the DRS: {}", e));
            None
        }
    }
}

fn parse_filename(ctx: &CheckContext<'_>, out: &mut OutcomeBuilder) -> Option<ParsedTokens> {
    match ctx.resolver.parse_filename(ctx.dataset.file_name()) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            out.add_failure(format!("Filename does not follow the DRS: {}", e));
            None
        }
    }
}

fn compared(ctx: &CheckContext<'_>, key: &str) -> bool {
    !ctx.resolver.schema().skip_compare.iter().any(|k| k == key)
}

// Each directory token is checked against the global attribute and against
// the filename token of the same name. The two relations are separate
// assertions.
fn structure(ctx: &CheckContext<'_>, out: &mut OutcomeBuilder) -> Result<(), CollaboratorError> {
    let Some(dir) = parse_directory(ctx, out) else {
        return Ok(());
    };
    let file = parse_filename(ctx, out);

    for (key, value) in dir.iter() {
        if !compared(ctx, key) {
            continue;
        }

        match ctx.global_attribute(key)? {
            Some(attr) => {
                let attr = attr.as_text();
                if attr == value {
                    out.add_pass(format!("path {}='{}' matches global attribute", key, value));
                } else {
                    out.add_failure(format!(
                        "path {}: expected '{}' from global attribute, found '{}'",
                        key, attr, value
                    ));
                }
            }
            None => out.note(format!("no global attribute '{}' to compare with the path", key)),
        }

        if let Some(file_value) = file.as_ref().and_then(|f| f.get(key)) {
            if file_value == value {
                out.add_pass(format!("path {}='{}' matches filename", key, value));
            } else {
                out.add_failure(format!(
                    "path {}: expected '{}' from filename, found '{}'",
                    key, file_value, value
                ));
            }
        }
    }
    Ok(())
}

fn filename_attributes(
    ctx: &CheckContext<'_>,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let Some(file) = parse_filename(ctx, out) else {
        return Ok(());
    };

    for (key, value) in file.iter() {
        if key == TIME_RANGE || !compared(ctx, key) {
            continue;
        }
        match ctx.global_attribute(key)? {
            Some(attr) => {
                let attr = attr.as_text();
                if attr == value {
                    out.add_pass(format!("filename {}='{}' matches global attribute", key, value));
                } else {
                    out.add_failure(format!(
                        "filename {}: expected '{}' from global attribute, found '{}'",
                        key, attr, value
                    ));
                }
            }
            None => out.note(format!("no global attribute '{}' to compare with the filename", key)),
        }
    }
    Ok(())
}

fn vocabulary(ctx: &CheckContext<'_>, out: &mut OutcomeBuilder) -> Result<(), CollaboratorError> {
    let dir = parse_directory(ctx, out);
    let file = parse_filename(ctx, out);

    let mut seen = BTreeSet::new();
    let tokens = dir
        .iter()
        .flat_map(|t| t.iter())
        .chain(file.iter().flat_map(|t| t.iter()));

    for (key, value) in tokens {
        if key == TIME_RANGE || !compared(ctx, key) || !seen.insert((key, value)) {
            continue;
        }
        match ctx.vocabulary.valid_term(value, ctx.project_id(), key) {
            Ok(true) => out.add_pass(format!("{}='{}' is a valid term", key, value)),
            Ok(false) => out.add_failure(format!(
                "DRS token {}: '{}' is not a valid term of collection '{}'",
                key, value, key
            )),
            Err(VocabularyError::UnknownCollection { .. }) => {
                out.note(format!("no vocabulary collection for DRS token '{}'", key))
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
