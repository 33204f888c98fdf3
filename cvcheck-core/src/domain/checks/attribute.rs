// cvcheck-core/src/domain/checks/attribute.rs

use super::CheckContext;
use crate::domain::error::CollaboratorError;
use crate::domain::project::{AttributeSpec, ValueType};
use crate::domain::scoring::OutcomeBuilder;
use crate::domain::tokens::split_terms;
use crate::ports::AttrValue;
use regex::Regex;

/// Existence, type, encoding, pattern and vocabulary of one attribute.
pub fn run(
    ctx: &CheckContext<'_>,
    spec: &AttributeSpec,
    pattern: Option<&Regex>,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let label = match &spec.variable {
        Some(var) => format!("{}:{}", var, spec.attribute),
        None => spec.attribute.clone(),
    };

    let value = match &spec.variable {
        Some(var_name) => match ctx.variable(var_name)? {
            Some(var) => var.attribute(&spec.attribute).cloned().or_else(|| {
                var.attributes
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&spec.attribute))
                    .map(|(_, v)| v.clone())
            }),
            None => {
                out.skip(format!("variable '{}' is absent", var_name));
                return Ok(());
            }
        },
        None => ctx.global_attribute(&spec.attribute)?,
    };

    let Some(value) = value else {
        if spec.required {
            out.add_failure(format!("Required attribute '{}' is missing", label));
        } else {
            out.skip(format!("optional attribute '{}' is absent", label));
        }
        return Ok(());
    };
    out.add_pass(format!("Attribute '{}' is present", label));

    if let Some(expected) = spec.expected_type {
        if type_matches(expected, &value) {
            out.add_pass(format!("'{}' has type {}", label, expected.as_str()));
        } else {
            out.add_failure(format!(
                "'{}': type mismatch, expected {}, found {}",
                label,
                expected.as_str(),
                value.type_name()
            ));
        }
    }

    match &value {
        AttrValue::Str(_) => out.add_pass(format!("'{}' is valid UTF-8", label)),
        AttrValue::Bytes { bytes } => {
            if std::str::from_utf8(bytes).is_ok() {
                out.add_pass(format!("'{}' is valid UTF-8", label));
            } else {
                out.add_failure(format!("'{}': non UTF-8 characters detected", label));
            }
        }
        _ => {}
    }

    let text = value.as_text();

    if let Some(re) = pattern {
        if re.is_match(&text) {
            out.add_pass(format!("'{}' matches the required pattern", label));
        } else {
            out.add_failure(format!(
                "'{}': value '{}' does not match pattern '{}'",
                label,
                text,
                re.as_str()
            ));
        }
    }

    if spec.vocabulary {
        if !value.is_text() {
            out.note(format!(
                "'{}' is not text, vocabulary lookup not attempted",
                label
            ));
            return Ok(());
        }

        let collection = spec.collection_id();
        let terms = if spec.multi_term || spec.expected_type == Some(ValueType::StrArray) {
            split_terms(&text)
        } else {
            vec![text.as_str()]
        };

        if terms.is_empty() {
            out.add_failure(format!(
                "'{}' is empty, no term to validate against '{}'",
                label, collection
            ));
        }

        for term in terms {
            if ctx
                .vocabulary
                .valid_term(term, ctx.project_id(), collection)?
            {
                out.add_pass(format!("'{}' is a valid '{}' term", term, collection));
            } else {
                out.add_failure(format!(
                    "'{}': '{}' is not a valid term of collection '{}'",
                    label, term, collection
                ));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: ValueType, value: &AttrValue) -> bool {
    match expected {
        ValueType::Str => value.is_text(),
        ValueType::Int => match value {
            AttrValue::Int(_) => true,
            AttrValue::IntArray(v) => v.len() == 1,
            _ => false,
        },
        ValueType::Float => match value {
            AttrValue::Float(_) => true,
            AttrValue::FloatArray(v) => v.len() == 1,
            _ => false,
        },
        ValueType::StrArray => value.is_text() && !split_terms(&value.as_text()).is_empty(),
    }
}
