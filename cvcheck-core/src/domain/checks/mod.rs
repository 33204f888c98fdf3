// cvcheck-core/src/domain/checks/mod.rs

// The atomic check catalog. Every variant shares one contract: read from the
// context, write assertions into the ledger, return a collaborator error if
// the dataset or the vocabulary failed.

pub mod attribute;
pub mod consistency;
pub mod context;
pub mod data;
pub mod dimension;
pub mod directory;
pub mod file;
pub mod variable;

pub use context::CheckContext;

use crate::domain::error::{CollaboratorError, ConfigurationError};
use crate::domain::project::{AttributeCheck, CheckConfig, CheckKind, ProjectConfig};
use crate::domain::scoring::{Category, OutcomeBuilder, Severity};
use crate::domain::tokens::{CompiledRule, TokenResolver};
use regex::Regex;

/// A selected check with its severity fixed and its regex and derivation
/// rule compiled.
#[derive(Debug, Clone)]
pub struct PlannedCheck {
    pub config: CheckConfig,
    pub severity: Severity,
    pub description: String,
    pattern: Option<Regex>,
    rule: Option<CompiledRule>,
}

impl PlannedCheck {
    pub fn prepare(
        project: &ProjectConfig,
        check: &CheckConfig,
        resolver: &TokenResolver,
    ) -> Result<Self, ConfigurationError> {
        let mut pattern = None;
        let mut rule = None;

        match &check.kind {
            CheckKind::Attribute(AttributeCheck::Attribute(spec)) => {
                if let Some(raw) = &spec.pattern {
                    let anchored = format!("^(?:{})$", raw);
                    pattern = Some(Regex::new(&anchored).map_err(|e| {
                        ConfigurationError::InvalidPattern {
                            check: check.id.clone(),
                            reason: e.to_string(),
                        }
                    })?);
                }
            }
            CheckKind::Attribute(AttributeCheck::Consistency {
                attribute,
                rule: inline,
            }) => {
                rule = Some(match inline {
                    Some(r) => resolver.compile(attribute, r)?,
                    None => resolver.rule(attribute).cloned().ok_or_else(|| {
                        ConfigurationError::InvalidDerivation {
                            attribute: attribute.clone(),
                            reason: format!(
                                "check '{}' has no inline rule and the project declares none",
                                check.id
                            ),
                        }
                    })?,
                });
            }
            _ => {}
        }

        Ok(Self {
            config: check.clone(),
            severity: project.severity_for(check),
            description: check.describe(),
            pattern,
            rule,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn category(&self) -> Category {
        self.config.category()
    }

    pub fn ledger(&self) -> OutcomeBuilder {
        OutcomeBuilder::new(
            self.config.id.clone(),
            self.description.clone(),
            self.category(),
            self.severity,
        )
    }

    /// Runs the check, writing its assertions into `out`.
    pub fn execute(
        &self,
        ctx: &CheckContext<'_>,
        out: &mut OutcomeBuilder,
    ) -> Result<(), CollaboratorError> {
        match &self.config.kind {
            CheckKind::File(check) => file::run(ctx, check, out),
            CheckKind::Dimension(check) => dimension::run(ctx, check, out),
            CheckKind::Variable(check) => variable::run(ctx, check, out),
            CheckKind::Attribute(AttributeCheck::Attribute(spec)) => {
                attribute::run(ctx, spec, self.pattern.as_ref(), out)
            }
            CheckKind::Attribute(AttributeCheck::Consistency { attribute, .. }) => {
                match &self.rule {
                    Some(rule) => consistency::run(ctx, attribute, rule, out),
                    None => {
                        out.skip(format!("no derivation rule for '{}'", attribute));
                        Ok(())
                    }
                }
            }
            CheckKind::Attribute(AttributeCheck::FrequencyTable { mapping }) => {
                consistency::frequency_table(ctx, mapping, out)
            }
            CheckKind::Directory(check) => directory::run(ctx, check, out),
            CheckKind::Data(check) => data::run(ctx, check, out),
        }
    }
}
