// cvcheck/src/commands/list.rs
//
// USE CASE: Show the resolved check plan without reading any dataset.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use cvcheck_core::application::ComplianceEngine;
use cvcheck_core::domain::selection::Selection;
use cvcheck_core::infrastructure::config::load_project_config;

use crate::output;

pub fn execute(config_path: PathBuf, selection: Selection) -> anyhow::Result<()> {
    let config = load_project_config(&config_path).with_context(|| {
        format!("Failed to load project configuration from {:?}", config_path)
    })?;
    let project = config.project_id.clone();

    let engine = ComplianceEngine::new(Arc::new(config), &selection)
        .context("Invalid check selection or project rules")?;

    println!("📋 Check plan for {} ({} checks)", project, engine.checks().len());
    println!("{}", output::render_plan(engine.checks()));
    Ok(())
}
