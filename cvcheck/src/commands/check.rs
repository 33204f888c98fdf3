// cvcheck/src/commands/check.rs
//
// USE CASE: Check a batch of dataset descriptors and report compliance.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use cvcheck_core::application::{CancellationToken, ComplianceEngine, run_batch};
use cvcheck_core::domain::scoring::Criteria;
use cvcheck_core::domain::selection::Selection;
use cvcheck_core::infrastructure::adapters::{JsonDatasetOpener, LocalVocabulary};
use cvcheck_core::infrastructure::config::load_project_config;
use cvcheck_core::infrastructure::fs::atomic_write;
use cvcheck_core::ports::VocabularyClient;

use crate::cli::OutputFormat;
use crate::output;

pub struct CheckOptions {
    pub paths: Vec<PathBuf>,
    pub config: PathBuf,
    pub vocabulary: Option<PathBuf>,
    pub selection: Selection,
    pub criteria: Criteria,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub jobs: usize,
}

pub async fn execute(options: CheckOptions) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Load the Config (Infra)
    eprintln!("⚙️  Loading configuration...");
    let config = load_project_config(&options.config).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            options.config
        )
    })?;
    eprintln!("   Project: {} ({})", config.project_id, config.version);

    // B. Fix the plan. Configuration errors stop here, before any file is read.
    let engine = ComplianceEngine::new(Arc::new(config), &options.selection)
        .context("Invalid check selection or project rules")?;
    eprintln!("   Checks: {}", engine.plan().len());

    let vocabulary: Arc<dyn VocabularyClient> = match &options.vocabulary {
        Some(dir) => {
            let project_id = &engine.config().project_id;
            Arc::new(
                LocalVocabulary::load(dir, project_id)
                    .with_context(|| format!("Failed to load vocabulary from {:?}", dir))?,
            )
        }
        None => Arc::new(LocalVocabulary::from_terms(
            &engine.config().project_id,
            std::iter::empty::<(String, Vec<String>)>(),
        )),
    };

    // C. Collect the descriptors
    let files = collect_descriptors(&options.paths);
    if files.is_empty() {
        anyhow::bail!("❌ No dataset descriptors (*.json) found in {:?}", options.paths);
    }
    debug!(files = ?files, "Dataset descriptors collected");
    eprintln!("🔎 Checking {} file(s) with {} job(s)...", files.len(), options.jobs);

    // D. Run the batch. Ctrl-C stops submitting new files.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Interrupted: finishing files already in progress...");
            on_signal.cancel();
        }
    });

    let outcomes = run_batch(
        Arc::new(engine),
        Arc::new(JsonDatasetOpener),
        vocabulary,
        files,
        options.jobs,
        cancel.clone(),
    )
    .await;

    // E. Render
    let rendered = match options.format {
        OutputFormat::Text => output::render_text(&outcomes, options.criteria),
        OutputFormat::Json => serde_json::to_string_pretty(&outcomes)?,
    };
    match &options.output {
        Some(path) => {
            atomic_write(path, &rendered)
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            eprintln!("📄 Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    // F. Verdict
    let summary = output::Summary::of(&outcomes, options.criteria);
    eprintln!(
        "\n📊 {} passed, {} failed, {} unreadable ({} criteria) in {:.2?}",
        summary.passed,
        summary.failed,
        summary.unreadable,
        options.criteria,
        start.elapsed()
    );
    if cancel.is_cancelled() {
        eprintln!("⚠️  Batch was cancelled: some files were not checked.");
    }
    if !summary.is_success() {
        eprintln!("\n❌ FAILURE. Not all files are compliant.");
        std::process::exit(1);
    }
    eprintln!("\n✨ SUCCESS! All files are compliant.");
    Ok(())
}

/// Files are taken as given; directories are walked for `*.json` descriptors
/// in file-name order.
fn collect_descriptors(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path).follow_links(true).sort_by_file_name();
            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_descriptor(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_descriptor(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
