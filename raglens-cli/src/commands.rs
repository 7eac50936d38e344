//! CLI subcommand handlers.

use crate::Commands;
use crate::EvalScope;
use crate::progress;
use raglens_core::config::EvalConfig;
use raglens_core::evaluator::{GenerationEvaluator, RetrievalEvaluator};
use raglens_core::fixtures::Fixtures;
use raglens_core::judge::{AzureJudgeClient, JudgeClient};
use raglens_core::noise::NoiseGenerator;
use raglens_core::progress::ProgressSink;
use raglens_core::rag::{HttpRagService, QueryAdapter, RagService};
use raglens_core::results::AggregateReport;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, config: EvalConfig, quiet: bool) -> anyhow::Result<()> {
    match command {
        Commands::Eval {
            fixtures,
            only,
            seed,
            output,
        } => handle_eval(config, fixtures.as_deref(), only, seed, output.as_deref(), quiet).await,
        Commands::Upload { dir, chunk_size } => handle_upload(config, &dir, chunk_size).await,
        Commands::Ask {
            question,
            temperature,
            n_docs,
        } => handle_ask(config, &question, temperature, n_docs).await,
        Commands::Fixtures => {
            println!("{}", Fixtures::builtin().to_json_pretty()?);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Both reports of one `eval` run.
#[derive(Debug, Default, Serialize)]
pub struct EvalOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<AggregateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<AggregateReport>,
}

impl EvalOutcome {
    /// Lines printed to stdout at the end of a run.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(report) = &self.retrieval {
            lines.push(format!("Retrieval Metrics: {report}"));
        }
        if let Some(report) = &self.generation {
            lines.push(format!("Generation Metrics: {report}"));
        }
        lines
    }
}

async fn handle_eval(
    mut config: EvalConfig,
    fixtures_path: Option<&Path>,
    only: Option<EvalScope>,
    seed: Option<u64>,
    output: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    if seed.is_some() {
        config.noise.seed = seed;
    }

    let fixtures = match fixtures_path {
        Some(path) => Fixtures::load(path)?,
        None => Fixtures::builtin(),
    };

    let judge = AzureJudgeClient::new(&config.judge)
        .map_err(|e| anyhow::anyhow!("Judge client error: {}", e))?;
    let rag = HttpRagService::new(&config.rag)?;
    let sink = progress::sink_for(quiet);

    info!(rag = rag.base_url(), queries = fixtures.queries.len(), "Starting evaluation");
    let outcome = run_eval(&rag, &judge, sink.as_ref(), &config, &fixtures, only).await?;

    for line in outcome.summary_lines() {
        println!("{line}");
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
        if !quiet {
            eprintln!("Reports written to {}", path.display());
        }
    }

    Ok(())
}

/// Run the selected evaluations, retrieval first.
pub async fn run_eval(
    rag: &dyn RagService,
    judge: &dyn JudgeClient,
    progress: &dyn ProgressSink,
    config: &EvalConfig,
    fixtures: &Fixtures,
    only: Option<EvalScope>,
) -> anyhow::Result<EvalOutcome> {
    let adapter = QueryAdapter::from_config(rag, &config.rag);
    let mut outcome = EvalOutcome::default();

    if only != Some(EvalScope::Generation) {
        let report = RetrievalEvaluator::new(rag, judge, progress)
            .with_adapter(adapter)
            .with_noise(NoiseGenerator::from_config(&config.noise))
            .evaluate(&fixtures.queries, &fixtures.ground_truth)
            .await?;
        outcome.retrieval = Some(report);
    }

    if only != Some(EvalScope::Retrieval) {
        let truths = fixtures.truth_contexts();
        let report = GenerationEvaluator::new(rag, judge, progress)
            .with_adapter(adapter)
            .evaluate(
                &fixtures.queries,
                &truths,
                &fixtures.counterfactual_pairs,
                &fixtures.negative_queries,
            )
            .await?;
        outcome.generation = Some(report);
    }

    Ok(outcome)
}

async fn handle_upload(config: EvalConfig, dir: &Path, chunk_size: Option<usize>) -> anyhow::Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.rag.upload_chunk_size);
    let rag = HttpRagService::new(&config.rag)?;
    let summary = upload_dir(&rag, dir, chunk_size).await?;

    println!(
        "Uploaded {} of {} documents",
        summary.uploaded.len(),
        summary.uploaded.len() + summary.failed.len()
    );
    if !summary.failed.is_empty() {
        anyhow::bail!("{} document(s) failed to upload", summary.failed.len());
    }
    Ok(())
}

/// Per-file results of a directory upload.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub uploaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// PDF files directly inside `dir`, sorted by name.
pub fn pdf_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", dir.display(), e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Upload each PDF in `dir`, continuing past failures.
pub async fn upload_dir(rag: &dyn RagService, dir: &Path, chunk_size: usize) -> anyhow::Result<UploadSummary> {
    let mut summary = UploadSummary::default();

    for path in pdf_files(dir)? {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let result = match tokio::fs::read(&path).await {
            Ok(bytes) => rag.upload(&name, bytes, chunk_size).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => {
                println!("  uploaded {name}");
                summary.uploaded.push(path);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Upload failed");
                println!("  failed   {name}: {e}");
                summary.failed.push((path, e));
            }
        }
    }

    Ok(summary)
}

async fn handle_ask(
    config: EvalConfig,
    question: &str,
    temperature: Option<f64>,
    n_docs: Option<usize>,
) -> anyhow::Result<()> {
    let rag = HttpRagService::new(&config.rag)?;
    let adapter = QueryAdapter::from_config(&rag, &config.rag);
    let answer = adapter
        .ask_with(
            question,
            temperature.unwrap_or(config.rag.temperature),
            n_docs.unwrap_or(config.rag.n_docs),
        )
        .await?;

    println!("{}", answer.text);
    eprintln!("\n({:.2}s)", answer.latency_secs());
    Ok(())
}
