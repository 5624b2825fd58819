use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

mod config;
mod costs;
mod exams;
mod invoke;
mod metrics;
mod models;
mod output;
mod postprocess;
mod prompt;
mod runner;

use crate::config::BenchConfig;
use crate::costs::CostTable;
use crate::exams::{ExamKind, sample_rows};
use crate::invoke::OpenAiInvoker;
use crate::models::ResultSheet;
use crate::output::OutputFormat;
use crate::runner::{GateDecision, RunContext};

/// Benchmark language models against multiple-choice exam datasets and rank
/// them by accuracy, cost and latency
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one benchmark and persist its result sheet
    Run(RunArgs),
    /// Aggregate persisted result sheets into a ranked comparison
    Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Exam dataset to score
    #[arg(short, long, value_enum)]
    exam: ExamKind,

    /// Model to evaluate
    #[arg(short, long)]
    model: String,

    /// Use chain-of-thought prompting
    #[arg(short, long)]
    cot: bool,

    /// Fraction of the dataset to sample
    #[arg(short, long, default_value_t = 1.0)]
    nsample: f64,

    /// Exam year
    #[arg(short, long, default_value = "")]
    year: String,

    /// Path to the benchmark TOML configuration
    #[arg(short = 'f', long, default_value = "configs.toml")]
    config_file: PathBuf,

    /// Path to the local dataset file (JSON or JSONL)
    #[arg(short, long)]
    dataset: PathBuf,

    /// Path to the cost metadata table
    #[arg(long, default_value = "costs.csv")]
    costs: PathBuf,

    /// Directory for persisted result sheets
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// Directory holding persisted result sheets
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Path to the cost metadata table
    #[arg(long, default_value = "costs.csv")]
    costs: PathBuf,

    /// Restrict latency means to concise responses for non-CoT models
    #[arg(long)]
    normalize_latency: bool,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_benchmark(args).await,
        Command::Report(args) => report(args),
    }
}

async fn run_benchmark(args: RunArgs) -> Result<()> {
    let parameters = run_parameters(&args);
    let config_file = args.config_file.display().to_string();
    let hash = runner::run_hash(&args.model, args.cot, args.nsample, &config_file, &parameters);
    let model_desc = runner::model_descriptor(&args.model, args.cot);
    let prefix = args.exam.prefix(&args.year);

    println!(
        "Starting {prefix} benchmark. Model = {}, CoT = {}, Sample = {}",
        args.model, args.cot, args.nsample
    );

    if runner::check_existing_run(&args.results_dir, &hash, &prefix, &model_desc)
        == GateDecision::AlreadyDone
    {
        println!("Model {model_desc} already executed. Exiting.");
        return Ok(());
    }

    let config = BenchConfig::from_file(&args.config_file)?;
    let cost_table = CostTable::from_file(&args.costs)?;
    let delay_secs = cost_table.delay_for(&args.model)?;

    let rows = args.exam.load_rows(&args.dataset, &args.year)?;
    let rows = sample_rows(rows, args.nsample);

    let invoker = OpenAiInvoker::new(&config.api_endpoint, &config.env_var_api_key)?;
    let mut sheet = ResultSheet::new(model_desc, hash, parameters);
    let mut context = RunContext {
        invoker: &invoker,
        config: &config,
        exam: args.exam,
        model_id: args.model.clone(),
        use_cot: args.cot,
        delay_secs,
        max_attempts: config.max_attempts,
    };

    context
        .execute(&rows, &mut sheet)
        .await
        .with_context(|| format!("Benchmark run for {} aborted", args.model))?;

    runner::save_results(&args.results_dir, &prefix, &sheet)?;
    println!("Done.");
    Ok(())
}

fn report(args: ReportArgs) -> Result<()> {
    let cost_table = CostTable::from_file(&args.costs)?;
    let sheets = metrics::load_all_sheets(&args.results_dir)?;
    let rows = metrics::tag_rows(&sheets)?;
    let ranking = metrics::aggregate(&rows, &cost_table, args.normalize_latency)?;

    output::print_ranking(&ranking, args.output);
    Ok(())
}

/// Full argument set folded into the Run identity hash and persisted with
/// the sheet
fn run_parameters(args: &RunArgs) -> BTreeMap<String, String> {
    let mut parameters = BTreeMap::new();
    parameters.insert("exam".to_string(), format!("{:?}", args.exam).to_lowercase());
    parameters.insert("model".to_string(), args.model.clone());
    parameters.insert("cot".to_string(), args.cot.to_string());
    parameters.insert("nsample".to_string(), args.nsample.to_string());
    parameters.insert("year".to_string(), args.year.clone());
    parameters.insert(
        "config_file".to_string(),
        args.config_file.display().to_string(),
    );
    parameters.insert("dataset".to_string(), args.dataset.display().to_string());
    parameters
}
