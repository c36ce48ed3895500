use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dialoguer::Input;

use research_agent::config::Config;
use research_agent::events::{EventSink, PipelineEvent, TracingSink};
use research_agent::llm::{self, LlmClient};
use research_agent::output;
use research_agent::pipeline::{AnalysisDimension, Query, ResearchOutcome, ResearchPipeline};
use research_agent::telemetry::init_telemetry;

const RULE_WIDTH: usize = 60;
const INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "research-agent",
    version,
    about = "Research a company or person and write a Markdown report"
)]
struct Args {
    /// Company or person to research. Prompted for when omitted.
    #[arg(short, long)]
    query: Option<String>,

    /// Directory for the report and JSON files [default: REPORT_OUTPUT_DIR or .]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Also write the insight record as insights_<name>.json
    #[arg(long)]
    json: bool,

    /// Also write the collected sources as collection_<name>.json
    #[arg(long)]
    save_collection: bool,

    /// Skip collection and analyze a saved collection_<name>.json
    #[arg(long, value_name = "PATH", conflicts_with = "query")]
    from_collection: Option<PathBuf>,
}

/// Prints the three progress steps, then forwards to the tracing sink.
struct ConsoleSink {
    inner: TracingSink,
}

impl EventSink for ConsoleSink {
    fn record(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::CollectionFinished { sources, .. } => {
                println!("   ✓ Collected data from {sources} sources\n");
                println!("[2/3] Analyzing data with AI...");
            }
            PipelineEvent::SynthesisFinished { succeeded, .. } => {
                println!(
                    "   ✓ Analysis completed ({succeeded}/{} dimensions)\n",
                    AnalysisDimension::ALL.len()
                );
                println!("[3/3] Generating report...");
            }
            PipelineEvent::SynthesisFailed { .. } => {
                println!("   ✗ Analysis could not run\n");
                println!("[3/3] Generating report...");
            }
            PipelineEvent::ReportComposed { .. } => println!("   ✓ Report generated\n"),
            _ => {}
        }
        self.inner.record(event);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ {err}");
            return ExitCode::FAILURE;
        }
    };

    let telemetry_guard = match init_telemetry(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("❌ Failed to initialize logging: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = tokio::select! {
        result = run(args, &config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "Research run failed");
                eprintln!("\n❌ Error: {err:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted by user");
            eprintln!("\n\n⚠️  Operation cancelled by user");
            telemetry_guard.shutdown();
            // A pending query prompt would keep the runtime from shutting down.
            std::process::exit(INTERRUPTED);
        }
    };

    telemetry_guard.shutdown();
    code
}

async fn run(args: Args, config: &Config) -> anyhow::Result<()> {
    print_banner();

    let provider = llm::build_provider(config)?;
    tracing::info!(
        provider = %config.llm_provider,
        model = %config.llm_model,
        environment = %config.environment,
        "LLM client initialized"
    );
    let llm_client = Arc::new(LlmClient::new(provider));

    let sink = Arc::new(ConsoleSink { inner: TracingSink });
    let pipeline = ResearchPipeline::from_config(config, llm_client, sink)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.report_output_dir.clone());

    let (query, outcome) = match &args.from_collection {
        Some(path) => {
            let value = output::read_collection(path).await?;
            println!("📂 Analyzing saved collection: {}\n", path.display());
            println!("[1/3] Collection loaded from file");
            println!("[2/3] Analyzing data with AI...");
            let outcome = pipeline.run_from_collection(&value).await;
            (query_for_saved(&outcome, path)?, outcome)
        }
        None => {
            let query = match args.query {
                Some(raw) => Query::parse(&raw)?,
                None => prompt_query().await?,
            };
            println!("\n🔍 Researching: {query}\n");
            println!("[1/3] Collecting data from sources...");
            let outcome = pipeline.run(&query).await;
            (query, outcome)
        }
    };

    tracing::info!(trace_id = %outcome.trace_id, run_id = %outcome.insights.run_id, "Research run finished");

    let rule = "=".repeat(RULE_WIDTH);
    println!("{rule}");
    println!("{}", outcome.report);
    println!("{rule}");

    let report_path = output::write_report(&output_dir, &query, &outcome.report).await?;
    println!("\n✅ Report saved to: {}", report_path.display());

    if args.json {
        let path = output::write_json(&output_dir, "insights", &query, &outcome.insights).await?;
        println!("📄 Insights saved to: {}", path.display());
    }
    if args.save_collection {
        match &outcome.collection {
            Some(collection) => {
                let path = output::write_json(&output_dir, "collection", &query, collection).await?;
                println!("📄 Collection saved to: {}", path.display());
            }
            None => tracing::info!("No collection to save for a run loaded from file"),
        }
    }

    println!("\n🎉 Research completed successfully!");
    Ok(())
}

fn print_banner() {
    let rule = "=".repeat(RULE_WIDTH);
    println!("{rule}");
    println!("🤖 AI Research Agent v{}", env!("CARGO_PKG_VERSION"));
    println!("   Automated company and person research");
    println!("{rule}\n");
}

async fn prompt_query() -> anyhow::Result<Query> {
    let raw: String = tokio::task::spawn_blocking(|| {
        Input::<String>::new()
            .with_prompt("Enter a company or person name to research")
            .allow_empty(true)
            .interact_text()
    })
    .await
    .context("query prompt task failed")?
    .context("failed to read query")?;

    Ok(Query::parse(&raw)?)
}

/// Names the output files of a run loaded from disk. Falls back to the input
/// file's stem when the saved query is unusable.
fn query_for_saved(outcome: &ResearchOutcome, path: &Path) -> anyhow::Result<Query> {
    if let Ok(query) = Query::parse(&outcome.insights.query) {
        return Ok(query);
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("collection");
    Ok(Query::parse(stem)?)
}
