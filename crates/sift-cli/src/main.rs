use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use clap::{Args, Parser, Subcommand};
use sift_cli::{check_endpoint, load_engine_config, BatchSummary, ClassifierEndpoint, OpenAiClassifier};
use sift_engine::{
    seeded_ledger, AiClassifier, AlertBus, EngineConfig, ItemMetadata, TriagePipeline,
    UsageLedger,
};
use tracing::{info, warn};

/// Inbox triage: deterministic scoring, safety rails, budgeted AI escalation.
#[derive(Debug, Parser)]
#[command(name = "sift", version, about)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify ItemMetadata JSON lines; write ClassificationResult JSON lines.
    Classify(ClassifyArgs),
    /// Load and validate configuration, then print the effective values.
    CheckConfig {
        #[arg(long, env = "SIFT_CONFIG")]
        config: Option<PathBuf>,
        /// Also check that the classifier endpoint answers.
        #[arg(long)]
        ping: bool,
    },
    /// Run safety rails and Tier-1 only for one item and print its reason trail.
    Explain {
        /// JSON file with one ItemMetadata object, or `-` for stdin.
        #[arg(long)]
        input: String,
        #[arg(long, env = "SIFT_CONFIG")]
        config: Option<PathBuf>,
        /// Print the full result as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    /// JSON lines file, or `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// User whose Tier-2 budget is charged.
    #[arg(long)]
    user: String,
    #[arg(long, env = "SIFT_CONFIG")]
    config: Option<PathBuf>,
    /// Items classified concurrently (overrides the config file).
    #[arg(long)]
    concurrency: Option<usize>,
    /// Tier-2 calls already used by this user this period.
    #[arg(long, default_value_t = 0)]
    calls_used: u32,
    /// Tier-2 cost already accumulated by this user this period.
    #[arg(long, default_value = "0")]
    cost_used: String,
    /// Never call the Tier-2 classifier.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Classify(args) => classify(args).await,
        Command::CheckConfig { config, ping } => check_config(config.as_deref(), ping).await,
        Command::Explain {
            input,
            config,
            json,
        } => explain(&input, config.as_deref(), json),
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn classify(args: ClassifyArgs) -> Result<()> {
    let mut config = load_engine_config(args.config.as_deref())?;
    if let Some(n) = args.concurrency {
        if n == 0 {
            bail!("--concurrency must be at least 1");
        }
        config.pipeline.batch_concurrency = n;
    }
    let cost_used = BigDecimal::from_str(args.cost_used.trim())
        .with_context(|| format!("Invalid --cost-used value {:?}", args.cost_used))?;

    let ledger = Arc::new(seeded_ledger(&config, &args.user, args.calls_used, cost_used));
    let alerts = AlertBus::new().shared();
    let mut alert_rx = alerts.subscribe();

    let mut builder = TriagePipeline::builder(config)
        .ledger(ledger.clone() as Arc<dyn UsageLedger>)
        .alerts(Arc::clone(&alerts));
    if let Some(classifier) = build_classifier(args.offline)? {
        builder = builder.classifier(classifier);
    }
    let pipeline = builder.build().context("Failed to build triage pipeline")?;

    let (items, rejected_lines) = read_items(&args.input)?;
    info!(
        items = items.len(),
        rejected_lines,
        user = %args.user,
        "Classifying batch"
    );

    let results = pipeline.classify_batch(&args.user, &items).await;

    let mut summary = BatchSummary {
        rejected_lines,
        ..Default::default()
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for result in &results {
        summary.record(result);
        serde_json::to_writer(&mut out, result).context("Failed to write result")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    while alert_rx.try_recv().is_ok() {
        summary.operator_alerts += 1;
    }
    let budget = ledger.snapshot(&args.user).await?;
    eprint!("{}", summary);
    eprintln!(
        "  budget: {}/{} calls, cost {} of {}",
        budget.calls_used, budget.call_cap, budget.cost_accumulated, budget.cost_cap
    );
    Ok(())
}

fn build_classifier(offline: bool) -> Result<Option<Arc<dyn AiClassifier>>> {
    if offline {
        info!("Offline run, Tier-2 escalation disabled");
        return Ok(None);
    }
    let Some(endpoint) = ClassifierEndpoint::from_env() else {
        warn!("SIFT_CLASSIFIER_URL not set, Tier-2 escalation disabled");
        return Ok(None);
    };
    info!(url = %endpoint.url, model = %endpoint.model, "Using Tier-2 classifier");
    let classifier = OpenAiClassifier::new(endpoint).context("Failed to build classifier client")?;
    Ok(Some(Arc::new(classifier)))
}

async fn check_config(path: Option<&Path>, ping: bool) -> Result<()> {
    let config = load_engine_config(path)?;
    // Building compiles every pattern and keyword.
    TriagePipeline::builder(config.clone())
        .build()
        .context("Configuration does not compile")?;
    print!("{}", config.to_toml_string()?);

    if ping {
        match ClassifierEndpoint::from_env() {
            Some(endpoint) if check_endpoint(&endpoint).await => {
                eprintln!("classifier endpoint {} reachable", endpoint.url);
            }
            Some(endpoint) => bail!("classifier endpoint {} unreachable", endpoint.url),
            None => eprintln!("no classifier endpoint configured"),
        }
    }
    Ok(())
}

fn explain(input: &str, path: Option<&Path>, json: bool) -> Result<()> {
    let config: EngineConfig = load_engine_config(path)?;
    let pipeline = TriagePipeline::builder(config)
        .build()
        .context("Failed to build triage pipeline")?;

    let text = read_all(input)?;
    let item: ItemMetadata =
        serde_json::from_str(&text).context("Input is not a valid ItemMetadata object")?;
    let eval = pipeline.evaluate_tier1(&item);
    let result = eval.explain(&item.item_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!(
        "{}: {} (confidence {:.2}, score {:.2})",
        result.item_id,
        result.disposition,
        result.confidence,
        eval.score.score()
    );
    if result.safety_override_applied {
        println!("safety override applied");
    }
    for entry in &result.reason_trail {
        println!("  {}", entry);
    }
    Ok(())
}

fn open_input(input: &str) -> Result<Box<dyn Read>> {
    if input == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = std::fs::File::open(input).with_context(|| format!("Failed to open {}", input))?;
    Ok(Box::new(file))
}

fn read_all(input: &str) -> Result<String> {
    let mut text = String::new();
    open_input(input)?
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to read {}", input))?;
    Ok(text)
}

/// Parse JSON lines, skipping blanks. Malformed lines are logged and counted.
fn read_items(input: &str) -> Result<(Vec<ItemMetadata>, usize)> {
    let reader = BufReader::new(open_input(input)?);
    let mut items = Vec::new();
    let mut rejected = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {}", idx + 1, input))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ItemMetadata>(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "Skipping malformed input line");
                rejected += 1;
            }
        }
    }
    Ok((items, rejected))
}
