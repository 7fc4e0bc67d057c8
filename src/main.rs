use anyhow::Context;
use clap::{Args, ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use deteval::schema::{Detection, EvaluationResult};
use deteval::validation::{RejectionSummary, Side, decode_records};
use deteval::{EvalConfig, Evaluator};
use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "deteval",
    about = "Object-detection evaluation: AP/mAP, grouped metrics and confusion analysis",
    arg_required_else_help = true
)]
struct Cli {
    /// Disable color
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate predictions against ground truth
    Evaluate(EvaluateArgs),
    /// Print the JSON schema of the evaluation result
    Schema,
    /// Show or initialize the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct EvaluateArgs {
    /// JSON array of predicted detections
    #[arg(short, long, value_name = "FILE")]
    predictions: PathBuf,

    /// JSON array of ground-truth detections
    #[arg(short, long = "ground-truth", value_name = "FILE")]
    ground_truth: PathBuf,

    /// TOML configuration (defaults to the user config file)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of classes
    #[arg(long)]
    num_classes: Option<usize>,

    /// Override the IoU threshold for precision/recall
    #[arg(long)]
    iou: Option<f64>,

    /// Override how many confusions to report
    #[arg(long)]
    top_k: Option<usize>,

    /// Output JSON (stable schema)
    #[arg(long)]
    json: bool,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Write the default configuration to the user config file
    #[arg(long)]
    init: bool,

    /// Number of classes for --init
    #[arg(long, requires = "init")]
    num_classes: Option<usize>,
}

/// Read a JSON array of detections; entries that fail to decode are counted, not fatal
fn load_detections(
    path: &Path,
    side: Side,
    rejected: &mut RejectionSummary,
) -> anyhow::Result<Vec<Detection>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of detections", path.display()))?;
    Ok(decode_records(records, side, rejected))
}

fn resolve_config(args: &EvaluateArgs) -> anyhow::Result<EvalConfig> {
    let mut config = match &args.config {
        Some(path) => EvalConfig::from_file(path)?,
        None => EvalConfig::load(),
    };
    if let Some(n) = args.num_classes {
        config.evaluation.num_classes = n;
    }
    if let Some(iou) = args.iou {
        config.evaluation.iou_threshold = iou;
    }
    if let Some(k) = args.top_k {
        config.evaluation.top_k_confusions = k;
    }
    Ok(config)
}

fn fmt_metric(v: f64) -> String {
    format!("{:.4}", v)
}

fn heading(text: &str, color: bool) -> String {
    if color {
        text.bold().cyan().to_string()
    } else {
        text.to_string()
    }
}

fn render_human(result: &EvaluationResult, color: bool) -> String {
    let mut out = String::new();
    let o = &result.overall;

    out.push_str(&heading("Overall:", color));
    for (k, v) in [
        ("mAP50", fmt_metric(o.map50)),
        ("mAP50-95", fmt_metric(o.map50_95)),
        ("precision", fmt_metric(o.precision)),
        ("recall", fmt_metric(o.recall)),
        ("f1", fmt_metric(o.f1)),
        ("images", o.num_images.to_string()),
        ("predictions", o.num_predictions.to_string()),
        ("ground truths", o.num_ground_truths.to_string()),
        ("classes evaluated", o.classes_evaluated.to_string()),
    ] {
        out.push_str(&format!("\n  {} = {}", k, v));
    }

    let rejected = &result.metadata.rejected;
    if rejected.total() > 0 {
        let line = format!(
            "\n  rejected = {} ({} predictions, {} ground truths)",
            rejected.total(),
            rejected.predictions,
            rejected.ground_truths
        );
        out.push_str(&if color { line.yellow().to_string() } else { line });
    }

    out.push('\n');
    out.push_str(&heading("Classes:", color));
    out.push_str(&format!(
        "\n  {:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>8}",
        "class", "precision", "recall", "f1", "AP50", "AP50-95", "support"
    ));
    for c in result.per_class.values() {
        out.push_str(&format!(
            "\n  {:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>8}",
            c.name,
            fmt_metric(c.precision),
            fmt_metric(c.recall),
            fmt_metric(c.f1),
            fmt_metric(c.ap50),
            fmt_metric(c.ap50_95),
            c.support
        ));
    }

    let groups = &result.groups;
    if !groups.normal.class_ids.is_empty() || !groups.warning.class_ids.is_empty() {
        out.push('\n');
        out.push_str(&heading("Groups:", color));
        for (name, g) in [("normal", &groups.normal), ("warning", &groups.warning)] {
            let mut line = format!(
                "\n  {} = precision {}, recall {}, mAP50 {}",
                name,
                fmt_metric(g.precision),
                fmt_metric(g.recall),
                fmt_metric(g.ap50)
            );
            if g.critical {
                line.push_str(" [critical]");
                if color {
                    line = line.red().to_string();
                }
            }
            out.push_str(&line);
        }
    }

    if !result.top_confusions.is_empty() {
        out.push('\n');
        out.push_str(&heading("Top confusions:", color));
        for pair in &result.top_confusions {
            out.push_str(&format!(
                "\n  {} -> {} ({:.1}%)\n    {}",
                pair.true_name,
                pair.predicted_name,
                pair.rate * 100.0,
                pair.advice
            ));
        }
    }

    out
}

fn run_evaluate(args: EvaluateArgs, color: ColorChoice) -> Result<(), i32> {
    let prepared = resolve_config(&args).and_then(|config| {
        let evaluator = Evaluator::new(&config)?;
        let mut rejected = RejectionSummary::default();
        let predictions = load_detections(&args.predictions, Side::Prediction, &mut rejected)?;
        let ground_truths =
            load_detections(&args.ground_truth, Side::GroundTruth, &mut rejected)?;
        Ok((evaluator, predictions, ground_truths, rejected))
    });
    let (evaluator, predictions, ground_truths, rejected) = match prepared {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Err(2);
        }
    };

    let result = evaluator.evaluate_with_rejections(&predictions, &ground_truths, rejected);

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(s) => println!("{}", s),
            Err(_) => return Err(3),
        }
    } else {
        let want_color = stdout().is_terminal() && !matches!(color, ColorChoice::Never);
        println!("{}", render_human(&result, want_color));
    }
    Ok(())
}

fn run_schema() -> Result<(), i32> {
    let schema = schemars::schema_for!(EvaluationResult);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => {
            println!("{}", s);
            Ok(())
        }
        Err(_) => Err(3),
    }
}

fn run_config(args: ConfigArgs) -> Result<(), i32> {
    if args.init {
        let config = EvalConfig::with_classes(args.num_classes.unwrap_or(1));
        return match config.save() {
            Ok(path) => {
                println!("wrote {}", path.display());
                Ok(())
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                Err(2)
            }
        };
    }

    match EvalConfig::load().to_toml_string() {
        Ok(s) => {
            print!("{}", s);
            Ok(())
        }
        Err(_) => Err(3),
    }
}

fn detect_color_choice() -> ColorChoice {
    // Scan args before clap so help/errors honor `--no-color`.
    // Stop at `--`, which terminates flags.
    let mut args = std::env::args_os();
    args.next();
    let mut flag = false;
    for arg in args {
        if arg == "--" {
            break;
        }
        if arg == "--no-color" {
            flag = true;
            break;
        }
    }
    if flag || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() {
    let color = detect_color_choice();
    let matches = Cli::command().color(color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Some(Commands::Evaluate(args)) => run_evaluate(args, color),
        Some(Commands::Schema) => run_schema(),
        Some(Commands::Config(args)) => run_config(args),
        None => Ok(()),
    };
    if let Err(code) = outcome {
        std::process::exit(code);
    }
}
