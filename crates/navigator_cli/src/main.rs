use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use navigator_core::{
    evaluate_cases, load_entries_jsonl, EvalCase, FaqAnswer, FaqEntry, MatchOutcome, MatchQuery,
    Matcher, MatcherConfig, DEFAULT_REQUIRED_PASS_RATE, DEFAULT_THRESHOLD,
};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "navigator")]
#[command(about = "Evidence navigator FAQ matcher")]
struct Cli {
    /// FAQ entries, one JSON object per line.
    #[arg(long, global = true, env = "NAVIGATOR_FAQS")]
    faqs: Option<PathBuf>,

    /// Minimum keyword score for a fuzzy hit.
    #[arg(long, global = true, env = "NAVIGATOR_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Ask {
        #[arg(long)]
        question: String,
        #[arg(long)]
        persona: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = DEFAULT_REQUIRED_PASS_RATE)]
        min_pass_rate: f32,
    },
}

#[derive(Serialize)]
struct AskReply<'a> {
    #[serde(flatten)]
    outcome: &'a MatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a FaqAnswer>,
}

fn read_eval_cases_json(path: &Path) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let cases: Vec<EvalCase> = serde_json::from_reader(file).context("parse eval cases json")?;
    Ok(cases)
}

fn load_faqs(cli: &Cli) -> Result<Vec<FaqEntry>> {
    let Some(path) = &cli.faqs else {
        bail!("--faqs (or NAVIGATOR_FAQS) is required");
    };
    let entries = load_entries_jsonl(path)?;
    debug!(count = entries.len(), path = %path.display(), "loaded faq entries");
    Ok(entries)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if !cli.threshold.is_finite() || cli.threshold < 0.0 {
        bail!("--threshold must be a non-negative number");
    }
    let matcher = Matcher::new(MatcherConfig::default().with_threshold(cli.threshold));

    match &cli.command {
        Commands::Ask {
            question,
            persona,
            format,
        } => {
            let entries = load_faqs(&cli)?;
            let query = MatchQuery {
                text: question.clone(),
                active_persona: persona.clone(),
            };
            let outcome = matcher.decide(&query, &entries);
            let answer = match (&outcome.entry_id, outcome.is_hit()) {
                (Some(id), true) => entries.iter().find(|e| &e.id == id).map(|e| &e.answer),
                _ => None,
            };

            match format {
                OutputFormat::Json => {
                    let reply = AskReply {
                        outcome: &outcome,
                        answer,
                    };
                    println!("{}", serde_json::to_string_pretty(&reply)?);
                }
                OutputFormat::Text => {
                    println!(
                        "decision={:?} score={:.4} kind={} entry_id={}",
                        outcome.decision,
                        outcome.score,
                        outcome
                            .kind
                            .map(|k| format!("{k:?}").to_lowercase())
                            .unwrap_or_else(|| "none".to_string()),
                        outcome.entry_id.as_deref().unwrap_or("null")
                    );
                    if let Some(answer) = answer {
                        println!("acknowledgment={}", answer.acknowledgment);
                        println!("evidence={}", answer.evidence);
                        for source in &answer.sources {
                            println!("source={source}");
                        }
                    }
                }
            }
        }
        Commands::Eval {
            cases,
            min_pass_rate,
        } => {
            let entries = load_faqs(&cli)?;
            let cases = read_eval_cases_json(cases)?;
            let run_id = format!("eval-{}", chrono::Utc::now().timestamp_millis());
            let summary = evaluate_cases(&matcher, &entries, &cases);

            println!(
                "run_id={} total={} passed={} failed={} pass_rate={:.4} required={:.4} meets_threshold={}",
                run_id,
                summary.total,
                summary.passed,
                summary.failed,
                summary.pass_rate,
                min_pass_rate,
                summary.meets(*min_pass_rate)
            );

            for o in &summary.outcomes {
                println!(
                    "case={} passed={} decision={:?} faq_id={} score={:.4}",
                    o.case_id,
                    o.passed,
                    o.actual_decision,
                    o.actual_faq_id.as_deref().unwrap_or("null"),
                    o.score
                );
            }

            if !summary.meets(*min_pass_rate) {
                bail!(
                    "pass rate {:.4} is below required {:.4}",
                    summary.pass_rate,
                    min_pass_rate
                );
            }
        }
    }

    Ok(())
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_defaults() {
        let cli = Cli::try_parse_from([
            "navigator",
            "--faqs",
            "faqs.jsonl",
            "ask",
            "--question",
            "what is aaro",
        ])
        .expect("parse");

        assert_eq!(cli.threshold, DEFAULT_THRESHOLD);
        match cli.command {
            Commands::Ask {
                persona, format, ..
            } => {
                assert_eq!(persona, None);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "navigator",
            "eval",
            "--cases",
            "cases.json",
            "--faqs",
            "faqs.jsonl",
            "--threshold",
            "3",
        ])
        .expect("parse");

        assert_eq!(cli.faqs.as_deref(), Some(Path::new("faqs.jsonl")));
        assert_eq!(cli.threshold, 3.0);
    }
}
