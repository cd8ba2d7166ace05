//! Command-line interface for paper-finder

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use comfy_table::{Attribute, Cell, Table, presets};
use finder_runtime::{CountedResult, FinderRuntime};
use finder_utils::{Config, LogFormat};
use futures::future::join_all;
use serde_json::json;
use tracing::{error, info};

/// Find research papers on a topic and count them
#[derive(Parser, Debug)]
#[command(name = "paper-finder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Find research papers on a topic with Gemini and Google Search, and count them",
    long_about = None
)]
struct Cli {
    /// Topics to search for; several topics run concurrently
    #[arg(required = true)]
    topics: Vec<String>,

    /// How the answer is produced
    #[arg(long, value_enum, default_value_t = Mode::Direct)]
    mode: Mode,

    /// Model override (defaults to PAPER_FINDER_MODEL or gemini-2.5-flash-lite)
    #[arg(long)]
    model: Option<String>,

    /// Print each result as a JSON object instead of a table
    #[arg(long)]
    json: bool,

    /// Log line format (text or json)
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

/// Answering strategy
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Search, then count, without a planning model
    Direct,
    /// Let the root model call the search agent and the counter
    Agent,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    finder_utils::init_tracing_with(cli.log_format, if cli.verbose { "debug" } else { "info" });

    let mut config = Config::from_env();
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }

    let runtime =
        FinderRuntime::from_config(&config).context("failed to initialise the paper finder")?;
    info!(
        mode = ?cli.mode,
        topics = cli.topics.len(),
        model = %config.model,
        "Starting paper-finder"
    );

    let failures = match cli.mode {
        Mode::Direct => run_direct(&runtime, &cli.topics, cli.json).await,
        Mode::Agent => run_agent(&runtime, &cli.topics).await,
    };

    if failures > 0 {
        anyhow::bail!("{failures} of {} topic(s) failed", cli.topics.len());
    }
    Ok(())
}

/// Run the orchestrator for every topic; returns the number of failures
async fn run_direct(runtime: &FinderRuntime, topics: &[String], as_json: bool) -> usize {
    let outcomes = runtime.find_many(topics).await;
    let mut failures = 0;

    for (topic, outcome) in topics.iter().zip(outcomes) {
        match outcome {
            Ok(result) if as_json => println!("{}", result_json(topic, &result)),
            Ok(result) => {
                println!("{}", render_table(topic, &result));
                println!("Total papers: {}", result.count());
            }
            Err(e) => {
                failures += 1;
                error!(topic = %topic, error = %e, "Topic failed");
            }
        }
    }

    failures
}

/// Run the LLM-driven root agent for every topic
async fn run_agent(runtime: &FinderRuntime, topics: &[String]) -> usize {
    let outcomes = join_all(topics.iter().map(|topic| runtime.ask(topic))).await;
    let mut failures = 0;

    for (topic, outcome) in topics.iter().zip(outcomes) {
        match outcome {
            Ok(answer) => println!("## {topic}\n\n{answer}\n"),
            Err(e) => {
                failures += 1;
                error!(topic = %topic, error = %e, "Topic failed");
            }
        }
    }

    failures
}

fn result_json(topic: &str, result: &CountedResult) -> serde_json::Value {
    json!({
        "topic": topic,
        "results": result.results(),
        "count": result.count(),
    })
}

fn render_table(topic: &str, result: &CountedResult) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new(format!("Papers on \"{topic}\"")).add_attribute(Attribute::Bold),
    ]);

    for (index, paper) in result.results().iter().enumerate() {
        table.add_row(vec![Cell::new(index + 1), Cell::new(paper)]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["paper-finder", "quantum computing 2024"]);
        assert_eq!(cli.topics, vec!["quantum computing 2024"]);
        assert_eq!(cli.mode, Mode::Direct);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.model.is_none());
        assert!(!cli.json);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "paper-finder",
            "--mode",
            "agent",
            "--model",
            "gemini-2.5-flash",
            "--json",
            "--log-format",
            "json",
            "-v",
            "rust",
            "wasm",
        ]);
        assert_eq!(cli.mode, Mode::Agent);
        assert_eq!(cli.model.as_deref(), Some("gemini-2.5-flash"));
        assert!(cli.json);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.verbose);
        assert_eq!(cli.topics, vec!["rust", "wasm"]);
    }

    #[test]
    fn test_cli_accepts_empty_topic() {
        let cli = Cli::parse_from(["paper-finder", ""]);
        assert_eq!(cli.topics, vec![String::new()]);
    }

    #[test]
    fn test_cli_requires_topic() {
        assert!(Cli::try_parse_from(["paper-finder"]).is_err());
        assert!(Cli::try_parse_from(["paper-finder", "--log-format", "xml", "x"]).is_err());
    }

    #[test]
    fn test_result_json() {
        let result = CountedResult::from_results(vec!["Paper A".to_string()]);
        assert_eq!(
            result_json("llm agents", &result),
            json!({ "topic": "llm agents", "results": ["Paper A"], "count": 1 })
        );
    }

    #[test]
    fn test_render_table() {
        let result =
            CountedResult::from_results(vec!["Paper A".to_string(), "Paper B".to_string()]);
        let rendered = render_table("llm agents", &result).to_string();
        assert!(rendered.contains("Paper A"));
        assert!(rendered.contains("Paper B"));
        assert!(rendered.contains("llm agents"));
    }
}
