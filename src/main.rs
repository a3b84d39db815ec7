// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! DocSentry: multi-agent document analysis
//!
//! Reads a contract, invoice or summary, runs entity extraction,
//! classification and anomaly detection, and prints a summary report.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use docsentry::archive::{ArchivedReport, ReportArchive};
use docsentry::config::{AppConfig, LlmProvider};
use docsentry::document::{self, SAMPLE_FILE};
use docsentry::llm::LlmClient;
use docsentry::pipeline::summary_report;
use docsentry::{Pipeline, Result};

/// DocSentry CLI - entity extraction, classification and anomaly detection
#[derive(Parser, Debug)]
#[command(name = "docsentry")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Multi-agent analyzer for renewable energy documents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a document (defaults to the sample document)
    Analyze {
        /// Document to analyze (.txt, .md, .pdf, .docx)
        path: Option<PathBuf>,

        /// Skip the language model; use rule-based agents only
        #[arg(long)]
        offline: bool,

        /// LLM provider (overrides config)
        #[arg(long, value_parser = ["ollama", "openai"])]
        provider: Option<String>,

        /// Model name (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// API key for OpenAI-compatible providers
        #[arg(long, env = "DOCSENTRY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Do not append the report to the archive
        #[arg(long)]
        no_archive: bool,
    },

    /// Show language model status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Archived report operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Write the sample Power Purchase Agreement
    Sample {
        /// Output file
        #[arg(short, long, default_value = SAMPLE_FILE)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent reports
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Clear the report archive
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Command line overrides for a single analysis
#[derive(Debug, Default)]
struct AnalyzeOptions {
    offline: bool,
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    no_archive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Analyze { path, offline, provider, model, api_key, no_archive }) => {
            let options = AnalyzeOptions { offline, provider, model, api_key, no_archive };
            run_analyze(config, path, options, &cli.format).await
        }
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::History { action }) => run_history_command(config, action, &cli.format),
        Some(Commands::Sample { output }) => run_sample(&output),
        None => run_analyze(config, None, AnalyzeOptions::default(), &cli.format).await,
    }
}

/// Fold command line overrides into the loaded configuration
fn apply_overrides(config: &mut AppConfig, options: &AnalyzeOptions) {
    if options.offline {
        config.llm.enabled = false;
    }
    match options.provider.as_deref() {
        Some("openai") => config.llm.provider = LlmProvider::OpenAi,
        Some("ollama") => config.llm.provider = LlmProvider::Ollama,
        _ => {}
    }
    if let Some(model) = &options.model {
        config.llm.model = model.clone();
    }
    if let Some(key) = &options.api_key {
        config.llm.api_key = Some(key.clone());
    }
    if options.no_archive {
        config.archive.enabled = false;
    }
}

/// Run the pipeline on one document
async fn run_analyze(
    mut config: AppConfig,
    path: Option<PathBuf>,
    options: AnalyzeOptions,
    format: &str,
) -> Result<()> {
    apply_overrides(&mut config, &options);
    config.validate()?;

    let path = match path {
        Some(p) => p,
        None => {
            let sample = PathBuf::from(SAMPLE_FILE);
            document::ensure_sample(&sample)?;
            sample
        }
    };

    info!("Reading document from {:?}", path);
    let text = document::load_document(&path)?;
    if text.trim().is_empty() {
        warn!("Document {:?} is empty", path);
    }

    let pipeline = Pipeline::from_config(&config)?;
    if config.llm.enabled {
        info!("Using {} model '{}'", config.llm.provider.as_str(), pipeline.generator_name());
    } else {
        warn!("LLM disabled - using rule-based agents only");
    }

    info!("Processing document through multi-agent pipeline...");
    let report = pipeline.run(&text).await?;

    match format {
        "json" => {
            let output = serde_json::json!({ "path": path.to_string_lossy(), "report": report });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "jsonl" => {
            let output = serde_json::json!({ "path": path.to_string_lossy(), "report": report });
            println!("{}", serde_json::to_string(&output)?);
        }
        _ => println!("{}", summary_report(&report)),
    }

    if config.archive.enabled {
        let archive = ReportArchive::new(PathBuf::from(&config.archive.path));
        let entry = ArchivedReport::new(path, document::content_hash(&text), report);
        if let Err(e) = archive.append(&entry) {
            warn!("Failed to archive report: {}", e);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("DocSentry v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    if !config.llm.enabled {
        println!("LLM: disabled (rule-based agents only)");
    } else {
        let client = LlmClient::new(&config.llm)?;
        println!("Provider: {} at {}", client.provider().as_str(), client.base_url());

        match client.health_check().await {
            Ok(()) => println!("LLM: Running"),
            Err(e) => println!("LLM: Error - {}", e),
        }

        match client.list_models().await {
            Ok(models) => {
                println!("\nAvailable models:");
                for m in &models {
                    let marker = if client.is_configured_model(m) { "→" } else { " " };
                    println!("  {} {}", marker, m);
                }
                if !models.iter().any(|m| client.is_configured_model(m)) {
                    println!("\nConfigured model '{}' not found", client.model());
                }
            }
            Err(e) => println!("  Error listing models: {}", e),
        }
    }

    println!("\nConfiguration:");
    println!("  Model: {}", config.llm.model);
    println!("  API key: {}", if config.llm.api_key.is_some() { "set" } else { "not set" });
    println!("  Entity backend: {:?}", config.extraction.backend);
    println!("  Labels: {}", config.extraction.labels.join(", "));
    println!(
        "  Archive: {}",
        if config.archive.enabled { config.archive.path.as_str() } else { "disabled" }
    );

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let mut shown = config;
            if shown.llm.api_key.is_some() {
                shown.llm.api_key = Some("********".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(docsentry::DocSentryError::Config(format!(
                    "{:?} already exists. Use --force to overwrite",
                    output
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Provider: {}", config.llm.provider.as_str());
            println!("  Model: {}", config.llm.model);
            println!("  Entity backend: {:?}", config.extraction.backend);
        }
    }

    Ok(())
}

/// Run history commands
fn run_history_command(config: AppConfig, action: HistoryCommands, format: &str) -> Result<()> {
    let archive = ReportArchive::new(PathBuf::from(&config.archive.path));

    match action {
        HistoryCommands::List { count } => {
            let entries = archive.get_recent(count)?;
            if format == "text" {
                println!("Recent reports ({} entries):", entries.len());
                for entry in entries {
                    println!(
                        "  {} {} [{}] {} anomalies",
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        entry.source.display(),
                        entry.report.doc_type,
                        entry.report.anomalies.len()
                    );
                }
            } else {
                for entry in entries {
                    println!("{}", serde_json::to_string(&entry)?);
                }
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing the report archive");
                return Ok(());
            }
            archive.clear()?;
            println!("Report archive cleared");
        }
    }

    Ok(())
}

/// Write the sample document
fn run_sample(output: &Path) -> Result<()> {
    if document::ensure_sample(output)? {
        println!("Wrote sample document to {:?}", output);
    } else {
        println!("{:?} already exists", output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["docsentry"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_analyze_command() {
        let cli = Cli::try_parse_from([
            "docsentry", "analyze", "/tmp/ppa.pdf", "--offline", "--format", "json",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Some(Commands::Analyze { path, offline, .. }) => {
                assert!(offline);
                assert_eq!(path, Some(PathBuf::from("/tmp/ppa.pdf")));
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["docsentry", "analyze", "--provider", "bard"]).is_err());
    }

    #[test]
    fn test_cli_history_list() {
        let cli = Cli::try_parse_from(["docsentry", "history", "list", "-n", "3"]).unwrap();
        match cli.command {
            Some(Commands::History { action: HistoryCommands::List { count } }) => assert_eq!(count, 3),
            _ => panic!("Expected History List command"),
        }
    }

    #[test]
    fn test_api_key_flag_reads_env() {
        let command = Cli::command();
        let analyze = command.find_subcommand("analyze").unwrap();
        let api_key = analyze
            .get_arguments()
            .find(|a| a.get_id() == "api_key")
            .unwrap();
        assert_eq!(api_key.get_env(), Some(std::ffi::OsStr::new("DOCSENTRY_API_KEY")));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AppConfig::default();
        let options = AnalyzeOptions {
            offline: true,
            provider: Some("openai".to_string()),
            model: Some("gpt-4o-mini".to_string()),
            api_key: Some("sk-test".to_string()),
            no_archive: true,
        };
        apply_overrides(&mut config, &options);

        assert!(!config.llm.enabled);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert!(!config.archive.enabled);
    }
}
