use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use delve_common::observability::{LogConfig, init_logging};
use delve_config::{
    ConfigProvider, DelveConfig, DelveConfigLoader, FileConfigProvider, StaticConfigProvider,
    default_config_path,
};
use delve_research::{ResearchService, build_sanitizer};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

mod render;

/// Research a topic with a hosted language model and web search.
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    /// Path to delve.yaml (defaults to ./delve.yaml, then the user config dir)
    #[arg(short, long, env = "DELVE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze, search, compare and summarize TEXT (read from stdin when omitted)
    Research {
        text: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run the cleanup pipeline over stdin
    Clean,
    /// Load configuration and report missing credentials
    CheckConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins over the file)
    let path = cli.config.clone().or_else(default_config_path);
    let provider: Arc<dyn ConfigProvider> = match &path {
        Some(p) => Arc::new(
            FileConfigProvider::open(p)
                .with_context(|| format!("failed to load {}", p.display()))?,
        ),
        None => Arc::new(StaticConfigProvider::new(
            DelveConfigLoader::new()
                .load()
                .context("failed to load configuration from the environment")?,
        )),
    };
    let cfg = provider.current();

    // 2) Logging from the `logging` section
    let log_path = init_logging(LogConfig {
        app_name: "delve",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::info!(
        config = %path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<env only>".into()),
        log = %log_path.display(),
        command = ?cli.command,
        "delve.start"
    );

    match cli.command {
        Command::Research { text, format } => {
            let text = match text {
                Some(t) => t,
                None => read_stdin()?,
            };
            let report = ResearchService::new(provider).research(&text).await?;
            match format {
                OutputFormat::Text => print!("{}", render::report_text(&report)),
                OutputFormat::Json => println!("{}", render::report_json(&report)?),
            }
        }
        Command::Clean => {
            let sanitizer = build_sanitizer(&cfg)?;
            println!("{}", sanitizer.clean(&read_stdin()?));
        }
        Command::CheckConfig => check_config(&cfg, path)?,
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn check_config(cfg: &DelveConfig, path: Option<PathBuf>) -> Result<()> {
    match path {
        Some(p) => println!("config file: {}", p.display()),
        None => println!("config file: none (environment only)"),
    }
    println!("inference endpoint: {}", cfg.inference.endpoint);
    println!("search endpoint: {}", cfg.search.endpoint);
    build_sanitizer(cfg)?;

    let missing = cfg.missing_credentials();
    for name in &missing {
        println!("missing credential: {name}");
    }
    if !cfg.credentials.has_model_token() {
        println!("note: without model_token inference calls are anonymous and rate limited");
    }
    if cfg.credentials.require_search().is_err() {
        bail!("search credentials are required for `delve research`");
    }
    println!("configuration OK");
    Ok(())
}
