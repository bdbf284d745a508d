//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use atlasdash_core::pipeline::{
    BuildResult, BuildSummary, ProgressReporter, SilentProgress, build_docset,
};
use atlasdash_shared::{AppConfig, BuildConfig, IndexRecord, init_config, load_config};
use atlasdash_storage::{INDEX_DB_NAME, Storage};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// atlasdash: offline docsets from the Salesforce developer documentation.
#[derive(Parser)]
#[command(
    name = "atlasdash",
    version,
    about = "Build offline, searchable docsets from the Salesforce documentation feed.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors; hides classification and version warnings.
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download and index one or more deliverables (e.g. apexcode, pages).
    Build {
        /// Deliverables to build, in order.
        #[arg(required = true)]
        deliverables: Vec<String>,

        /// Documentation locale (defaults to config, then en-us).
        #[arg(short, long)]
        locale: Option<String>,

        /// Docset build directory.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum concurrent downloads.
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// Search the index of an existing build.
    Search {
        /// Substring to look for in entry names.
        query: String,

        /// Docset build directory.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum number of results.
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List past build runs of a build directory.
    History {
        /// Docset build directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match (cli.silent, cli.verbose) {
        (true, _) => "atlasdash=error",
        (false, 0) => "atlasdash=info",
        (false, 1) => "atlasdash=debug",
        _ => "atlasdash=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            deliverables,
            locale,
            out,
            concurrency,
        } => {
            let overrides = BuildOverrides {
                locale,
                out,
                concurrency,
            };
            cmd_build(deliverables, overrides, cli.silent).await
        }
        Command::Search {
            query,
            out,
            limit,
            json,
        } => cmd_search(&query, out, limit, json).await,
        Command::History { out } => cmd_history(out).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

/// Flag values that win over the config file.
#[derive(Debug, Default)]
struct BuildOverrides {
    locale: Option<String>,
    out: Option<PathBuf>,
    concurrency: Option<u32>,
}

fn resolve_build_config(
    mut config: AppConfig,
    deliverables: Vec<String>,
    overrides: BuildOverrides,
) -> Result<BuildConfig> {
    if let Some(locale) = overrides.locale {
        config.defaults.locale = locale;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.defaults.concurrency = concurrency;
    }
    let mut build = BuildConfig::from_app_config(&config, deliverables)?;
    if let Some(out) = overrides.out {
        build.output_dir = out;
    }
    Ok(build)
}

async fn cmd_build(deliverables: Vec<String>, overrides: BuildOverrides, silent: bool) -> Result<()> {
    let build_config = resolve_build_config(load_config()?, deliverables, overrides)?;

    info!(
        locale = %build_config.locale,
        deliverables = ?build_config.deliverables,
        output = %build_config.output_dir.display(),
        "building docset"
    );

    let result = if silent {
        build_docset(&build_config, &SilentProgress).await?
    } else {
        let reporter = CliProgress::new()?;
        build_docset(&build_config, &reporter).await?
    };

    for summary in &result.deliverables {
        println!("Success: {} - {}", summary.title, summary.version_text);
    }
    if !silent {
        println!(
            "  {} pages downloaded, {} already present, {:.1}s",
            result.pages_written,
            result.pages_skipped,
            result.elapsed.as_secs_f64()
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_indexed(&self, record: &IndexRecord) {
        self.spinner
            .set_message(format!("Indexed {} ({})", record.name, record.type_name));
    }

    fn deliverable_done(&self, summary: &BuildSummary) {
        self.spinner.println(format!(
            "  {} ({}): {} entries",
            summary.title, summary.doc_version, summary.records
        ));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// search / history
// ---------------------------------------------------------------------------

fn build_dir(out: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir))
}

async fn cmd_search(query: &str, out: Option<PathBuf>, limit: u32, json: bool) -> Result<()> {
    let config = load_config()?;
    let db_path = build_dir(out, &config).join(INDEX_DB_NAME);
    let storage = Storage::open_readonly(&db_path).await?;

    let records = storage.search(query, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No entries match '{query}'.");
        return Ok(());
    }
    for record in &records {
        println!("{:<12} {:<40} {}", record.type_name, record.name, record.path);
    }
    Ok(())
}

async fn cmd_history(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = build_dir(out, &config).join(INDEX_DB_NAME);
    let storage = Storage::open_readonly(&db_path).await?;

    let runs = storage.list_build_runs().await?;
    if runs.is_empty() {
        println!("No builds recorded.");
        return Ok(());
    }
    for run in &runs {
        let status = match run.finished_at {
            Some(_) => format!("{} entries", run.record_count.unwrap_or(0)),
            None => "incomplete".to_string(),
        };
        println!(
            "{}  {:<12} {:<6} {:<28} {}",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.deliverable,
            run.locale,
            run.version_text.as_deref().unwrap_or("-"),
            status
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let overrides = BuildOverrides {
            locale: Some("ja-jp".into()),
            out: Some(PathBuf::from("/tmp/docset")),
            concurrency: Some(4),
        };

        let build = resolve_build_config(AppConfig::default(), vec!["apexcode".into()], overrides)
            .unwrap();
        assert_eq!(build.locale, "ja-jp");
        assert_eq!(build.output_dir, PathBuf::from("/tmp/docset"));
        assert_eq!(build.concurrency, 4);
        assert_eq!(build.deliverables, ["apexcode"]);
    }

    #[test]
    fn zero_concurrency_flag_is_rejected() {
        let overrides = BuildOverrides {
            concurrency: Some(0),
            ..BuildOverrides::default()
        };
        let err = resolve_build_config(AppConfig::default(), vec!["pages".into()], overrides)
            .unwrap_err();
        assert!(err.to_string().contains("concurrency must be at least 1"));
    }

    #[test]
    fn build_requires_a_deliverable() {
        assert!(Cli::try_parse_from(["atlasdash", "build"]).is_err());
        let cli = Cli::try_parse_from(["atlasdash", "--silent", "build", "apexcode", "pages"])
            .unwrap();
        assert!(cli.silent);
        assert!(matches!(cli.command, Command::Build { ref deliverables, .. } if deliverables.len() == 2));
    }

    #[test]
    fn silent_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["atlasdash", "-v", "--silent", "config", "show"]).is_err());
    }
}
