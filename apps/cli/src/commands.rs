//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use contentsync_consistency::ReferenceOptions;
use contentsync_core::{
    ArtifactMeta, ExportOptions, MigrateOptions, ProgressReporter, ReportWriter,
};
use contentsync_shared::{
    AppConfig, init_config, load_config, load_config_from, validate_snapshot_exists,
};
use contentsync_store::{DocumentStore, FirestoreStore};
use contentsync_testimonials::{GoogleTranslator, ProcessorOptions, WhatlangDetector};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Keep a remote content store and its static snapshot consistent.
#[derive(Parser)]
#[command(
    name = "contentsync",
    version,
    about = "Export, migrate, audit and annotate content between a remote store and its static snapshot.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.contentsync/contentsync.toml).
    #[arg(long, global = true, env = "CONTENTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Snapshot file, overriding `[snapshot] path`.
    #[arg(long, global = true)]
    pub snapshot: Option<String>,

    /// Reports directory, overriding `[reports] output_dir`.
    #[arg(long, global = true)]
    pub reports_dir: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Pull every collection from the remote store into the snapshot.
    Export {
        /// Write the snapshot (the previous one is backed up first).
        #[arg(long)]
        apply: bool,
    },

    /// Normalize legacy shapes, merge duplicates and validate offerings.
    Migrate {
        /// Read from the remote store instead of the snapshot file.
        #[arg(long)]
        from_remote: bool,

        /// Write the migrated snapshot (the previous one is backed up first).
        #[arg(long)]
        apply: bool,

        /// Also write migrated offerings to the remote store. Requires --apply.
        #[arg(long, requires = "apply")]
        push: bool,
    },

    /// Deep-diff the remote store against the snapshot.
    Parity,

    /// Report dangling links, orphaned records and reference coverage.
    Coverage {
        /// Also treat strings under program/experience/solution/slug field
        /// paths as references.
        #[arg(long)]
        heuristics: bool,
    },

    /// Report the field structure of every remote collection.
    Structure,

    /// Detect testimonial languages and translate Spanish ones.
    Testimonials {
        /// Write annotated records back to the remote store.
        #[arg(long)]
        apply: bool,

        /// Reprocess records already at the current processing version.
        #[arg(long)]
        force: bool,

        /// Records per batch, overriding `[translation] batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,
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

    let filter = match cli.verbose {
        0 => "contentsync=info",
        1 => "contentsync=debug",
        _ => "contentsync=trace",
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
    if let Command::Config {
        action: ConfigAction::Init,
    } = cli.command
    {
        return cmd_config_init();
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Export { apply } => cmd_export(&config, apply).await,
        Command::Migrate {
            from_remote,
            apply,
            push,
        } => cmd_migrate(&config, from_remote, apply, push).await,
        Command::Parity => cmd_parity(&config).await,
        Command::Coverage { heuristics } => cmd_coverage(&config, heuristics),
        Command::Structure => cmd_structure(&config).await,
        Command::Testimonials {
            apply,
            force,
            batch_size,
        } => cmd_testimonials(&config, apply, force, batch_size).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load the config file, then apply global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(snapshot) = &cli.snapshot {
        config.snapshot.path = snapshot.clone();
    }
    if let Some(dir) = &cli.reports_dir {
        config.reports.output_dir = dir.clone();
    }

    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_export(config: &AppConfig, apply: bool) -> Result<()> {
    let store = FirestoreStore::from_config(&config.store)?;
    let options = ExportOptions::from_config(&config.snapshot, apply);

    info!(apply, snapshot = %options.snapshot_path.display(), "exporting remote store");

    let reporter = CliProgress::new();
    let result = contentsync_core::export(&store, &options, &reporter).await?;

    println!();
    println!("  Records: {}", result.dataset.record_count());
    match &result.write {
        Some(write) => {
            println!("  Snapshot: {} ({} bytes)", write.path.display(), write.bytes);
            if let Some(backup) = &write.backup {
                println!("  Backup:   {}", backup.display());
            }
        }
        None => println!("  Dry run: snapshot not written (use --apply)."),
    }
    println!();

    Ok(())
}

async fn cmd_migrate(config: &AppConfig, from_remote: bool, apply: bool, push: bool) -> Result<()> {
    let options = MigrateOptions {
        from_remote,
        apply,
        push,
        ..MigrateOptions::from_config(&config.snapshot)
    };

    // Fail on missing credentials or a missing snapshot before any work.
    let store = if options.needs_store() {
        Some(FirestoreStore::from_config(&config.store)?)
    } else {
        None
    };
    if !from_remote {
        validate_snapshot_exists(&config.snapshot)?;
    }

    let writer = ReportWriter::from_config(&config.reports);
    let reporter = CliProgress::new();
    let result = contentsync_core::migrate(
        store.as_ref().map(|s| s as &dyn DocumentStore),
        &options,
        &writer,
        &reporter,
    )
    .await?;

    let report = &result.report;
    println!();
    for entry in &report.collections {
        println!(
            "  {:<12} {} -> {}",
            entry.collection.as_str(),
            entry.input,
            entry.output
        );
    }
    println!("  Duplicates merged:  {}", report.duplicates.len());
    println!("  Records dropped:    {}", report.dropped.len());
    println!("  Records normalized: {}", report.normalized.len());
    println!("  Validation issues:  {}", report.validation_issues.len());
    println!("  Failures:           {}", report.failures.len());
    if !report.applied {
        println!("  Dry run: snapshot not written (use --apply).");
    }
    print_artifacts(writer.output_dir(), &result.artifacts);

    Ok(())
}

async fn cmd_parity(config: &AppConfig) -> Result<()> {
    let snapshot_path = validate_snapshot_exists(&config.snapshot)?;
    let store = FirestoreStore::from_config(&config.store)?;
    let writer = ReportWriter::from_config(&config.reports);

    let reporter = CliProgress::new();
    let result = contentsync_core::parity(&store, &snapshot_path, &writer, &reporter).await?;

    let report = &result.report;
    println!();
    println!("  Missing in snapshot:      {}", report.missing_in_json.len());
    println!("  Missing in remote store:  {}", report.missing_in_firestore.len());
    println!("  Field mismatches:         {}", report.field_mismatches.len());
    println!("  Extra fields in snapshot: {}", report.extra_fields_in_json.len());
    print_artifacts(writer.output_dir(), &result.artifacts);

    Ok(())
}

fn cmd_coverage(config: &AppConfig, heuristics: bool) -> Result<()> {
    let snapshot_path = validate_snapshot_exists(&config.snapshot)?;
    let options = ReferenceOptions {
        path_heuristics: heuristics || config.references.path_heuristics,
    };
    let writer = ReportWriter::from_config(&config.reports);

    let reporter = CliProgress::new();
    let result = contentsync_core::coverage(&snapshot_path, &options, &writer, &reporter)?;

    let report = &result.report;
    println!();
    println!("  Coverage:       {}%", report.coverage);
    println!("  Referenced:     {}", report.used_count);
    println!("  Orphans:        {}", report.orphan_count);
    println!("  Dangling links: {}", report.dangling_links.len());
    print_artifacts(writer.output_dir(), &result.artifacts);

    Ok(())
}

async fn cmd_structure(config: &AppConfig) -> Result<()> {
    let store = FirestoreStore::from_config(&config.store)?;
    let writer = ReportWriter::from_config(&config.reports);

    let reporter = CliProgress::new();
    let result = contentsync_core::structure(&store, &writer, &reporter).await?;

    println!();
    for collection in &result.report.collections {
        println!(
            "  {:<16} {} documents, {} field paths",
            collection.name,
            collection.document_count,
            collection.fields.len()
        );
    }
    print_artifacts(writer.output_dir(), &result.artifacts);

    Ok(())
}

async fn cmd_testimonials(
    config: &AppConfig,
    apply: bool,
    force: bool,
    batch_size: Option<usize>,
) -> Result<()> {
    // Both credentials are checked before the first batch.
    let store: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::from_config(&config.store)?);
    let translator = Arc::new(GoogleTranslator::from_config(&config.translation)?);

    let mut options = ProcessorOptions::from_config(&config.translation);
    options.dry_run = !apply;
    options.force = force;
    if let Some(size) = batch_size {
        options.batch_size = size.max(1);
    }

    let writer = ReportWriter::from_config(&config.reports);
    let reporter = CliProgress::new();
    let result = contentsync_core::process_testimonials(
        store,
        Arc::new(WhatlangDetector),
        translator,
        options,
        &writer,
        &reporter,
    )
    .await?;

    let summary = &result.report;
    println!();
    println!("  Processed:  {}", summary.processed);
    println!("  Translated: {}", summary.translated);
    println!("  Failed:     {}", summary.failed);
    println!("  Skipped:    {}", summary.skipped);
    if summary.dry_run {
        println!("  Dry run: nothing written (use --apply).");
    }
    print_artifacts(writer.output_dir(), &result.artifacts);

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_artifacts(dir: &Path, artifacts: &[ArtifactMeta]) {
    println!();
    for artifact in artifacts {
        println!(
            "  {}  {} bytes  sha256:{}",
            dir.join(&artifact.filename).display(),
            artifact.size_bytes,
            artifact.sha256.get(..12).unwrap_or(&artifact.sha256)
        );
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn collection(&self, name: &str, records: usize) {
        self.spinner.println(format!("  {name}: {records} records"));
    }

    fn done(&self, _artifacts: &[ArtifactMeta]) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn push_requires_apply() {
        assert!(Cli::try_parse_from(["contentsync", "migrate", "--push"]).is_err());
        assert!(Cli::try_parse_from(["contentsync", "migrate", "--apply", "--push"]).is_ok());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "contentsync",
            "coverage",
            "--heuristics",
            "-vv",
            "--snapshot",
            "data/other.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.snapshot.as_deref(), Some("data/other.json"));
        assert!(matches!(cli.command, Command::Coverage { heuristics: true }));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!(
            "cs-cli-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("contentsync.toml");
        std::fs::write(&path, "[snapshot]\npath = \"from-file.json\"\n\n[reports]\nmax_listed = 50\n")
            .unwrap();

        let cli = Cli::try_parse_from([
            "contentsync",
            "--config",
            path.to_str().unwrap(),
            "--reports-dir",
            "out",
            "parity",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.snapshot.path, "from-file.json");
        assert_eq!(config.reports.output_dir, "out");
        assert_eq!(config.reports.max_listed, 50);

        std::fs::remove_dir_all(&dir).ok();
    }
}
