// ABOUTME: CLI entry point for relational-migrator
// ABOUTME: Parses commands, layers profile and flag settings, and runs one operation

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use relational_migrator::commands::{self, OperationResult};
use relational_migrator::config::{self, ConnectionOverrides, ConnectionParams, MigrationProfile};
use relational_migrator::database::Vendor;
use relational_migrator::interactive;
use relational_migrator::migration::{RecordCodec, DEFAULT_BATCH_SIZE};
use relational_migrator::orchestrator::{MigrationOptions, TableFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relational-migrator")]
#[command(about = "Migrate table data between MySQL, PostgreSQL, and SQLite", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML profile with [source] and [target] connection settings
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// Source connection URL (mysql://, postgresql://, sqlite://path)
    #[arg(long)]
    source_url: Option<String>,
    #[arg(long, value_enum)]
    source_vendor: Option<Vendor>,
    #[arg(long)]
    source_host: Option<String>,
    #[arg(long)]
    source_port: Option<u16>,
    /// Source database name, or file path for SQLite
    #[arg(long)]
    source_database: Option<String>,
    #[arg(long)]
    source_user: Option<String>,
    #[arg(long)]
    source_password: Option<String>,
    /// Require TLS for the source connection
    #[arg(long)]
    source_tls: bool,
}

#[derive(Args, Clone, Default)]
struct TargetArgs {
    /// Target connection URL (mysql://, postgresql://, sqlite://path)
    #[arg(long)]
    target_url: Option<String>,
    #[arg(long, value_enum)]
    target_vendor: Option<Vendor>,
    #[arg(long)]
    target_host: Option<String>,
    #[arg(long)]
    target_port: Option<u16>,
    /// Target database name, or file path for SQLite
    #[arg(long)]
    target_database: Option<String>,
    #[arg(long)]
    target_user: Option<String>,
    #[arg(long)]
    target_password: Option<String>,
    /// Require TLS for the target connection
    #[arg(long)]
    target_tls: bool,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Rows per import transaction (default: 1000)
    #[arg(long)]
    batch_size: Option<usize>,
    /// Write record files without indentation
    #[arg(long)]
    compact: bool,
    /// Import only these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    include_tables: Option<Vec<String>>,
    /// Never import these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude_tables: Option<Vec<String>>,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every user table of the source into an export directory
    Export {
        #[command(flatten)]
        source: SourceArgs,
        /// Export directory (default: timestamped directory under the temp dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Import an export directory into the target
    Import {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        input_dir: PathBuf,
        /// Skip table selection and confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Export, import, and validate in one run
    Migrate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        target: TargetArgs,
        /// Working directory (default: timestamped directory under the temp dir)
        #[arg(long)]
        temp_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Compare per-table row counts between source and target
    Validate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Export the local development MySQL database
    QuickExport {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Import into the managed PostgreSQL target from AZURE_POSTGRES_* variables
    QuickImport {
        #[arg(long)]
        input_dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Migrate the local development MySQL database to the managed PostgreSQL target
    QuickMigrate {
        #[arg(long)]
        temp_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
}

impl SourceArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            vendor: self.source_vendor,
            host: self.source_host.clone(),
            port: self.source_port,
            database: self.source_database.clone(),
            username: self.source_user.clone(),
            password: self.source_password.clone(),
            tls: self.source_tls.then_some(true),
        }
    }
}

impl TargetArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            vendor: self.target_vendor,
            host: self.target_host.clone(),
            port: self.target_port,
            database: self.target_database.clone(),
            username: self.target_user.clone(),
            password: self.target_password.clone(),
            tls: self.target_tls.then_some(true),
        }
    }
}

/// Layer defaults, then the URL or the profile, then explicit flags
fn resolve_connection(
    default: ConnectionParams,
    url: Option<&str>,
    profile: &ConnectionOverrides,
    flags: &ConnectionOverrides,
) -> anyhow::Result<ConnectionParams> {
    let base = match url {
        Some(url) => ConnectionParams::from_url(url)?,
        None => profile.apply(default),
    };
    Ok(flags.apply(base))
}

fn build_options(run: &RunArgs, profile: &MigrationProfile) -> MigrationOptions {
    MigrationOptions {
        batch_size: run
            .batch_size
            .or(profile.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE),
        codec: RecordCodec::new(!run.compact),
        show_progress: !run.no_progress,
        table_filter: TableFilter {
            include: run.include_tables.clone(),
            exclude: run.exclude_tables.clone().unwrap_or_default(),
        },
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let profile = match &cli.config_path {
        Some(path) => config::load_profile(path)?,
        None => MigrationProfile::default(),
    };

    let result = match cli.command {
        Commands::Export {
            source,
            output_dir,
            run,
        } => {
            let params = resolve_connection(
                ConnectionParams::mysql_default(),
                source.source_url.as_deref(),
                &profile.source,
                &source.overrides(),
            )?;
            commands::export_from_source(&params, output_dir, &build_options(&run, &profile)).await
        }
        Commands::Import {
            target,
            input_dir,
            yes,
            run,
        } => {
            let params = resolve_connection(
                ConnectionParams::postgres_default(),
                target.target_url.as_deref(),
                &profile.target,
                &target.overrides(),
            )?;
            let mut options = build_options(&run, &profile);
            if !yes {
                // Flags already narrowed the set; only prompt for a full import
                if options.table_filter.is_empty() {
                    options.table_filter = interactive::select_tables(&input_dir)?;
                }
                let confirmed = interactive::confirm_import(&params, &options.table_filter)
                    .context("Import needs confirmation; pass --yes to skip the prompt")?;
                if !confirmed {
                    tracing::info!("Import cancelled");
                    return Ok(());
                }
            }
            commands::import_to_target(&params, &input_dir, &options).await
        }
        Commands::Migrate {
            source,
            target,
            temp_dir,
            run,
        } => {
            let source = resolve_connection(
                ConnectionParams::mysql_default(),
                source.source_url.as_deref(),
                &profile.source,
                &source.overrides(),
            )?;
            let target = resolve_connection(
                ConnectionParams::postgres_default(),
                target.target_url.as_deref(),
                &profile.target,
                &target.overrides(),
            )?;
            commands::migrate_full(&source, &target, temp_dir, &build_options(&run, &profile))
                .await
        }
        Commands::Validate {
            source,
            target,
            run,
        } => {
            let source = resolve_connection(
                ConnectionParams::mysql_default(),
                source.source_url.as_deref(),
                &profile.source,
                &source.overrides(),
            )?;
            let target = resolve_connection(
                ConnectionParams::postgres_default(),
                target.target_url.as_deref(),
                &profile.target,
                &target.overrides(),
            )?;
            commands::validate_only(&source, &target, &build_options(&run, &profile)).await
        }
        Commands::QuickExport { output_dir, run } => {
            commands::quick_export(output_dir, &build_options(&run, &profile)).await
        }
        Commands::QuickImport { input_dir, run } => {
            commands::quick_import(&input_dir, &build_options(&run, &profile)).await
        }
        Commands::QuickMigrate { temp_dir, run } => {
            commands::quick_migrate(temp_dir, &build_options(&run, &profile)).await
        }
    };

    report(&result);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: &OperationResult) {
    for line in result.to_string().lines() {
        if result.success {
            tracing::info!("{}", line);
        } else {
            tracing::error!("{}", line);
        }
    }
}
