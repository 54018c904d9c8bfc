//! tdl: diagnose Java thread dump snapshots from the command line.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tdlogic_core::analysis::Analyzer;
use tdlogic_core::config::{Config, LogFormat};
use tdlogic_core::groups::GroupKind;
use tdlogic_core::logging::{LogConfig, init_logging};
use tdlogic_core::thread::ThreadSnapshot;

#[derive(Parser)]
#[command(name = "tdl", version, about = "Rule-based Java thread dump diagnosis")]
struct Cli {
    /// Config file (defaults to $TDLOGIC_CONFIG, then the user config dir)
    #[arg(long, global = true, env = "TDLOGIC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format (pretty or json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a JSON snapshot and print the report
    Analyze {
        /// Snapshot file (JSON)
        snapshot: PathBuf,

        /// Extra advisory definition directory (repeatable)
        #[arg(long = "advisories", value_name = "DIR")]
        advisory_dirs: Vec<PathBuf>,

        /// Group definition file replacing the built-in groups
        #[arg(long = "groups", value_name = "FILE")]
        group_file: Option<PathBuf>,

        /// Single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Query the advisory catalog
    Advisories {
        #[command(subcommand)]
        command: AdvisoryCommands,
    },

    /// Query the group definitions
    Groups {
        #[command(subcommand)]
        command: GroupCommands,
    },
}

#[derive(Subcommand)]
enum AdvisoryCommands {
    /// List every advisory, worst health first
    List,
    /// Show one advisory by keyword or display name
    Show {
        key: String,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// List visible groups in partition order
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if let Some(remediation) = err
                .downcast_ref::<tdlogic_core::Error>()
                .and_then(tdlogic_core::Error::remediation)
            {
                eprint!("{}", remediation.render_plain());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    init_cli_logging(&config, cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Analyze {
            snapshot,
            advisory_dirs,
            group_file,
            compact,
        } => {
            config.definitions.advisory_dirs.extend(advisory_dirs);
            if group_file.is_some() {
                config.definitions.group_file = group_file;
            }
            let raw = fs::read_to_string(&snapshot)
                .with_context(|| format!("failed to read snapshot {}", snapshot.display()))?;
            let snapshot = ThreadSnapshot::from_json(&raw)?;
            let report = Analyzer::from_config(config)?.analyze(&snapshot).report();
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Advisories { command } => {
            let analyzer = Analyzer::from_config(config)?;
            let catalog = analyzer.catalog();
            match command {
                AdvisoryCommands::List => {
                    for advisory in catalog.all_sorted() {
                        println!(
                            "{:<8} {}  [{}]",
                            advisory.health().as_str(),
                            advisory.pattern(),
                            advisory.keyword()
                        );
                    }
                    Ok(ExitCode::SUCCESS)
                }
                AdvisoryCommands::Show { key } => {
                    let found = catalog
                        .lookup_by_keyword(&key)
                        .or_else(|| catalog.lookup_by_display_name(&key));
                    match found {
                        Some(advisory) => {
                            println!("{}", serde_json::to_string_pretty(&advisory)?);
                            Ok(ExitCode::SUCCESS)
                        }
                        None => {
                            eprintln!("No advisory matches '{key}'");
                            Ok(ExitCode::FAILURE)
                        }
                    }
                }
            }
        }
        Commands::Groups {
            command: GroupCommands::List,
        } => {
            let analyzer = Analyzer::from_config(config)?;
            for group in analyzer.groups().iter().filter(|g| g.visible) {
                println!("{:<12} {}", GroupKind::from_group_name(&group.name).as_str(), group.name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_cli_logging(
    config: &Config,
    level: Option<String>,
    format: Option<LogFormat>,
) -> anyhow::Result<()> {
    let mut log = LogConfig::from_general(&config.general);
    if let Some(level) = level {
        log.level = level;
    }
    if let Some(format) = format {
        log.format = format;
    }
    init_logging(&log)?;
    tracing::debug!(level = %log.level, "CLI started");
    Ok(())
}
