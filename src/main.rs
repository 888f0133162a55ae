use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use photoprune::cli::args::{Cli, Commands, ConfigAction, OutputFormat};
use photoprune::cli::output;
use photoprune::common::config::Config;
use photoprune::common::format;
use photoprune::duplicates::{CancelFlag, DateRange, DecisionSet, Engine, EngineSettings, LocalSource};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            ref path,
            threshold,
            max_dimension,
            workers,
            min_size,
            ref from,
            ref to,
            ref output,
            detailed,
        } => {
            let overrides = ScanOverrides {
                threshold,
                max_dimension,
                workers,
                min_size,
            };
            cmd_scan(
                &cli,
                path,
                overrides,
                from.as_deref(),
                to.as_deref(),
                output.as_deref(),
                detailed,
            )
        }

        Commands::Plan { ref file, detailed } => cmd_plan(&cli, file, detailed),

        Commands::Config { ref action } => cmd_config(action),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("photoprune=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photoprune=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ─── Scan ─────────────────────────────────────────────────────────────────────

struct ScanOverrides {
    threshold: Option<u32>,
    max_dimension: Option<u32>,
    workers: Option<usize>,
    min_size: Option<u64>,
}

impl ScanOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(t) = self.threshold {
            config.threshold = t;
        }
        if let Some(d) = self.max_dimension {
            config.max_decode_dimension = d;
        }
        if let Some(w) = self.workers {
            config.workers = w;
        }
        if let Some(s) = self.min_size {
            config.min_size = s;
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(rest.trim_start_matches('/'))
    } else {
        PathBuf::from(path)
    }
}

fn parse_date(flag: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("--{} expects YYYY-MM-DD, got '{}'", flag, v))
        })
        .transpose()
}

fn cmd_scan(
    cli: &Cli,
    path: &str,
    overrides: ScanOverrides,
    from: Option<&str>,
    to: Option<&str>,
    output_file: Option<&Path>,
    detailed: bool,
) -> Result<()> {
    let root = expand_home(path);
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }

    let mut config = Config::load()?;
    overrides.apply(&mut config);
    config.validate()?;

    let dates = DateRange {
        from: parse_date("from", from)?,
        to: parse_date("to", to)?,
    };
    if let (Some(f), Some(t)) = (dates.from, dates.to) {
        if f > t {
            anyhow::bail!("--from ({}) is after --to ({})", f, t);
        }
    }

    let show_progress = !cli.quiet && matches!(cli.format, OutputFormat::Human);

    if show_progress {
        println!();
        println!(
            "  {} Scanning {} for similar photos (threshold {})...",
            "🔍",
            format::format_path(&root).cyan(),
            config.threshold
        );
    }

    let source = LocalSource::new(&root)
        .with_min_size(config.min_size)
        .with_dates(dates);

    let settings = EngineSettings {
        show_progress,
        ..EngineSettings::from(&config)
    };
    let engine = Engine::new(settings)?;
    let report = engine.run_source(&source, &CancelFlag::new())?;

    match cli.format {
        OutputFormat::Human if !cli.quiet => output::print_scan_results(&report, detailed),
        OutputFormat::Json => output::print_scan_json(&report),
        _ => output::print_scan_quiet(&report),
    }

    if let Some(dest) = output_file {
        report
            .decisions
            .save(dest)
            .with_context(|| format!("Failed to write decisions to {}", dest.display()))?;
        if matches!(cli.format, OutputFormat::Human) && !cli.quiet {
            println!(
                "  {} Decision file written to {}",
                "✓".green(),
                format::format_path(dest)
            );
            println!();
        }
    }

    Ok(())
}

// ─── Plan ─────────────────────────────────────────────────────────────────────

fn cmd_plan(cli: &Cli, file: &Path, detailed: bool) -> Result<()> {
    let (decisions, layout) = DecisionSet::load_with_layout(file)?;

    match cli.format {
        OutputFormat::Human if !cli.quiet => output::print_plan(&decisions, layout, file, detailed),
        OutputFormat::Json => output::print_plan_json(&decisions, layout),
        _ => output::print_plan_quiet(&decisions),
    }

    Ok(())
}

// ─── Config ───────────────────────────────────────────────────────────────────

fn cmd_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = Config::config_path();
            if path.exists() {
                println!(
                    "  {} Config already exists at {}",
                    "✓".green(),
                    format::format_path(&path)
                );
            } else {
                Config::default().save()?;
                println!(
                    "  {} PhotoPrune initialized at {}",
                    "✓".green(),
                    format::format_path(&path)
                );
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("  {} Configuration reset to defaults", "✓".green());
            Ok(())
        }
    }
}
