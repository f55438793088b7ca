// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use writeoff_recon::{kpi_cards, run_pipeline, AppConfig, LoadCache, ReconciliationReport};

enum Command {
    Run,
    Export(Option<PathBuf>),
    Ui,
}

struct Args {
    command: Command,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut command = None;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "run" if command.is_none() => command = Some(Command::Run),
            "ui" if command.is_none() => command = Some(Command::Ui),
            "export" if command.is_none() => command = Some(Command::Export(None)),
            other if matches!(command, Some(Command::Export(None))) && !other.starts_with('-') => {
                command = Some(Command::Export(Some(PathBuf::from(other))));
            }
            other => bail!("unknown argument: {other}\nusage: writeoff-recon [run|ui|export [PATH]] [--config PATH]"),
        }
    }

    Ok(Args {
        command: command.unwrap_or(Command::Run),
        config,
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Fatal errors are reported once; no partial output is written.
    if let Err(err) = try_main() {
        eprintln!("❌ {:#}", err);
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = parse_args()?;
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let cache = LoadCache::new();

    match args.command {
        Command::Run => run_report(&config, &cache),
        Command::Export(path) => run_export(&config, &cache, path),
        Command::Ui => run_ui_mode(&config, &cache),
    }
}

fn run_report(config: &AppConfig, cache: &LoadCache) -> Result<()> {
    println!("📊 Write-offs vs Repayments Analysis");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading data...");
    let report = run_pipeline(config, cache)?;
    print_warnings(&report);

    println!();
    for card in kpi_cards(&report.totals) {
        println!("  {:<26} {:>20}", card.label, card.value);
    }

    println!("\n💾 Writing result...");
    report
        .augmented
        .write_csv(&config.output.path)
        .with_context(|| format!("Failed to write {}", config.output.path.display()))?;
    println!(
        "✓ {} rows written to {}",
        report.augmented.len(),
        config.output.path.display()
    );

    Ok(())
}

fn run_export(config: &AppConfig, cache: &LoadCache, path: Option<PathBuf>) -> Result<()> {
    let report = run_pipeline(config, cache)?;
    print_warnings(&report);

    let path = path.unwrap_or_else(|| config.output.path.clone());
    report
        .augmented
        .write_csv(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✓ {}", path.display());
    Ok(())
}

fn print_warnings(report: &ReconciliationReport) {
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig, cache: &LoadCache) -> Result<()> {
    println!("🖥️  Loading reconciliation dashboard...\n");

    let report = run_pipeline(config, cache)?;
    let mut app = ui::App::new(
        report,
        config.output.path.clone(),
        &config.writeoffs.key.name,
        &config.writeoffs.amount.name,
    );
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig, _cache: &LoadCache) -> Result<()> {
    bail!("TUI mode not available. Rebuild with: cargo build --features tui");
}
