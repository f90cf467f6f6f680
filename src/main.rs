// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pvcompare::{
    batch::{run_batch, BatchReport, FailurePolicy},
    calendar,
    config::Config,
    discover::find_input_files,
    join::{join_all, normalize_pvgis_dir, JoinRun, NormalizeRun},
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "pvcompare")]
#[command(about = "Compare modelled and metered monthly PV production", long_about = None)]
struct Cli {
    /// YAML configuration file (defaults to $PVCOMPARE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per PV system
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute stats.csv next to every joined table below the root
    Stats(StatsArgs),
    /// Normalize raw PVGIS monthly downloads into <root>/<system>/pvgis/<system>.csv
    Pvgis {
        /// Directory of downloads (defaults to the configured pvgis_dir)
        downloads: Option<PathBuf>,
    },
    /// Join each system's PVGIS and PVOutput files into joined_<system>.csv
    Join {
        /// Write a JSON join report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Join, then compute statistics
    Run(StatsArgs),
    /// Print the Monday-Sunday week periods of a year
    Weeks {
        year: i32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct StatsArgs {
    /// What to do when one file fails
    #[arg(long, value_enum)]
    policy: Option<FailurePolicy>,

    /// Process files in parallel
    #[arg(long)]
    parallel: bool,

    /// Write a JSON batch report here
    #[arg(long)]
    report: Option<PathBuf>,
}

impl StatsArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(policy) = self.policy {
            cfg.failure_policy = policy;
        }
        if self.parallel {
            cfg.parallel = true;
        }
        if let Some(report) = &self.report {
            cfg.report_path = Some(report.clone());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(root) = &cli.root {
        cfg.input_root = root.clone();
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command, cfg) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when some inputs failed but the command itself completed.
fn run(command: Command, mut cfg: Config) -> Result<bool> {
    match command {
        Command::Stats(args) => {
            args.apply(&mut cfg);
            stats(&cfg)
        }
        Command::Pvgis { downloads } => {
            if let Some(dir) = downloads {
                cfg.pvgis_dir = dir;
            }
            pvgis(&cfg)
        }
        Command::Join { report } => {
            if report.is_some() {
                cfg.join_report_path = report;
            }
            join(&cfg)
        }
        Command::Run(args) => {
            args.apply(&mut cfg);
            let joined_ok = join(&cfg)?;
            let stats_ok = stats(&cfg)?;
            Ok(joined_ok && stats_ok)
        }
        Command::Weeks { year, json } => {
            let weeks = calendar::week_periods(year)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&weeks)?);
                return Ok(true);
            }
            for week in weeks {
                println!(
                    "{: <10} {} {} {:>2}",
                    week.label,
                    week.start,
                    week.end,
                    week.days()
                );
            }
            Ok(true)
        }
    }
}

fn stats(cfg: &Config) -> Result<bool> {
    let files = find_input_files(&cfg.input_root, &cfg.file_prefix)?;
    if files.is_empty() {
        warn!(root = %cfg.input_root.display(), "no input files found");
        return Ok(true);
    }
    info!("{} comparison tables to process", files.len());

    let report = run_batch(&files, &cfg.batch_options())?;
    print_report(&report);

    if let Some(path) = &cfg.report_path {
        report
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "wrote batch report");
    }
    Ok(!report.has_failures())
}

fn pvgis(cfg: &Config) -> Result<bool> {
    let run = normalize_pvgis_dir(&cfg.pvgis_dir, &cfg.input_root, cfg.failure_policy)?;
    print_normalized(&run);
    Ok(run.failed.is_empty())
}

fn join(cfg: &Config) -> Result<bool> {
    let run = join_all(&cfg.input_root, cfg.failure_policy)?;
    print_join(&run);

    if let Some(path) = &cfg.join_report_path {
        run.write_json(path)?;
        info!(path = %path.display(), "wrote join report");
    }
    Ok(run.failed.is_empty())
}

fn print_report(report: &BatchReport) {
    println!(
        "\n{: <60} {:>10} {:>12} {:>12}",
        "File", "Status", "MAE", "RMSE"
    );
    println!("{:-<97}", "");
    for outcome in &report.outcomes {
        let (mae, rmse) = outcome
            .summary
            .map(|s| (format!("{:.3}", s.mae), format!("{:.3}", s.rmse)))
            .unwrap_or_default();
        println!(
            "{: <60} {:>10} {:>12} {:>12}",
            outcome.input.display(),
            format!("{:?}", outcome.status),
            mae,
            rmse
        );
        if let Some(err) = &outcome.error {
            println!("    {}", err);
        }
    }
    println!(
        "\n{} written, {} failed",
        report.succeeded(),
        report.failed()
    );
}

fn print_normalized(run: &NormalizeRun) {
    for done in &run.normalized {
        println!(
            "{: <30} {:>2} months -> {}",
            done.system,
            done.months,
            done.csv.display()
        );
    }
    for (path, err) in &run.failed {
        println!("{: <30} FAILED: {}", path.display(), err);
    }
}

fn print_join(run: &JoinRun) {
    for system in &run.joined {
        println!(
            "{: <30} mean error {:.3} (pvgis mean {:.3} kWh, pvoutput mean {:.3} kWh)",
            system.name, system.mean_error, system.mean_predicted, system.mean_actual
        );
    }
    for (name, err) in &run.failed {
        println!("{: <30} FAILED: {}", name, err);
    }
    match run.overview() {
        Some(overview) => {
            println!("{:?}", overview.sorted);
            println!("Mean error {} {}", overview.mean, overview.sorted.len());
            println!("Median error {}", overview.median);
        }
        None => println!("no systems joined"),
    }
}
