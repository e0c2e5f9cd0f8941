//! Workforce Forecast CLI
//!
//! Command-line interface for running forecasts, backtests and scenario comparisons

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use workforce_forecast::backtest::BacktestSummary;
use workforce_forecast::history::load_records;
use workforce_forecast::{Assumptions, EngineConfig, ForecastEngine, Metric, Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "workforce-forecast", version, about = "Contact-centre demand and staffing forecasts")]
struct Cli {
    /// Engine configuration JSON (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with segment_call_rates.csv, segment_mix.csv and calendar_multipliers.csv
    #[arg(long, global = true)]
    assumptions: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forecast one scenario
    Forecast {
        /// History CSV
        history: PathBuf,

        /// Scenario JSON
        scenario: PathBuf,
    },

    /// Score the pipeline against history
    Backtest {
        history: PathBuf,

        #[arg(long, default_value_t = 3)]
        horizon: u32,
    },

    /// Run several scenarios side by side
    Compare {
        history: PathBuf,

        #[arg(required = true)]
        scenarios: Vec<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.assumptions {
        let assumptions = Assumptions::from_csv_path(dir)
            .with_context(|| format!("loading assumptions from {}", dir.display()))?;
        config = config.with_assumptions(assumptions);
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Forecast { history, scenario } => {
            let records = load_records(history).with_context(|| format!("reading {}", history.display()))?;
            let scenario = Scenario::from_json_path(scenario)
                .with_context(|| format!("reading {}", scenario.display()))?;
            let output = ForecastEngine::new(config).compute_forecast(&records, &scenario)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            println!("Forecast: {} ({} months)", scenario.name, output.forecast_results.len());
            println!(
                "{:>8} {:>10} {:>8} {:>6} {:>5} {:>7} {:>7}",
                "Month", "Members", "Calls", "Staff", "Sup", "Util", "SL"
            );
            println!("{}", "-".repeat(58));
            for p in &output.forecast_results {
                println!(
                    "{:>8} {:>10} {:>8} {:>6} {:>5} {:>6.1}% {:>6.1}%{}",
                    p.month.to_string(),
                    p.predicted_members,
                    p.predicted_calls,
                    p.required_staff,
                    p.required_supervisors,
                    p.agent_utilization * 100.0,
                    p.service_level * 100.0,
                    if p.staffing_converged { "" } else { " *" }
                );
            }

            if let Some(mc) = &output.monte_carlo {
                println!();
                println!(
                    "Monte Carlo: {}/{} trials (seed {}), {:.0}% bands",
                    mc.completed,
                    mc.requested,
                    mc.seed,
                    mc.confidence_level * 100.0
                );
                println!("{:>8} {:>10} {:>10} {:>10}", "Month", "Staff lo", "Median", "Staff hi");
                for ci in output.intervals_for(Metric::Staff) {
                    println!("{:>8} {:>10.1} {:>10.1} {:>10.1}", ci.month.to_string(), ci.lower, ci.median, ci.upper);
                }
            }

            for issue in &output.staffing_issues {
                println!("* {}", issue.message);
            }

            let d = &output.diagnostics;
            let summary = output.summary();
            println!();
            println!("Total calls:        {}", summary.total_calls);
            println!("Peak staff:         {}", summary.peak_staff);
            println!("Data quality score: {:.2}", d.data_quality_score);
            if !d.anomalous_months.is_empty() {
                let months: Vec<String> = d.anomalous_months.iter().map(|m| m.to_string()).collect();
                println!("Anomalous months:   {}", months.join(", "));
            }
            println!("Computed in {} ms", output.computation_time_ms);
        }

        Command::Backtest { history, horizon } => {
            let records = load_records(history).with_context(|| format!("reading {}", history.display()))?;
            let reports = ForecastEngine::new(config).backtest(&records, *horizon)?;
            let summary = BacktestSummary::from_reports(&reports);

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "reports": reports, "summary": summary }))?
                );
                return Ok(());
            }

            println!("Backtest: horizon {} months, {} windows", horizon, summary.windows);
            println!("{:>8} {:>8} {:>10} {:>10} {:>8}", "Period", "MAPE", "MAE", "RMSE", "R2");
            println!("{}", "-".repeat(48));
            for r in &reports {
                match (&r.metrics, &r.failure) {
                    (Some(m), _) => println!(
                        "{:>8} {:>7.2}% {:>10.1} {:>10.1} {:>8.3}",
                        r.period.to_string(),
                        m.mape,
                        m.mae,
                        m.rmse,
                        m.r_squared
                    ),
                    (None, Some(reason)) => println!("{:>8} failed: {}", r.period.to_string(), reason),
                    (None, None) => println!("{:>8} skipped (no calls)", r.period.to_string()),
                }
            }
            if let Some(mean) = &summary.mean {
                println!();
                println!("Mean MAPE {:.2}%, WMAPE {:.2}%, SMAPE {:.2}%", mean.mape, mean.wmape, mean.smape);
            }
        }

        Command::Compare { history, scenarios } => {
            let records = load_records(history).with_context(|| format!("reading {}", history.display()))?;
            let scenarios = scenarios
                .iter()
                .map(|path| Scenario::from_json_path(path).with_context(|| format!("reading {}", path.display())))
                .collect::<Result<Vec<_>>>()?;
            let comparison = ScenarioRunner::with_engine(ForecastEngine::new(config)).compare(&records, &scenarios)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
                return Ok(());
            }

            for metric in &comparison.metrics {
                println!("{} (horizon totals)", metric.metric.name());
                for series in &metric.series {
                    println!("  {:<32} {:>14.0}", series.scenario, series.total);
                }
                println!(
                    "  mean {:.0}, std dev {:.0}, range {:.0} - {:.0}",
                    metric.mean_total, metric.std_dev_total, metric.min_total, metric.max_total
                );
                println!();
            }
        }
    }

    Ok(())
}
