use anyhow::{Context, Result};
use clap::Parser;
use ratinglift::artifacts::{self, ArtifactWriter};
use ratinglift::causal::run_placebo;
use ratinglift::cli::{Cli, Command, EstimateArgs, PlaceboArgs, SimulateArgs};
use ratinglift::csv_output::panel_to_csv;
use ratinglift::json_output::panel_to_jsonl;
use ratinglift::panel::{load_panel, ColumnNames, Panel, PanelFormat};
use ratinglift::pipeline::{run_pipeline, RunOptions};
use ratinglift::report::to_report_string;
use ratinglift::simulate::{simulate_events, SimulationConfig};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber (stderr); `--debug` forces debug level
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(input: &ratinglift::cli::InputArgs) -> Result<Panel> {
    let panel = load_panel(&input.input, &input.load_options())
        .with_context(|| format!("Failed to load panel {}", input.input.display()))?;
    tracing::info!(
        events = panel.len(),
        users = panel.user_count(),
        "Panel loaded"
    );
    Ok(panel)
}

fn report_written(paths: &[std::path::PathBuf]) {
    for path in paths {
        eprintln!("wrote {}", path.display());
    }
}

fn estimate(args: EstimateArgs) -> Result<()> {
    // Configuration errors are fatal before any input is read
    let config = args.estimator.resolve().context("Invalid configuration")?;
    let panel = load(&args.input)?;

    let report = run_pipeline(
        &panel,
        &config,
        RunOptions {
            placebo: !args.no_placebo,
        },
    )?;

    eprint!("{}", to_report_string(&report, &config));
    let written = artifacts::write_report(
        &report,
        &config,
        &args.input.out_dir,
        args.input.format,
        args.all_strata,
    )?;
    report_written(&written);
    Ok(())
}

fn placebo(args: PlaceboArgs) -> Result<()> {
    let config = args.estimator.resolve().context("Invalid configuration")?;
    let panel = load(&args.input)?;

    let bias = run_placebo(&panel, &config);
    match bias.mean_bias {
        Some(mean) => eprintln!(
            "Placebo check: {} tasks, Average System Bias: {:.2}",
            bias.records.len(),
            mean
        ),
        None => eprintln!("Placebo check: 0 tasks, Average System Bias: N/A"),
    }

    let mut writer = ArtifactWriter::new(&args.input.out_dir, args.input.format)?;
    writer.table(artifacts::PLACEBO, &bias.records)?;
    report_written(&writer.finish());
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let config = SimulationConfig {
        seed: args.seed,
        users: args.users,
        submissions_per_user: args.submissions,
        boost_gain: args.boost_gain,
        ..SimulationConfig::default()
    };
    let format = args
        .output_format
        .or_else(|| PanelFormat::from_path(&args.output))
        .unwrap_or(PanelFormat::Csv);

    let events = simulate_events(&config);
    let columns = ColumnNames::default();
    let contents = match format {
        PanelFormat::Csv => panel_to_csv(&events, &columns),
        PanelFormat::Jsonl => {
            panel_to_jsonl(&events, &columns).context("Failed to encode simulated panel")?
        }
    };

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_panel(&args.output, &contents)?;
    eprintln!(
        "wrote {} events for {} users to {}",
        events.len(),
        config.users,
        args.output.display()
    );
    Ok(())
}

fn write_panel(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Estimate(args) => estimate(args),
        Command::Placebo(args) => placebo(args),
        Command::Simulate(args) => simulate(args),
    }
}
