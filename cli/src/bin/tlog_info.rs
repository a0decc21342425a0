use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use linac_tools_tlog::TrajectoryLog;
use linac_tools_tlog::stats::{axis_statistics, mlc_statistics};
use std::path::PathBuf;
use tracing::Level;

/// Print the header, sub-beams and per-axis delivery statistics of a
/// TrueBeam trajectory log.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Cli {
    /// Trajectory log file (.bin).
    input: PathBuf,
    /// Enable logging at DEBUG level.
    #[arg(long, default_value_t = false)]
    debug: bool,
    /// Enable logging at TRACE level.
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.trace {
        Level::TRACE
    } else if cli.debug {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let log = TrajectoryLog::read_file(&cli.input)
        .with_context(|| format!("Unable to read trajectory log {:?}", cli.input))?;
    let header = log.header();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Version".to_string(), header.version.clone()]);
    table.add_row(vec![
        "Sampling interval".to_string(),
        format!("{} ms", header.sampling_interval_ms),
    ]);
    table.add_row(vec![
        "Axis scale".to_string(),
        header.axis_scale.to_string(),
    ]);
    table.add_row(vec![
        "MLC model".to_string(),
        header.mlc_model.to_string(),
    ]);
    table.add_row(vec!["Axes".to_string(), header.axes.len().to_string()]);
    table.add_row(vec![
        "Snapshots".to_string(),
        header.num_snapshots.to_string(),
    ]);
    table.add_row(vec![
        "Truncated".to_string(),
        header.is_truncated.to_string(),
    ]);
    println!("{table}");

    if !log.subbeams().is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
        table.set_header(vec!["#", "Name", "Control point", "MU", "Rad time (s)"]);
        for (i, sb) in log.subbeams().iter().enumerate() {
            table.add_row(vec![
                i.to_string(),
                sb.name.clone(),
                sb.control_point.to_string(),
                format!("{:.2}", sb.monitor_units),
                format!("{:.2}", sb.radiation_time),
            ]);
        }
        println!("{table}");
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Axis", "RMS error", "Max error"]);
    for s in axis_statistics(&log)? {
        table.add_row(vec![
            s.axis.to_string(),
            format!("{:.4}", s.rms_error),
            format!("{:.4}", s.max_error),
        ]);
    }
    if let Some(s) = mlc_statistics(&log)? {
        table.add_row(vec![
            s.axis.to_string(),
            format!("{:.4}", s.rms_error),
            format!("{:.4}", s.max_error),
        ]);
    }
    println!("{table}");
    Ok(())
}
