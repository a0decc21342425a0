use anyhow::{Context, Result, bail};
use clap::Parser;
use linac_tools_dcm_plan::{PlanFluenceSource, read_rtplan, write_rt_image};
use linac_tools_fluence::io::{write_dat_file, write_tsv_file};
use linac_tools_fluence::scale::ScaleRegistry;
use linac_tools_fluence::{
    CancelToken, Fluence, FluenceOptions, RecordType, create_fluence_with_cancel,
};
use linac_tools_tlog::{LogFluenceSource, TrajectoryLog};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{Level, debug, warn};

/// Reconstruct the 2D fluence delivered by a linac from a TrueBeam
/// trajectory log or planned by a DICOM RT Plan, and write it as a PTW
/// image, a TSV matrix or a DICOM RT Image.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "
Reconstruct the 2D fluence delivered by a linac from a TrueBeam trajectory
log (.bin) or planned by a DICOM RT Plan (.dcm).

The output format is selected by the extension of the output file:
.dat (PTW image), .tsv (tab separated matrix) or .dcm (DICOM RT Image).
"
)]
struct Cli {
    /// Trajectory log (.bin) or DICOM RT Plan (.dcm).
    input: PathBuf,
    /// Output file (.dat, .tsv or .dcm).
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,
    /// Sub-beam index (logs) or beam number (plans). Logs default to the
    /// whole file, plans to their first beam.
    #[arg(short, long)]
    beam: Option<i32>,
    /// Grid columns.
    #[arg(long, default_value_t = 200)]
    cols: usize,
    /// Grid rows.
    #[arg(long, default_value_t = 200)]
    rows: usize,
    /// Grid width in cm.
    #[arg(long, default_value_t = 40.0)]
    width: f64,
    /// Grid height in cm.
    #[arg(long, default_value_t = 40.0)]
    height: f64,
    /// Record stream to integrate for logs: "expected" or "actual".
    #[arg(short, long, default_value = "actual")]
    record: String,
    /// Centre-point rasterisation instead of exact polygon clipping.
    #[arg(long, default_value_t = false)]
    approximate: bool,
    /// Skip samples whose MU delta is at or below this value.
    #[arg(long, default_value_t = 0.0)]
    min_delta_mu: f64,
    /// Integrate samples recorded during a beam hold.
    #[arg(long, default_value_t = false)]
    include_beam_holds: bool,
    /// Worker count; defaults to the host CPU count.
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Control point interpolation step for DICOM plans.
    #[arg(long, default_value_t = 0.1)]
    cp_delta: f64,
    /// Beam meterset override in MU, for plans without one.
    #[arg(long)]
    mu: Option<f64>,
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
    tracing_subscriber::fmt()
        .with_thread_ids(true)
        .with_target(true)
        .with_max_level(level)
        .init();
    debug!("Commandline arguments: {:#?}", &cli);

    let record = RecordType::from_str(&cli.record)?;
    let mut options = FluenceOptions::new(cli.cols, cli.rows, cli.width, cli.height);
    options.use_approximate_fluence = cli.approximate;
    options.min_delta_mu = cli.min_delta_mu;
    options.include_beam_holds = cli.include_beam_holds;
    options.record_type = record;
    if let Some(jobs) = cli.jobs {
        options.max_parallelism = jobs.max(1);
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("Cancellation requested, finishing up ...");
            cancel.cancel();
        })
        .context("Unable to install the Ctrl-C handler")?;
    }

    let fluence = match extension(&cli.input).as_deref() {
        Some("bin") | Some("dlg") => fluence_from_log(&cli, &options, &cancel)?,
        Some("dcm") => fluence_from_plan(&cli, &options, &cancel)?,
        _ => bail!(
            "Unrecognised input extension: {:?} (expected .bin or .dcm)",
            cli.input
        ),
    };
    if !fluence.is_complete() {
        warn!("The sweep was cancelled; the written grid is partial.");
    }

    match extension(&cli.output).as_deref() {
        Some("dat") => write_dat_file(&cli.output, &fluence)?,
        Some("tsv") => write_tsv_file(&cli.output, &fluence)?,
        Some("dcm") => write_rt_image(&cli.output, &fluence, "fluence")?,
        _ => bail!(
            "Unrecognised output extension: {:?} (expected .dat, .tsv or .dcm)",
            cli.output
        ),
    }

    let grid = fluence.grid();
    println!(
        "{} x {} grid, max {:.3} MU, integral {:.3} MU cm2{}",
        grid.cols(),
        grid.rows(),
        grid.max(),
        grid.sum() * grid.dx() * grid.dy(),
        if fluence.is_complete() {
            ""
        } else {
            " (partial)"
        }
    );
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn fluence_from_log(cli: &Cli, options: &FluenceOptions, cancel: &CancelToken) -> Result<Fluence> {
    let log = TrajectoryLog::read_file(&cli.input)
        .with_context(|| format!("Unable to read trajectory log {:?}", cli.input))?;
    let registry = ScaleRegistry::with_defaults();
    let source = match cli.beam {
        Some(index) => {
            let index = usize::try_from(index)
                .map_err(|_| anyhow::anyhow!("Sub-beam index must not be negative: {index}"))?;
            LogFluenceSource::for_subbeam(&log, &registry, options.record_type, index)?
        }
        None => LogFluenceSource::new(&log, &registry, options.record_type)?,
    };
    Ok(create_fluence_with_cancel(&source, options, cancel)?)
}

fn fluence_from_plan(cli: &Cli, options: &FluenceOptions, cancel: &CancelToken) -> Result<Fluence> {
    let plan =
        read_rtplan(&cli.input).with_context(|| format!("Unable to read plan {:?}", cli.input))?;
    let beam = match cli.beam {
        Some(number) => plan
            .beam(number)
            .with_context(|| format!("Plan has no beam number {number}"))?,
        None => plan.beams.first().context("Plan contains no beams")?,
    };
    let mu = cli
        .mu
        .or_else(|| plan.beam_meterset(beam.beam_number))
        .context("Beam carries no meterset; pass --mu")?;
    let source = PlanFluenceSource::new(beam, mu, cli.cp_delta)?;
    Ok(create_fluence_with_cancel(&source, options, cancel)?)
}
