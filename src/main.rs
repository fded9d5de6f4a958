use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memscope::aggregation::render_type_report;
use memscope::source::{parse_trace, ReplayTransport, ResolveCallback, TraceEvent};
use memscope::util::{format_size, selection_label};
use memscope::{
    AggregationResult, Endpoint, Explorer, ExplorerConfig, ExplorerError, FrameRange,
    InMemoryTrace, PollAction, ReferenceResolver, TraceSource,
};

#[derive(Parser, Debug)]
#[command(name = "memscope", about = "Explore memory allocation traces")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Records scanned between cancellation checks.
    #[arg(long, global = true, default_value_t = 256)]
    cancel_check_interval: usize,

    /// Progress reports per aggregation.
    #[arg(long, global = true, default_value_t = 10)]
    progress_steps: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate live objects over a frame range of a trace file.
    Aggregate {
        /// Trace file.
        trace: PathBuf,
        /// First frame (default: trace start).
        #[arg(long)]
        from: Option<u64>,
        /// Last frame, inclusive (default: trace end).
        #[arg(long)]
        to: Option<u64>,
        /// Also list the allocation callstacks of this type.
        #[arg(long = "type")]
        type_id: Option<u64>,
    },
    /// Map a pixel selection on the timeline and aggregate it.
    Select {
        /// Trace file.
        trace: PathBuf,
        /// Canvas x where the drag started.
        press_x: f64,
        /// Canvas x where the drag ended.
        release_x: f64,
        /// Canvas width in pixels.
        #[arg(long, default_value_t = 1000.0)]
        width: f64,
        /// Zoom factor (pixels per frame).
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
        /// First visible frame.
        #[arg(long, default_value_t = 0)]
        scroll: i64,
        /// Snap the selection to marker frames.
        #[arg(long)]
        snap: bool,
    },
    /// Replay a trace as a live session and tail it.
    Replay {
        /// Trace file.
        trace: PathBuf,
        /// Canvas width in pixels.
        #[arg(long, default_value_t = 200.0)]
        width: f64,
        /// Frames released per poll tick.
        #[arg(long, default_value_t = 10)]
        frames_per_tick: u64,
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

/// Offline traces carry no heap graph.
struct OfflineResolver;

impl ReferenceResolver for OfflineResolver {
    fn resolve(&self, _addresses: Vec<u64>, on_result: ResolveCallback) {
        on_result(Err("reference queries need a live process".to_string()));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ExplorerConfig::default()
        .with_cancel_check_interval(cli.cancel_check_interval)
        .with_progress_steps(cli.progress_steps);

    match cli.command {
        Commands::Aggregate {
            trace,
            from,
            to,
            type_id,
        } => run_aggregate(&trace, from, to, type_id, config)?,
        Commands::Select {
            trace,
            press_x,
            release_x,
            width,
            zoom,
            scroll,
            snap,
        } => run_select(
            &trace,
            (press_x, release_x),
            width,
            zoom,
            scroll,
            config.with_snap_to_markers(snap),
        )?,
        Commands::Replay {
            trace,
            width,
            frames_per_tick,
            interval_ms,
        } => run_replay(
            &trace,
            width,
            frames_per_tick,
            config.with_poll_interval(Duration::from_millis(interval_ms)),
        )?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_events(path: &Path) -> Result<Vec<TraceEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse_trace(&text).with_context(|| format!("failed to parse trace {}", path.display()))
}

fn open_offline(path: &Path, config: ExplorerConfig) -> Result<(Explorer, Arc<InMemoryTrace>)> {
    let trace = Arc::new(InMemoryTrace::from_events(load_events(path)?));
    let (transport, _feed) = ReplayTransport::new(Vec::new(), Arc::clone(&trace));
    let mut explorer = Explorer::new(
        trace.clone(),
        Box::new(transport),
        Arc::new(OfflineResolver),
        config,
    )
    .context("invalid configuration")?;
    explorer.open_trace().context("failed to open trace")?;
    Ok((explorer, trace))
}

fn await_result(explorer: &mut Explorer) -> Result<Arc<AggregationResult>> {
    match explorer.wait_for_aggregation(Duration::from_secs(60)) {
        Some(result) => Ok(result),
        None => match explorer.last_warning() {
            Some(warning) => bail!("aggregation failed: {warning}"),
            None => bail!("aggregation did not finish"),
        },
    }
}

fn print_report(trace: &InMemoryTrace, result: &AggregationResult) {
    print!("{}", render_type_report(result, |id| trace.type_name(id)));
}

fn run_aggregate(
    path: &Path,
    from: Option<u64>,
    to: Option<u64>,
    type_id: Option<u64>,
    config: ExplorerConfig,
) -> Result<()> {
    let (mut explorer, trace) = open_offline(path, config)?;
    let bounds = explorer.boundaries();
    let range = FrameRange::new(
        from.unwrap_or(bounds.min_frame),
        to.unwrap_or(bounds.max_frame),
    );

    explorer.aggregate(range)?;
    let result = await_result(&mut explorer)?;
    print_report(&trace, &result);

    if let Some(type_id) = type_id {
        let name = trace
            .type_name(type_id)
            .unwrap_or_else(|| format!("#{type_id}"));
        println!();
        println!("callstacks of {name}:");
        for (callstack_id, group) in result.callstacks_for_type(type_id) {
            println!(
                "  #{callstack_id:<8} {:>8} {:>10}",
                group.totals.count,
                format_size(group.totals.total_size)
            );
        }
        let size = result.selected_size(&[type_id]);
        println!("{}", selection_label(size, result.total_size()));
    }
    Ok(())
}

fn run_select(
    path: &Path,
    (press_x, release_x): (f64, f64),
    width: f64,
    zoom: f64,
    scroll: i64,
    config: ExplorerConfig,
) -> Result<()> {
    let (mut explorer, trace) = open_offline(path, config)?;
    explorer.resize(width);
    explorer.zoom(zoom);
    let visible = explorer.scroll(scroll);

    let (selection, _) = explorer.select_pixels(press_x, release_x)?;
    println!("visible {visible}");
    println!(
        "selection {selection} covers frames {}",
        selection.covered_frames()
    );

    let result = await_result(&mut explorer)?;
    print_report(&trace, &result);
    Ok(())
}

fn run_replay(
    path: &Path,
    width: f64,
    frames_per_tick: u64,
    config: ExplorerConfig,
) -> Result<()> {
    let events = load_events(path)?;
    let live = Arc::new(InMemoryTrace::new());
    let (transport, feed) = ReplayTransport::new(events, Arc::clone(&live));
    let poll_interval = config.poll_interval;

    let mut explorer = Explorer::new(
        live.clone(),
        Box::new(transport),
        Arc::new(OfflineResolver),
        config,
    )
    .context("invalid configuration")?;
    explorer.resize(width);
    if let Err(err) = explorer.start_capture(&Endpoint::localhost(0)) {
        if let ExplorerError::Connection(fault) = &err {
            eprintln!("hint: {}", fault.hint());
        }
        return Err(err).context("failed to start replay session");
    }

    let ticker = crossbeam_channel::tick(poll_interval);
    let mut ticks = 0u64;
    while !feed.is_exhausted() {
        ticker.recv().context("poll ticker stopped")?;
        feed.advance(frames_per_tick);
        let outcome = explorer.tick();
        ticks += 1;

        let bounds = explorer.boundaries();
        println!(
            "tick {ticks:>4}  frames [{}, {}]  visible {}  {:?}  backlog {}",
            bounds.min_frame,
            bounds.max_frame,
            explorer.visible_range(),
            outcome.action,
            outcome.backlog
        );
        if outcome.action == PollAction::Disconnected {
            if let Some(fault) = explorer.session_fault() {
                eprintln!("hint: {}", fault.hint());
            }
            bail!("replay session disconnected");
        }
    }

    explorer.stop()?;
    let visible = explorer.visible_range();
    explorer.aggregate(visible)?;
    let result = await_result(&mut explorer)?;
    print_report(&live, &result);
    Ok(())
}
