use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use media_mixer::{
    BatchEvent, BatchOrchestrator, BatchResult, Canvas, ColorMode, DurationProbe as _,
    FfmpegGateway, FfmpegProbe, MediaAsset, MediaKind, MixerConfig, PairOutcome,
    ProcessingPlanner, RunOptions, WaveformRenderer, WaveformSpec, decode_audio_f32,
    ensure_parent_dir, image_frame_size, is_ffmpeg_available, resolve_pairs, scan_directory,
    unpaired_stems,
};

#[derive(Parser, Debug)]
#[command(name = "media-mixer", version)]
struct Cli {
    /// JSON configuration file; every field is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Encoder executable (overrides the config file).
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Keep decoded scratch audio next to the outputs.
    #[arg(long, global = true)]
    preserve_temp: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pair every audio file in a directory with its visual and encode the pairs.
    Run(RunArgs),
    /// Encode one audio file with one video or image.
    Pair(PairArgs),
    /// List the pairs a run would encode, without encoding.
    Scan(ScanArgs),
    /// Render one waveform overlay frame as a PNG.
    Preview(PreviewArgs),
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct OverlayArgs {
    /// Draw the spectrum bar overlay.
    #[arg(long)]
    waveform: bool,

    /// Bar coloring (defaults to the configured mode).
    #[arg(long, value_enum)]
    color_mode: Option<ColorModeChoice>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Directory holding the audio files and visuals.
    #[arg(long)]
    input_dir: PathBuf,

    #[command(flatten)]
    overlay: OverlayArgs,
}

#[derive(Parser, Debug)]
struct PairArgs {
    /// Audio file.
    #[arg(long)]
    audio: PathBuf,

    /// Video or image file.
    #[arg(long)]
    visual: PathBuf,

    /// Directory for the output MP4.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    overlay: OverlayArgs,
}

#[derive(Parser, Debug)]
struct ScanArgs {
    /// Directory holding the audio files and visuals.
    #[arg(long)]
    input_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Audio file to analyze.
    #[arg(long)]
    audio: PathBuf,

    /// Timestamp in seconds.
    #[arg(long)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Video or image whose width and height size the strip (defaults to the output canvas).
    #[arg(long)]
    visual: Option<PathBuf>,

    /// Bar coloring (defaults to the configured mode).
    #[arg(long, value_enum)]
    color_mode: Option<ColorModeChoice>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorModeChoice {
    Classic,
    Gradient,
}

impl From<ColorModeChoice> for ColorMode {
    fn from(choice: ColorModeChoice) -> Self {
        match choice {
            ColorModeChoice::Classic => ColorMode::Classic,
            ColorModeChoice::Gradient => ColorMode::Gradient,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_mixer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    match cli.cmd {
        Command::Run(args) => cmd_run(&cfg, args),
        Command::Pair(args) => cmd_pair(&cfg, args),
        Command::Scan(args) => cmd_scan(&cfg, args),
        Command::Preview(args) => cmd_preview(&cfg, args),
        Command::Config => cmd_config(&cfg),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MixerConfig> {
    let mut cfg = match &cli.config {
        Some(path) => MixerConfig::from_path(path)?,
        None => MixerConfig::default(),
    };
    if let Some(ffmpeg) = &cli.ffmpeg {
        cfg.encoder.ffmpeg_path = ffmpeg.clone();
    }
    if cli.preserve_temp {
        cfg.preserve_temp = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn require_ffmpeg(cfg: &MixerConfig) -> anyhow::Result<()> {
    if !is_ffmpeg_available(&cfg.encoder.ffmpeg_path) {
        anyhow::bail!(
            "'{}' could not be run; install ffmpeg or pass --ffmpeg",
            cfg.encoder.ffmpeg_path.display()
        );
    }
    Ok(())
}

fn run_options(cfg: &MixerConfig, overlay: &OverlayArgs) -> RunOptions {
    let mode = overlay
        .color_mode
        .map(ColorMode::from)
        .unwrap_or(cfg.waveform.color_mode);
    RunOptions {
        waveform: overlay.waveform.then_some(mode),
        cancel: None,
    }
}

fn print_event(event: BatchEvent) {
    match event {
        BatchEvent::Status(line) => println!("{line}"),
        BatchEvent::Progress(p) => tracing::debug!(progress = p),
        BatchEvent::Phase(phase) => tracing::debug!(?phase),
        BatchEvent::Finished { success } => tracing::debug!(success, "finished"),
    }
}

fn finish(result: &BatchResult) -> anyhow::Result<()> {
    for (pair, outcome) in &result.outcomes {
        if let PairOutcome::Failure { reason } = outcome {
            eprintln!(
                "failed: {} + {}: {reason}",
                pair.audio.file_name(),
                pair.visual.file_name()
            );
        }
    }
    if result.cancelled {
        anyhow::bail!(
            "run cancelled after {} of {} pairs",
            result.outcomes.len(),
            result.total
        );
    }
    if result.failed() > 0 {
        anyhow::bail!("{} of {} pairs failed", result.failed(), result.total);
    }
    Ok(())
}

fn cmd_run(cfg: &MixerConfig, args: RunArgs) -> anyhow::Result<()> {
    require_ffmpeg(cfg)?;
    let probe = FfmpegProbe::new(&cfg.encoder.ffmpeg_path);
    let mut gateway = FfmpegGateway::from_config(cfg);
    let opts = run_options(cfg, &args.overlay);

    let result = BatchOrchestrator::new(cfg, &probe, &mut gateway).run(
        &args.input_dir,
        &opts,
        &mut print_event,
    )?;
    println!(
        "{}/{} pairs encoded into '{}'",
        result.succeeded,
        result.total,
        cfg.results_dir(&args.input_dir).display()
    );
    finish(&result)
}

fn cmd_pair(cfg: &MixerConfig, args: PairArgs) -> anyhow::Result<()> {
    require_ffmpeg(cfg)?;
    let probe = FfmpegProbe::new(&cfg.encoder.ffmpeg_path);
    let mut gateway = FfmpegGateway::from_config(cfg);
    let opts = run_options(cfg, &args.overlay);

    let result = BatchOrchestrator::new(cfg, &probe, &mut gateway).run_single(
        &args.audio,
        &args.visual,
        &args.out_dir,
        &opts,
        &mut print_event,
    )?;
    finish(&result)
}

fn cmd_scan(cfg: &MixerConfig, args: ScanArgs) -> anyhow::Result<()> {
    require_ffmpeg(cfg)?;
    let probe = FfmpegProbe::new(&cfg.encoder.ffmpeg_path);
    let scan = scan_directory(&args.input_dir, &cfg.formats, cfg.audio_collision, &probe)?;
    let pairs = resolve_pairs(&scan, &cfg.formats);
    let planner = ProcessingPlanner::new(cfg, &probe);
    let out_dir = cfg.results_dir(&args.input_dir);

    for pair in &pairs {
        let branch = match planner.plan(pair, None, &out_dir) {
            Ok(plan) => plan.branch.label(),
            Err(e) => format!("error: {e}"),
        };
        println!(
            "{} + {} -> {} [{branch}]",
            pair.audio.file_name(),
            pair.visual.file_name(),
            pair.output_name(&cfg.output_prefix)
        );
    }
    for collision in &scan.collisions {
        println!("ambiguous: {}", collision.to_error());
    }
    for dropped in &scan.dropped {
        println!("dropped: {}: {}", dropped.path.display(), dropped.reason);
    }
    for stem in unpaired_stems(&scan) {
        println!("no visual: {stem}");
    }
    println!("{} pair(s)", pairs.len());
    Ok(())
}

fn cmd_preview(cfg: &MixerConfig, args: PreviewArgs) -> anyhow::Result<()> {
    require_ffmpeg(cfg)?;
    let mode = args
        .color_mode
        .map(ColorMode::from)
        .unwrap_or(cfg.waveform.color_mode);
    let frame = match &args.visual {
        Some(visual) => visual_frame_size(cfg, visual)?,
        None => cfg.encoder.canvas,
    };
    let spec = WaveformSpec::from_config(cfg, mode, frame)?;
    let pcm = decode_audio_f32(
        &cfg.encoder.ffmpeg_path,
        &args.audio,
        spec.analysis.sample_rate,
        spec.channels,
    )?;
    let renderer = WaveformRenderer::from_pcm(spec, &pcm.downmix_mono(), pcm.duration_secs())?;
    let frame = renderer.render_at(args.at);
    ensure_parent_dir(&args.out)?;
    frame.save_png(&args.out)?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn visual_frame_size(cfg: &MixerConfig, visual: &std::path::Path) -> anyhow::Result<Canvas> {
    let asset = MediaAsset::from_path(visual, &cfg.formats)
        .with_context(|| format!("'{}' is not a supported video or image", visual.display()))?;
    let frame = match asset.kind {
        MediaKind::Image => image_frame_size(visual)?,
        MediaKind::Video => FfmpegProbe::new(&cfg.encoder.ffmpeg_path).probe_frame_size(visual)?,
        MediaKind::Audio => anyhow::bail!("'{}' is an audio file", visual.display()),
    };
    Ok(frame)
}

fn cmd_config(cfg: &MixerConfig) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(cfg).context("serialize config")?;
    println!("{json}");
    Ok(())
}
