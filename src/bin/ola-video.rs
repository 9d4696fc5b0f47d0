use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ola-video",
    version,
    about = "Converts an OLA showfile to a video"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a whole showfile to a video.
    Render(RenderArgs),
    /// Write one emitted snapshot as a grayscale PNG.
    Frame(FrameArgs),
    /// Turn a converted video (raw Matroska or gray YUV4MPEG2) back into a showfile.
    Dump(DumpArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Number of universes.
    #[arg(short, long, allow_negative_numbers = true)]
    universes: i64,

    /// Duration of last frame (ms).
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    last_duration: i64,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    show: ShowArgs,

    /// Path of output MKV file.
    #[arg(short, long, required_unless_present = "output_pos")]
    output: Option<PathBuf>,

    /// Path of input showfile.
    #[arg(short, long, required_unless_present = "input_pos")]
    input: Option<PathBuf>,

    /// Output MKV file, as a positional alternative to `--output`.
    #[arg(value_name = "OUTPUT", conflicts_with = "output")]
    output_pos: Option<PathBuf>,

    /// Input showfile, as a positional alternative to `--input`.
    #[arg(value_name = "INPUT", conflicts_with = "input")]
    input_pos: Option<PathBuf>,

    /// Record interval between progress reports (0 = off).
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    progress: i64,

    /// Output codec.
    #[arg(long, value_enum, default_value_t = CodecChoice::Ffv1)]
    codec: CodecChoice,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    overwrite: bool,

    /// Write conversion statistics as JSON.
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    show: ShowArgs,

    /// Path of input showfile.
    #[arg(short, long)]
    input: PathBuf,

    /// Emitted frame index (0-based).
    #[arg(long)]
    index: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Input video (`-` or absent for stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output showfile (stdout when absent).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Duration of a last frame whose length the video does not record (ms).
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    last_duration: i64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecChoice {
    /// Lossless FFV1 via the system `ffmpeg`.
    Ffv1,
    /// Uncompressed gray frames, written without external tools.
    Raw,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Dump(args) => cmd_dump(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = ola_video::ConvertOpts::from_raw(
        args.show.universes,
        args.show.last_duration,
        args.progress,
    )?;
    let output = args
        .output
        .or(args.output_pos)
        .context("an output path is required (-o or OUTPUT)")?;
    let input = args
        .input
        .or(args.input_pos)
        .context("an input showfile is required (-i or INPUT)")?;

    let stats = match args.codec {
        CodecChoice::Ffv1 => {
            let backend = ola_video::FfmpegBackend::new(ola_video::FfmpegOpts {
                out_path: output.clone(),
                overwrite: args.overwrite,
            });
            ola_video::convert_file(&input, backend, &opts)
        }
        CodecChoice::Raw => {
            let backend = ola_video::MatroskaBackend::new(ola_video::MatroskaOpts {
                out_path: output.clone(),
                overwrite: args.overwrite,
            });
            ola_video::convert_file(&input, backend, &opts)
        }
    }
    .with_context(|| format!("convert '{}'", input.display()))?;

    if let Some(path) = args.stats_json.as_deref() {
        write_stats(path, &stats)?;
    }

    eprintln!("wrote {}", output.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let opts =
        ola_video::ConvertOpts::from_raw(args.show.universes, args.show.last_duration, 0)?;
    let snap = ola_video::snapshot_file(&args.input, &opts, args.index)
        .with_context(|| format!("read '{}'", args.input.display()))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &snap.pixels,
        snap.width,
        snap.height,
        image::ColorType::L8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} (pts {} ms, {} ms)",
        args.out.display(),
        snap.pts_ms,
        snap.duration_ms
    );
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let opts = ola_video::DumpOpts::from_raw(args.last_duration)?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create '{}'", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let stats = match args.input.as_deref().filter(|p| *p != Path::new("-")) {
        Some(path) => ola_video::dump_file(path, out, &opts)
            .with_context(|| format!("dump '{}'", path.display()))?,
        None => ola_video::dump(std::io::stdin().lock(), out, &opts).context("dump stdin")?,
    };

    if let Some(path) = &args.output {
        eprintln!("wrote {} ({} frames)", path.display(), stats.frames);
    }
    Ok(())
}

fn write_stats(path: &Path, stats: &ola_video::ConvertStats) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(stats).context("serialize stats")?;
    std::fs::write(path, json).with_context(|| format!("write stats '{}'", path.display()))
}
