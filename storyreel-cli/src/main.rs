use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "speakers")]
mod speakers;

use storyreel::{
    CapturePacing, Compositor, DirProjectStore, ExportResolution, FrameRGBA, GeminiBackend,
    NullPreview, Orchestrator, OverlayConfig, PlaybackCursor, PreviewOutput, ProductionRequest,
    Project, ProjectId, ProjectStore, Retrier, Rgba8, SpeechAudio, Stage, StudioConfig,
    send_decoded_assets,
};

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    /// Studio configuration JSON (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a production through the configured backend.
    Produce(ProduceArgs),
    /// Render a single frame of a saved project as a PNG.
    Frame(FrameArgs),
    /// Play a saved project in real time through the speakers, or into a directory.
    Preview(PreviewArgs),
    /// Export a saved project as a video (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// List saved projects, newest first.
    Projects(ProjectsArgs),
}

#[derive(Parser, Debug)]
struct ProduceArgs {
    /// What the dialogue is about.
    #[arg(long)]
    topic: String,

    /// Where the scene takes place.
    #[arg(long, default_value = "")]
    setting: String,

    /// Number of characters to generate.
    #[arg(long, default_value_t = 2)]
    characters: usize,

    /// Target dialogue length in minutes.
    #[arg(long, default_value_t = 1)]
    minutes: u32,

    /// Save the finished production to the project store.
    #[arg(long, default_value_t = false)]
    save: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Project id.
    #[arg(long)]
    project: String,

    /// Line index (0-based); the idle frame when omitted.
    #[arg(long)]
    line: Option<usize>,

    /// Render at an export resolution instead of the preview size.
    #[arg(long, value_enum)]
    resolution: Option<ResolutionArg>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Project id.
    #[arg(long)]
    project: String,

    /// Write `line_NNN.png`, `line_NNN.wav` and `idle.png` here instead of playing aloud.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Project id.
    #[arg(long)]
    project: String,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// Export resolution; the configured default when omitted.
    #[arg(long, value_enum)]
    resolution: Option<ResolutionArg>,

    /// Pace frames at wall-clock speed instead of rendering as fast as possible.
    #[arg(long, default_value_t = false)]
    realtime: bool,
}

#[derive(Parser, Debug)]
struct ProjectsArgs {
    /// Print the listing as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResolutionArg {
    #[value(name = "1080")]
    Hd1080,
    #[value(name = "2160")]
    Uhd2160,
}

impl From<ResolutionArg> for ExportResolution {
    fn from(r: ResolutionArg) -> Self {
        match r {
            ResolutionArg::Hd1080 => ExportResolution::Hd1080,
            ResolutionArg::Uhd2160 => ExportResolution::Uhd2160,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = StudioConfig::load_or_default(cli.config.as_deref())?;
    match cli.cmd {
        Command::Produce(args) => cmd_produce(&cfg, args).await,
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Preview(args) => cmd_preview(&cfg, args).await,
        Command::Export(args) => cmd_export(&cfg, args).await,
        Command::Projects(args) => cmd_projects(&cfg, args),
    }
}

fn open_store(cfg: &StudioConfig) -> DirProjectStore {
    DirProjectStore::new(cfg.store_root())
}

fn load_project(cfg: &StudioConfig, id: &str) -> anyhow::Result<Project> {
    let id = ProjectId::parse(id)?;
    open_store(cfg)
        .load(&id)
        .with_context(|| format!("load project {id}"))
}

/// Missing fonts only disable text, so this never fails.
fn load_font(cfg: &StudioConfig) -> Option<Arc<Vec<u8>>> {
    match std::fs::read(&cfg.render.font_path) {
        Ok(bytes) => Some(Arc::new(bytes)),
        Err(e) => {
            tracing::warn!(
                path = %cfg.render.font_path.display(),
                error = %e,
                "font unavailable, rendering without text"
            );
            None
        }
    }
}

fn configured_overlay(cfg: &StudioConfig) -> anyhow::Result<OverlayConfig> {
    let logo = match &cfg.render.logo_path {
        Some(p) => Some(Arc::new(
            std::fs::read(p).with_context(|| format!("read logo '{}'", p.display()))?,
        )),
        None => None,
    };
    Ok(OverlayConfig {
        text: cfg.render.caption.clone(),
        text_color: Rgba8::parse_hex(&cfg.render.caption_color)?,
        logo,
    })
}

async fn cmd_produce(cfg: &StudioConfig, args: ProduceArgs) -> anyhow::Result<()> {
    let backend = GeminiBackend::from_env(cfg.backend.clone())?;
    let retrier = Retrier::new(cfg.retry).with_credential_prompt(Arc::new(|e| {
        eprintln!("credential rejected ({e}); check the configured API key variable");
    }));
    let orchestrator = Orchestrator::new(Arc::new(backend), retrier)
        .with_store(Arc::new(open_store(cfg)));

    let mut request = ProductionRequest::new(args.topic, args.setting, args.characters);
    request.duration_minutes = args.minutes;
    request.aspect_ratio = cfg.render.aspect_ratio;

    let mut progress = orchestrator.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let stage = progress.borrow_and_update().clone();
            eprintln!("{}", stage.progress_text());
        }
    });

    let result = orchestrator.produce(request).await;
    reporter.abort();
    let production = result?;

    for (i, line) in production.lines.iter().enumerate() {
        let audio = if line.audio.is_some() { "" } else { " (no audio)" };
        println!("{i:>3} {}: {}{audio}", line.speaker, line.text);
    }

    if args.save {
        let overlay = configured_overlay(cfg)?;
        let id = orchestrator.save_current(&overlay)?;
        println!("saved project {id}");
    }
    Ok(())
}

fn cmd_frame(cfg: &StudioConfig, args: FrameArgs) -> anyhow::Result<()> {
    let project = load_project(cfg, &args.project)?;
    let production = &project.production;
    let cursor = match args.line {
        Some(i) => PlaybackCursor::line(i, production.lines.len())?,
        None => PlaybackCursor::IDLE,
    };
    let target = match args.resolution {
        Some(r) => ExportResolution::from(r).canvas(production.aspect_ratio),
        None => production.aspect_ratio.preview_canvas(),
    };

    let mut compositor = Compositor::new(load_font(cfg));
    send_decoded_assets(
        Some(production),
        Some(&project.overlay),
        &compositor.asset_sender(),
    );
    let frame = compositor.draw_frame(cursor, target, Some(production), &project.overlay)?;
    frame
        .save_png(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Writes every presented frame and every played line to a directory.
struct DirPreview {
    dir: PathBuf,
    current: Mutex<PlaybackCursor>,
}

impl DirPreview {
    fn file_for(&self, cursor: PlaybackCursor, ext: &str) -> PathBuf {
        match cursor.index() {
            Some(i) => self.dir.join(format!("line_{i:03}.{ext}")),
            None => self.dir.join(format!("idle.{ext}")),
        }
    }
}

impl PreviewOutput for DirPreview {
    fn present(&self, cursor: PlaybackCursor, frame: &FrameRGBA) {
        *self.current.lock() = cursor;
        let path = self.file_for(cursor, "png");
        if let Err(e) = frame.save_png(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write preview frame");
        }
        tracing::info!(%cursor, "presented");
    }

    fn play(&self, audio: &SpeechAudio) {
        let path = self.file_for(*self.current.lock(), "wav");
        if let Err(e) = std::fs::write(&path, audio.to_wav()) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write line audio");
        }
    }
}

async fn cmd_preview(cfg: &StudioConfig, args: PreviewArgs) -> anyhow::Result<()> {
    let project = load_project(cfg, &args.project)?;
    let output: Arc<dyn PreviewOutput> = match &args.out_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output dir '{}'", dir.display()))?;
            Arc::new(DirPreview {
                dir: dir.clone(),
                current: Mutex::new(PlaybackCursor::IDLE),
            })
        }
        None => speaker_output(&project)?,
    };
    let mut stage = Stage::new(
        Compositor::new(load_font(cfg)),
        output,
        project.production.aspect_ratio,
    );
    stage.set_overlay(project.overlay)?;
    stage.load_production(project.production)?;
    stage.wait_for_assets();

    stage.play()?;
    stage.join_preview().await;

    if let Some(dir) = &args.out_dir {
        eprintln!("wrote {}", dir.display());
    }
    Ok(())
}

#[cfg(feature = "speakers")]
fn speaker_output(project: &Project) -> anyhow::Result<Arc<dyn PreviewOutput>> {
    let captions = project
        .production
        .lines
        .iter()
        .map(|l| format!("{}: {}", l.speaker, l.text))
        .collect();
    let output = speakers::RodioPreview::open(captions)
        .context("no audio output; pass --out-dir to write frames and audio instead")?;
    Ok(Arc::new(output))
}

#[cfg(not(feature = "speakers"))]
fn speaker_output(_project: &Project) -> anyhow::Result<Arc<dyn PreviewOutput>> {
    anyhow::bail!("built without speaker output; pass --out-dir to write frames and audio")
}

async fn cmd_export(cfg: &StudioConfig, args: ExportArgs) -> anyhow::Result<()> {
    let project = load_project(cfg, &args.project)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let resolution = args
        .resolution
        .map_or(cfg.render.export_resolution, ExportResolution::from);
    let pacing = if args.realtime {
        CapturePacing::RealTime
    } else {
        CapturePacing::Offline
    };
    let stem = file_stem(&project.request.topic);

    let mut stage = Stage::new(
        Compositor::new(load_font(cfg)),
        Arc::new(NullPreview),
        project.production.aspect_ratio,
    );
    stage.set_overlay(project.overlay)?;
    stage.load_production(project.production)?;
    stage.wait_for_assets();

    let path = stage.start_export(&args.out_dir, &stem, resolution, pacing)?;
    eprintln!("exporting {}", path.display());
    let outcome = stage.wait_export().await?;

    eprintln!("wrote {} ({} frames)", path.display(), outcome.frames);
    Ok(())
}

fn cmd_projects(cfg: &StudioConfig, args: ProjectsArgs) -> anyhow::Result<()> {
    let store = open_store(cfg);
    let projects = store
        .list()
        .with_context(|| format!("list projects in '{}'", store.root().display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }
    for p in projects {
        println!(
            "{}  {}  {} lines ({} voiced)  {}",
            p.id,
            p.created_at.format("%Y-%m-%d %H:%M"),
            p.lines,
            p.voiced_lines,
            p.topic
        );
    }
    Ok(())
}

/// Lowercase ASCII words joined by `-`, or `storyreel` when nothing is left.
fn file_stem(topic: &str) -> String {
    let words: Vec<String> = topic
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(6)
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "storyreel".to_owned()
    } else {
        words.join("-")
    }
}
