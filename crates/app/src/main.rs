use std::{
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use hues_core::{
    AppConfig, AudioOutput, AutoMode, Engine, EngineEvent, EventKind, FileFetcher, HuesError,
    SymphoniaDecoder,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> hues_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            respack,
            song,
            auto_mode,
            seconds,
        } => run_play(config, respack, song, auto_mode, seconds).await,
        Commands::Inspect { respack } => run_inspect(config, &respack).await,
        Commands::List { search } => run_list(&config, search.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> hues_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

async fn run_play(
    mut config: AppConfig,
    respack: Option<String>,
    song: Option<usize>,
    auto_mode: Option<String>,
    seconds: Option<f64>,
) -> hues_core::Result<()> {
    if let Some(respack) = respack {
        config.respacks.default_pack = respack;
    }
    if let Some(mode) = auto_mode {
        config.playback.auto_mode = mode.parse::<AutoMode>()?;
    }
    if let Some(song) = song {
        config.playback.default_song = song;
        config.playback.autoplay = true;
    }

    #[cfg(feature = "audio")]
    let output = hues_core::RodioOutput::open()?;
    #[cfg(not(feature = "audio"))]
    let output = hues_core::SilentOutput::realtime();

    play(Engine::new(FileFetcher, output, Box::new(SymphoniaDecoder), config), seconds).await
}

async fn play<O: AudioOutput>(
    mut engine: Engine<FileFetcher, O>,
    seconds: Option<f64>,
) -> hues_core::Result<()> {
    attach_logging(&mut engine);
    engine.load_default_respack().await?;

    if !engine.config().playback.autoplay {
        tracing::info!("autoplay disabled; nothing to play");
        return Ok(());
    }
    engine.play_song()?;
    tracing::info!(
        upcoming = %engine.beat_string(32),
        "playing {} in {} mode",
        engine.current_song().map(|info| info.song.title.clone()).unwrap_or_default(),
        engine.auto_mode(),
    );

    let tick_rate = engine.config().audio.tick_rate.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(tick_rate)));
    let deadline = seconds.map(play_duration).transpose()?.map(|d| Instant::now() + d);
    loop {
        ticker.tick().await;
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            engine.stop_song();
        }
        if !engine.tick() {
            break;
        }
    }
    tracing::info!("playback finished");
    Ok(())
}

/// Negative limits stop at once; infinite or NaN ones are rejected.
fn play_duration(seconds: f64) -> hues_core::Result<Duration> {
    let seconds_or_zero = if seconds < 0.0 { 0.0 } else { seconds };
    Duration::try_from_secs_f64(seconds_or_zero)
        .map_err(|e| HuesError::msg(format!("invalid play time {seconds}: {e}")))
}

fn attach_logging<O: AudioOutput>(engine: &mut Engine<FileFetcher, O>) {
    let log = Rc::new(|event: &EngineEvent| match event {
        EngineEvent::Progress { completed, added } => {
            tracing::debug!(completed, added, "load progress")
        }
        EngineEvent::AutoModeChange(mode) => tracing::info!(%mode, "auto mode"),
        EngineEvent::SongChange(info) => {
            tracing::info!(index = info.index, title = %info.song.title, "song")
        }
        EngineEvent::HueChange(info) => {
            tracing::debug!(index = info.index, hue = %info.hue.name, hex = %info.hue.hex, "hue")
        }
        EngineEvent::ImageChange(info) => {
            tracing::debug!(index = info.index, image = %info.image.name, "image")
        }
        EngineEvent::Beat(info) => {
            tracing::trace!(beat = ?info.beat, character = ?info.character, effect = ?info.effect, "beat")
        }
        EngineEvent::ProgressStart | EngineEvent::ProgressEnd => {
            tracing::debug!(event = %event.kind(), "loading")
        }
    });
    for kind in EventKind::ALL {
        engine.subscribe(kind, log.clone());
    }
}

async fn run_inspect(config: AppConfig, respack: &str) -> hues_core::Result<()> {
    let mut engine = Engine::new(
        FileFetcher,
        hues_core::SilentOutput::realtime(),
        Box::new(SymphoniaDecoder),
        config,
    );
    let name = engine.load_respack_named(respack).await?;
    let pack = engine
        .registry()
        .get(&name)
        .ok_or_else(|| HuesError::UnknownRespack(name.clone()))?;

    println!("{} <{}>", pack.name, pack.url);
    for (key, value) in pack.metadata.iter().filter(|(key, _)| key.as_str() != "name") {
        println!("  {key}: {value}");
    }
    match &pack.hues {
        Some(hues) => {
            println!("hues ({}):", hues.len());
            for hue in hues {
                println!("  {:<24} {}", hue.name, hue.hex);
            }
        }
        None => println!("hues: none"),
    }
    match &pack.songs {
        Some(songs) => {
            println!("songs ({}):", songs.len());
            for song in songs {
                let buildup = if song.buildup_buffer.is_some() {
                    format!(", buildup {:.2}s", song.buildup_duration())
                } else {
                    String::new()
                };
                println!(
                    "  {:<32} {} beats, {:.2}s loop{buildup}",
                    song.title,
                    song.loop_beats(),
                    song.loop_buffer.duration(),
                );
            }
        }
        None => println!("songs: none"),
    }
    match &pack.images {
        Some(images) => {
            println!("images ({}):", images.len());
            for image in images {
                let frames = image.frames().len();
                if image.is_animated() {
                    println!("  {:<32} {frames} frames", image.name);
                } else {
                    println!("  {}", image.name);
                }
            }
        }
        None => println!("images: none"),
    }
    Ok(())
}

fn run_list(config: &AppConfig, search: Option<&str>) -> hues_core::Result<()> {
    let needle = search.map(str::to_lowercase);
    let mut names = Vec::new();
    let directory = config.respacks.local_directory()?;
    tracing::debug!(?directory, "listing respacks");
    for entry in std::fs::read_dir(&directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == config.respacks.builtin {
            continue;
        }
        if needle.as_deref().is_some_and(|needle| !name.to_lowercase().contains(needle)) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised hue and image show", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the default respack and play its songs.
    Play {
        /// Respack to use instead of the configured default.
        #[arg(short, long)]
        respack: Option<String>,
        /// Index of the song to start with.
        #[arg(short, long)]
        song: Option<usize>,
        /// One of `normal`, `auto` or `full-auto`.
        #[arg(short, long)]
        auto_mode: Option<String>,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Load one respack and print what it contains.
    Inspect {
        /// Respack directory name, or an absolute URL.
        respack: String,
    },
    /// List the available respacks.
    List {
        /// Only show respacks whose name contains this text.
        #[arg(short, long)]
        search: Option<String>,
    },
}
