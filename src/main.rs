use clap::{Parser, ValueEnum};
use crossbeam_channel::{never, select, unbounded, Receiver};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use pulse_lib::audio::engine::PlaybackEngine;
use pulse_lib::audio::output::output_devices;
use pulse_lib::audio::telemetry::{EndReason, Interest, PlayerEvent};
use pulse_lib::error::Result;
use pulse_lib::metadata::display_name;
use pulse_lib::player::Player;
use pulse_lib::playlist::{Playlist, RepeatMode};
use pulse_lib::settings::PlayerSettings;
use pulse_lib::visualizer::{AmplitudeFrame, Visualizer};

const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Terminal music player with a live bar visualizer.
#[derive(Parser, Debug)]
#[command(name = "pulse", version, about)]
struct Args {
    /// Audio files or .m3u playlists, played in the given order
    paths: Vec<PathBuf>,

    /// Initial volume in percent (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Start with shuffle enabled
    #[arg(long)]
    shuffle: bool,

    /// Repeat mode
    #[arg(long, value_enum)]
    repeat: Option<RepeatArg>,

    /// Don't draw the visualizer
    #[arg(long)]
    no_visualizer: bool,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RepeatArg {
    None,
    All,
    One,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::None => RepeatMode::None,
            RepeatArg::All => RepeatMode::All,
            RepeatArg::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    TogglePause,
    Next,
    Previous,
    Seek(f64),
    Volume(u8),
    Repeat(RepeatMode),
    ToggleShuffle,
    /// 1-based, as printed in the listing.
    GoTo(usize),
    Save(PathBuf),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim()),
        None => (line, ""),
    };

    match (word, arg) {
        ("p", "") => Some(Command::TogglePause),
        ("n", "") => Some(Command::Next),
        ("b", "") => Some(Command::Previous),
        ("x", "") => Some(Command::ToggleShuffle),
        ("q", "") => Some(Command::Quit),
        ("s", secs) => secs.parse().ok().filter(|s: &f64| s.is_finite()).map(Command::Seek),
        ("v", pct) => pct.parse::<u8>().ok().filter(|p| *p <= 100).map(Command::Volume),
        ("r", mode) => RepeatArg::from_str(mode, true)
            .ok()
            .map(|m| Command::Repeat(m.into())),
        ("g", n) => n.parse().ok().filter(|n| *n > 0).map(Command::GoTo),
        ("w", file) if !file.is_empty() => Some(Command::Save(PathBuf::from(file))),
        _ => None,
    }
}

const HELP: &str = "commands: p pause/resume | n next | b previous | s <secs> seek | \
v <0-100> volume | r none|all|one | x shuffle | g <n> go to | w <file> save | q quit";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if args.list_devices {
        for device in output_devices() {
            let marker = if device.is_default { "*" } else { " " };
            println!("{} {}", marker, device.name);
        }
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pulse: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let settings_dir = PlayerSettings::default_dir();
    let mut settings = settings_dir
        .as_deref()
        .map(PlayerSettings::load)
        .unwrap_or_default();

    if let Some(volume) = args.volume {
        settings.volume_percent = volume;
    }
    if let Some(repeat) = args.repeat {
        settings.repeat = repeat.into();
    }
    if args.shuffle {
        settings.shuffle = true;
    }

    let engine = PlaybackEngine::system(settings.engine_config());
    engine.set_volume(settings.volume_percent.min(100) as f32);

    let mut playlist = Playlist::new();
    playlist.set_repeat_mode(settings.repeat);

    let mut player = Player::new(engine, playlist);
    player.add_paths(args.paths);
    player.set_shuffle(settings.shuffle);
    print_listing(&player);

    let visualizer = (!args.no_visualizer)
        .then(|| Visualizer::spawn(settings.visualizer, player.subscribe(Interest::BLOCKS)));

    let positions = player.subscribe(Interest::POSITIONS);
    let lifecycle = player.lifecycle_events().clone();
    let frames = visualizer
        .as_ref()
        .map(|v| v.frames().clone())
        .unwrap_or_else(never);
    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;

    if !player.playlist().is_empty() {
        if let Err(e) = player.play_current_or_next() {
            eprintln!("\r{}", e);
        }
    }
    eprintln!("{}", HELP);

    let mut status = StatusLine::default();
    let mut fade_sync = FadeSync::default();
    loop {
        let mut stdin_closed = false;
        select! {
            recv(commands) -> line => match line {
                Ok(line) => match parse_command(&line) {
                    Some(Command::Quit) => break,
                    Some(command) => {
                        if let Err(e) = execute(&mut player, command) {
                            eprintln!("\r{}", e);
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("\r{}", HELP),
                },
                Err(_) => stdin_closed = true,
            },
            recv(lifecycle) -> event => {
                let Ok(event) = event else { break };
                let ended = matches!(event, PlayerEvent::TrackEnded(EndReason::Finished | EndReason::Failed));
                if let Err(e) = player.handle_event(&event) {
                    eprintln!("\r{}", e);
                }
                if ended && !player.is_busy() && !stdin_open {
                    break;
                }
            },
            recv(positions) -> event => {
                if let Ok(PlayerEvent::Position(frame)) = event {
                    status.position = frame;
                    status.render(&player);
                }
            },
            recv(frames) -> frame => {
                if let Ok(frame) = frame {
                    status.frame = Some(frame);
                    status.render(&player);
                }
            },
        }
        fade_sync.apply(&player, visualizer.as_ref());
        if stdin_closed {
            stdin_open = false;
            commands = never();
            if !player.is_busy() {
                break;
            }
        }
    }

    player.stop();
    println!();

    if let Some(dir) = settings_dir {
        settings.volume_percent = player.volume_percent();
        settings.repeat = player.playlist().repeat_mode();
        settings.shuffle = player.playlist().is_shuffled();
        if let Err(e) = settings.save(&dir) {
            log::warn!("Failed to save settings: {}", e);
        }
    }
    Ok(())
}

fn execute(player: &mut Player, command: Command) -> Result<()> {
    match command {
        Command::TogglePause => {
            player.toggle_pause()?;
        }
        Command::Next => player.next()?,
        Command::Previous => player.previous()?,
        Command::Seek(secs) => player.seek_seconds(secs)?,
        Command::Volume(pct) => player.set_volume(pct),
        Command::Repeat(mode) => player.set_repeat(mode),
        Command::ToggleShuffle => {
            let enabled = !player.playlist().is_shuffled();
            player.set_shuffle(enabled);
            eprintln!("\rshuffle {}", if enabled { "on" } else { "off" });
        }
        Command::GoTo(n) => player.play_index(n - 1)?,
        Command::Save(path) => player.save_playlist(&path)?,
        Command::Quit => {}
    }
    Ok(())
}

/// Follows the engine's pause flag so the bars fade out exactly while
/// playback is paused, whichever command or track change caused it.
#[derive(Default)]
struct FadeSync {
    paused: bool,
}

impl FadeSync {
    /// Returns the new pause state when it differs from the last one seen.
    fn update(&mut self, paused: bool) -> Option<bool> {
        if paused == self.paused {
            return None;
        }
        self.paused = paused;
        Some(paused)
    }

    fn apply(&mut self, player: &Player, visualizer: Option<&Visualizer>) {
        let Some(viz) = visualizer else { return };
        match self.update(player.engine().is_paused()) {
            Some(true) => viz.pause(),
            Some(false) => viz.resume(),
            None => {}
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    let spawned = thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn stdin reader: {}", e);
    }
    rx
}

fn print_listing(player: &Player) {
    for (i, entry) in player.playlist().entries().iter().enumerate() {
        println!("{:>3}. {}", i + 1, display_name(&entry.path));
    }
}

#[derive(Default)]
struct StatusLine {
    position: u64,
    frame: Option<AmplitudeFrame>,
    /// Cached so tags are read once per track.
    title: Option<(PathBuf, String)>,
}

impl StatusLine {
    fn render(&mut self, player: &Player) {
        let engine = player.engine();
        let Some(track) = engine.track() else { return };

        let title = match &self.title {
            Some((path, title)) if path == track.path() => title.clone(),
            _ => {
                let title = display_name(track.path());
                self.title = Some((track.path().to_path_buf(), title.clone()));
                title
            }
        };

        let state = if engine.is_paused() { "||" } else { "> " };
        let elapsed = format_time(track.frames_to_secs(self.position));
        let total = track
            .duration_secs()
            .map(format_time)
            .unwrap_or_else(|| "--:--".into());
        let bars = self.frame.as_ref().map(render_bars).unwrap_or_default();

        let mut out = io::stdout().lock();
        let _ = write!(
            out,
            "\r\x1b[2K{} {}  {} / {}  vol {}%  {}",
            state,
            title,
            elapsed,
            total,
            player.volume_percent(),
            bars
        );
        let _ = out.flush();
    }
}

fn render_bars(frame: &AmplitudeFrame) -> String {
    if frame.faded {
        return String::new();
    }
    frame
        .bars
        .iter()
        .zip(&frame.alpha)
        .map(|(&height, &alpha)| {
            if alpha == 0 {
                return ' ';
            }
            let scaled = height * alpha as f32 / 255.0;
            let level = (scaled * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[level.min(BAR_GLYPHS.len() - 1)]
        })
        .collect()
}

fn format_time(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
