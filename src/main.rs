use anyhow::Context;
use clap::Parser;
use cube_sync::domain::keymap::KeyBindings;
use cube_sync::domain::models::{format_sequence, CubeEvent, Move, MoveSource};
use cube_sync::domain::scramble::{GuideStep, ScrambleGenerator};
use cube_sync::domain::settings::SettingsService;
use cube_sync::infrastructure::bluetooth::{
    CubeSession, CubeView, SessionCommand, SessionHandle, TransportEvent,
};
use cube_sync::infrastructure::logging::init_logger;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cube_sync", about = "Track a GiiKER smart cube from its BLE frames")]
struct Args {
    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Seed for reproducible scrambles.
    #[arg(long)]
    seed: Option<u64>,
    /// Command file replayed before reading stdin, e.g. a captured frame trace.
    #[arg(long)]
    trace: Option<PathBuf>,
}

/// One line of driver input.
#[derive(Debug, PartialEq)]
enum Input {
    Commands(Vec<SessionCommand>),
    /// Rebind a key and save the settings.
    Bind(char, Move),
    Show,
    Quit,
    Empty,
}

fn parse_line(line: &str, keys: &KeyBindings, scramble_length: usize) -> anyhow::Result<Input> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(Input::Empty);
    };
    if word.starts_with('#') {
        return Ok(Input::Empty);
    }

    let command = match word {
        "quit" | "exit" => return Ok(Input::Quit),
        "show" => return Ok(Input::Show),
        "connect" => SessionCommand::Transport(TransportEvent::Connected),
        "disconnect" => SessionCommand::Transport(TransportEvent::Disconnected),
        "reset" => SessionCommand::Reset,
        "scramble" => {
            let length = match words.next() {
                Some(n) => n.parse().context("scramble length must be a number")?,
                None => scramble_length,
            };
            SessionCommand::Scramble(length)
        }
        "bind" => {
            let (Some(key), Some(mv), None) = (words.next(), words.next(), words.next()) else {
                anyhow::bail!("usage: bind <key> <move>");
            };
            let mut chars = key.chars();
            let (Some(key), None) = (chars.next(), chars.next()) else {
                anyhow::bail!("key must be a single character, got '{}'", key);
            };
            return Ok(Input::Bind(key, mv.parse()?));
        }
        "frame" => {
            let text: String = words.collect();
            let raw = hex::decode(&text).with_context(|| format!("bad hex frame '{}'", text))?;
            SessionCommand::Transport(TransportEvent::Packet(raw))
        }
        _ => {
            let moves = keys.resolve_input(line)?;
            return Ok(Input::Commands(
                moves.into_iter().map(SessionCommand::VirtualMove).collect(),
            ));
        }
    };
    Ok(Input::Commands(vec![command]))
}

fn describe(event: &CubeEvent) -> String {
    match event {
        CubeEvent::MoveApplied {
            mv,
            source: MoveSource::Device,
            sequence,
        } => match sequence {
            Some(seq) => format!("{} (device #{})", mv, seq),
            None => format!("{} (device)", mv),
        },
        CubeEvent::MoveApplied { mv, .. } => mv.to_string(),
        CubeEvent::Solved => "Solved!".to_string(),
        CubeEvent::StatusChanged(status) => format!("status: {:?}", status),
        CubeEvent::SnapshotRequested => "requesting state snapshot from cube".to_string(),
        CubeEvent::Battery(battery) => format!(
            "battery {}%{}",
            battery.level,
            if battery.charging { " (charging)" } else { "" }
        ),
        CubeEvent::Scrambled(sequence) => format!("scramble: {}", format_sequence(sequence)),
        CubeEvent::ScrambleProgress {
            completed,
            total,
            next,
        } => {
            let next = match next {
                GuideStep::Expect(mv) => format!("next {}", mv),
                GuideStep::Undo(mv) => format!("undo with {}", mv),
                GuideStep::Complete => "done".to_string(),
            };
            format!("scramble {}/{}: {}", completed, total, next)
        }
    }
}

fn print_view(view: &CubeView) {
    println!("{}", view.facelets);
    let battery = view
        .battery
        .map(|b| format!(", battery {}%", b.level))
        .unwrap_or_default();
    println!(
        "[{:?}{}{}]",
        view.status,
        if view.solved { ", solved" } else { "" },
        battery
    );
}

struct Driver {
    session: SessionHandle,
    events: mpsc::UnboundedReceiver<CubeEvent>,
    settings: SettingsService,
}

impl Driver {
    /// Returns false once the user asked to quit.
    async fn execute(&mut self, line: &str) -> anyhow::Result<bool> {
        let settings = self.settings.get();
        let input = parse_line(line, &settings.key_bindings, settings.scramble_length)?;
        let commands = match input {
            Input::Commands(commands) => commands,
            Input::Bind(key, mv) => {
                self.settings.get_mut().key_bindings.bind(key, mv)?;
                self.settings.save()?;
                println!(
                    "'{}' now turns {} (saved to {})",
                    key,
                    mv,
                    self.settings.path().display()
                );
                return Ok(true);
            }
            Input::Show => {
                print_view(&self.session.view.borrow());
                return Ok(true);
            }
            Input::Quit => return Ok(false),
            Input::Empty => return Ok(true),
        };

        for command in commands {
            self.session
                .commands
                .send(command)
                .map_err(|_| anyhow::anyhow!("Cube session stopped"))?;
            // Every handled command publishes a new view
            self.session
                .view
                .changed()
                .await
                .context("Cube session stopped")?;
            while let Ok(event) = self.events.try_recv() {
                println!("{}", describe(&event));
            }
        }
        Ok(true)
    }

    async fn run_trace(&mut self, path: &Path) -> anyhow::Result<bool> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read trace {}", path.display()))?;
        info!("Replaying trace {}", path.display());
        for (number, line) in contents.lines().enumerate() {
            match self.execute(line).await {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => warn!("{}:{}: {:#}", path.display(), number + 1, e),
            }
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings_service = match &args.settings {
        Some(path) => SettingsService::load(path),
        None => SettingsService::new()?,
    };
    let _logging_guard = init_logger(&settings_service.get().log_settings)?;
    info!("Starting cube_sync");

    let scrambler = match args.seed {
        Some(seed) => ScrambleGenerator::with_seed(seed),
        None => ScrambleGenerator::new(),
    };
    let (event_tx, events) = mpsc::unbounded_channel();
    let mut driver = Driver {
        session: CubeSession::spawn(scrambler, event_tx),
        events,
        settings: settings_service,
    };

    let mut running = true;
    if let Some(path) = &args.trace {
        running = driver.run_trace(path).await?;
    }

    if running {
        print_view(&driver.session.view.borrow());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match driver.execute(&line).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("error: {:#}", e),
            }
        }
    }

    print_view(&driver.session.view.borrow());
    let Driver { session, .. } = driver;
    drop(session.commands);
    session.task.await?;
    info!("Shutting down");
    Ok(())
}
