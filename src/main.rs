//! Application entry point — SriRadio console station.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk and the environment.
//! 3. Create the [`tokio`] runtime.
//! 4. Open the playlist, bootstrapping it from the seed queries when empty.
//! 5. Spawn the playback orchestrator with a player-process sink.
//! 6. Spawn the connection manager on the local transport and join.
//! 7. Spawn the DJ break scheduler.
//! 8. Serve the JSON status page.
//! 9. Run the console front-end on stdin until `quit` or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use sri_radio::{
    config::AppConfig,
    connection::{ConnectionHandle, ConnectionManager, ConnectionSettings},
    events::{event_bus, RadioEvent},
    interjection::{
        default_lines, ApiScriptWriter, DjProvider, FallbackProvider, HttpSpeechSynthesizer,
        InterjectionProvider, InterjectionScheduler, PromptCatalog, SpeechSynthesizer,
    },
    output::{LocalTransport, ProcessSink},
    playback::{
        new_shared_session, AudioSink, PlaybackHandle, PlaybackOrchestrator, PlaybackSettings,
        QueueRefill,
    },
    queue::{new_shared_queue, refill, ContentLookup, DirectUrlLookup, QueueStore},
    resolver::{DirectResolver, TrackResolver},
    station::Station,
    web,
};

// ---------------------------------------------------------------------------
// Console commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Status,
    Playlist,
    Skip,
    Stop,
    Resume,
    Add(String),
    /// One-based position, as shown by `playlist`.
    Remove(usize),
    Search(String),
    Announce(String),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let needs_arg = |name: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {name} <text>"))
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "status" => Ok(ConsoleCommand::Status),
        "playlist" | "list" => Ok(ConsoleCommand::Playlist),
        "skip" | "next" => Ok(ConsoleCommand::Skip),
        "stop" => Ok(ConsoleCommand::Stop),
        "resume" | "play" => Ok(ConsoleCommand::Resume),
        "add" => needs_arg("add").map(ConsoleCommand::Add),
        "search" => needs_arg("search").map(ConsoleCommand::Search),
        "announce" => needs_arg("announce").map(ConsoleCommand::Announce),
        "remove" | "rm" => match rest.parse::<usize>() {
            Ok(n) if n > 0 => Ok(ConsoleCommand::Remove(n)),
            _ => Err("usage: remove <position>".into()),
        },
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "" => Err(String::new()),
        other => Err(format!("unknown command {other:?}; try `help`")),
    }
}

const HELP: &str = "\
commands:
  status              what is playing, queue and DJ state
  playlist            tracks around the current position
  skip | stop | resume
  add <url>           append a track
  remove <n>          remove the track at position n
  search <query>      look up tracks without adding them
  announce <text>     speak a custom announcement now
  quit";

/// Execute one command.  Returns `false` when the console should exit.
async fn execute(station: &Station, cmd: ConsoleCommand) -> bool {
    match cmd {
        ConsoleCommand::Status => print_status(station),
        ConsoleCommand::Playlist => {
            let window = station.playlist_window(3, 2);
            if window.is_empty() {
                println!("playlist is empty");
            }
            for entry in window {
                let marker = if entry.is_current { "▶" } else { " " };
                println!(
                    "{marker} {}. {} [{}] added {}",
                    entry.position + 1,
                    entry.track.title(),
                    entry.track.duration_label(),
                    entry.track.added_at().format("%Y-%m-%d")
                );
            }
        }
        ConsoleCommand::Skip => {
            station.skip();
            println!("skipping");
        }
        ConsoleCommand::Stop => {
            station.stop();
            println!("stopped");
        }
        ConsoleCommand::Resume => {
            station.resume();
            println!("resuming");
        }
        ConsoleCommand::Add(query) => match station.add_track(&query).await {
            Ok(track) => println!("added {track} at position {}", station.status().queue.total),
            Err(e) => println!("could not add: {e}"),
        },
        ConsoleCommand::Remove(position) => match station.remove_track(position - 1) {
            Ok(track) => println!("removed {track}"),
            Err(e) => println!("{e}"),
        },
        ConsoleCommand::Search(query) => match station.search(&query, 5).await {
            Ok(hits) if hits.is_empty() => println!("no results"),
            Ok(hits) => {
                for (i, hit) in hits.iter().enumerate() {
                    println!("{}. {} ({})", i + 1, hit.title, hit.source_ref);
                }
            }
            Err(e) => println!("search failed: {e}"),
        },
        ConsoleCommand::Announce(text) => match station.announce(&text).await {
            Ok(()) => println!("announcement on air"),
            Err(e) => println!("announcement failed: {e}"),
        },
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn print_status(station: &Station) {
    let status = station.status();
    println!("{}: {}", status.name, status.playback.state);
    match &status.playback.current_track {
        Some(track) => println!("  now playing: {track} by {}", track.artist()),
        None => println!("  now playing: nothing"),
    }
    println!(
        "  playlist:    {} tracks, position {}",
        status.queue.total, status.queue.cursor
    );
    if let Some(next) = &status.queue.next {
        println!("  up next:     {next}");
    }
    let destination = status
        .connection
        .destination
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".into());
    println!("  output:      {} ({destination})", status.connection.state);
    println!(
        "  DJ:          {} scripts written, writer {}, {} breaks aired",
        status.dj.total_scripts,
        if status.dj.writer_enabled { "on" } else { "off" },
        status.playback.interjections_played
    );
}

/// Print what happens on air.
async fn announce_events(mut events: broadcast::Receiver<RadioEvent>) {
    loop {
        match events.recv().await {
            Ok(RadioEvent::NowPlaying(track)) => println!("♪ now playing: {track}"),
            Ok(RadioEvent::InterjectionStarted { label }) => println!("🎤 on air: {label}"),
            Ok(RadioEvent::ConnectionChanged(state)) => println!("output {state}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => log::debug!("console missed {n} events"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let events = event_bus(64);
    let lookup: Arc<dyn ContentLookup> = Arc::new(DirectUrlLookup);

    // Playlist
    let playlist_path = config.queue.playlist_path();
    let store = QueueStore::open(playlist_path.clone(), config.queue.reshuffle_interval())
        .unwrap_or_else(|e| {
            log::error!("queue: cannot read {}: {e}; starting empty", playlist_path.display());
            QueueStore::new(Vec::new(), config.queue.reshuffle_interval()).persist_to(playlist_path)
        });
    let queue = new_shared_queue(store.write_behind());
    let bootstrap_pause = Duration::from_millis(config.queue.bootstrap_pause_ms);
    if queue.lock().map(|q| q.is_empty()).unwrap_or(false) {
        let len = refill(&queue, lookup.as_ref(), &config.station.seed_queries, bootstrap_pause).await;
        log::info!("queue: starting with {len} tracks");
    }

    // Playback
    let (playback, playback_inbox) = PlaybackHandle::channel(new_shared_session());
    let sink: Arc<dyn AudioSink> =
        Arc::new(ProcessSink::from_config(&config.playback, playback.sink_reporter()));
    let resolver: Arc<dyn TrackResolver> = Arc::new(DirectResolver::default());
    let orchestrator = PlaybackOrchestrator::new(
        playback.clone(),
        Arc::clone(&queue),
        resolver,
        Arc::clone(&sink),
        PlaybackSettings::from_config(&config.playback),
        events.clone(),
    )
    .with_refill(QueueRefill {
        lookup: Arc::clone(&lookup),
        seed_queries: config.station.seed_queries.clone(),
        pause: bootstrap_pause,
    });
    let playback_task = tokio::spawn(orchestrator.run(playback_inbox));

    // Connection
    let (connection, connection_inbox) = ConnectionHandle::channel();
    let manager = ConnectionManager::new(
        connection.clone(),
        Arc::new(LocalTransport),
        sink,
        ConnectionSettings::from_config(&config.connection),
        events.clone(),
    )
    .with_playback(playback.clone());
    let connection_task = tokio::spawn(manager.run(connection_inbox));
    connection.discover();

    // DJ breaks
    let station_name = config.station.name.clone();
    let speech: Arc<dyn SpeechSynthesizer> =
        Arc::new(HttpSpeechSynthesizer::from_config(&config.speech));
    let writer = Arc::new(ApiScriptWriter::from_config(&config.llm, &station_name));
    let dj = DjProvider::new(writer, Arc::clone(&speech), PromptCatalog::new(&station_name));
    let provider: Arc<dyn InterjectionProvider> =
        Arc::new(FallbackProvider::new(dj, speech, default_lines(&station_name)));

    let scheduler_task = if config.interjection.enabled {
        let scheduler = InterjectionScheduler::new(
            Arc::clone(&provider),
            playback.clone(),
            config.interjection.interval(),
        );
        Some(tokio::spawn(scheduler.run()))
    } else {
        log::info!("interjection: DJ breaks disabled");
        None
    };

    // Console + status page
    let station = Arc::new(Station::new(
        station_name,
        Arc::clone(&queue),
        lookup,
        playback.clone(),
        connection.clone(),
        provider,
        events.clone(),
    ));
    let web_task = config.web.enabled.then(|| {
        let addr = config.web.addr();
        let station = Arc::clone(&station);
        tokio::spawn(async move {
            if let Err(e) = web::serve(&addr, station).await {
                log::error!("web: status page stopped: {e:#}");
            }
        })
    });
    let events_task = tokio::spawn(announce_events(station.subscribe()));

    println!("{} is on air. Type `help` for commands.", station.name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading console input")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(cmd) => {
                        if !execute(&station, cmd).await {
                            break;
                        }
                    }
                    Err(msg) if msg.is_empty() => {}
                    Err(msg) => println!("{msg}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
        }
    }

    // Shutdown
    log::info!("{} signing off", station.name());
    for task in [scheduler_task, web_task].into_iter().flatten() {
        task.abort();
    }
    playback.shutdown();
    connection.shutdown();
    let _ = playback_task.await;
    let _ = connection_task.await;
    events_task.abort();

    let writer = queue
        .lock()
        .map(|mut q| q.close_writer())
        .unwrap_or_else(|poisoned| poisoned.into_inner().close_writer());
    if let Some(task) = writer {
        let _ = task.await;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("SriRadio starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        let mut config = AppConfig::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("status"), Ok(ConsoleCommand::Status));
        assert_eq!(parse_command("  SKIP "), Ok(ConsoleCommand::Skip));
        assert_eq!(parse_command("quit"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(
            parse_command("add https://example.com/a.mp3"),
            Ok(ConsoleCommand::Add("https://example.com/a.mp3".into()))
        );
        assert_eq!(
            parse_command("announce  Happy birthday Sam "),
            Ok(ConsoleCommand::Announce("Happy birthday Sam".into()))
        );
        assert_eq!(parse_command("remove 3"), Ok(ConsoleCommand::Remove(3)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("add").is_err());
        assert!(parse_command("remove 0").is_err());
        assert!(parse_command("remove x").is_err());
        assert!(parse_command("dance").is_err());
        assert_eq!(parse_command("   "), Err(String::new()));
    }
}
