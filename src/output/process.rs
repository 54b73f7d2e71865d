//! Audio sink backed by an external player process.
//!
//! Each clip runs in its own child process (`ffplay` by default).  The
//! player's argument template may contain two placeholders:
//!
//! | Placeholder | Replaced by                                               |
//! |-------------|-----------------------------------------------------------|
//! | `{input}`   | the clip's URL or path, or `pipe:0` for buffered audio    |
//! | `{volume}`  | the clip volume as a percentage (`80` for 0.8)            |
//!
//! Buffered audio (synthesized speech) is written to the child's stdin.
//! When the child exits the sink reports [`SinkSignal::Idle`] on success and
//! [`SinkSignal::Failed`] otherwise, with the last line the player wrote to
//! stderr.  Stderr is drained while the player runs.  Starting a clip or
//! calling `stop` kills whatever child is still running.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;

use crate::config::PlaybackConfig;
use crate::playback::{AudioClip, AudioInput, AudioSink, OutputError, PlayId, SinkReporter, SinkSignal};

/// Stands in for buffered input on the player's command line.
const STDIN_INPUT: &str = "pipe:0";

pub struct ProcessSink {
    program: String,
    args: Vec<String>,
    reporter: SinkReporter,
    /// Kill switch for the running child.
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessSink {
    pub fn new(program: impl Into<String>, args: Vec<String>, reporter: SinkReporter) -> Self {
        Self {
            program: program.into(),
            args,
            reporter,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &PlaybackConfig, reporter: SinkReporter) -> Self {
        Self::new(config.player_program.clone(), config.player_args.clone(), reporter)
    }

    fn kill_current(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(kill) = previous {
            let _ = kill.send(());
        }
    }
}

/// Expand the argument template for one clip.
pub(crate) fn build_args(template: &[String], input: &AudioInput, volume: f32) -> Vec<String> {
    let input = match input {
        AudioInput::Location(loc) => loc.as_str(),
        AudioInput::Buffer(_) => STDIN_INPUT,
    };
    let percent = ((volume.clamp(0.0, 1.0) * 100.0).round() as u32).to_string();
    template
        .iter()
        .map(|arg| arg.replace("{input}", input).replace("{volume}", &percent))
        .collect()
}

impl AudioSink for ProcessSink {
    fn play(&self, id: PlayId, clip: AudioClip, volume: f32) -> Result<(), OutputError> {
        self.kill_current();

        let args = build_args(&self.args, &clip.input, volume);
        let buffered = match clip.input {
            AudioInput::Buffer(bytes) => Some(bytes),
            AudioInput::Location(_) => None,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(if buffered.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| OutputError::Start(format!("{}: {e}", self.program)))?;
        log::debug!("output: {id} {:?} started ({})", clip.label, self.program);

        let (kill_tx, kill_rx) = oneshot::channel();
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(kill_tx);

        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            let signal = supervise(id, child, buffered, kill_rx).await;
            reporter.report(signal);
        });
        Ok(())
    }

    fn stop(&self) {
        self.kill_current();
    }
}

/// Feed the child, then wait for it to exit or be killed.
async fn supervise(
    id: PlayId,
    mut child: Child,
    buffered: Option<Vec<u8>>,
    kill_rx: oneshot::Receiver<()>,
) -> SinkSignal {
    if let (Some(bytes), Some(mut stdin)) = (buffered, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&bytes).await {
                log::debug!("output: {id} stdin closed early: {e}");
            }
            // Dropping stdin signals end of input.
        });
    }
    // A chatty player must never block on a full stderr pipe.
    let stderr = child.stderr.take().map(|stderr| tokio::spawn(last_stderr_line(stderr)));

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => SinkSignal::Idle(id),
            Ok(status) => {
                let detail = match stderr {
                    Some(task) => tokio::time::timeout(STDERR_GRACE, task)
                        .await
                        .ok()
                        .and_then(Result::ok)
                        .flatten()
                        .map(|line| format!(": {line}"))
                        .unwrap_or_default(),
                    None => String::new(),
                };
                SinkSignal::Failed(id, format!("player exited with {status}{detail}"))
            }
            Err(e) => SinkSignal::Failed(id, format!("waiting for player: {e}")),
        },
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                log::debug!("output: {id} already gone: {e}");
            }
            if let Some(task) = stderr {
                task.abort();
            }
            SinkSignal::Idle(id)
        }
    }
}

/// How long a failed player's stderr may stay open after it exits.
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Read stderr to the end, keeping only the last non-empty line.
async fn last_stderr_line(stderr: ChildStderr) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if !line.trim().is_empty() => last = Some(line.trim().to_string()),
            Ok(Some(_)) => {}
            Ok(None) => break,
            // Not UTF-8 or a read error; keep draining raw bytes.
            Err(_) => {
                let mut rest = lines.into_inner();
                let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
                break;
            }
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::playback::handle::PlaybackCommand;
    use crate::playback::{new_shared_session, PlaybackHandle, PlaybackInbox};

    fn template() -> Vec<String> {
        PlaybackConfig::default().player_args
    }

    #[test]
    fn location_and_volume_are_substituted() {
        let args = build_args(
            &template(),
            &AudioInput::Location("https://example.com/a.mp3".into()),
            0.8,
        );
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/a.mp3"));
        assert!(args.iter().any(|a| a == "80"));
    }

    #[test]
    fn buffered_input_reads_stdin() {
        let args = build_args(&template(), &AudioInput::Buffer(vec![1, 2]), 0.9);
        assert_eq!(args.last().map(String::as_str), Some(STDIN_INPUT));
        assert!(args.iter().any(|a| a == "90"));
    }

    async fn next_signal(inbox: &mut PlaybackInbox) -> SinkSignal {
        let cmd = tokio::time::timeout(Duration::from_secs(5), inbox.rx.recv())
            .await
            .expect("sink reported in time")
            .expect("channel open");
        match cmd {
            PlaybackCommand::Sink(signal) => signal,
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn sink(program: &str, args: &[&str]) -> (ProcessSink, PlaybackInbox) {
        let (handle, inbox) = PlaybackHandle::channel(new_shared_session());
        let sink = ProcessSink::new(
            program,
            args.iter().map(|s| s.to_string()).collect(),
            handle.sink_reporter(),
        );
        (sink, inbox)
    }

    fn clip() -> AudioClip {
        AudioClip::music("t", AudioInput::Location("x".into()))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_reports_idle() {
        let (sink, mut inbox) = sink("true", &[]);
        sink.play(PlayId(1), clip(), 0.8).unwrap();
        assert_eq!(next_signal(&mut inbox).await, SinkSignal::Idle(PlayId(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_player_reports_failure() {
        let (sink, mut inbox) = sink("false", &[]);
        sink.play(PlayId(2), clip(), 0.8).unwrap();
        assert!(matches!(
            next_signal(&mut inbox).await,
            SinkSignal::Failed(PlayId(2), _)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_kills_running_player() {
        let (sink, mut inbox) = sink("sleep", &["30"]);
        sink.play(PlayId(3), clip(), 0.8).unwrap();
        sink.stop();
        assert_eq!(next_signal(&mut inbox).await, SinkSignal::Idle(PlayId(3)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn buffered_audio_is_piped_to_stdin() {
        let (sink, mut inbox) = sink("cat", &[]);
        let speech = AudioClip::interjection("dj", AudioInput::Buffer(b"hello".to_vec()));
        sink.play(PlayId(4), speech, 0.9).unwrap();
        assert_eq!(next_signal(&mut inbox).await, SinkSignal::Idle(PlayId(4)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn noisy_stderr_does_not_stall_the_player() {
        let (sink, mut inbox) = sink("sh", &["-c", "head -c 200000 /dev/zero >&2; exit 0"]);
        sink.play(PlayId(6), clip(), 0.8).unwrap();
        assert_eq!(next_signal(&mut inbox).await, SinkSignal::Idle(PlayId(6)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_carries_last_stderr_line() {
        let script = "for i in $(seq 1 5000); do echo noise $i >&2; done; echo 'bad codec' >&2; echo >&2; exit 3";
        let (sink, mut inbox) = sink("sh", &["-c", script]);
        sink.play(PlayId(7), clip(), 0.8).unwrap();
        match next_signal(&mut inbox).await {
            SinkSignal::Failed(PlayId(7), reason) => assert!(reason.ends_with(": bad codec"), "{reason}"),
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let (sink, _inbox) = sink("definitely-not-an-audio-player", &[]);
        let err = sink.play(PlayId(5), clip(), 0.8).unwrap_err();
        assert!(matches!(err, OutputError::Start(_)));
    }
}
