//! Recurring DJ breaks.
//!
//! [`InterjectionScheduler`] sleeps for the configured interval, asks its
//! provider for a clip and hands it to the orchestrator, then starts the
//! next interval.  The next sleep only begins once the previous break has
//! been produced, so slow content generation never piles up breaks.  While
//! playback is stopped a fire is skipped entirely.

use std::sync::Arc;
use std::time::Duration;

use crate::playback::{PlaybackHandle, PlaybackState};

use super::provider::InterjectionProvider;

pub struct InterjectionScheduler {
    provider: Arc<dyn InterjectionProvider>,
    playback: PlaybackHandle,
    interval: Duration,
}

impl InterjectionScheduler {
    pub fn new(
        provider: Arc<dyn InterjectionProvider>,
        playback: PlaybackHandle,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            playback,
            interval,
        }
    }

    /// Fire every interval, forever.  Abort the task to stop it.
    pub async fn run(self) {
        log::info!("interjection: DJ breaks every {:?}", self.interval);
        loop {
            tokio::time::sleep(self.interval).await;
            self.fire().await;
        }
    }

    /// One break.  Returns `true` when a clip was handed to playback.
    pub async fn fire(&self) -> bool {
        if self.playback.state() == PlaybackState::Stopped {
            log::info!("interjection: playback stopped, skipping DJ break");
            return false;
        }

        log::info!("interjection: DJ break starting");
        let Some(clip) = self.provider.next_interjection().await else {
            log::info!("interjection: no DJ break content, continuing with music");
            return false;
        };

        // Generation can take a while; the operator may have stopped since.
        if self.playback.state() == PlaybackState::Stopped {
            log::info!("interjection: playback stopped during generation, dropping break");
            return false;
        }

        self.playback.interject(clip);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::playback::handle::PlaybackCommand;
    use crate::playback::{new_shared_session, AudioClip, AudioInput, PlaybackInbox};

    struct StubProvider {
        calls: AtomicUsize,
        produce: bool,
    }

    impl StubProvider {
        fn new(produce: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                produce,
            })
        }
    }

    #[async_trait]
    impl InterjectionProvider for StubProvider {
        async fn next_interjection(&self) -> Option<AudioClip> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.produce
                .then(|| AudioClip::interjection("dj", AudioInput::Buffer(vec![0])))
        }

        async fn announce(&self, _text: &str) -> Option<AudioClip> {
            None
        }
    }

    fn interjections(inbox: &mut PlaybackInbox) -> usize {
        let mut n = 0;
        while let Ok(cmd) = inbox.rx.try_recv() {
            if matches!(cmd, PlaybackCommand::Interject(_)) {
                n += 1;
            }
        }
        n
    }

    fn set_state(playback: &PlaybackHandle, state: PlaybackState) {
        playback.session().lock().unwrap().state = state;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_interval() {
        let provider = StubProvider::new(true);
        let (playback, mut inbox) = PlaybackHandle::channel(new_shared_session());
        let scheduler =
            InterjectionScheduler::new(provider.clone(), playback, Duration::from_millis(300_000));
        let task = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(interjections(&mut inbox), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(interjections(&mut inbox), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(interjections(&mut inbox), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_breaks_keep_the_normal_cadence() {
        let provider = StubProvider::new(true);
        let (playback, mut inbox) = PlaybackHandle::channel(new_shared_session());
        set_state(&playback, PlaybackState::Stopped);
        let scheduler = InterjectionScheduler::new(
            provider.clone(),
            playback.clone(),
            Duration::from_millis(300_000),
        );
        let task = tokio::spawn(scheduler.run());

        // Two intervals pass while stopped.
        tokio::time::sleep(Duration::from_secs(610)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(interjections(&mut inbox), 0);

        // The third tick still lands at 900 s, not 300 s after resuming.
        set_state(&playback, PlaybackState::Playing);
        tokio::time::sleep(Duration::from_secs(289)).await;
        assert_eq!(interjections(&mut inbox), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(interjections(&mut inbox), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        task.abort();
    }

    #[tokio::test]
    async fn stopped_playback_skips_without_generating() {
        let provider = StubProvider::new(true);
        let (playback, mut inbox) = PlaybackHandle::channel(new_shared_session());
        set_state(&playback, PlaybackState::Stopped);
        let scheduler =
            InterjectionScheduler::new(provider.clone(), playback, Duration::from_secs(1));

        assert!(!scheduler.fire().await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(interjections(&mut inbox), 0);
    }

    #[tokio::test]
    async fn missing_content_leaves_playback_alone() {
        let provider = StubProvider::new(false);
        let (playback, mut inbox) = PlaybackHandle::channel(new_shared_session());
        set_state(&playback, PlaybackState::Playing);
        let scheduler = InterjectionScheduler::new(provider, playback, Duration::from_secs(1));

        assert!(!scheduler.fire().await);
        assert!(inbox.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn playing_session_gets_the_clip() {
        let (playback, mut inbox) = PlaybackHandle::channel(new_shared_session());
        set_state(&playback, PlaybackState::Playing);
        let scheduler =
            InterjectionScheduler::new(StubProvider::new(true), playback, Duration::from_secs(1));

        assert!(scheduler.fire().await);
        assert_eq!(interjections(&mut inbox), 1);
    }
}
