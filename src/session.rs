use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use rand::Rng;

use crate::audio::AudioOutput;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::scorer::{score_step, ScorerState, StepOutcome, UserInput};
use crate::sequence::{self, Channel, Sequence, TrialStep};
use crate::summary::{finalize, SessionSummary};
use crate::WARMUP_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum GameState {
    Idle,
    Loading,
    Playing,
    Finished,
}

/// What a call to [`Session::advance`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Not playing, or the current step is still live
    Pending,
    /// A new step went live; `resolved` holds the outcome of the one before it
    Stepped {
        index: usize,
        step: TrialStep,
        resolved: Option<StepOutcome>,
    },
    /// The last step was resolved and the session is over
    Finished { resolved: StepOutcome },
}

/// Timing state machine for one dual n-back session.
///
/// The session never sleeps or spawns timers itself. Hosts ask for the
/// pending deadline, wait until it passes (or an acknowledgment arrives),
/// and call [`Session::advance`].
#[derive(Debug, Clone)]
pub struct Session {
    settings: Settings,
    state: GameState,
    sequence: Sequence,
    current: Option<usize>,
    input: UserInput,
    step_started_at: Option<Instant>,
    deadline: Option<Instant>,
    scorer: ScorerState,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: GameState::Idle,
            sequence: Sequence::default(),
            current: None,
            input: UserInput::default(),
            step_started_at: None,
            deadline: None,
            scorer: ScorerState::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_step(&self) -> Option<&TrialStep> {
        self.current.and_then(|idx| self.sequence.get(idx))
    }

    pub fn input(&self) -> &UserInput {
        &self.input
    }

    pub fn scorer(&self) -> &ScorerState {
        &self.scorer
    }

    pub fn score(&self) -> u32 {
        self.scorer.score
    }

    /// When the pending step timer expires, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Enter `Loading`. Allowed from any state; an armed timer is dropped.
    pub fn request_start(&mut self) {
        tracing::debug!(from = %self.state, "start requested");
        self.reset_progress();
        self.state = GameState::Loading;
    }

    /// Hand a generated sequence to the session and start the warm-up.
    pub fn begin(&mut self, sequence: Sequence, now: Instant) -> Result<()> {
        if self.state != GameState::Loading {
            return Err(Error::InvalidState {
                expected: GameState::Loading,
                actual: self.state,
            });
        }
        let expected = self.settings.total_trials as usize;
        if sequence.len() != expected {
            return Err(Error::SequenceLength {
                expected,
                actual: sequence.len(),
            });
        }

        self.reset_progress();
        self.sequence = sequence;
        self.state = GameState::Playing;
        self.deadline = Some(now + Duration::from_millis(WARMUP_MS));
        tracing::info!(
            n_level = self.settings.n_level,
            total_trials = self.settings.total_trials,
            "session playing"
        );
        Ok(())
    }

    /// Full start: preload audio (best effort), generate, begin.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        audio: &mut dyn AudioOutput,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        self.request_start();
        self.load(audio, rng, now)
    }

    /// The `Loading` phase: preload audio, generate the sequence, begin.
    /// An invalid configuration sends the session back to `Idle`.
    pub fn load<R: Rng + ?Sized>(
        &mut self,
        audio: &mut dyn AudioOutput,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        if self.state != GameState::Loading {
            return Err(Error::InvalidState {
                expected: GameState::Loading,
                actual: self.state,
            });
        }
        if let Err(e) = audio.preload(&self.settings) {
            tracing::warn!("audio preload failed, continuing without it: {e}");
        }
        let sequence = match sequence::generate(&self.settings, rng) {
            Ok(seq) => seq,
            Err(e) => {
                self.state = GameState::Idle;
                return Err(e);
            }
        };
        tracing::debug!(sequence = %sequence.describe(), "sequence ready");
        self.begin(sequence, now)
    }

    /// Register a learner response for `channel` on the live step.
    ///
    /// Returns true only when the acknowledgment was recorded. Responses
    /// during the warm-up, outside `Playing`, or repeated on an already
    /// acked channel are ignored.
    pub fn acknowledge(&mut self, channel: Channel, now: Instant) -> bool {
        if self.state != GameState::Playing || self.current.is_none() {
            return false;
        }
        let Some(started) = self.step_started_at else {
            return false;
        };
        let latency_ms = now.saturating_duration_since(started).as_millis() as u64;
        self.input.acknowledge(channel, latency_ms)
    }

    /// Resolve the live step if its timer expired and move on.
    pub fn advance(&mut self, now: Instant) -> Advance {
        if self.state != GameState::Playing {
            return Advance::Pending;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return Advance::Pending,
        }

        let resolved = self.current.and_then(|idx| self.resolve(idx));

        let next = self.current.map_or(0, |idx| idx + 1);
        if next >= self.sequence.len() {
            self.state = GameState::Finished;
            self.deadline = None;
            self.step_started_at = None;
            tracing::info!(score = self.scorer.score, "session finished");
            return match resolved {
                Some(resolved) => Advance::Finished { resolved },
                // unreachable with a validated sequence
                None => Advance::Pending,
            };
        }

        self.input = UserInput::default();
        self.current = Some(next);
        self.step_started_at = Some(now);
        self.deadline = Some(now + self.settings.step_duration());

        let step = self.sequence.steps()[next];
        Advance::Stepped {
            index: next,
            step,
            resolved,
        }
    }

    /// [`Session::advance`] plus the audio cue for a newly live step.
    pub fn tick(&mut self, now: Instant, audio: &mut dyn AudioOutput) -> Advance {
        let advance = self.advance(now);
        if let Advance::Stepped { step, .. } = advance {
            audio.play(step.token, &self.settings);
        }
        advance
    }

    /// Abandon the session. The step timer is released.
    pub fn quit(&mut self) {
        if self.state == GameState::Playing {
            tracing::info!(
                step = ?self.current,
                score = self.scorer.score,
                "session abandoned"
            );
        }
        self.reset_progress();
        self.sequence = Sequence::default();
        self.state = GameState::Idle;
    }

    /// Build the summary of a finished session.
    pub fn summary(&self, timestamp: DateTime<Local>) -> Option<SessionSummary> {
        if self.state != GameState::Finished {
            return None;
        }
        Some(finalize(
            &self.scorer.visual,
            &self.scorer.audio,
            self.scorer.score,
            &self.settings,
            timestamp,
        ))
    }

    fn resolve(&mut self, idx: usize) -> Option<StepOutcome> {
        let step = *self.sequence.get(idx)?;
        let (scorer, outcome) = score_step(self.scorer, &step, &self.input);
        self.scorer = scorer;
        tracing::trace!(idx, ?outcome, score = scorer.score, "step resolved");
        Some(outcome)
    }

    fn reset_progress(&mut self) {
        self.current = None;
        self.input = UserInput::default();
        self.step_started_at = None;
        self.deadline = None;
        self.scorer = ScorerState::default();
    }
}
