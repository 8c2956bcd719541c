use serde::{Deserialize, Serialize};

use crate::sequence::{Channel, TrialStep};

pub const HIT_REWARD: u32 = 100;
pub const FALSE_ALARM_PENALTY: u32 = 50;

/// Signal-detection outcome of one channel of one step
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Outcome {
    Hit,
    Miss,
    FalseAlarm,
    CorrectRejection,
}

/// Crosses "was there a match" with "did the learner respond".
pub fn classify(is_match: bool, acked: bool) -> Outcome {
    match (is_match, acked) {
        (true, true) => Outcome::Hit,
        (true, false) => Outcome::Miss,
        (false, true) => Outcome::FalseAlarm,
        (false, false) => Outcome::CorrectRejection,
    }
}

/// Acknowledgments captured while a step is live
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserInput {
    pub position_acked: bool,
    pub audio_acked: bool,
    pub position_latency_ms: Option<u64>,
    pub audio_latency_ms: Option<u64>,
}

impl UserInput {
    pub fn is_acked(&self, channel: Channel) -> bool {
        match channel {
            Channel::Position => self.position_acked,
            Channel::Audio => self.audio_acked,
        }
    }

    pub fn latency_ms(&self, channel: Channel) -> Option<u64> {
        match channel {
            Channel::Position => self.position_latency_ms,
            Channel::Audio => self.audio_latency_ms,
        }
    }

    /// Record the first acknowledgment for `channel`. Returns false and
    /// leaves the input untouched when the channel was already acked.
    pub fn acknowledge(&mut self, channel: Channel, latency_ms: u64) -> bool {
        let (acked, latency) = match channel {
            Channel::Position => (&mut self.position_acked, &mut self.position_latency_ms),
            Channel::Audio => (&mut self.audio_acked, &mut self.audio_latency_ms),
        };
        if *acked {
            return false;
        }
        *acked = true;
        *latency = Some(latency_ms);
        true
    }
}

/// Running per-channel tallies for one session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalStats {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub total_response_time_ms: u64,
    pub hit_count: u32,
}

impl ModalStats {
    pub fn record(&mut self, outcome: Outcome, latency_ms: Option<u64>) {
        match outcome {
            Outcome::Hit => {
                self.hits += 1;
                self.total_response_time_ms += latency_ms.unwrap_or(0);
                self.hit_count += 1;
            }
            Outcome::Miss => self.misses += 1,
            Outcome::FalseAlarm => self.false_alarms += 1,
            Outcome::CorrectRejection => self.correct_rejections += 1,
        }
    }

    pub fn trials(&self) -> u32 {
        self.hits + self.misses + self.false_alarms + self.correct_rejections
    }

    pub fn mistakes(&self) -> u32 {
        self.misses + self.false_alarms
    }

    /// Mean response time over hits, rounded; 0 without hits
    pub fn avg_response_time_ms(&self) -> u64 {
        if self.hit_count > 0 {
            (self.total_response_time_ms as f64 / self.hit_count as f64).round() as u64
        } else {
            0
        }
    }
}

/// Outcomes of one resolved step, position first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub position: Outcome,
    pub audio: Outcome,
}

/// Live scoring accumulators, owned by whoever drives the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScorerState {
    pub score: u32,
    pub visual: ModalStats,
    pub audio: ModalStats,
}

impl ScorerState {
    pub fn stats(&self, channel: Channel) -> &ModalStats {
        match channel {
            Channel::Position => &self.visual,
            Channel::Audio => &self.audio,
        }
    }

    fn stats_mut(&mut self, channel: Channel) -> &mut ModalStats {
        match channel {
            Channel::Position => &mut self.visual,
            Channel::Audio => &mut self.audio,
        }
    }

    fn apply_outcome(&mut self, channel: Channel, outcome: Outcome, latency_ms: Option<u64>) {
        self.stats_mut(channel).record(outcome, latency_ms);
        match outcome {
            Outcome::Hit => self.score += HIT_REWARD,
            Outcome::FalseAlarm => self.score = self.score.saturating_sub(FALSE_ALARM_PENALTY),
            Outcome::Miss | Outcome::CorrectRejection => {}
        }
    }
}

/// Classify a finished step on both channels and fold it into `state`.
pub fn score_step(
    mut state: ScorerState,
    step: &TrialStep,
    input: &UserInput,
) -> (ScorerState, StepOutcome) {
    let position = classify(step.is_position_match, input.position_acked);
    state.apply_outcome(Channel::Position, position, input.position_latency_ms);

    let audio = classify(step.is_audio_match, input.audio_acked);
    state.apply_outcome(Channel::Audio, audio, input.audio_latency_ms);

    (state, StepOutcome { position, audio })
}
