use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::Result;
use crate::{GRID_SIZE, LETTERS};

/// The two stimulus channels of a dual n-back trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum Channel {
    Position,
    Audio,
}

/// One stimulus presentation. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialStep {
    /// cell index on the 3x3 grid, row major
    pub position: usize,
    pub token: char,
    pub is_position_match: bool,
    pub is_audio_match: bool,
}

impl TrialStep {
    pub fn is_match(&self, channel: Channel) -> bool {
        match channel {
            Channel::Position => self.is_position_match,
            Channel::Audio => self.is_audio_match,
        }
    }
}

/// Ordered trial steps for one session, index 0 presented first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    steps: Vec<TrialStep>,
}

impl Sequence {
    pub fn steps(&self) -> &[TrialStep] {
        &self.steps
    }

    pub fn get(&self, idx: usize) -> Option<&TrialStep> {
        self.steps.get(idx)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps that are a match on `channel`
    pub fn match_count(&self, channel: Channel) -> usize {
        self.steps.iter().filter(|s| s.is_match(channel)).count()
    }

    /// Compact rendering used in logs, e.g. `4C 0H 4C*`
    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| {
                let marker = match (s.is_position_match, s.is_audio_match) {
                    (true, true) => "*",
                    (true, false) => "p",
                    (false, true) => "a",
                    (false, false) => "",
                };
                format!("{}{}{}", s.position, s.token, marker)
            })
            .join(" ")
    }
}

impl From<Vec<TrialStep>> for Sequence {
    fn from(steps: Vec<TrialStep>) -> Self {
        Self { steps }
    }
}

/// Build the trial sequence for `settings`, drawing from `rng`.
///
/// Each lag-eligible index gets two independent draws against
/// `match_chance`, one per channel, that copy the value from `n_level`
/// steps back. A random value that happens to equal the lagged one is
/// flagged as a match too, so the observed match rate is
/// `match_chance + (1 - match_chance) * P(collision)` rather than exactly
/// `match_chance`. That accidental upgrade is intended behaviour.
pub fn generate<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> Result<Sequence> {
    settings.validate()?;

    let n = settings.n_level as usize;
    let total = settings.total_trials as usize;
    let mut steps: Vec<TrialStep> = Vec::with_capacity(total);

    for i in 0..total {
        let mut position = rng.gen_range(0..GRID_SIZE);
        let mut token = *LETTERS.choose(rng).unwrap_or(&LETTERS[0]);
        let mut is_position_match = false;
        let mut is_audio_match = false;

        if i >= n {
            let lagged = steps[i - n];

            if rng.gen_bool(settings.match_chance) {
                position = lagged.position;
                is_position_match = true;
            }
            if rng.gen_bool(settings.match_chance) {
                token = lagged.token;
                is_audio_match = true;
            }

            // accidental repeats count as matches
            if !is_position_match && position == lagged.position {
                is_position_match = true;
            }
            if !is_audio_match && token == lagged.token {
                is_audio_match = true;
            }
        }

        steps.push(TrialStep {
            position,
            token,
            is_position_match,
            is_audio_match,
        });
    }

    tracing::debug!(
        n_level = settings.n_level,
        total_trials = settings.total_trials,
        position_matches = steps.iter().filter(|s| s.is_position_match).count(),
        audio_matches = steps.iter().filter(|s| s.is_audio_match).count(),
        "generated sequence"
    );

    Ok(Sequence { steps })
}
