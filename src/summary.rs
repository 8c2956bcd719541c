use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::scorer::ModalStats;

/// Per-channel result as stored in history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalSummary {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub avg_response_time_ms: u64,
}

impl From<&ModalStats> for ModalSummary {
    fn from(stats: &ModalStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            false_alarms: stats.false_alarms,
            correct_rejections: stats.correct_rejections,
            avg_response_time_ms: stats.avg_response_time_ms(),
        }
    }
}

/// Outcome of one complete session, built once at the end of play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub n_level: u32,
    pub score: u32,
    /// percent of steps classified correctly on the position channel
    pub accuracy_position: u32,
    pub accuracy_audio: u32,
    pub total_mistakes: u32,
    pub visual_stats: ModalSummary,
    pub audio_stats: ModalSummary,
}

impl SessionSummary {
    /// Both channels at or above `threshold` percent
    pub fn passed(&self, threshold: u32) -> bool {
        self.accuracy_position >= threshold && self.accuracy_audio >= threshold
    }
}

fn accuracy_percent(stats: &ModalStats, total_trials: u32) -> u32 {
    if total_trials == 0 {
        return 0;
    }
    let correct = (stats.hits + stats.correct_rejections) as f64;
    (correct / total_trials as f64 * 100.0).round() as u32
}

/// Turn the final accumulators into a summary for persistence.
pub fn finalize(
    visual: &ModalStats,
    audio: &ModalStats,
    score: u32,
    settings: &Settings,
    timestamp: DateTime<Local>,
) -> SessionSummary {
    SessionSummary {
        id: timestamp.timestamp_millis().to_string(),
        timestamp,
        n_level: settings.n_level,
        score,
        accuracy_position: accuracy_percent(visual, settings.total_trials),
        accuracy_audio: accuracy_percent(audio, settings.total_trials),
        total_mistakes: visual.mistakes() + audio.mistakes(),
        visual_stats: visual.into(),
        audio_stats: audio.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(total_trials: u32) -> Settings {
        Settings {
            total_trials,
            ..Settings::default()
        }
    }

    #[test]
    fn test_finalize_accuracy_and_mistakes() {
        let visual = ModalStats {
            hits: 4,
            misses: 2,
            false_alarms: 1,
            correct_rejections: 13,
            total_response_time_ms: 2000,
            hit_count: 4,
        };
        let audio = ModalStats {
            hits: 5,
            misses: 0,
            false_alarms: 3,
            correct_rejections: 12,
            total_response_time_ms: 0,
            hit_count: 0,
        };
        let now = Local::now();
        let summary = finalize(&visual, &audio, 750, &settings(20), now);

        assert_eq!(summary.score, 750);
        assert_eq!(summary.n_level, 2);
        assert_eq!(summary.accuracy_position, 85);
        assert_eq!(summary.accuracy_audio, 85);
        assert_eq!(summary.total_mistakes, 6);
        assert_eq!(summary.visual_stats.avg_response_time_ms, 500);
        assert_eq!(summary.audio_stats.avg_response_time_ms, 0);
        assert_eq!(summary.id, now.timestamp_millis().to_string());
        assert_eq!(summary.timestamp, now);
    }

    #[test]
    fn test_accuracy_rounds_half_up() {
        // 1 of 8 correct = 12.5%
        let visual = ModalStats {
            hits: 1,
            misses: 7,
            hit_count: 1,
            ..ModalStats::default()
        };
        let summary = finalize(&visual, &visual, 0, &settings(8), Local::now());
        assert_eq!(summary.accuracy_position, 13);
    }

    #[test]
    fn test_modal_summary_avg_response_time() {
        let stats = ModalStats {
            hits: 3,
            total_response_time_ms: 900,
            hit_count: 3,
            ..ModalStats::default()
        };
        assert_eq!(ModalSummary::from(&stats).avg_response_time_ms, 300);
        assert_eq!(ModalSummary::from(&ModalStats::default()).avg_response_time_ms, 0);
    }

    #[test]
    fn test_passed_threshold() {
        let mut summary = finalize(
            &ModalStats {
                correct_rejections: 8,
                ..ModalStats::default()
            },
            &ModalStats {
                correct_rejections: 10,
                ..ModalStats::default()
            },
            0,
            &settings(10),
            Local::now(),
        );
        assert_eq!(summary.accuracy_position, 80);
        assert!(summary.passed(80));
        summary.accuracy_audio = 79;
        assert!(!summary.passed(80));
    }
}
