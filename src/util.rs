use crate::summary::SessionSummary;

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Mean (position, audio) accuracy over `sessions`
pub fn average_accuracy(sessions: &[SessionSummary]) -> Option<(f64, f64)> {
    let position: Vec<f64> = sessions
        .iter()
        .map(|s| s.accuracy_position as f64)
        .collect();
    let audio: Vec<f64> = sessions.iter().map(|s| s.accuracy_audio as f64).collect();

    Some((mean(&position)?, mean(&audio)?))
}

/// Rounded mean score over `sessions`, 0 without any
pub fn average_score(sessions: &[SessionSummary]) -> u32 {
    let scores: Vec<f64> = sessions.iter().map(|s| s.score as f64).collect();
    mean(&scores).map_or(0, |m| m.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scorer::ModalStats;
    use crate::summary::finalize;
    use chrono::Local;

    fn session(position_correct: u32, audio_correct: u32) -> SessionSummary {
        let settings = Settings {
            total_trials: 10,
            ..Settings::default()
        };
        let visual = ModalStats {
            correct_rejections: position_correct,
            ..ModalStats::default()
        };
        let audio = ModalStats {
            correct_rejections: audio_correct,
            ..ModalStats::default()
        };
        finalize(&visual, &audio, 0, &settings, Local::now())
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[15., 7., 55., 12., 4.]), Some(18.6));
    }

    #[test]
    fn test_mean_single_value() {
        assert_eq!(mean(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_average_accuracy() {
        let sessions = vec![session(8, 6), session(10, 9)];
        assert_eq!(average_accuracy(&sessions), Some((90.0, 75.0)));
        assert_eq!(average_accuracy(&[]), None);
    }

    #[test]
    fn test_average_score_rounds() {
        let mut a = session(5, 5);
        a.score = 300;
        let mut b = session(5, 5);
        b.score = 401;
        assert_eq!(average_score(&[a, b]), 351);
        assert_eq!(average_score(&[]), 0);
    }
}
