use nback::summary::SessionSummary;

/// X (session number) and Y (score) bounds for the history chart.
/// X never drops below 1 so a single session still gets an axis.
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let highest_score = points.iter().map(|&(_, y)| y).fold(0.0, f64::max);

    let last_session = points.last().map_or(1.0, |p| p.0).max(1.0);

    (last_session, highest_score.round())
}

/// Chart points: (1-based session number, score)
pub fn score_points(scores: &[u32]) -> Vec<(f64, f64)> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &score)| ((i + 1) as f64, score as f64))
        .collect()
}

/// Average reaction time per session as (position, audio) chart points,
/// numbered from 1 like [`score_points`]
pub fn reaction_time_points(
    sessions: &[SessionSummary],
) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let x = (i + 1) as f64;
            (
                (x, s.visual_stats.avg_response_time_ms as f64),
                (x, s.audio_stats.avg_response_time_ms as f64),
            )
        })
        .unzip()
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
