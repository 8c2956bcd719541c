use nback::{
    history::PASS_ACCURACY,
    summary::SessionSummary,
    util::average_score,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, LegendPosition, Paragraph, Row,
        Table,
    },
    Frame,
};

use crate::{
    ui::charting::{compute_chart_params, format_label, reaction_time_points, score_points},
    App,
};

/// Sessions shown in the reaction time chart
const RECENT_SESSIONS: usize = 10;

fn accuracy_color(accuracy: u32) -> Color {
    if accuracy >= PASS_ACCURACY {
        Color::Green
    } else if accuracy >= 50 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Pure presenter for a single history row
pub fn present_row(summary: &SessionSummary) -> Row<'static> {
    let level_style = if summary.passed(PASS_ACCURACY) {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    Row::new(vec![
        Cell::from(summary.timestamp.format("%Y-%m-%d %H:%M").to_string()),
        Cell::from(format!("{}-back", summary.n_level)).style(level_style),
        Cell::from(summary.score.to_string()),
        Cell::from(format!("{}%", summary.accuracy_position))
            .style(Style::default().fg(accuracy_color(summary.accuracy_position))),
        Cell::from(format!("{}%", summary.accuracy_audio))
            .style(Style::default().fg(accuracy_color(summary.accuracy_audio))),
        Cell::from(summary.total_mistakes.to_string()),
    ])
}

/// Render the session history screen: score and reaction time charts
/// above, table below
pub fn render_history(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),      // Title
            Constraint::Percentage(40), // Chart
            Constraint::Min(0),         // Table
            Constraint::Length(2),      // Instructions
        ])
        .split(area);

    let title = Paragraph::new(format!(
        "History  games {}  avg score {}  streak {}  best {}-back",
        app.stats.sessions.len(),
        average_score(&app.stats.sessions),
        app.stats.streak,
        app.stats.high_score_n
    ))
    .block(Block::default().borders(Borders::ALL).title("Sessions"))
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let sessions = &app.stats.sessions;
    if sessions.is_empty() {
        let no_data = Paragraph::new("No sessions yet. Finish a game to start your history.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[2]);
    } else {
        let scores: Vec<u32> = sessions.iter().map(|s| s.score).collect();
        let points = score_points(&scores);
        let (last_session, highest_score) = compute_chart_params(&points);
        let bold = Style::default().add_modifier(Modifier::BOLD);

        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let datasets = vec![Dataset::default()
            .marker(Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&points)];
        let chart = Chart::new(datasets)
            .block(Block::default().title("Score"))
            .x_axis(
                Axis::default()
                    .title("session")
                    .bounds([1.0, last_session])
                    .labels(vec![
                        Span::styled("1", bold),
                        Span::styled(format_label(last_session), bold),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("score")
                    .bounds([0.0, highest_score.max(1.0)])
                    .labels(vec![
                        Span::styled("0", bold),
                        Span::styled(format_label(highest_score), bold),
                    ]),
            );
        f.render_widget(chart, charts[0]);

        let (position_rt, audio_rt) = reaction_time_points(app.stats.recent(RECENT_SESSIONS));
        let (rt_sessions, slowest_position) = compute_chart_params(&position_rt);
        let (_, slowest_audio) = compute_chart_params(&audio_rt);
        let slowest = slowest_position.max(slowest_audio);

        let rt_datasets = vec![
            Dataset::default()
                .name("position")
                .marker(Marker::Braille)
                .style(Style::default().fg(Color::Cyan))
                .graph_type(GraphType::Line)
                .data(&position_rt),
            Dataset::default()
                .name("audio")
                .marker(Marker::Braille)
                .style(Style::default().fg(Color::Yellow))
                .graph_type(GraphType::Line)
                .data(&audio_rt),
        ];
        let rt_chart = Chart::new(rt_datasets)
            .block(Block::default().title(format!("Reaction time, last {RECENT_SESSIONS}")))
            .legend_position(Some(LegendPosition::TopRight))
            .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
            .x_axis(
                Axis::default()
                    .title("session")
                    .bounds([1.0, rt_sessions])
                    .labels(vec![
                        Span::styled("1", bold),
                        Span::styled(format_label(rt_sessions), bold),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("ms")
                    .bounds([0.0, slowest.max(1.0)])
                    .labels(vec![
                        Span::styled("0", bold),
                        Span::styled(format_label(slowest), bold),
                    ]),
            );
        f.render_widget(rt_chart, charts[1]);

        let table_height = chunks[2].height.saturating_sub(3) as usize; // borders + header
        let max_scroll = sessions.len().saturating_sub(table_height);
        if app.history_scroll > max_scroll {
            app.history_scroll = max_scroll;
        }

        let header = Row::new(vec![
            Cell::from("Played"),
            Cell::from("Level"),
            Cell::from("Score"),
            Cell::from("Position"),
            Cell::from("Audio"),
            Cell::from("Mistakes"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        // newest first
        let visible_rows: Vec<Row> = sessions
            .iter()
            .rev()
            .skip(app.history_scroll)
            .take(table_height)
            .map(present_row)
            .collect();

        let widths = [
            Constraint::Length(17),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Min(8),
        ];

        let table = Table::new(visible_rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Past sessions"))
            .column_spacing(2);
        f.render_widget(table, chunks[2]);
    }

    let instructions = Paragraph::new("(↑/↓) scroll  (PgUp/PgDn) page  (Home) top  (b/backspace) back  (r) play")
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(instructions, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use nback::{audio::SilentAudio, config::Settings, summary::ModalSummary};
    use ratatui::{backend::TestBackend, Terminal};

    fn summary(score: u32, position: u32, audio: u32) -> SessionSummary {
        timed_summary(score, position, audio, 0, 0)
    }

    fn timed_summary(
        score: u32,
        position: u32,
        audio: u32,
        position_rt: u64,
        audio_rt: u64,
    ) -> SessionSummary {
        let timestamp = Local.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        SessionSummary {
            id: timestamp.timestamp_millis().to_string(),
            timestamp,
            n_level: 2,
            score,
            accuracy_position: position,
            accuracy_audio: audio,
            total_mistakes: 3,
            visual_stats: ModalSummary {
                avg_response_time_ms: position_rt,
                ..ModalSummary::default()
            },
            audio_stats: ModalSummary {
                avg_response_time_ms: audio_rt,
                ..ModalSummary::default()
            },
        }
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| render_history(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn app() -> App {
        App::new(Settings::default(), Box::new(SilentAudio), None, Some(3))
    }

    #[test]
    fn test_present_row_builds() {
        let _row = present_row(&summary(400, 90, 85));
    }

    #[test]
    fn test_empty_history_message() {
        let mut app = app();
        let out = draw(&mut app);
        assert!(out.contains("No sessions yet"));
    }

    #[test]
    fn test_history_lists_sessions_and_clamps_scroll() {
        let mut app = app();
        app.stats.sessions = vec![summary(300, 70, 60), summary(950, 90, 85)];
        app.history_scroll = 50;

        let out = draw(&mut app);
        assert!(out.contains("2026-03-14 09:30"));
        assert!(out.contains("950"));
        assert!(out.contains("2-back"));
        assert_eq!(app.history_scroll, 0);
    }

    #[test]
    fn test_history_shows_averages_and_reaction_times() {
        let mut app = app();
        app.stats.sessions = vec![
            timed_summary(300, 70, 60, 450, 700),
            timed_summary(500, 90, 85, 380, 900),
        ];

        let out = draw(&mut app);
        assert!(out.contains("games 2"));
        assert!(out.contains("avg score 400"));
        assert!(out.contains("Reaction time"));
        assert!(out.contains("position"));
        // the slowest average reaction time labels the y axis
        assert!(out.contains("900"));
    }
}
