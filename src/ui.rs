pub mod charting;
pub mod history;
pub mod screen;

use nback::{
    history::PASS_ACCURACY,
    scorer::{ModalStats, UserInput},
    sequence::Channel,
    session::GameState,
    summary::{ModalSummary, SessionSummary},
    util::average_accuracy,
    GRID_SIZE,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
/// How many recent sessions feed the dashboard averages
const RECENT_SESSIONS: usize = 5;

const CELL_WIDTH: u16 = 9;
const CELL_HEIGHT: u16 = 4;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Results => render_results(self, area, buf),
            // the history screen draws through the frame, see ui::history
            AppState::History => {}
            AppState::Game => match self.session.state() {
                GameState::Idle => render_dashboard(self, area, buf),
                GameState::Loading => render_loading(area, buf),
                GameState::Playing => render_grid(self, area, buf),
                GameState::Finished => render_finished(self, area, buf),
            },
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn accuracy_style(accuracy: u32) -> Style {
    let color = if accuracy >= PASS_ACCURACY {
        Color::Green
    } else if accuracy >= 50 {
        Color::Yellow
    } else {
        Color::Red
    };
    bold().fg(color)
}

fn render_dashboard(app: &App, area: Rect, buf: &mut Buffer) {
    let settings = &app.settings;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // title
            Constraint::Length(4), // profile
            Constraint::Length(3), // settings
            Constraint::Min(1),
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("DUAL {}-BACK", settings.n_level),
        bold().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let mut profile = vec![Line::from(vec![
        Span::raw("streak "),
        Span::styled(format!("{} days", app.stats.streak), bold()),
        Span::raw("   best level "),
        Span::styled(format!("{}-back", app.stats.high_score_n), bold()),
        Span::raw("   sessions "),
        Span::styled(app.stats.sessions.len().to_string(), bold()),
    ])];
    match average_accuracy(app.stats.recent(RECENT_SESSIONS)) {
        Some((position, audio)) => profile.push(Line::from(vec![
            Span::raw("recent accuracy  position "),
            Span::styled(format!("{position:.0}%"), bold()),
            Span::raw("  audio "),
            Span::styled(format!("{audio:.0}%"), bold()),
        ])),
        None => profile.push(Line::from(Span::styled("no sessions yet", dim()))),
    }
    Paragraph::new(profile)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(vec![
        Line::from(format!(
            "{} trials   {:.1}s per step   {} audio",
            settings.total_trials, settings.duration_seconds, settings.audio_provider
        )),
        Line::from(Span::styled(
            "(a) position match   (l) audio match",
            dim(),
        )),
    ])
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Red)))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }

    Paragraph::new(Span::styled(
        "(enter) start / (h)istory / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[5], buf);
}

fn render_loading(area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Length(1),
            Constraint::Percentage(50),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        "Loading sounds...",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);
}

/// Top-left corner of a centered 3x3 grid, or None when it does not fit
fn grid_origin(area: Rect) -> Option<(u16, u16)> {
    let width = CELL_WIDTH * 3;
    let height = CELL_HEIGHT * 3;
    if area.width < width || area.height < height + 3 {
        return None;
    }
    Some((
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
    ))
}

fn ack_span(label: &str, channel: Channel, input: &UserInput) -> Span<'static> {
    if input.is_acked(channel) {
        Span::styled(format!("[{label}]"), bold().fg(Color::Cyan))
    } else {
        Span::styled(format!(" {label} "), dim())
    }
}

fn render_grid(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let total = session.sequence().len();
    let step_no = session.current_index().map_or(0, |i| i + 1);

    let header = Line::from(vec![
        Span::styled(format!("{}-back", session.settings().n_level), dim()),
        Span::raw("   "),
        Span::styled(format!("score {}", session.score()), bold()),
        Span::raw("   "),
        Span::styled(format!("{step_no}/{total}"), dim()),
    ]);
    Paragraph::new(header)
        .alignment(Alignment::Center)
        .render(Rect { height: 1, ..area }, buf);

    let Some((x0, y0)) = grid_origin(area) else {
        Paragraph::new("terminal too small")
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(area, buf);
        return;
    };

    let lit = session.current_step().map(|s| s.position);
    for cell in 0..GRID_SIZE {
        let rect = Rect {
            x: x0 + (cell % 3) as u16 * CELL_WIDTH,
            y: y0 + (cell / 3) as u16 * CELL_HEIGHT,
            width: CELL_WIDTH,
            height: CELL_HEIGHT,
        };
        let mut block = Block::default().borders(Borders::ALL).border_style(dim());
        if lit == Some(cell) {
            block = block
                .border_style(bold().fg(Color::Cyan))
                .style(Style::default().bg(Color::Cyan));
        }
        block.render(rect, buf);
    }

    let input = session.input();
    let footer = Line::from(vec![
        ack_span("A position", Channel::Position, input),
        Span::raw("      "),
        ack_span("L audio", Channel::Audio, input),
    ]);
    let footer_y = y0 + CELL_HEIGHT * 3 + 1;
    if footer_y < area.y + area.height {
        Paragraph::new(footer).alignment(Alignment::Center).render(
            Rect {
                y: footer_y,
                height: 1,
                ..area
            },
            buf,
        );
    }
}

fn modal_line(label: &'static str, stats: &ModalStats) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, bold()),
        Span::raw(format!(
            "  {} hits  {} misses  {} false alarms",
            stats.hits, stats.misses, stats.false_alarms
        )),
    ])
}

fn render_finished(app: &App, area: Rect, buf: &mut Buffer) {
    let scorer = app.session.scorer();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("Session complete   score {}", scorer.score),
        bold().fg(Color::Green),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(vec![
        modal_line("position", &scorer.visual),
        modal_line("audio   ", &scorer.audio),
    ])
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(enter) save and see results",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}

fn breakdown(label: &'static str, accuracy: u32, stats: &ModalSummary) -> Vec<Line<'static>> {
    vec![
        Line::from(vec![
            Span::styled(label, bold()),
            Span::raw("  "),
            Span::styled(format!("{accuracy}%"), accuracy_style(accuracy)),
        ]),
        Line::from(format!(
            "hits {}  misses {}  false alarms {}  correct rejections {}",
            stats.hits, stats.misses, stats.false_alarms, stats.correct_rejections
        )),
        Line::from(Span::styled(
            format!("avg response {} ms", stats.avg_response_time_ms),
            dim(),
        )),
    ]
}

fn verdict(summary: &SessionSummary, best: u32) -> Span<'static> {
    if summary.passed(PASS_ACCURACY) && summary.n_level >= best {
        Span::styled(
            format!("level {} cleared, try {}-back next", summary.n_level, summary.n_level + 1),
            bold().fg(Color::Green),
        )
    } else if summary.passed(PASS_ACCURACY) {
        Span::styled("passed", bold().fg(Color::Green))
    } else {
        Span::styled(
            format!("reach {PASS_ACCURACY}% on both to advance"),
            Style::default().fg(Color::Yellow),
        )
    }
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(summary) = &app.last_summary else {
        Paragraph::new("no results").render(area, buf);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // headline
            Constraint::Length(4), // position
            Constraint::Length(4), // audio
            Constraint::Length(2), // verdict
            Constraint::Min(1),
            Constraint::Length(1), // notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Line::from(vec![
        Span::styled(format!("{}-back   ", summary.n_level), dim()),
        Span::styled(format!("score {}", summary.score), bold().fg(Color::Cyan)),
        Span::styled(format!("   {} mistakes", summary.total_mistakes), dim()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    Paragraph::new(breakdown(
        "position",
        summary.accuracy_position,
        &summary.visual_stats,
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(breakdown("audio", summary.accuracy_audio, &summary.audio_stats))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(verdict(summary, app.stats.high_score_n))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Red)))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
    }

    Paragraph::new(Span::styled(
        "(r)etry / (h)istory / (b)ack / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[6], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nback::{audio::SilentAudio, config::Settings};
    use std::time::{Duration, Instant};

    fn create_test_app() -> App {
        App::new(
            Settings {
                n_level: 1,
                total_trials: 4,
                duration_seconds: 1.0,
                ..Settings::default()
            },
            Box::new(SilentAudio),
            None,
            Some(5),
        )
    }

    fn render_to_string(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        app.render(area, &mut buf);
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_dashboard_shows_level_and_legend() {
        let app = create_test_app();
        let out = render_to_string(&app, 80, 24);
        assert!(out.contains("DUAL 1-BACK"));
        assert!(out.contains("no sessions yet"));
        assert!(out.contains("(enter) start"));
    }

    #[test]
    fn test_loading_screen() {
        let mut app = create_test_app();
        app.start_game();
        let out = render_to_string(&app, 80, 24);
        assert!(out.contains("Loading sounds"));
    }

    #[test]
    fn test_grid_renders_score_and_counter() {
        let mut app = create_test_app();
        app.start_game();
        let t0 = Instant::now();
        app.finish_loading(t0);
        app.on_tick(t0 + Duration::from_millis(500));

        let out = render_to_string(&app, 80, 24);
        assert!(out.contains("score 0"));
        assert!(out.contains("1/4"));
        assert!(out.contains("A position"));
    }

    #[test]
    fn test_grid_survives_tiny_terminal() {
        let mut app = create_test_app();
        app.start_game();
        let t0 = Instant::now();
        app.finish_loading(t0);
        app.on_tick(t0 + Duration::from_millis(500));

        let out = render_to_string(&app, 20, 6);
        assert!(out.contains("too small"));
    }

    #[test]
    fn test_results_breakdown() {
        let mut app = create_test_app();
        app.start_game();
        let t0 = Instant::now();
        app.finish_loading(t0);
        let mut now = t0;
        for _ in 0..8 {
            now += Duration::from_millis(1000);
            app.on_tick(now);
        }
        let finished = render_to_string(&app, 80, 24);
        assert!(finished.contains("Session complete"));

        app.save_results();
        let out = render_to_string(&app, 100, 30);
        assert!(out.contains("1-back"));
        assert!(out.contains("correct rejections"));
        assert!(out.contains("(r)etry"));
    }

    #[test]
    fn test_accuracy_style_thresholds() {
        assert_eq!(accuracy_style(80).fg, Some(Color::Green));
        assert_eq!(accuracy_style(60).fg, Some(Color::Yellow));
        assert_eq!(accuracy_style(10).fg, Some(Color::Red));
    }
}
