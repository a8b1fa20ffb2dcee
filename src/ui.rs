pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget, Wrap,
    },
};
use unicode_width::UnicodeWidthStr;

use crate::history::{summarize, wpm_deltas, Improvement};
use crate::session::{CharOutcome, SessionPhase};
use crate::store::KeyValueStore;
use crate::trainer::{AppState, Trainer};
use crate::util::format_clock;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

impl<S: KeyValueStore> Widget for &Trainer<S> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state() {
            AppState::Typing => render_typing(self, area, buf),
            AppState::Results => render_results(self, area, buf),
            AppState::History => render_history(self, area, buf),
        }
    }
}

fn render_typing<S: KeyValueStore>(trainer: &Trainer<S>, area: Rect, buf: &mut Buffer) {
    let session = trainer.session();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let text_width = session.words().iter().map(|w| w.width() + 1).sum::<usize>();
    let prompt_lines = (text_width as f64 / max_chars_per_line as f64).ceil().max(1.0) as u16 + 1;
    let padding = area.height.saturating_sub(prompt_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(2),
            Constraint::Length(prompt_lines),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let live = trainer.live();
    let status = match session.phase() {
        SessionPhase::Idle => format!(
            "{}   start typing to begin",
            format_clock(trainer.countdown().remaining())
        ),
        _ => format!(
            "{}   {} wpm   {}% acc",
            format_clock(trainer.countdown().remaining()),
            live.wpm,
            live.accuracy
        ),
    };
    Paragraph::new(Span::styled(status, dim_bold()))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Line::from(word_spans(trainer)))
        .alignment(if prompt_lines <= 2 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(←) restart / (→) new text / (enter) submit word / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}

fn word_spans<S: KeyValueStore>(trainer: &Trainer<S>) -> Vec<Span<'static>> {
    let session = trainer.session();
    let current = session.current_word_index();
    let mut spans = Vec::new();

    for index in 0..session.words().len() {
        let mut cursor_placed = index != current;
        for (c, outcome) in session.char_outcomes(index) {
            let style = match outcome {
                CharOutcome::Correct => bold().fg(Color::Green),
                CharOutcome::Incorrect => bold().fg(Color::Red),
                CharOutcome::Extra => bold().fg(Color::Red).add_modifier(Modifier::CROSSED_OUT),
                CharOutcome::Pending if !cursor_placed => {
                    cursor_placed = true;
                    dim_bold().add_modifier(Modifier::UNDERLINED)
                }
                CharOutcome::Pending => dim_bold(),
            };
            spans.push(Span::styled(c.to_string(), style));
        }

        let gap = if cursor_placed {
            dim_bold()
        } else {
            dim_bold().add_modifier(Modifier::UNDERLINED)
        };
        spans.push(Span::styled(" ", gap));
    }
    spans
}

fn verdict_text(improvement: &Improvement) -> String {
    if improvement.is_first_attempt {
        return "first attempt recorded".to_string();
    }
    match (improvement.speed_improved, improvement.accuracy_improved) {
        (true, true) => "faster and more accurate than last time".to_string(),
        (true, false) => "faster than last time".to_string(),
        (false, true) => "more accurate than last time".to_string(),
        (false, false) => "no improvement over last time".to_string(),
    }
}

fn render_results<S: KeyValueStore>(trainer: &Trainer<S>, area: Rect, buf: &mut Buffer) {
    let Some(outcome) = trainer.outcome() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // verdict
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    render_history_chart(trainer, chunks[0], buf);

    let stats = Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {}/{} chars",
            outcome.record.words_per_minute,
            outcome.record.accuracy_percent,
            outcome.stats.correct_chars,
            outcome.stats.total_chars
        ),
        bold(),
    ))
    .alignment(Alignment::Center);
    stats.render(chunks[1], buf);

    let mut verdict = verdict_text(&outcome.improvement);
    if !outcome.persisted {
        verdict.push_str(" (not saved)");
    }
    Paragraph::new(Span::styled(
        verdict,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(r)etry / (n)ew / (h)istory / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}

fn render_history_chart<S: KeyValueStore>(trainer: &Trainer<S>, area: Rect, buf: &mut Buffer) {
    let points = charting::history_points(trainer.records());
    let (attempts, highest_wpm) = charting::compute_chart_params(&points);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("attempt")
                .bounds([1.0, attempts])
                .labels(vec![
                    Span::styled("1", bold()),
                    Span::styled(charting::format_label(attempts), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(highest_wpm), bold()),
                ]),
        )
        .render(area, buf);
}

fn render_history<S: KeyValueStore>(trainer: &Trainer<S>, area: Rect, buf: &mut Buffer) {
    let records = trainer.records();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let summary = match summarize(records) {
        Some(s) => format!(
            "{} attempts   avg {:.1} wpm   best {} wpm   avg {:.1}% acc   sd {:.2}",
            s.attempts, s.mean_wpm, s.best_wpm, s.mean_accuracy, s.wpm_std_dev
        ),
        None => "no results yet".to_string(),
    };
    Paragraph::new(Span::styled(summary, bold()))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    // newest first; deltas[i] is the change into records[i + 1]
    let deltas = wpm_deltas(records);
    let visible = chunks[1].height.saturating_sub(3) as usize;
    let rows: Vec<Row> = records
        .iter()
        .enumerate()
        .rev()
        .take(visible)
        .map(|(i, r)| {
            let delta = match i.checked_sub(1).and_then(|d| deltas.get(d)) {
                Some(d) if *d > 0 => {
                    Cell::from(format!("+{d}")).style(Style::default().fg(Color::Green))
                }
                Some(d) if *d < 0 => {
                    Cell::from(d.to_string()).style(Style::default().fg(Color::Red))
                }
                Some(_) => Cell::from("0"),
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from((i + 1).to_string()),
                Cell::from(
                    r.timestamp
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string(),
                ),
                Cell::from(r.words_per_minute.to_string()),
                Cell::from(format!("{}%", r.accuracy_percent)),
                delta,
            ])
        })
        .collect();

    let header = Row::new(vec!["#", "date", "wpm", "acc", "Δ wpm"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(18),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("History"))
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(b)ack / (r)etry / (n)ew / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::store::MemoryStore;
    use crate::text_source::{Prompt, TextProvider};

    fn trainer(prompt: &str) -> Trainer<MemoryStore> {
        Trainer::new(
            TextProvider::new(Prompt(prompt.into())),
            HistoryStore::new(MemoryStore::new()),
            30,
        )
    }

    fn render(trainer: &Trainer<MemoryStore>, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        trainer.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_typing_screen_shows_words_and_clock() {
        let t = trainer("hello world");
        let rendered = render(&t, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("hello world"));
        assert!(rendered.contains("0:30"));
    }

    #[test]
    fn test_typing_screen_shows_live_metrics() {
        let mut t = trainer("hello world");
        for c in "hel".chars() {
            t.type_char(c);
        }
        let rendered = render(&t, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("100% acc"));
    }

    #[test]
    fn test_results_screen() {
        let mut t = trainer("hi");
        for c in "hi ".chars() {
            t.type_char(c);
        }
        let rendered = render(&t, Rect::new(0, 0, 80, 24));
        assert!(rendered.contains("100% acc"));
        assert!(rendered.contains("first attempt recorded"));
        assert!(rendered.contains("(h)istory"));
    }

    #[test]
    fn test_history_screen() {
        let mut t = trainer("hi");
        for c in "hi ".chars() {
            t.type_char(c);
        }
        t.show_history();
        let rendered = render(&t, Rect::new(0, 0, 140, 24));
        assert!(rendered.contains("1 attempts"));
        assert!(rendered.contains("History"));
    }

    #[test]
    fn test_small_area_does_not_panic() {
        let t = trainer("hello");
        let area = Rect::new(0, 0, 12, 4);
        let mut buffer = Buffer::empty(area);
        (&t).render(area, &mut buffer);
        assert_eq!(*buffer.area(), area);
    }

    #[test]
    fn test_verdict_text() {
        let first = Improvement {
            speed_improved: false,
            accuracy_improved: false,
            is_first_attempt: true,
        };
        assert_eq!(verdict_text(&first), "first attempt recorded");
        let faster = Improvement {
            speed_improved: true,
            is_first_attempt: false,
            ..first
        };
        assert_eq!(verdict_text(&faster), "faster than last time");
    }
}
