//! Layout and drawing: board, blink rendering, next previews, chain counters, pause overlay.

use crate::game::{Cell, GameState};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Two terminal columns per board cell.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 20;
/// Duration of the board fade-in after a session reset.
const RESET_FADE_MS: u32 = 400;

const PUYO_GLYPH: &str = "● ";
/// Blink off-phase while clearing: the terminal analog of faded-and-shrunk.
const POP_GLYPH: &str = "∘ ";
const EMPTY_GLYPH: &str = "  ";

/// Board fade effect state after a session reset. The app requests it when
/// the engine's session counter changes; it runs until done.
#[derive(Default)]
pub struct ResetFade {
    effect: Option<Effect>,
    process_time: Option<Instant>,
    requested: bool,
}

impl ResetFade {
    pub fn request(&mut self) {
        self.requested = true;
        self.effect = None;
        self.process_time = None;
    }
}

/// Board outer rect (border included), centered with room for the sidebar.
fn board_rect(area: Rect, state: &GameState) -> Rect {
    let w = state.field().cols() as u16 * CELL_WIDTH + 2;
    let h = state.field().rows() as u16 + 2;
    let total_w = w + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(h) / 2;
    Rect {
        x,
        y,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

/// Draw the playing view, with optional pause overlay and the reset fade.
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    paused: bool,
    area: Rect,
    reset_fade: &mut ResetFade,
    now: Instant,
) {
    draw_board(frame, state, theme, area);
    draw_sidebar(frame, state, theme, area);
    if paused {
        draw_pause_overlay(frame, theme, area);
    }
    apply_reset_fade(frame, state, theme, area, reset_fade, now);
}

/// Colour of the active pair at (x, y), if one of its cells is there.
/// Cells above the top edge (negative rows) are not drawn.
fn pair_color_at(state: &GameState, x: usize, y: usize) -> Option<u8> {
    let pair = state.current()?;
    pair.cells()
        .into_iter()
        .find(|c| c.y >= 0 && c.x == x as i32 && c.y == y as i32)
        .map(|c| c.color)
}

fn cell_span(state: &GameState, theme: &Theme, x: usize, y: usize) -> Span<'static> {
    let base = Style::default().bg(theme.bg);
    if let Some(color) = pair_color_at(state, x, y) {
        return Span::styled(PUYO_GLYPH, base.fg(theme.puyo_color(color)));
    }
    match state.field().get(x, y) {
        Some(Cell::Puyo(color)) => {
            let style = base.fg(theme.puyo_color(color));
            if state.is_clearing_cell(x, y) && !state.blink_on() {
                Span::styled(POP_GLYPH, style.add_modifier(Modifier::DIM))
            } else {
                Span::styled(PUYO_GLYPH, style)
            }
        }
        _ => Span::styled(EMPTY_GLYPH, base),
    }
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let outer = board_rect(area, state);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line))
        .title(Span::styled(" puyotui ", Style::default().fg(theme.title)))
        .style(Style::default().bg(theme.bg));
    frame.render_widget(block, outer);

    let inner = Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: (state.field().cols() as u16 * CELL_WIDTH).min(outer.width.saturating_sub(2)),
        height: (state.field().rows() as u16).min(outer.height.saturating_sub(2)),
    };
    let lines: Vec<Line> = (0..state.field().rows())
        .map(|y| {
            Line::from(
                (0..state.field().cols())
                    .map(|x| cell_span(state, theme, x, y))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let board = board_rect(area, state);
    let x = board.x + board.width + 1;
    if x >= area.x + area.width {
        return;
    }
    let sidebar = Rect {
        x,
        y: board.y,
        width: SIDEBAR_WIDTH.min(area.x + area.width - x),
        height: board.height.min(area.height),
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // next previews
            Constraint::Length(3), // chain counters
            Constraint::Min(0),    // help
        ])
        .split(sidebar);

    let mut next_lines = Vec::new();
    for pair in state.next_pairs() {
        // Child is drawn above the pivot, matching the spawn orientation.
        next_lines.push(Line::from(Span::styled(
            PUYO_GLYPH,
            Style::default().fg(theme.puyo_color(pair.child.color)),
        )));
        next_lines.push(Line::from(Span::styled(
            PUYO_GLYPH,
            Style::default().fg(theme.puyo_color(pair.pivot.color)),
        )));
        next_lines.push(Line::from(""));
    }
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line))
        .title(Span::styled(" next ", Style::default().fg(theme.title)));
    frame.render_widget(Paragraph::new(next_lines).block(next_block), chunks[0]);

    let chain_style = if state.chain() > 0 {
        Style::default().fg(theme.title).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.main_fg)
    };
    let counters = vec![
        Line::from(vec![
            Span::styled("chain ", Style::default().fg(theme.main_fg)),
            Span::styled(state.chain().to_string(), chain_style),
        ]),
        Line::from(vec![
            Span::styled("best  ", Style::default().fg(theme.main_fg)),
            Span::styled(
                state.max_chain().to_string(),
                Style::default().fg(theme.main_fg),
            ),
        ]),
    ];
    frame.render_widget(Paragraph::new(counters), chunks[1]);

    let help_style = Style::default().fg(theme.inactive_fg);
    let help = vec![
        Line::from(Span::styled("←/→  move", help_style)),
        Line::from(Span::styled("↑    rotate", help_style)),
        Line::from(Span::styled("↓    soft drop", help_style)),
        Line::from(Span::styled("r    restart", help_style)),
        Line::from(Span::styled("p    pause", help_style)),
        Line::from(Span::styled("q    quit", help_style)),
    ];
    frame.render_widget(Paragraph::new(help), chunks[2]);
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let w = 22u16.min(area.width);
    let h = 3u16.min(area.height);
    let popup = Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w,
        height: h,
    };
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .style(Style::default().bg(theme.bg));
    let text = Paragraph::new(Line::from(Span::styled(
        "paused — p resumes",
        Style::default().fg(theme.main_fg),
    )))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(text, popup);
}

/// Create or advance the reset fade (board sweeps in from the background
/// colour over ~RESET_FADE_MS). Cleared once the effect reports done.
fn apply_reset_fade(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    fade: &mut ResetFade,
    now: Instant,
) {
    let rect = board_rect(area, state);
    if fade.requested && fade.effect.is_none() {
        fade.effect = Some(
            fx::fade_from(theme.bg, theme.bg, (RESET_FADE_MS, Interpolation::Linear))
                .with_area(rect),
        );
    }
    fade.requested = false;

    if let Some(effect) = fade.effect.as_mut() {
        let delta = fade
            .process_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(std::time::Duration::ZERO);
        fade.process_time = Some(now);
        let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
        frame.render_effect(effect, rect, TfxDuration::from_millis(delta_ms));
        if effect.done() {
            fade.effect = None;
            fade.process_time = None;
        }
    }
}
