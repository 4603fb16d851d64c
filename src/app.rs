//! App: terminal init, frame loop, tick and key handling.

use crate::GameConfig;
use crate::game::GameState;
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::ResetFade;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;
/// Frame budget for event polling (~60 FPS rendering).
const FRAME_MS: u64 = 16;

pub struct App {
    theme: Theme,
    state: GameState,
    paused: bool,
    /// Anchor for the delta fed to the engine each frame.
    last_update: Instant,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    /// Board fade after a session reset (board full or manual restart).
    reset_fade: ResetFade,
    seen_sessions: u32,
}

impl App {
    pub fn new(config: &GameConfig, theme: Theme) -> Result<Self> {
        Ok(Self {
            theme,
            state: GameState::new(config),
            paused: false,
            last_update: Instant::now(),
            repeat_state: None,
            last_repeat_fire: None,
            reset_fade: ResetFade::default(),
            seen_sessions: 0,
        })
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => {
                self.state.move_left();
            }
            Action::MoveRight => {
                self.state.move_right();
            }
            Action::Rotate => {
                self.state.rotate();
            }
            Action::SoftDrop => self.state.set_soft_drop(true),
            Action::Reset => self.state.reset(),
            Action::Pause | Action::Quit | Action::None => {}
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let (action, first) = match self.repeat_state {
            Some(s) => s,
            None => return,
        };
        if !matches!(action, Action::MoveLeft | Action::MoveRight) {
            return;
        }
        if now.duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Attempt to enable enhanced keyboard for Release events (soft drop is held).
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        self.last_update = Instant::now();
        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let delta = now.duration_since(self.last_update);
            self.last_update = now;

            if !self.paused {
                self.tick_repeat(now);
                self.state.update(delta);
            }

            // A reset anywhere (board full during update, or the R key) gets a fade.
            if self.state.sessions() != self.seen_sessions {
                self.seen_sessions = self.state.sessions();
                self.reset_fade.request();
                self.repeat_state = None;
                self.last_repeat_fire = None;
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.state,
                    &self.theme,
                    self.paused,
                    f.area(),
                    &mut self.reset_fade,
                    now,
                )
            })?;

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key);
                        if key.kind == KeyEventKind::Release {
                            if action == Action::SoftDrop {
                                self.state.set_soft_drop(false);
                            }
                            if self.repeat_state.map(|(a, _)| a) == Some(action) {
                                self.repeat_state = None;
                                self.last_repeat_fire = None;
                            }
                            continue;
                        }
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        // Ignore OS repeats for actions we auto-repeat ourselves.
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            continue;
                        }

                        match action {
                            Action::Quit => return Ok(()),
                            Action::Pause => self.paused = !self.paused,
                            _ if self.paused => {}
                            Action::MoveLeft | Action::MoveRight => {
                                self.apply_action(action);
                                self.repeat_state = Some((action, Instant::now()));
                                self.last_repeat_fire = None;
                            }
                            _ => self.apply_action(action),
                        }
                    }
                }
            }
        }
    }
}
