//! # Terminal UI Module
//!
//! Interactive settings menu rendered with ratatui.
//!
//! The UI runs its own 60 Hz refresh loop on a blocking task, independent of
//! the frame scheduler. It mutates tunables exclusively through
//! [`SharedConfig`] (every write clamps before becoming visible to the
//! scheduler) and displays the live steering value published by the engine's
//! watch channel.
//!
//! ## Keys
//!
//! - Up/Down: select a row
//! - Left/Right: adjust the selected value
//! - Enter: toggle the selected switch (or exit on the Exit row)
//! - Esc / q: exit

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::SharedConfig;
use crate::engine::EngineStatus;

/// UI refresh budget (60 Hz).
const UI_REFRESH: Duration = Duration::from_millis(16);

/// Menu rows, in display order.
const MENU: [&str; 10] = [
    "Emulation",
    "Deadzone",
    "Smoothing",
    "Response Curve",
    "AutoCenter",
    "AC Strength",
    "AC Delay",
    "AC Damping",
    "Primary Buttons",
    "Exit",
];

const ROW_EMULATION: usize = 0;
const ROW_DEADZONE: usize = 1;
const ROW_SMOOTHING: usize = 2;
const ROW_CURVE: usize = 3;
const ROW_AUTO_CENTER: usize = 4;
const ROW_AC_STRENGTH: usize = 5;
const ROW_AC_DELAY: usize = 6;
const ROW_AC_DAMPING: usize = 7;
const ROW_PRIMARY_BUTTONS: usize = 8;
const ROW_EXIT: usize = 9;

/// Interactive settings menu.
pub struct Ui {
    config: SharedConfig,
    status: watch::Receiver<EngineStatus>,
    selected: usize,
}

impl Ui {
    /// Creates a UI over the shared configuration and the engine's status
    /// channel.
    #[must_use]
    pub fn new(config: SharedConfig, status: watch::Receiver<EngineStatus>) -> Self {
        Self {
            config,
            status,
            selected: 0,
        }
    }

    /// Runs the menu until the user exits or the token is cancelled.
    ///
    /// Blocking; intended for `tokio::task::spawn_blocking`. The terminal is
    /// restored before returning, including on error.
    pub fn run(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, &cancel);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            terminal.draw(|frame| self.render(frame))?;

            if event::poll(UI_REFRESH)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Applies one key press. Returns true when the UI should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Up => {
                self.selected = (self.selected + MENU.len() - 1) % MENU.len();
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1) % MENU.len();
            }
            KeyCode::Left => self.adjust(-1.0),
            KeyCode::Right => self.adjust(1.0),
            KeyCode::Enter => {
                if self.selected == ROW_EXIT {
                    return true;
                }
                self.activate();
            }
            KeyCode::Esc | KeyCode::Char('q') => return true,
            _ => {}
        }
        false
    }

    /// Left/Right adjustment of the selected row.
    fn adjust(&mut self, direction: f32) {
        match self.selected {
            ROW_EMULATION => self.config.toggle_emulation(),
            ROW_DEADZONE => self.config.adjust_deadzone(0.01 * direction),
            ROW_SMOOTHING => self.config.adjust_smoothing(0.05 * direction),
            ROW_CURVE => self.config.adjust_curve(0.1 * direction),
            ROW_AUTO_CENTER => self.config.toggle_auto_center(),
            ROW_AC_STRENGTH => self.config.adjust_auto_center_strength(0.5 * direction),
            ROW_AC_DELAY => self.config.adjust_auto_center_delay(20 * direction as i32),
            ROW_AC_DAMPING => self.config.adjust_auto_center_damping(0.02 * direction),
            ROW_PRIMARY_BUTTONS => self.config.toggle_primary_buttons(),
            _ => {}
        }
    }

    /// Enter on a toggle row.
    fn activate(&mut self) {
        match self.selected {
            ROW_EMULATION => self.config.toggle_emulation(),
            ROW_AUTO_CENTER => self.config.toggle_auto_center(),
            ROW_PRIMARY_BUTTONS => self.config.toggle_primary_buttons(),
            _ => {}
        }
    }

    fn row_value(&self, index: usize) -> String {
        let settings = self.config.snapshot();
        match index {
            ROW_EMULATION => on_off(settings.emulation_active),
            ROW_DEADZONE => format!("{:.2}", settings.deadzone),
            ROW_SMOOTHING => format!("{:.2}", settings.smoothing),
            ROW_CURVE => format!("{:.2}", settings.curve),
            ROW_AUTO_CENTER => on_off(settings.auto_center_enabled),
            ROW_AC_STRENGTH => format!("{:.1}", settings.auto_center_strength),
            ROW_AC_DELAY => format!("{} ms", settings.auto_center_delay_ms),
            ROW_AC_DAMPING => format!("{:.2}", settings.auto_center_damping),
            ROW_PRIMARY_BUTTONS => on_off(settings.primary_buttons),
            _ => String::new(),
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let status = *self.status.borrow();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(MENU.len() as u16 + 2),
                Constraint::Length(3),
                Constraint::Length(2),
            ])
            .split(frame.size());

        let title = if status.pad_connected {
            " steerpad | pad connected "
        } else {
            " steerpad | pad disconnected "
        };

        let items: Vec<ListItem> = MENU
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let marker = if i == self.selected { ">" } else { " " };
                let line = format!("{} {:<18}{:>8}", marker, label, self.row_value(i));
                let style = if i == self.selected {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(line).style(style)
            })
            .collect();

        let menu = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(menu, chunks[0]);

        let ratio = f64::from(status.steering.clamp(-1.0, 1.0)) / 2.0 + 0.5;
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" steering "))
            .gauge_style(Style::default().fg(Color::Cyan))
            .label(format!("{:+.3}", status.steering))
            .ratio(ratio);
        frame.render_widget(gauge, chunks[1]);

        let help = Paragraph::new(Line::from(
            "↑/↓ select   ←/→ adjust   Enter toggle   Esc/q quit   middle click recenters",
        ))
        .alignment(Alignment::Center);
        frame.render_widget(help, chunks[2]);
    }
}

fn on_off(value: bool) -> String {
    if value { "ON" } else { "OFF" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn build_ui() -> (Ui, SharedConfig) {
        let config = SharedConfig::new();
        let (_tx, rx) = watch::channel(EngineStatus::default());
        (Ui::new(config.clone(), rx), config)
    }

    #[test]
    fn test_selection_wraps() {
        let (mut ui, _config) = build_ui();

        ui.handle_key(KeyCode::Up);
        assert_eq!(ui.selected, ROW_EXIT);

        ui.handle_key(KeyCode::Down);
        assert_eq!(ui.selected, 0);
    }

    #[test]
    fn test_adjust_uses_documented_increments() {
        let (mut ui, config) = build_ui();

        ui.selected = ROW_DEADZONE;
        ui.handle_key(KeyCode::Right);
        assert!((config.snapshot().deadzone - 0.06).abs() < 1e-6);

        ui.selected = ROW_AC_DELAY;
        ui.handle_key(KeyCode::Left);
        assert_eq!(config.snapshot().auto_center_delay_ms, 130);

        ui.selected = ROW_AC_STRENGTH;
        ui.handle_key(KeyCode::Right);
        assert!((config.snapshot().auto_center_strength - 6.5).abs() < 1e-6);
    }

    #[test]
    fn test_enter_toggles_switches() {
        let (mut ui, config) = build_ui();

        ui.selected = ROW_EMULATION;
        ui.handle_key(KeyCode::Enter);
        assert!(!config.snapshot().emulation_active);

        ui.selected = ROW_PRIMARY_BUTTONS;
        ui.handle_key(KeyCode::Enter);
        assert!(config.snapshot().primary_buttons);
    }

    #[test]
    fn test_exit_keys() {
        let (mut ui, _config) = build_ui();

        assert!(ui.handle_key(KeyCode::Esc));
        assert!(ui.handle_key(KeyCode::Char('q')));

        ui.selected = ROW_EXIT;
        assert!(ui.handle_key(KeyCode::Enter));

        ui.selected = ROW_DEADZONE;
        assert!(!ui.handle_key(KeyCode::Enter));
    }

    #[test]
    fn test_render_smoke() {
        let (mut ui, _config) = build_ui();
        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();

        terminal.draw(|frame| ui.render(frame)).unwrap();

        let rendered = format!("{:?}", terminal.backend().buffer());
        assert!(rendered.contains("Deadzone"));
        assert!(rendered.contains("steering"));
    }
}
