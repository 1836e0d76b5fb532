//! Terminal control surface
//!
//! One column per light panel, a header with music mode and transport
//! state, and a footer with the last event. The color picker opens as a
//! popup over the selected panel.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::warn;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};

use crate::app::{apply_event, AppEvent};
use crate::controller::LightController;
use crate::light::{LightIndex, LightStatus, Rgb, LIGHT_COUNT};
use crate::panel::{LightIcon, Panel};
use crate::picker::ColorPickerDialog;
use crate::transport::ConnectionState;

const HELP: &str =
    "←/→ select  o on  f off  c/C color  b/B brightness  u custom  e edit  m music  q quit";

/// Result of one key press
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ControlSurface {
    controller: LightController,
    selected: LightIndex,
    picker: Option<ColorPickerDialog>,
    last_event: String,
}

impl ControlSurface {
    pub fn new(controller: LightController) -> Self {
        Self {
            controller,
            selected: LightIndex::from_slot(0),
            picker: None,
            last_event: String::from("ready"),
        }
    }

    pub fn into_controller(self) -> LightController {
        self.controller
    }

    fn select_offset(&mut self, offset: isize) {
        let slot = (self.selected.slot() as isize + offset).rem_euclid(LIGHT_COUNT as isize);
        self.selected = LightIndex::from_slot(slot as usize);
    }

    fn toggle(&mut self, status: LightStatus) {
        self.last_event = match self.controller.toggle_light(self.selected, status) {
            Some(message) => format!("light {} → {}", self.selected, message),
            None => format!("light {} {} dropped: transport not connected", self.selected, status),
        };
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if let Some(mut picker) = self.picker.take() {
            match key.code {
                KeyCode::Enter => {
                    let light = picker.light();
                    let outcome = picker.confirm();
                    self.controller.close_color_picker(light, outcome);
                    self.last_event = format!("light {} color {:?}", light, outcome);
                }
                KeyCode::Esc => {
                    let light = picker.light();
                    self.controller.close_color_picker(light, picker.cancel());
                    self.last_event = format!("light {} color unchanged", light);
                }
                KeyCode::Backspace => {
                    picker.backspace();
                    self.picker = Some(picker);
                }
                KeyCode::Char(c) => {
                    picker.push(c);
                    self.picker = Some(picker);
                }
                _ => self.picker = Some(picker),
            }
            return Flow::Continue;
        }

        let index = self.selected;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Left => self.select_offset(-1),
            KeyCode::Right | KeyCode::Tab => self.select_offset(1),
            KeyCode::Char(c @ '1'..='9') => {
                if let Some(index) = c.to_digit(10).and_then(|d| LightIndex::new(d.into())) {
                    self.selected = index;
                }
            }
            KeyCode::Char('o') => self.toggle(LightStatus::On),
            KeyCode::Char('f') => self.toggle(LightStatus::Off),
            KeyCode::Char('c') => self.controller.panel_mut(index).state.color.next(),
            KeyCode::Char('C') => self.controller.panel_mut(index).state.color.previous(),
            KeyCode::Char('b') => self.controller.panel_mut(index).state.brightness.next(),
            KeyCode::Char('B') => self.controller.panel_mut(index).state.brightness.previous(),
            KeyCode::Char('u') => {
                let state = &mut self.controller.panel_mut(index).state;
                state.use_custom_color = !state.use_custom_color;
            }
            KeyCode::Char('e') => self.picker = Some(self.controller.open_color_picker(index)),
            KeyCode::Char('m') => {
                let enabled = self.controller.toggle_music_mode();
                self.last_event = format!("music mode {}", if enabled { "on" } else { "off" });
            }
            _ => {}
        }
        Flow::Continue
    }

    fn draw(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(12),
                Constraint::Length(3),
            ])
            .split(f.size());

        f.render_widget(self.header(), rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, LIGHT_COUNT as u32); LIGHT_COUNT])
            .split(rows[1]);
        for (panel, area) in self.controller.panels().iter().zip(columns.iter()) {
            f.render_widget(self.panel_widget(panel), *area);
        }

        let footer = Paragraph::new(vec![
            Line::from(self.last_event.as_str()),
            Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
        ])
        .block(Block::default().borders(Borders::TOP));
        f.render_widget(footer, rows[2]);

        if let Some(picker) = &self.picker {
            let area = popup(columns[picker.light().slot()]);
            f.render_widget(Clear, area);
            f.render_widget(picker_widget(picker), area);
        }
    }

    fn header(&self) -> Paragraph<'static> {
        let (link, link_color) = match self.controller.link().state() {
            ConnectionState::Connected => ("connected", Color::Green),
            ConnectionState::Connecting => ("connecting", Color::Yellow),
            ConnectionState::Disconnected => ("disconnected", Color::Red),
        };
        let music = if self.controller.music_mode() {
            Span::styled("Music Mode ON", Style::default().fg(Color::Magenta))
        } else {
            Span::raw("Music Mode OFF")
        };
        Paragraph::new(Line::from(vec![
            music,
            Span::raw("   transport: "),
            Span::styled(link, Style::default().fg(link_color)),
        ]))
        .block(Block::default().title("Light Remote").borders(Borders::ALL))
    }

    fn panel_widget(&self, panel: &Panel) -> Paragraph<'static> {
        let state = &panel.state;
        let icon = match panel.icon {
            LightIcon::On => Span::styled(
                "● ON",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            LightIcon::Off => Span::styled("○ OFF", Style::default().fg(Color::DarkGray)),
        };
        let check = if state.use_custom_color { "[x]" } else { "[ ]" };

        let lines = vec![
            Line::from(panel.status_text.clone()),
            Line::from(icon),
            Line::from(""),
            Line::from(format!("Color      < {} >", state.color.selected())),
            Line::from(format!("Brightness < {} >", state.brightness.selected())),
            Line::from(vec![
                Span::raw(format!("{} ", panel.edit_color_text)),
                swatch(state.custom_color),
                Span::raw(format!(" {}", state.custom_color.to_hex())),
            ]),
            Line::from(format!("{} {}", check, panel.use_custom_text)),
            Line::from(""),
            Line::from(vec![
                Span::raw("sends "),
                swatch(state.resolve_toggle(LightStatus::On).color),
            ]),
            Line::from("[ ON ]  [ OFF ]"),
        ];

        let border = if panel.index == self.selected {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        Paragraph::new(lines).block(
            Block::default()
                .title(format!("Light {}", panel.index))
                .borders(Borders::ALL)
                .border_style(border),
        )
    }
}

fn swatch(color: Rgb) -> Span<'static> {
    Span::styled("   ", Style::default().bg(Color::Rgb(color.r, color.g, color.b)))
}

fn picker_widget(picker: &ColorPickerDialog) -> Paragraph<'static> {
    let preview = match picker.preview() {
        Some(color) => swatch(color),
        None => Span::styled("invalid", Style::default().fg(Color::Red)),
    };
    Paragraph::new(vec![
        Line::from(vec![Span::raw("was "), swatch(picker.initial())]),
        Line::from(vec![
            Span::raw(format!("new {} ", picker.buffer())),
            preview,
        ]),
        Line::from(Span::styled(
            "Enter ok  Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(
        Block::default()
            .title(format!("Edit Color {}", picker.light()))
            .borders(Borders::ALL),
    )
}

fn popup(area: Rect) -> Rect {
    let height = 5.min(area.height);
    Rect {
        x: area.x + 1.min(area.width),
        y: area.y + area.height.saturating_sub(height) / 2,
        width: area.width.saturating_sub(2),
        height,
    }
}

/// Raw mode and the alternate screen, undone on drop
struct TerminalGuard {
    restore: fn(),
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self {
            restore: restore_terminal,
        };
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        (self.restore)();
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!("failed to leave raw mode: {}", e);
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
        warn!("failed to restore screen: {}", e);
    }
}

/// Run the control surface until the user quits or `shutdown` is raised.
/// Returns the controller so the caller can tear the transport down.
pub fn run(
    controller: LightController,
    events: &Receiver<AppEvent>,
    shutdown: &AtomicBool,
) -> io::Result<LightController> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut surface = ControlSurface::new(controller);
    event_loop(&mut terminal, &mut surface, events, shutdown)?;
    Ok(surface.into_controller())
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    surface: &mut ControlSurface,
    events: &Receiver<AppEvent>,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(app_event) = events.try_recv() {
            surface.last_event = apply_event(&mut surface.controller, app_event);
        }

        terminal.draw(|f| surface.draw(f))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && surface.handle_key(key) == Flow::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}
