//! Terminal front end.
//!
//! Paints the commands recorded by the viewer's [`RecordingCanvas`] onto a
//! ratatui braille canvas and maps keys and mouse input onto [`Player`]
//! controls. Playback itself runs on the tokio runtime; this loop only reads
//! snapshots and issues commands.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use nalgebra::Vector2;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::canvas::{Canvas as CanvasWidget, Line as Segment},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tafview_core::{
    Canvas, DrawCommand, PlaybackState, PlaybackStatus, Player, RecordingCanvas, TextAlign,
};
use tafview_env::ReplayContext;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Nominal pixel size of one terminal cell.
const CELL_PX: (f64, f64) = (8.0, 16.0);

/// Wheel delta per scroll notch.
const WHEEL_STEP: f64 = 100.0;

/// Pan step for arrow keys, in canvas pixels.
const PAN_STEP_PX: f64 = 20.0;

const MIN_SPEED: f64 = 1.0 / 16.0;
const MAX_SPEED: f64 = 16.0;

const INPUT_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// INPUT MAPPING
// =============================================================================

/// A user intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Start when idle, otherwise pause/resume
    PlayPause,
    Faster,
    Slower,
    ZoomIn,
    ZoomOut,
    /// Screen-space pan in canvas pixels
    Pan(Vector2<f64>),
    ToggleOrientation,
    ToggleLabels,
    /// Jump to the given tenth of the scenario
    SeekDecile(usize),
    Quit,
}

impl Action {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        let action = match code {
            KeyCode::Char(' ') => Action::PlayPause,
            KeyCode::Char('+') | KeyCode::Char('=') => Action::Faster,
            KeyCode::Char('-') => Action::Slower,
            KeyCode::Char(']') => Action::ZoomIn,
            KeyCode::Char('[') => Action::ZoomOut,
            KeyCode::Left => Action::Pan(Vector2::new(PAN_STEP_PX, 0.0)),
            KeyCode::Right => Action::Pan(Vector2::new(-PAN_STEP_PX, 0.0)),
            KeyCode::Up => Action::Pan(Vector2::new(0.0, PAN_STEP_PX)),
            KeyCode::Down => Action::Pan(Vector2::new(0.0, -PAN_STEP_PX)),
            KeyCode::Char('o') => Action::ToggleOrientation,
            KeyCode::Char('l') => Action::ToggleLabels,
            KeyCode::Char(c @ '0'..='9') => Action::SeekDecile(c as usize - '0' as usize),
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            _ => return None,
        };
        Some(action)
    }
}

/// Frame position at the start of decile `decile` of `total` frames.
pub fn decile_index(decile: usize, total: usize) -> usize {
    (decile.min(10) * total / 10).min(total.saturating_sub(1))
}

/// Next speed on the doubling ladder, clamped to the supported range.
pub fn step_speed(speed: f64, faster: bool) -> f64 {
    let next = if faster { speed * 2.0 } else { speed / 2.0 };
    next.clamp(MIN_SPEED, MAX_SPEED)
}

/// Turns successive pointer positions into pan deltas.
#[derive(Debug, Default)]
pub struct DragTracker {
    last: Option<(u16, u16)>,
}

impl DragTracker {
    pub fn start(&mut self, column: u16, row: u16) {
        self.last = Some((column, row));
    }

    /// Movement since the previous position, in cells. `None` unless a drag
    /// is in progress.
    pub fn drag(&mut self, column: u16, row: u16) -> Option<Vector2<f64>> {
        let (last_col, last_row) = self.last.replace((column, row))?;
        Some(Vector2::new(
            column as f64 - last_col as f64,
            row as f64 - last_row as f64,
        ))
    }

    pub fn stop(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }
}

// =============================================================================
// DRAWING
// =============================================================================

/// Parses `#RRGGBB` (an alpha suffix is ignored).
pub fn parse_color(css: &str) -> Color {
    let hex = css.trim_start_matches('#');
    let channel = |i: usize| hex.get(i..i + 2).and_then(|h| u8::from_str_radix(h, 16).ok());
    match (hex.len(), channel(0), channel(2), channel(4)) {
        (6 | 8, Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

/// Maps canvas pixels onto a terminal area without distorting the aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Canvas pixels per terminal cell
    pub cell: Vector2<f64>,
    /// Visible canvas extent
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn fit(canvas_width: f64, canvas_height: f64, area: Rect) -> Self {
        let cols = f64::from(area.width.max(1));
        let rows = f64::from(area.height.max(1));
        let scale = (canvas_width / (cols * CELL_PX.0)).max(canvas_height / (rows * CELL_PX.1));
        let cell = Vector2::new(CELL_PX.0 * scale, CELL_PX.1 * scale);
        Self {
            cell,
            width: cols * cell.x,
            height: rows * cell.y,
        }
    }

    /// Canvas delta for a pointer movement in cells.
    pub fn to_canvas(&self, cells: Vector2<f64>) -> Vector2<f64> {
        cells.component_mul(&self.cell)
    }
}

/// What the terminal needs from the viewer for one paint.
struct Snapshot {
    commands: Vec<DrawCommand>,
    width: f64,
    height: f64,
    zoom: f64,
}

fn paint(f: &mut Frame, area: Rect, snapshot: &Snapshot, viewport: Viewport) {
    let top = viewport.height;
    let cell_w = viewport.cell.x;
    let widget = CanvasWidget::default()
        .block(Block::default().borders(Borders::ALL).title(" tafview "))
        .marker(Marker::Braille)
        .x_bounds([0.0, viewport.width])
        .y_bounds([0.0, viewport.height])
        .paint(|ctx| {
            for command in &snapshot.commands {
                match command {
                    DrawCommand::Stroke { points, closed, color, .. } => {
                        let color = parse_color(color);
                        let close = closed.then(|| points.first()).flatten();
                        let ends = points.iter().skip(1).chain(close);
                        for (a, b) in points.iter().zip(ends) {
                            ctx.draw(&Segment::new(a.x, top - a.y, b.x, top - b.y, color));
                        }
                    }
                    DrawCommand::Text { text, at, color, align, .. } => {
                        let span = cell_w * text.chars().count() as f64;
                        let x = match align {
                            TextAlign::Left => at.x,
                            TextAlign::Center => at.x - span / 2.0,
                            TextAlign::Right => at.x - span,
                        };
                        let style = Style::default().fg(parse_color(color));
                        ctx.print(x.max(0.0), top - at.y, Line::styled(text.clone(), style));
                    }
                    // Braille cells cannot show translucent fills.
                    DrawCommand::Fill { .. } | DrawCommand::Clear => {}
                }
            }
        });
    f.render_widget(widget, area);
}

fn footer(status: &PlaybackStatus, zoom: f64) -> Paragraph<'static> {
    let state = match status.state {
        PlaybackState::Idle => ("IDLE", Color::DarkGray),
        PlaybackState::Running => ("PLAY", Color::Green),
        PlaybackState::Paused => ("PAUSE", Color::Yellow),
    };
    Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                format!(" {} ", state.0),
                Style::default().fg(state.1).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {status}  x{:.3}  zoom {zoom:.2}", status.speed)),
        ]),
        Line::from(Span::styled(
            " space play/pause  +/- speed  [/] zoom  drag/arrows pan  o heading  l labels  0-9 seek  q quit",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::TOP))
}

// =============================================================================
// APPLICATION
// =============================================================================

/// Interactive player session.
pub struct TerminalApp<Ctx: ReplayContext> {
    player: Player<Ctx, RecordingCanvas>,
    runtime: Handle,
    drag: DragTracker,
    viewport: Viewport,
    show_orientation: bool,
    show_labels: bool,
}

impl<Ctx: ReplayContext> TerminalApp<Ctx> {
    pub fn new(player: Player<Ctx, RecordingCanvas>, runtime: Handle) -> Self {
        let options = player.with_viewer(|v| v.options());
        Self {
            player,
            runtime,
            drag: DragTracker::default(),
            viewport: Viewport::fit(1.0, 1.0, Rect::new(0, 0, 1, 1)),
            show_orientation: options.show_orientation,
            show_labels: options.show_labels,
        }
    }

    /// Takes over the terminal until the user quits.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.start();
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        let status = self.player.subscribe();
        loop {
            let current = status.borrow().clone();
            terminal.draw(|f| self.ui(f, &current))?;

            if !event::poll(INPUT_POLL)? {
                continue;
            }
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = Action::from_key(key.code) {
                        if action == Action::Quit {
                            info!("quit requested");
                            return Ok(());
                        }
                        self.apply(action, current.total);
                    }
                }
                Event::Mouse(mouse) => self.on_mouse(mouse),
                _ => {}
            }
        }
    }

    fn ui(&mut self, f: &mut Frame, status: &PlaybackStatus) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(f.area());

        let snapshot = self.player.with_viewer(|v| Snapshot {
            commands: v.canvas().commands().to_vec(),
            width: v.canvas().width(),
            height: v.canvas().height(),
            zoom: v.projection().view().zoom,
        });
        let inner = Block::default().borders(Borders::ALL).inner(chunks[0]);
        self.viewport = Viewport::fit(snapshot.width, snapshot.height, inner);

        paint(f, chunks[0], &snapshot, self.viewport);
        f.render_widget(footer(status, snapshot.zoom), chunks[1]);
    }

    /// Spawns a playback loop; a second one is a no-op inside the player.
    fn start(&self) {
        let player = self.player.clone();
        self.runtime.spawn(async move {
            let outcome = player.run().await;
            debug!(?outcome, "playback loop ended");
        });
    }

    fn apply(&mut self, action: Action, total: usize) {
        match action {
            Action::PlayPause => {
                if self.player.state() == PlaybackState::Idle {
                    self.start();
                } else {
                    self.player.toggle();
                }
            }
            Action::Faster | Action::Slower => {
                let speed = step_speed(self.player.speed(), action == Action::Faster);
                if let Err(e) = self.player.set_speed(speed) {
                    warn!(error = %e, "speed change rejected");
                }
            }
            Action::ZoomIn => {
                self.player.adjust_zoom(-WHEEL_STEP);
            }
            Action::ZoomOut => {
                self.player.adjust_zoom(WHEEL_STEP);
            }
            Action::Pan(delta) => {
                self.player.adjust_offset(delta);
            }
            Action::ToggleOrientation => {
                self.show_orientation = !self.show_orientation;
                self.player.set_show_orientation(self.show_orientation);
            }
            Action::ToggleLabels => {
                self.show_labels = !self.show_labels;
                self.player.set_show_labels(self.show_labels);
            }
            Action::SeekDecile(decile) => self.player.seek(decile_index(decile, total)),
            Action::Quit => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                self.player.adjust_zoom(-WHEEL_STEP);
            }
            MouseEventKind::ScrollDown => {
                self.player.adjust_zoom(WHEEL_STEP);
            }
            MouseEventKind::Down(MouseButton::Left) => self.drag.start(mouse.column, mouse.row),
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(cells) = self.drag.drag(mouse.column, mouse.row) {
                    self.player.adjust_offset(self.viewport.to_canvas(cells));
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.drag.stop(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_key_bindings() {
        assert_eq!(Action::from_key(KeyCode::Char(' ')), Some(Action::PlayPause));
        assert_eq!(Action::from_key(KeyCode::Char('7')), Some(Action::SeekDecile(7)));
        assert_eq!(Action::from_key(KeyCode::Esc), Some(Action::Quit));
        assert_eq!(
            Action::from_key(KeyCode::Left),
            Some(Action::Pan(Vector2::new(PAN_STEP_PX, 0.0)))
        );
        assert_eq!(Action::from_key(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_decile_index() {
        assert_eq!(decile_index(0, 50), 0);
        assert_eq!(decile_index(5, 50), 25);
        assert_eq!(decile_index(9, 50), 45);
        assert_eq!(decile_index(9, 3), 2);
        assert_eq!(decile_index(3, 0), 0);
    }

    #[test]
    fn test_speed_ladder_is_clamped() {
        assert_eq!(step_speed(1.0, true), 2.0);
        assert_eq!(step_speed(1.0, false), 0.5);
        assert_eq!(step_speed(MAX_SPEED, true), MAX_SPEED);
        assert_eq!(step_speed(MIN_SPEED, false), MIN_SPEED);
    }

    #[test]
    fn test_drag_tracker() {
        let mut drag = DragTracker::default();
        assert_eq!(drag.drag(3, 3), None);

        drag.start(10, 5);
        assert!(drag.is_dragging());
        assert_eq!(drag.drag(12, 4), Some(Vector2::new(2.0, -1.0)));
        assert_eq!(drag.drag(12, 6), Some(Vector2::new(0.0, 2.0)));

        drag.stop();
        assert!(!drag.is_dragging());
        assert_eq!(drag.drag(20, 20), None);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#4FC3F7"), Color::Rgb(0x4f, 0xc3, 0xf7));
        assert_eq!(parse_color("#BA68C866"), Color::Rgb(0xba, 0x68, 0xc8));
        assert_eq!(parse_color("#fff"), Color::White);
        assert_eq!(parse_color("tomato"), Color::White);
    }

    #[test]
    fn test_viewport_keeps_aspect() {
        // 80x20 cells at 8x16 px is 640x320; an 800x200 canvas is width-bound.
        let vp = Viewport::fit(800.0, 200.0, Rect::new(0, 0, 80, 20));
        assert_relative_eq!(vp.width, 800.0);
        assert_relative_eq!(vp.height, 400.0);
        assert_relative_eq!(vp.cell.x / vp.cell.y, 0.5);

        let delta = vp.to_canvas(Vector2::new(2.0, 1.0));
        assert_relative_eq!(delta.x, 20.0);
        assert_relative_eq!(delta.y, 20.0);
    }
}
