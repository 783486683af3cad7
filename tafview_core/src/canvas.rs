//! 2D drawing surface used by the renderer.
//!
//! [`Canvas`] mirrors the subset of an HTML-style 2D context the renderer
//! needs: path building, stroke/fill, and text. Pixel coordinates have their
//! origin in the top-left corner with Y pointing down.

use nalgebra::Point2;

/// Horizontal anchor for [`Canvas::fill_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Drawing surface with a mutable pixel size.
pub trait Canvas {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn set_width(&mut self, width: f64);

    /// Wipes every pixel.
    fn clear(&mut self);

    fn set_stroke_style(&mut self, color: &str);
    fn set_fill_style(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: TextAlign);

    fn begin_path(&mut self);
    fn move_to(&mut self, p: Point2<f64>);
    fn line_to(&mut self, p: Point2<f64>);
    fn close_path(&mut self);
    fn stroke(&mut self);
    fn fill(&mut self);

    /// Rendered width of `text` in the current font.
    fn measure_text(&self, text: &str) -> f64;
    fn fill_text(&mut self, text: &str, at: Point2<f64>);
}

/// One paint operation captured by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Stroke {
        points: Vec<Point2<f64>>,
        closed: bool,
        color: String,
        line_width: f64,
    },
    Fill {
        points: Vec<Point2<f64>>,
        color: String,
    },
    Text {
        text: String,
        at: Point2<f64>,
        color: String,
        font: String,
        align: TextAlign,
    },
}

/// Canvas that records paint operations instead of rasterizing them.
///
/// `commands()` is what is currently "on screen" (everything since the last
/// clear). With history enabled, every command including clears is also kept
/// in call order.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f64,
    height: f64,
    stroke_style: String,
    fill_style: String,
    line_width: f64,
    font: String,
    text_align: TextAlign,
    path: Vec<Point2<f64>>,
    path_closed: bool,
    commands: Vec<DrawCommand>,
    history: Option<Vec<DrawCommand>>,
}

impl RecordingCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            stroke_style: "#000000".to_string(),
            fill_style: "#000000".to_string(),
            line_width: 1.0,
            font: "10px mono".to_string(),
            text_align: TextAlign::Left,
            path: Vec::new(),
            path_closed: false,
            commands: Vec::new(),
            history: None,
        }
    }

    /// Also keeps every command ever issued.
    pub fn with_history(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    /// Commands painted since the last clear.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Every command issued, if history is enabled.
    pub fn history(&self) -> Option<&[DrawCommand]> {
        self.history.as_deref()
    }

    /// Text strings currently on screen.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, command: DrawCommand) {
        if let Some(history) = self.history.as_mut() {
            history.push(command.clone());
        }
        if command != DrawCommand::Clear {
            self.commands.push(command);
        }
    }
}

/// Pixel size parsed from a CSS-like font string ("bold 12px mono").
fn font_size(font: &str) -> f64 {
    font.split_whitespace()
        .find_map(|tok| tok.strip_suffix("px").and_then(|n| n.parse().ok()))
        .unwrap_or(10.0)
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.push(DrawCommand::Clear);
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.stroke_style = color.to_string();
    }

    fn set_fill_style(&mut self, color: &str) {
        self.fill_style = color.to_string();
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn set_font(&mut self, font: &str) {
        self.font = font.to_string();
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.text_align = align;
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.path_closed = false;
    }

    fn move_to(&mut self, p: Point2<f64>) {
        self.path.push(p);
    }

    fn line_to(&mut self, p: Point2<f64>) {
        self.path.push(p);
    }

    fn close_path(&mut self) {
        self.path_closed = true;
    }

    fn stroke(&mut self) {
        let command = DrawCommand::Stroke {
            points: self.path.clone(),
            closed: self.path_closed,
            color: self.stroke_style.clone(),
            line_width: self.line_width,
        };
        self.push(command);
    }

    fn fill(&mut self) {
        let command = DrawCommand::Fill {
            points: self.path.clone(),
            color: self.fill_style.clone(),
        };
        self.push(command);
    }

    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64 * font_size(&self.font) * 0.6
    }

    fn fill_text(&mut self, text: &str, at: Point2<f64>) {
        let command = DrawCommand::Text {
            text: text.to_string(),
            at,
            color: self.fill_style.clone(),
            font: self.font.clone(),
            align: self.text_align,
        };
        self.push(command);
    }
}
