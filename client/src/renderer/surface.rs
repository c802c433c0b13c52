use crate::viewport::ScreenPoint;

/// A 2D drawing target. The subset of canvas operations the map needs.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> (f64, f64);

    /// Called once before each frame is painted.
    fn begin_frame(&mut self) {}

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);

    fn polyline(&mut self, points: &[ScreenPoint], color: &str, width: f64);

    fn fill_circle(&mut self, center: ScreenPoint, radius: f64, color: &str);

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f64, color: &str, width: f64);

    fn fill_text(&mut self, text: &str, at: ScreenPoint, color: &str, font_px: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
    },
    Polyline {
        points: Vec<ScreenPoint>,
        color: String,
        width: f64,
    },
    FillCircle {
        center: ScreenPoint,
        radius: f64,
        color: String,
    },
    StrokeCircle {
        center: ScreenPoint,
        radius: f64,
        color: String,
        width: f64,
    },
    Text {
        text: String,
        at: ScreenPoint,
        color: String,
        font_px: f64,
    },
}

/// Surface that records commands instead of rasterising them. Used by the
/// headless runner and in tests.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    width: f64,
    height: f64,
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drain the recorded commands.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }
}

impl Surface for CommandRecorder {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// A recorder holds one frame at a time.
    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            w,
            h,
            color: color.to_string(),
        });
    }

    fn polyline(&mut self, points: &[ScreenPoint], color: &str, width: f64) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            color: color.to_string(),
            width,
        });
    }

    fn fill_circle(&mut self, center: ScreenPoint, radius: f64, color: &str) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color: color.to_string(),
        });
    }

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f64, color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius,
            color: color.to_string(),
            width,
        });
    }

    fn fill_text(&mut self, text: &str, at: ScreenPoint, color: &str, font_px: f64) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            color: color.to_string(),
            font_px,
        });
    }
}
