use crate::error::{CaptureError, Result};
use crate::types::{Frame, HandLandmarks};

const LANDMARK_COLOR: u32 = 0x0000_FF00;
const REVIEW_BORDER_COLOR: u32 = 0x00FF_D700;

/// Live preview window with the tracked hand drawn on top.
pub struct PreviewWindow {
    window: minifb::Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl PreviewWindow {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = minifb::Window::new(
            title,
            width,
            height,
            minifb::WindowOptions {
                resize: true,
                ..minifb::WindowOptions::default()
            },
        )
        .map_err(|e| CaptureError::Frame(format!("failed to create window: {}", e)))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(minifb::Key::Escape)
    }

    fn draw_point(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.buffer[y * self.width + x] = color;
        }
    }

    fn draw_border(&mut self, color: u32, thickness: usize) {
        for y in 0..self.height {
            for x in 0..self.width {
                let edge = x < thickness
                    || y < thickness
                    || x + thickness >= self.width
                    || y + thickness >= self.height;
                if edge {
                    self.buffer[y * self.width + x] = color;
                }
            }
        }
    }

    /// Shows `frame`, the hand landmarks if any, and a border while reviewing.
    pub fn show(&mut self, frame: &Frame, hand: Option<&HandLandmarks>, reviewing: bool) -> Result<()> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
        }
        self.buffer.resize(self.width * self.height, 0);

        for (i, pixel) in frame.pixels().enumerate() {
            let r = pixel[0] as u32;
            let g = pixel[1] as u32;
            let b = pixel[2] as u32;
            self.buffer[i] = (r << 16) | (g << 8) | b;
        }

        if let Some(hand) = hand {
            for point in hand.points() {
                // Landmarks are normalized; scale to pixels and draw 3x3 dots
                let px = (point.x * self.width as f32) as usize;
                let py = (point.y * self.height as f32) as usize;
                for dx in 0..3 {
                    for dy in 0..3 {
                        self.draw_point(px + dx, py + dy, LANDMARK_COLOR);
                    }
                }
            }
        }

        if reviewing {
            self.draw_border(REVIEW_BORDER_COLOR, 6);
        }

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| CaptureError::Frame(format!("window update failed: {}", e)))
    }
}
