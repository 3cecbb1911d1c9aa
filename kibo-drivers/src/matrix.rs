//! Expression matrix renderer
//!
//! An 8×8 RGB grid showing the robot's "eyes": two filled circles whose
//! color and vertical placement encode the current expression. Pixels
//! are stored unscaled; the global brightness multiplies in only when a
//! frame is serialized for the LED bus, so changing brightness never
//! degrades stored color data.
//!
//! The bus write is one batched GRB byte stream per refresh, gated by a
//! dirty flag so an unchanged face costs nothing.

use kibo_core::config::MatrixConfig;
use kibo_core::traits::{ExpressionSink, LedBus};

/// Grid edge length in pixels
pub const MATRIX_SIZE: usize = 8;

/// Eye geometry shared by every preset
const LEFT_EYE_X: i32 = 2;
const RIGHT_EYE_X: i32 = 5;
const EYE_RADIUS: i32 = 2;

/// Number of defined expression presets (ids 0x00 to 0x0F)
pub const EXPRESSION_COUNT: usize = 16;

// Expression ids. The first five are the canonical faces of the
// interaction states; the rest are host-selectable moods.
pub const EXPR_SLEEP: u8 = 0x00;
pub const EXPR_WAKE: u8 = 0x01;
pub const EXPR_LISTEN: u8 = 0x02;
pub const EXPR_THINK: u8 = 0x03;
pub const EXPR_TALK: u8 = 0x04;
pub const EXPR_HAPPY: u8 = 0x05;
pub const EXPR_SAD: u8 = 0x06;
pub const EXPR_SURPRISED: u8 = 0x07;
pub const EXPR_CONFUSED: u8 = 0x08;
pub const EXPR_CURIOUS: u8 = 0x09;
pub const EXPR_SHY: u8 = 0x0A;
pub const EXPR_ANGRY: u8 = 0x0B;
pub const EXPR_LOVE: u8 = 0x0C;
pub const EXPR_TIRED: u8 = 0x0D;
pub const EXPR_EXCITED: u8 = 0x0E;
pub const EXPR_BLANK: u8 = 0x0F;

/// Eye preset: vertical center and color
#[derive(Debug, Clone, Copy)]
struct EyePreset {
    y: i32,
    color: (u8, u8, u8),
}

/// Preset table indexed by expression id. Colors and placements match
/// the hardware peer's expectations (the host previews them).
const PRESETS: [EyePreset; EXPRESSION_COUNT] = [
    EyePreset { y: 4, color: (50, 50, 50) },    // sleep: dim gray
    EyePreset { y: 4, color: (0, 255, 0) },     // wake: green
    EyePreset { y: 4, color: (0, 150, 255) },   // listen: cyan-blue
    EyePreset { y: 3, color: (255, 200, 0) },   // think: amber, raised
    EyePreset { y: 4, color: (255, 100, 100) }, // talk: warm red
    EyePreset { y: 4, color: (255, 255, 0) },   // happy: yellow
    EyePreset { y: 5, color: (0, 0, 255) },     // sad: blue, lowered
    EyePreset { y: 3, color: (255, 255, 255) }, // surprised: white, raised
    EyePreset { y: 4, color: (255, 165, 0) },   // confused: orange
    EyePreset { y: 4, color: (255, 255, 150) }, // curious: pale yellow
    EyePreset { y: 5, color: (255, 182, 193) }, // shy: pink, lowered
    EyePreset { y: 4, color: (255, 0, 0) },     // angry: red
    EyePreset { y: 4, color: (255, 105, 180) }, // love: hot pink
    EyePreset { y: 4, color: (128, 128, 128) }, // tired: gray
    EyePreset { y: 3, color: (255, 0, 255) },   // excited: magenta, raised
    EyePreset { y: 4, color: (200, 200, 200) }, // blank: pale
];

/// Fallback for unrecognized ids: neutral white pair
const FALLBACK: EyePreset = EyePreset {
    y: 4,
    color: (255, 255, 255),
};

/// Colors used by the per-eye override path: closed (dim gray) or the
/// default active color. Deliberately narrower than the preset table.
const EYE_CLOSED: (u8, u8, u8) = (50, 50, 50);
const EYE_ACTIVE: (u8, u8, u8) = (0, 150, 255);

/// The expression matrix and its renderer
pub struct ExpressionMatrix<B: LedBus> {
    pixels: [[(u8, u8, u8); MATRIX_SIZE]; MATRIX_SIZE],
    brightness: u8,
    bus: B,
    dirty: bool,
}

impl<B: LedBus> ExpressionMatrix<B> {
    pub fn new(config: MatrixConfig, bus: B) -> Self {
        Self {
            pixels: [[(0, 0, 0); MATRIX_SIZE]; MATRIX_SIZE],
            brightness: config.brightness,
            bus,
            dirty: true,
        }
    }

    /// Set one pixel's unscaled color. Out-of-range coordinates are a
    /// no-op.
    pub fn set_pixel(&mut self, x: usize, y: usize, r: u8, g: u8, b: u8) {
        if x < MATRIX_SIZE && y < MATRIX_SIZE {
            self.pixels[x][y] = (r, g, b);
            self.dirty = true;
        }
    }

    /// Read one pixel's unscaled color. Out-of-range returns None.
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        if x < MATRIX_SIZE && y < MATRIX_SIZE {
            Some(self.pixels[x][y])
        } else {
            None
        }
    }

    /// Black out the grid
    pub fn clear(&mut self) {
        self.pixels = [[(0, 0, 0); MATRIX_SIZE]; MATRIX_SIZE];
        self.dirty = true;
    }

    /// Flood the grid with one color
    pub fn fill(&mut self, r: u8, g: u8, b: u8) {
        self.pixels = [[(r, g, b); MATRIX_SIZE]; MATRIX_SIZE];
        self.dirty = true;
    }

    /// Set the global brightness (0-255), applied at write time
    pub fn set_brightness(&mut self, brightness: u8) {
        if self.brightness != brightness {
            self.brightness = brightness;
            self.dirty = true;
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Draw a filled circle, clipped to the grid
    pub fn draw_eye(&mut self, center_x: i32, center_y: i32, radius: i32, color: (u8, u8, u8)) {
        for x in center_x - radius..=center_x + radius {
            for y in center_y - radius..=center_y + radius {
                if x < 0 || x >= MATRIX_SIZE as i32 || y < 0 || y >= MATRIX_SIZE as i32 {
                    continue;
                }
                let dx = x - center_x;
                let dy = y - center_y;
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(x as usize, y as usize, color.0, color.1, color.2);
                }
            }
        }
    }

    /// Render a full expression: both eyes from the preset table.
    pub fn set_expression(&mut self, id: u8) {
        let preset = PRESETS.get(id as usize).copied().unwrap_or(FALLBACK);

        self.clear();
        self.draw_eye(LEFT_EYE_X, preset.y, EYE_RADIUS, preset.color);
        self.draw_eye(RIGHT_EYE_X, preset.y, EYE_RADIUS, preset.color);
        self.flush();
    }

    /// Per-eye override for asymmetric faces (winking). 0 renders the
    /// eye closed; anything else the default active color.
    pub fn set_eyes(&mut self, left: u8, right: u8) {
        self.clear();
        let left_color = if left == 0 { EYE_CLOSED } else { EYE_ACTIVE };
        let right_color = if right == 0 { EYE_CLOSED } else { EYE_ACTIVE };
        self.draw_eye(LEFT_EYE_X, 4, EYE_RADIUS, left_color);
        self.draw_eye(RIGHT_EYE_X, 4, EYE_RADIUS, right_color);
        self.flush();
    }

    /// Push the grid to the LED bus if anything changed since the last
    /// flush. Called once per control-loop tick and after draws.
    pub fn refresh(&mut self) {
        if self.dirty {
            self.flush();
        }
    }

    /// Serialize the grid (brightness-scaled, GRB order) and write it to
    /// the bus in one batch.
    fn flush(&mut self) {
        let mut frame = [0u8; MATRIX_SIZE * MATRIX_SIZE * 3];
        let brightness = self.brightness as u16;

        let mut i = 0;
        for x in 0..MATRIX_SIZE {
            for y in 0..MATRIX_SIZE {
                let (r, g, b) = self.pixels[x][y];
                frame[i] = ((g as u16 * brightness) / 255) as u8;
                frame[i + 1] = ((r as u16 * brightness) / 255) as u8;
                frame[i + 2] = ((b as u16 * brightness) / 255) as u8;
                i += 3;
            }
        }

        self.bus.write(&frame);
        self.dirty = false;
    }
}

impl<B: LedBus> ExpressionSink for ExpressionMatrix<B> {
    fn show_expression(&mut self, expression: u8) {
        self.set_expression(expression);
    }
}
