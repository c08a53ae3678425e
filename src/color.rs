//! RGB colors and the per-fan color grid pushed to the hardware.

use serde::{Deserialize, Serialize};

/// 8-bit RGB color.
///
/// Serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend, `ratio` 0.0 yields `self` and 1.0 yields `other`.
    pub fn lerp(self, other: Color, ratio: f32) -> Color {
        let ratio = ratio.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * ratio).round() as u8;
        Color::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }

    /// Byte order expected by the LIGHT command.
    pub fn grb(self) -> [u8; 3] {
        [self.g, self.r, self.b]
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

/// Colors indexed by `[controller][fan]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorBuffer {
    cells: Vec<Vec<Color>>,
}

impl ColorBuffer {
    /// All-black buffer, one row per controller with `shape[c]` fans.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            cells: shape.iter().map(|&fans| vec![Color::BLACK; fans]).collect(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.cells.iter().map(Vec::len).collect()
    }

    pub fn get(&self, controller: usize, fan: usize) -> Option<Color> {
        self.cells.get(controller)?.get(fan).copied()
    }

    /// Writes one cell. Returns `false` if the address is out of range.
    pub fn set(&mut self, controller: usize, fan: usize, color: Color) -> bool {
        match self.cells.get_mut(controller).and_then(|row| row.get_mut(fan)) {
            Some(cell) => {
                *cell = color;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, color: Color) {
        self.cells.iter_mut().flatten().for_each(|cell| *cell = color);
    }

    /// Iterates `(controller, fan, color)` in address order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Color)> + '_ {
        self.cells.iter().enumerate().flat_map(|(c, row)| {
            row.iter()
                .enumerate()
                .map(move |(f, color)| (c, f, *color))
        })
    }

    /// `Some(color)` when every cell holds the same color.
    pub fn uniform_color(&self) -> Option<Color> {
        let mut cells = self.cells.iter().flatten();
        let first = *cells.next()?;
        cells.all(|c| *c == first).then_some(first)
    }
}
