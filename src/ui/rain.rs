//! Falling-character background
//!
//! Every tick the whole field is faded a little towards the background, then
//! each column draws one glyph at its cursor and the cursor moves down a row.
//! Cursors past the bottom edge restart at the top only with a small
//! probability, so columns drift out of step with each other.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RainConfig;

/// Below this a cell is treated as background
const VISIBLE_THRESHOLD: f32 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainCell {
    pub glyph: char,
    /// 1.0 when just drawn, decaying towards 0.0
    pub intensity: f32,
}

impl Default for RainCell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            intensity: 0.0,
        }
    }
}

impl RainCell {
    pub fn is_visible(&self) -> bool {
        self.intensity >= VISIBLE_THRESHOLD
    }
}

pub struct RainField {
    width: u16,
    height: u16,
    spacing: u16,
    /// Row cursor per column
    drops: Vec<u32>,
    cells: Vec<RainCell>,
    glyphs: Vec<char>,
    reset_probability: f64,
    fade: f32,
    rng: StdRng,
}

impl RainField {
    pub fn new(width: u16, height: u16, config: &RainConfig) -> Self {
        Self::with_rng(width, height, config, StdRng::from_entropy())
    }

    pub fn with_rng(width: u16, height: u16, config: &RainConfig, rng: StdRng) -> Self {
        let mut field = Self {
            width: 0,
            height: 0,
            spacing: config.column_spacing.max(1),
            drops: Vec::new(),
            cells: Vec::new(),
            glyphs: config.glyphs(),
            reset_probability: config.reset_probability(),
            fade: config.fade(),
            rng,
        };
        field.resize(width, height);
        field
    }

    /// Recompute columns for a new surface size; every cursor restarts at the top
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let columns = (width as usize).div_ceil(self.spacing as usize);
        self.drops = vec![0; columns];
        self.cells = vec![RainCell::default(); width as usize * height as usize];
    }

    pub fn columns(&self) -> usize {
        self.drops.len()
    }

    pub fn drops(&self) -> &[u32] {
        &self.drops
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&RainCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y as usize * self.width as usize + x as usize)
    }

    /// Advance one frame
    pub fn tick(&mut self) {
        let keep = 1.0 - self.fade;
        for cell in &mut self.cells {
            cell.intensity *= keep;
            if cell.intensity < VISIBLE_THRESHOLD {
                cell.intensity = 0.0;
            }
        }

        for i in 0..self.drops.len() {
            let row = self.drops[i];
            let x = i * self.spacing as usize;
            if row < self.height as u32 && x < self.width as usize {
                let glyph = self.glyphs[self.rng.gen_range(0..self.glyphs.len())];
                let idx = row as usize * self.width as usize + x;
                self.cells[idx] = RainCell {
                    glyph,
                    intensity: 1.0,
                };
            }

            self.drops[i] = if row >= self.height as u32 && self.rng.gen_bool(self.reset_probability) {
                0
            } else {
                row.saturating_add(1)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(width: u16, height: u16, seed: u64) -> RainField {
        RainField::with_rng(width, height, &RainConfig::default(), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_column_count_follows_width() {
        let mut rain = field(80, 24, 1);
        assert_eq!(rain.columns(), 40);

        rain.resize(81, 10);
        assert_eq!(rain.columns(), 41);
        assert!(rain.drops().iter().all(|&d| d == 0));
        assert_eq!(rain.size(), (81, 10));
    }

    #[test]
    fn test_tick_draws_then_fades() {
        let mut rain = field(4, 5, 7);
        rain.tick();
        let head = *rain.cell(0, 0).unwrap();
        assert_eq!(head.intensity, 1.0);
        assert_ne!(head.glyph, ' ');
        // odd columns are gaps
        assert!(!rain.cell(1, 0).unwrap().is_visible());
        assert_eq!(rain.drops(), &[1, 1]);

        rain.tick();
        let trail = rain.cell(0, 0).unwrap();
        assert!(trail.intensity < 1.0 && trail.is_visible());
        assert_eq!(trail.glyph, head.glyph);
        assert_eq!(rain.cell(0, 1).unwrap().intensity, 1.0);
    }

    #[test]
    fn test_trail_eventually_vanishes() {
        let mut rain = field(2, 200, 3);
        rain.tick();
        for _ in 0..120 {
            rain.tick();
        }
        assert!(!rain.cell(0, 0).unwrap().is_visible());
    }

    #[test]
    fn test_cursor_keeps_falling_until_reset() {
        let mut rain = field(2, 3, 11);
        for _ in 0..3 {
            rain.tick();
        }
        assert_eq!(rain.drops()[0], 3);
        // past the edge: either reset or one more row
        rain.tick();
        assert!(matches!(rain.drops()[0], 0 | 4));
    }

    #[test]
    fn test_reset_rate_matches_probability() {
        let height = 10u32;
        let mut rain = field(400, height as u16, 42);
        let p = RainConfig::default().reset_probability();

        let mut past_edge = 0usize;
        let mut resets = 0usize;
        for _ in 0..2_000 {
            let before: Vec<u32> = rain.drops().to_vec();
            rain.tick();
            for (old, new) in before.iter().zip(rain.drops()) {
                if *old >= height {
                    past_edge += 1;
                    if *new == 0 {
                        resets += 1;
                    } else {
                        assert_eq!(*new, old + 1);
                    }
                } else {
                    assert_eq!(*new, old + 1);
                }
            }
        }

        let rate = resets as f64 / past_edge as f64;
        assert!((rate - p).abs() < 0.005, "observed reset rate {rate}");
    }

    #[test]
    fn test_columns_fall_out_of_step() {
        let mut rain = field(100, 10, 5);
        for _ in 0..400 {
            rain.tick();
        }
        let first = rain.drops()[0];
        assert!(rain.drops().iter().any(|&d| d != first));
    }
}
