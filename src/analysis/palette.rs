//! Chart color assignment.
//!
//! Slices take colors from an ordered palette running dark to light. When
//! there are more slices than palette entries the palette is stretched by
//! interpolating between neighbouring entries.

use crate::models::{ChartSlice, ColoredSlice};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base palette, darkest first.
pub const BASE_PALETTE: [&str; 6] = [
    "#2A1E5C", "#433770", "#645C82", "#8D8698", "#B6B0B8", "#D8D4D8",
];

/// Neutral gray for the unfunded remainder.
pub const UNFUNDED_COLOR: &str = "#E5E5E5";

#[derive(Debug, Error, PartialEq)]
pub enum PaletteError {
    #[error("Invalid color '{0}': expected #RRGGBB")]
    InvalidHex(String),
    #[error("Palette must contain at least one color")]
    Empty,
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Channel-wise linear interpolation; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 * (1.0 - t) + b as f64 * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl FromStr for Rgb {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PaletteError::InvalidHex(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A validated palette plus the color reserved for the unfunded remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    base: Vec<Rgb>,
    unfunded: Rgb,
}

impl Palette {
    /// Build a palette from hex strings.
    pub fn new<S: AsRef<str>>(base: &[S], unfunded: &str) -> Result<Self, PaletteError> {
        if base.is_empty() {
            return Err(PaletteError::Empty);
        }

        let base = base
            .iter()
            .map(|c| c.as_ref().parse())
            .collect::<Result<Vec<Rgb>, _>>()?;

        Ok(Self {
            base,
            unfunded: unfunded.parse()?,
        })
    }

    /// Generate `count` colors progressing from darkest to lightest.
    pub fn generate(&self, count: usize) -> Vec<Rgb> {
        let base = &self.base;
        if count <= base.len() {
            return base[..count].to_vec();
        }

        let last = (base.len() - 1) as f64;
        (0..count)
            .map(|i| {
                let position = i as f64 / (count - 1) as f64 * last;
                let lower = position.floor() as usize;
                let upper = position.ceil() as usize;

                if lower == upper {
                    base[lower]
                } else {
                    base[lower].lerp(base[upper], position - lower as f64)
                }
            })
            .collect()
    }

    /// Pair each slice with its color.
    ///
    /// Colors are generated for the full slice count; the unfunded remainder
    /// always gets the neutral color instead of its palette position.
    pub fn assign(&self, slices: &[ChartSlice]) -> Vec<ColoredSlice> {
        let colors = self.generate(slices.len());

        slices
            .iter()
            .zip(colors)
            .map(|(slice, color)| {
                let color = if slice.is_unattributed_remainder {
                    self.unfunded
                } else {
                    color
                };
                ColoredSlice {
                    slice: slice.clone(),
                    color: color.to_string(),
                }
            })
            .collect()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(&BASE_PALETTE[..], UNFUNDED_COLOR).expect("built-in palette is valid")
    }
}
