//! SassScript colors.

use std::fmt;

use cssparser::{Parser, Token};

use crate::error::*;
use crate::number::units_equal;
use crate::parsers::Parse;

/// An RGBA color.
///
/// Colors are stored as 8-bit RGB channels plus a floating-point alpha.
/// HSL-constructed colors are converted on construction; the HSL channels
/// can be read back through [`Color::hue`], [`Color::saturation`] and
/// [`Color::lightness`].  Equality compares the normalized RGB channels, so
/// an HSL color and the RGB color it denotes are equal.
#[derive(Debug, Clone)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f64,
}

impl Color {
    pub fn new(red: u8, green: u8, blue: u8, alpha: f64) -> Color {
        Color {
            red,
            green,
            blue,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn rgb(red: u8, green: u8, blue: u8) -> Color {
        Color::new(red, green, blue, 1.0)
    }

    /// Constructs a color from HSL channels: hue in degrees, saturation and
    /// lightness in `0..=1`.
    pub fn from_hsla(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Color {
        let hue = hue.rem_euclid(360.0) / 360.0;
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);

        if saturation == 0.0 {
            let gray = channel(lightness);
            return Color::new(gray, gray, gray, alpha);
        }

        // CSS Color 3, §4.2.4.
        let m2 = if lightness <= 0.5 {
            lightness * (saturation + 1.0)
        } else {
            lightness + saturation - lightness * saturation
        };
        let m1 = lightness * 2.0 - m2;

        Color::new(
            channel(hue_to_rgb(m1, m2, hue + 1.0 / 3.0)),
            channel(hue_to_rgb(m1, m2, hue)),
            channel(hue_to_rgb(m1, m2, hue - 1.0 / 3.0)),
            alpha,
        )
    }

    /// The hue of this color, in degrees.
    pub fn hue(&self) -> f64 {
        let (r, g, b) = self.scaled_rgb();
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        if delta == 0.0 {
            0.0
        } else if max == r {
            (60.0 * (g - b) / delta).rem_euclid(360.0)
        } else if max == g {
            (120.0 + 60.0 * (b - r) / delta).rem_euclid(360.0)
        } else {
            (240.0 + 60.0 * (r - g) / delta).rem_euclid(360.0)
        }
    }

    /// The saturation of this color, in `0..=1`.
    pub fn saturation(&self) -> f64 {
        let (r, g, b) = self.scaled_rgb();
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        if delta == 0.0 {
            0.0
        } else {
            let lightness = (max + min) / 2.0;
            if lightness < 0.5 {
                delta / (max + min)
            } else {
                delta / (2.0 - max - min)
            }
        }
    }

    /// The lightness of this color, in `0..=1`.
    pub fn lightness(&self) -> f64 {
        let (r, g, b) = self.scaled_rgb();
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        (max + min) / 2.0
    }

    pub fn with_red(&self, red: u8) -> Color {
        Color::new(red, self.green, self.blue, self.alpha)
    }

    pub fn with_green(&self, green: u8) -> Color {
        Color::new(self.red, green, self.blue, self.alpha)
    }

    pub fn with_blue(&self, blue: u8) -> Color {
        Color::new(self.red, self.green, blue, self.alpha)
    }

    pub fn with_alpha(&self, alpha: f64) -> Color {
        Color::new(self.red, self.green, self.blue, alpha)
    }

    /// Changes HSL channels, keeping the others.
    pub fn with_hsl(
        &self,
        hue: Option<f64>,
        saturation: Option<f64>,
        lightness: Option<f64>,
    ) -> Color {
        Color::from_hsla(
            hue.unwrap_or_else(|| self.hue()),
            saturation.unwrap_or_else(|| self.saturation()),
            lightness.unwrap_or_else(|| self.lightness()),
            self.alpha,
        )
    }

    fn scaled_rgb(&self) -> (f64, f64, f64) {
        (
            f64::from(self.red) / 255.0,
            f64::from(self.green) / 255.0,
            f64::from(self.blue) / 255.0,
        )
    }
}

fn hue_to_rgb(m1: f64, m2: f64, mut hue: f64) -> f64 {
    if hue < 0.0 {
        hue += 1.0;
    }
    if hue > 1.0 {
        hue -= 1.0;
    }

    if hue * 6.0 < 1.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue * 2.0 < 1.0 {
        m2
    } else if hue * 3.0 < 2.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

fn channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

impl PartialEq for Color {
    fn eq(&self, other: &Color) -> bool {
        self.red == other.red
            && self.green == other.green
            && self.blue == other.blue
            && units_equal(self.alpha, other.alpha)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if units_equal(self.alpha, 1.0) {
            write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        } else {
            write!(
                f,
                "rgba({}, {}, {}, {})",
                self.red, self.green, self.blue, self.alpha
            )
        }
    }
}

impl Parse for Color {
    /// Parses hex colors; this is what tests use to construct colors
    /// tersely.  The full color syntax lives in the surface parser.
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Color, ParseError<'i>> {
        let token = parser.next()?.clone();

        match token {
            Token::IDHash(ref hex) | Token::Hash(ref hex) => {
                parse_hex(hex.as_ref()).ok_or_else(|| {
                    parser.new_custom_error(ValueErrorKind::parse_error("invalid hex color"))
                })
            }

            _ => Err(parser.new_unexpected_token_error(token)),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Color::rgb(
            digit(0)? * 0x11,
            digit(1)? * 0x11,
            digit(2)? * 0x11,
        )),
        4 => Some(Color::new(
            digit(0)? * 0x11,
            digit(1)? * 0x11,
            digit(2)? * 0x11,
            f64::from(digit(3)? * 0x11) / 255.0,
        )),
        6 => Some(Color::rgb(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Color::new(
            pair(0)?,
            pair(2)?,
            pair(4)?,
            f64::from(pair(6)?) / 255.0,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex() {
        assert_eq!(Color::parse_str("#ff0000").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::parse_str("#f00").unwrap(), Color::rgb(255, 0, 0));
        assert!(Color::parse_str("#ff00xx").is_err());
    }

    #[test]
    fn hsl_round_trip() {
        let red = Color::from_hsla(0.0, 1.0, 0.5, 1.0);
        assert_eq!(red, Color::rgb(255, 0, 0));
        assert_eq!(red.hue(), 0.0);
        assert_eq!(red.saturation(), 1.0);
        assert_eq!(red.lightness(), 0.5);

        let teal = Color::from_hsla(180.0, 0.5, 0.4, 1.0);
        assert_eq!(teal, Color::rgb(51, 153, 153));
    }

    #[test]
    fn hsl_equals_rgb() {
        assert_eq!(
            Color::from_hsla(120.0, 1.0, 0.25, 1.0),
            Color::rgb(0, 128, 0)
        );
    }

    #[test]
    fn channel_changers() {
        let c = Color::rgb(10, 20, 30);
        assert_eq!(c.with_red(99), Color::rgb(99, 20, 30));
        assert_eq!(c.with_alpha(0.5).alpha, 0.5);
        assert_eq!(c.with_alpha(7.0).alpha, 1.0);
    }
}
