use crate::error::{AnnotateError, Result};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use ttf_parser::Face;

/// Pixel extent of one line of label text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the line box to the baseline.
    pub ascent: f32,
}

pub trait TextMeasure {
    fn measure(&self, text: &str) -> Result<TextExtent>;
}

impl<F> TextMeasure for F
where
    F: Fn(&str) -> Result<TextExtent>,
{
    fn measure(&self, text: &str) -> Result<TextExtent> {
        self(text)
    }
}

/// Metrics read from a real font face resolved through the system font
/// database.
pub struct FontMetrics {
    face: FontFace,
    font_size: f32,
}

impl FontMetrics {
    pub fn from_system(font_family: &str, font_size: f32) -> Result<Self> {
        if font_size <= 0.0 || !font_size.is_finite() {
            return Err(AnnotateError::Measurement(format!(
                "invalid font size {font_size}"
            )));
        }
        let mut db = Database::new();
        db.load_system_fonts();
        let face = load_face(&db, font_family).ok_or_else(|| {
            AnnotateError::Measurement(format!("no usable font face for '{font_family}'"))
        })?;
        log::debug!(
            "loaded font face for '{}' ({} units/em)",
            font_family,
            face.units_per_em
        );
        Ok(Self { face, font_size })
    }

    pub fn from_font_data(data: Vec<u8>, index: u32, font_size: f32) -> Result<Self> {
        let face = FontFace::parse(data, index)
            .ok_or_else(|| AnnotateError::Measurement("font data could not be parsed".into()))?;
        Ok(Self { face, font_size })
    }

    /// Raw font bytes, so the rasterizer can draw with the face that was
    /// measured.
    pub fn font_data(&self) -> &[u8] {
        &self.face.data
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str) -> Result<TextExtent> {
        let scale = self.font_size / self.face.units_per_em as f32;
        let width = self
            .face
            .measure_width(text, self.font_size)
            .ok_or_else(|| AnnotateError::Measurement("font face no longer parses".into()))?;
        Ok(TextExtent {
            width,
            height: (self.face.ascender - self.face.descender) as f32 * scale,
            ascent: self.face.ascender as f32 * scale,
        })
    }
}

/// Font-free metrics from calibrated per-character width factors.
#[derive(Debug, Clone, Copy)]
pub struct ApproxMetrics {
    pub font_size: f32,
    pub line_height: f32,
}

impl ApproxMetrics {
    pub fn new(font_size: f32) -> Self {
        Self {
            font_size,
            line_height: 1.2,
        }
    }
}

impl TextMeasure for ApproxMetrics {
    fn measure(&self, text: &str) -> Result<TextExtent> {
        if self.font_size <= 0.0 || !self.font_size.is_finite() {
            return Err(AnnotateError::Measurement(format!(
                "invalid font size {}",
                self.font_size
            )));
        }
        let height = self.font_size * self.line_height;
        Ok(TextExtent {
            width: text.chars().map(char_width_factor).sum::<f32>() * self.font_size,
            height,
            ascent: height * 0.8,
        })
    }
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        '-' => 0.358,
        'A' | 'K' | 'X' | 'V' | 'Y' => 0.652,
        'B' | 'R' | 'S' | 'P' => 0.633,
        'C' | 'D' | 'G' | 'H' | 'N' | 'O' | 'Q' | 'U' => 0.742,
        'E' | 'F' | 'L' | 'T' | 'Z' => 0.590,
        'I' => 0.272,
        'J' => 0.557,
        'M' => 0.903,
        'W' => 0.958,
        'f' | 'r' | 't' => 0.340,
        'i' | 'j' | 'l' => 0.235,
        'm' => 0.867,
        'w' => 0.811,
        'a'..='z' => 0.570,
        '0'..='9' => 0.600,
        '@' | '#' | '%' | '&' => 0.946,
        _ => 0.568,
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    ascii_advances: [u16; 128],
}

impl FontFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let ascender = face.ascender();
        let descender = face.descender();
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        drop(face);
        Some(Self {
            data,
            index,
            units_per_em,
            ascender,
            descender,
            ascii_advances,
        })
    }

    fn measure_width(&self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;

        if text.is_ascii() {
            let width = text
                .bytes()
                .filter(|byte| *byte != b'\n')
                .map(|byte| match self.ascii_advances[byte as usize] {
                    0 => fallback,
                    advance => advance as f32 * scale,
                })
                .sum::<f32>();
            return Some(width.max(0.0));
        }

        let face = Face::parse(&self.data, self.index).ok()?;
        let mut width = 0.0f32;
        for ch in text.chars().filter(|ch| *ch != '\n') {
            match face.glyph_index(ch) {
                Some(glyph) => {
                    width += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
                }
                None => width += fallback,
            }
        }
        Some(width.max(0.0))
    }
}

fn load_face(db: &Database, font_family: &str) -> Option<FontFace> {
    let names: Vec<&str> = font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .filter(|part| !part.is_empty())
        .collect();

    let mut families: Vec<Family<'_>> = names
        .iter()
        .map(|&name| match name.to_ascii_lowercase().as_str() {
            "serif" => Family::Serif,
            "sans-serif" | "system-ui" | "ui-sans-serif" => Family::SansSerif,
            "monospace" | "ui-monospace" => Family::Monospace,
            "cursive" => Family::Cursive,
            "fantasy" => Family::Fantasy,
            _ => Family::Name(name),
        })
        .collect();
    if families.is_empty() {
        families.push(Family::SansSerif);
    }

    let query = Query {
        families: &families,
        weight: Weight::NORMAL,
        stretch: Stretch::Normal,
        style: Style::Normal,
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| FontFace::parse(data.to_vec(), index))
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_width_scales_with_font_size() {
        let small = ApproxMetrics::new(10.0).measure("Vulpes").expect("measure");
        let large = ApproxMetrics::new(20.0).measure("Vulpes").expect("measure");
        assert!((large.width - small.width * 2.0).abs() < 0.01);
        assert!((large.height - small.height * 2.0).abs() < 0.01);
    }

    #[test]
    fn approx_empty_text_keeps_line_height() {
        let extent = ApproxMetrics::new(12.0).measure("").expect("measure");
        assert_eq!(extent.width, 0.0);
        assert!(extent.height > 0.0);
        assert!(extent.ascent < extent.height);
    }

    #[test]
    fn approx_rejects_non_positive_font_size() {
        let err = ApproxMetrics::new(0.0).measure("x").unwrap_err();
        assert!(matches!(err, AnnotateError::Measurement(_)));
    }

    #[test]
    fn char_width_factor_returns_positive_values() {
        for ch in ['a', 'Z', ' ', '0', '@', ':', '\u{4e2d}'] {
            assert!(char_width_factor(ch) > 0.0, "char {:?} has zero width", ch);
        }
    }

    #[test]
    fn closures_act_as_measurers() {
        let fixed = |text: &str| -> Result<TextExtent> {
            Ok(TextExtent {
                width: text.len() as f32,
                height: 6.0,
                ascent: 5.0,
            })
        };
        let extent = fixed.measure("abcd").expect("measure");
        assert_eq!(extent.width, 4.0);
    }

    #[test]
    fn garbage_font_data_is_a_measurement_error() {
        let err = FontMetrics::from_font_data(vec![0, 1, 2, 3], 0, 12.0)
            .err()
            .expect("garbage must not parse");
        assert!(matches!(err, AnnotateError::Measurement(_)));
    }
}
