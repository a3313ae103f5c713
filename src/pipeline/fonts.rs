//! Metrics for the two base-14 fonts used by the PDF renderer.
//!
//! Widths are in 1/1000 em, taken from the Adobe Core14 AFM files. Only the
//! printable ASCII range varies enough to matter for line breaking; the
//! upper half of WinAnsi uses the average lowercase advance.

/// A base-14 font the PDF renderer can place text in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseFont {
    Helvetica,
    Courier,
}

impl BaseFont {
    /// PostScript name written into the font dictionary.
    pub fn postscript_name(self) -> &'static str {
        match self {
            BaseFont::Helvetica => "Helvetica",
            BaseFont::Courier => "Courier",
        }
    }

    /// Resource name used in content streams (`/F1 10 Tf`).
    pub fn resource_name(self) -> &'static str {
        match self {
            BaseFont::Helvetica => "F1",
            BaseFont::Courier => "F2",
        }
    }

    /// Advance width of one WinAnsi byte, in 1/1000 em.
    pub fn glyph_width(self, byte: u8) -> u16 {
        match self {
            BaseFont::Courier => COURIER_WIDTH,
            BaseFont::Helvetica => match byte {
                0x20..=0x7E => HELVETICA_ASCII[(byte - 0x20) as usize],
                0xA0 => 278,
                _ => 556,
            },
        }
    }

    /// Width of `bytes` set at `size` points.
    pub fn text_width(self, bytes: &[u8], size: f32) -> f32 {
        let units: u32 = bytes.iter().map(|&b| u32::from(self.glyph_width(b))).sum();
        units as f32 * size / 1000.0
    }
}

const COURIER_WIDTH: u16 = 600;

/// Helvetica advances for 0x20 (space) through 0x7E (`~`).
#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ␠ ! " # $ % & ' ( ) * + , - . /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0-9 : ; < = > ?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @ A-O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P-Z [ \ ] ^ _
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // ` a-o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p-z { | } ~
];
