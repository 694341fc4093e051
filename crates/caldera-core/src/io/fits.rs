//! Minimal FITS support: a single primary HDU holding a 2-D image.
//!
//! Headers are sequences of 80-byte ASCII cards terminated by `END` and
//! padded to 2880-byte blocks. Pixel data is big-endian, also block padded.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::consts::{FITS_BLOCK_SIZE, FITS_CARD_SIZE};
use crate::error::{CalderaError, Result};

/// Value of a header card.
#[derive(Clone, Debug, PartialEq)]
pub enum FitsValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FitsValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Logical(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FitsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// Ordered list of header cards (keyword, value, comment).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, FitsValue, Option<String>)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card, replacing any existing card with the same keyword.
    pub fn set(&mut self, key: &str, value: FitsValue, comment: Option<&str>) {
        let key = key.to_ascii_uppercase();
        let comment = comment.map(str::to_string);
        if let Some(card) = self.cards.iter_mut().find(|c| c.0 == key) {
            card.1 = value;
            card.2 = comment;
        } else {
            self.cards.push((key, value, comment));
        }
    }

    pub fn get(&self, key: &str) -> Option<&FitsValue> {
        self.cards
            .iter()
            .find(|c| c.0.eq_ignore_ascii_case(key))
            .map(|c| &c.1)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FitsValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FitsValue::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FitsValue::as_str)
    }

    /// First of `keys` that is present as a number.
    pub fn first_f64(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.get_f64(k))
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(|c| c.0.as_str())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// A decoded primary image.
#[derive(Clone, Debug)]
pub struct FitsImage {
    pub header: FitsHeader,
    /// Physical values (BSCALE/BZERO applied), shape = (NAXIS2, NAXIS1)
    pub data: Array2<f32>,
    pub bitpix: i32,
}

impl FitsImage {
    /// Native bit depth implied by BITPIX.
    pub fn bit_depth(&self) -> u8 {
        self.bitpix.unsigned_abs() as u8
    }
}

/// Read the primary HDU of a FITS file.
pub fn read_fits(path: &Path) -> Result<FitsImage> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    decode(&mmap)
}

/// Read only the primary header of a FITS file.
pub fn read_fits_header(path: &Path) -> Result<FitsHeader> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let (header, _) = parse_header(&mmap)?;
    Ok(header)
}

/// Decode an in-memory FITS file.
pub fn decode(bytes: &[u8]) -> Result<FitsImage> {
    let (header, data_offset) = parse_header(bytes)?;

    let bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| CalderaError::InvalidFits("missing BITPIX".into()))? as i32;
    let naxis = header.get_i64("NAXIS").unwrap_or(0);
    if naxis < 2 {
        return Err(CalderaError::InvalidFits(format!(
            "expected a 2-D image, NAXIS = {naxis}"
        )));
    }
    for axis in 3..=naxis {
        let len = header.get_i64(&format!("NAXIS{axis}")).unwrap_or(1);
        if len != 1 {
            return Err(CalderaError::InvalidFits(format!(
                "only single-plane images are supported, NAXIS{axis} = {len}"
            )));
        }
    }

    let width = axis_len(&header, 1)?;
    let height = axis_len(&header, 2)?;
    let bytes_per_pixel = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => {
            return Err(CalderaError::InvalidFits(format!(
                "unsupported BITPIX {other}"
            )))
        }
    };

    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| CalderaError::InvalidFits("image dimensions overflow".into()))?;
    let data_end = pixel_count
        .checked_mul(bytes_per_pixel)
        .and_then(|len| len.checked_add(data_offset))
        .ok_or_else(|| CalderaError::InvalidFits("image dimensions overflow".into()))?;
    if bytes.len() < data_end {
        return Err(CalderaError::InvalidFits(format!(
            "file truncated: expected at least {data_end} bytes, got {}",
            bytes.len()
        )));
    }

    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);
    let raw = &bytes[data_offset..data_end];

    let pixels: Vec<f32> = raw
        .chunks_exact(bytes_per_pixel)
        .map(|b| {
            let v = match bitpix {
                8 => b[0] as f64,
                16 => BigEndian::read_i16(b) as f64,
                32 => BigEndian::read_i32(b) as f64,
                64 => BigEndian::read_i64(b) as f64,
                -32 => BigEndian::read_f32(b) as f64,
                _ => BigEndian::read_f64(b),
            };
            (bzero + bscale * v) as f32
        })
        .collect();

    let data = Array2::from_shape_vec((height, width), pixels)
        .map_err(|e| CalderaError::InvalidFits(e.to_string()))?;

    Ok(FitsImage {
        header,
        data,
        bitpix,
    })
}

fn axis_len(header: &FitsHeader, axis: usize) -> Result<usize> {
    let key = format!("NAXIS{axis}");
    match header.get_i64(&key) {
        Some(n) if n > 0 => Ok(n as usize),
        Some(n) => Err(CalderaError::InvalidFits(format!("{key} = {n}"))),
        None => Err(CalderaError::InvalidFits(format!("missing {key}"))),
    }
}

/// Parse header cards up to `END`. Returns the header and the byte offset of
/// the data unit.
fn parse_header(bytes: &[u8]) -> Result<(FitsHeader, usize)> {
    if bytes.len() < FITS_BLOCK_SIZE || !bytes.starts_with(b"SIMPLE") {
        return Err(CalderaError::InvalidFits("missing SIMPLE card".into()));
    }

    let mut header = FitsHeader::new();
    let mut offset = 0;
    loop {
        let card = bytes
            .get(offset..offset + FITS_CARD_SIZE)
            .ok_or_else(|| CalderaError::InvalidFits("header has no END card".into()))?;
        offset += FITS_CARD_SIZE;

        let key = String::from_utf8_lossy(&card[..8]).trim().to_string();
        if key == "END" {
            break;
        }
        if key.is_empty() || &card[8..10] != b"= " {
            // COMMENT, HISTORY and blank cards carry no value
            continue;
        }
        let text = String::from_utf8_lossy(&card[10..]);
        if let Some(value) = parse_value(&text) {
            header.cards.push((key, value, None));
        }
    }

    let data_offset = offset.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE;
    Ok((header, data_offset))
}

fn parse_value(text: &str) -> Option<FitsValue> {
    let text = text.trim_start();
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return Some(FitsValue::Text(out.trim_end().to_string()));
    }

    let value = text.split('/').next().unwrap_or("").trim();
    match value {
        "" => None,
        "T" => Some(FitsValue::Logical(true)),
        "F" => Some(FitsValue::Logical(false)),
        v => {
            if let Ok(i) = v.parse::<i64>() {
                Some(FitsValue::Integer(i))
            } else {
                v.replace(['D', 'd'], "E")
                    .parse::<f64>()
                    .ok()
                    .map(FitsValue::Float)
            }
        }
    }
}

/// Encode `data` as a 32-bit float primary HDU. `extra` cards follow the
/// mandatory ones.
pub fn encode(data: &Array2<f32>, extra: &FitsHeader, w: &mut dyn Write) -> Result<()> {
    let (h, wd) = data.dim();

    let mut cards: Vec<String> = vec![
        format_card("SIMPLE", &FitsValue::Logical(true), Some("conforms to FITS standard")),
        format_card("BITPIX", &FitsValue::Integer(-32), Some("32-bit IEEE float")),
        format_card("NAXIS", &FitsValue::Integer(2), None),
        format_card("NAXIS1", &FitsValue::Integer(wd as i64), Some("width")),
        format_card("NAXIS2", &FitsValue::Integer(h as i64), Some("height")),
    ];
    for (key, value, comment) in &extra.cards {
        if is_structural_key(key) {
            continue;
        }
        cards.push(format_card(key, value, comment.as_deref()));
    }
    cards.push(format!("{:<80}", "END"));

    let mut header_bytes = 0;
    for card in &cards {
        w.write_all(card.as_bytes())?;
        header_bytes += FITS_CARD_SIZE;
    }
    write_padding(w, header_bytes, b' ')?;

    for &v in data.iter() {
        w.write_f32::<BigEndian>(v)?;
    }
    write_padding(w, data.len() * 4, 0)?;
    Ok(())
}

/// Write `data` and `extra` cards to a FITS file at `path`.
pub fn write_fits(path: &Path, data: &Array2<f32>, extra: &FitsHeader) -> Result<()> {
    crate::io::atomic::write_atomic(path, |w| encode(data, extra, w))
}

fn is_structural_key(key: &str) -> bool {
    matches!(key, "SIMPLE" | "BITPIX" | "NAXIS" | "END" | "BSCALE" | "BZERO" | "EXTEND")
        || key.starts_with("NAXIS")
}

fn write_padding(w: &mut dyn Write, written: usize, fill: u8) -> Result<()> {
    let rem = written % FITS_BLOCK_SIZE;
    if rem != 0 {
        w.write_all(&vec![fill; FITS_BLOCK_SIZE - rem])?;
    }
    Ok(())
}

fn format_card(key: &str, value: &FitsValue, comment: Option<&str>) -> String {
    let value_str = match value {
        FitsValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        FitsValue::Integer(i) => format!("{i:>20}"),
        FitsValue::Float(f) => format!("{:>20}", format_float(*f)),
        FitsValue::Text(s) => {
            let escaped: String = s
                .chars()
                .filter(|c| c.is_ascii() && !c.is_ascii_control())
                .collect::<String>()
                .replace('\'', "''");
            format!("'{escaped:<8}'")
        }
    };
    let mut card = format!("{:<8}= {}", &key[..key.len().min(8)], value_str);
    if let Some(c) = comment {
        card.push_str(" / ");
        card.push_str(c);
    }
    card.truncate(FITS_CARD_SIZE);
    format!("{card:<80}")
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f:E}")
    }
}
