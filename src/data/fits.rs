use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use super::model::HeaderValue;

// ---------------------------------------------------------------------------
// Minimal FITS primary-HDU reader / writer
// ---------------------------------------------------------------------------
//
// A FITS file is a sequence of 2880-byte blocks. The primary header is a run
// of 80-character ASCII cards terminated by `END`, padded to a block boundary,
// followed by the data array stored big-endian. Only the primary HDU is read;
// extensions are ignored.

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;
const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;
/// Largest NAXIS the standard allows.
const MAX_NAXIS: i64 = 999;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a FITS file: first card is '{0}'")]
    NotFits(String),

    #[error("missing header keyword {0}")]
    MissingKeyword(String),

    #[error("unsupported BITPIX {0}")]
    UnsupportedBitpix(i64),

    #[error("invalid axis length {name} = {value}")]
    InvalidAxis { name: String, value: i64 },

    #[error("data array of shape {0:?} does not fit in memory")]
    TooLarge(Vec<usize>),

    #[error("data array truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}

/// Header cards in file order, indexed by keyword.
#[derive(Debug, Clone, Default)]
pub struct FitsHeader {
    cards: BTreeMap<String, HeaderValue>,
    order: Vec<String>,
}

impl FitsHeader {
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    /// Keywords in the order they appeared.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, key: String, value: HeaderValue) {
        if self.cards.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }

    fn required_i64(&self, key: &str) -> Result<i64, FitsError> {
        self.get_i64(key)
            .ok_or_else(|| FitsError::MissingKeyword(key.to_string()))
    }
}

/// Primary header plus its data array decoded to host-order `f64`.
#[derive(Debug, Clone)]
pub struct PrimaryHdu {
    pub header: FitsHeader,
    /// Axis lengths, `NAXIS1` first (the fastest varying axis).
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl PrimaryHdu {
    /// Row `i` of a 2-D array (a run of `NAXIS1` values).
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        let width = *self.shape.first()?;
        if width == 0 {
            return None;
        }
        self.data.chunks(width).nth(i)
    }

    /// Number of rows of a 2-D array (`NAXIS2`).
    pub fn n_rows(&self) -> usize {
        match self.shape.len() {
            0 => 0,
            1 => 1,
            _ => self.shape[1],
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub fn read_primary_hdu(path: &Path) -> Result<PrimaryHdu, FitsError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_primary_hdu_from(&mut reader)
}

pub fn read_primary_hdu_from<R: Read>(reader: &mut R) -> Result<PrimaryHdu, FitsError> {
    let header = read_header(reader)?;

    let bitpix = header.required_i64("BITPIX")?;
    let naxis = header.required_i64("NAXIS")?;
    if !(0..=MAX_NAXIS).contains(&naxis) {
        return Err(FitsError::InvalidAxis {
            name: "NAXIS".into(),
            value: naxis,
        });
    }

    let mut shape = Vec::with_capacity(naxis as usize);
    for n in 1..=naxis {
        let name = format!("NAXIS{n}");
        let len = header.required_i64(&name)?;
        if len < 0 {
            return Err(FitsError::InvalidAxis { name, value: len });
        }
        shape.push(len as usize);
    }

    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);

    let mut data = read_data(reader, bitpix, &shape)?;
    if bscale != 1.0 || bzero != 0.0 {
        for v in &mut data {
            *v = *v * bscale + bzero;
        }
    }

    Ok(PrimaryHdu { header, shape, data })
}

fn read_header<R: Read>(reader: &mut R) -> Result<FitsHeader, FitsError> {
    let mut header = FitsHeader::default();
    let mut card = [0u8; CARD_SIZE];
    let mut n_cards = 0usize;

    loop {
        reader.read_exact(&mut card)?;
        n_cards += 1;
        let text = String::from_utf8_lossy(&card);

        if n_cards == 1 && !text.starts_with("SIMPLE") {
            return Err(FitsError::NotFits(text.trim_end().to_string()));
        }

        let keyword = text.get(..8).unwrap_or("").trim();
        if keyword == "END" {
            break;
        }
        if let Some((key, value)) = parse_card(&text) {
            header.insert(key, value);
        }
    }

    // Skip the remaining cards of the last header block.
    let remainder = n_cards % CARDS_PER_BLOCK;
    if remainder != 0 {
        let mut skip = vec![0u8; (CARDS_PER_BLOCK - remainder) * CARD_SIZE];
        reader.read_exact(&mut skip)?;
    }

    Ok(header)
}

/// Parse a `KEYWORD = value / comment` card. Commentary cards yield `None`.
fn parse_card(card: &str) -> Option<(String, HeaderValue)> {
    let keyword = card.get(..8)?.trim();
    if keyword.is_empty() || card.get(8..10) != Some("= ") {
        return None;
    }
    let value = parse_value(card.get(10..).unwrap_or(""));
    Some((keyword.to_string(), value))
}

fn parse_value(raw: &str) -> HeaderValue {
    let s = raw.trim_start();

    // Quoted string; a doubled quote is an escaped quote.
    if let Some(rest) = s.strip_prefix('\'') {
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
        return HeaderValue::String(out.trim_end().to_string());
    }

    let value = match s.find('/') {
        Some(idx) => s[..idx].trim(),
        None => s.trim(),
    };

    match value {
        "" => HeaderValue::Null,
        "T" => HeaderValue::Bool(true),
        "F" => HeaderValue::Bool(false),
        _ => {
            if let Ok(i) = value.parse::<i64>() {
                HeaderValue::Integer(i)
            } else if let Ok(f) = value.replace(['D', 'd'], "E").parse::<f64>() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::String(value.to_string())
            }
        }
    }
}

/// Decode the big-endian samples of an array of `shape` into host-order `f64`.
///
/// The raw bytes are read before any sample buffer is allocated, so a header
/// claiming more data than the stream holds fails with `Truncated`.
fn read_data<R: Read>(reader: &mut R, bitpix: i64, shape: &[usize]) -> Result<Vec<f64>, FitsError> {
    let width = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => return Err(FitsError::UnsupportedBitpix(other)),
    };
    let count = if shape.is_empty() {
        Some(0)
    } else {
        shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))
    };
    let (count, expected) = count
        .and_then(|c| c.checked_mul(width).map(|bytes| (c, bytes)))
        .ok_or_else(|| FitsError::TooLarge(shape.to_vec()))?;

    let mut bytes = Vec::new();
    reader.by_ref().take(expected as u64).read_to_end(&mut bytes)?;
    if bytes.len() < expected {
        return Err(FitsError::Truncated {
            expected,
            found: bytes.len(),
        });
    }

    let mut reader = bytes.as_slice();
    let data = match bitpix {
        8 => bytes.iter().copied().map(f64::from).collect(),
        16 => {
            let mut buf = vec![0i16; count];
            reader.read_i16_into::<BigEndian>(&mut buf)?;
            buf.into_iter().map(f64::from).collect()
        }
        32 => {
            let mut buf = vec![0i32; count];
            reader.read_i32_into::<BigEndian>(&mut buf)?;
            buf.into_iter().map(f64::from).collect()
        }
        64 => {
            let mut buf = vec![0i64; count];
            reader.read_i64_into::<BigEndian>(&mut buf)?;
            buf.into_iter().map(|v| v as f64).collect()
        }
        -32 => {
            let mut buf = vec![0f32; count];
            reader.read_f32_into::<BigEndian>(&mut buf)?;
            buf.into_iter().map(f64::from).collect()
        }
        -64 => {
            let mut buf = vec![0f64; count];
            reader.read_f64_into::<BigEndian>(&mut buf)?;
            buf
        }
        other => return Err(FitsError::UnsupportedBitpix(other)),
    };
    Ok(data)
}

// ---------------------------------------------------------------------------
// Writing (BITPIX = -64 only)
// ---------------------------------------------------------------------------

/// Write a primary HDU holding `data` as big-endian doubles.
///
/// `cards` are appended after the mandatory SIMPLE/BITPIX/NAXIS cards.
pub fn write_primary_hdu(
    path: &Path,
    cards: &[(&str, HeaderValue)],
    shape: &[usize],
    data: &[f64],
) -> Result<(), FitsError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_primary_hdu_to(&mut writer, cards, shape, data)?;
    writer.flush()?;
    Ok(())
}

pub fn write_primary_hdu_to<W: Write>(
    writer: &mut W,
    cards: &[(&str, HeaderValue)],
    shape: &[usize],
    data: &[f64],
) -> Result<(), FitsError> {
    let mut header = Vec::with_capacity(BLOCK_SIZE);
    push_card(&mut header, "SIMPLE", &HeaderValue::Bool(true));
    push_card(&mut header, "BITPIX", &HeaderValue::Integer(-64));
    push_card(&mut header, "NAXIS", &HeaderValue::Integer(shape.len() as i64));
    for (i, len) in shape.iter().enumerate() {
        push_card(
            &mut header,
            &format!("NAXIS{}", i + 1),
            &HeaderValue::Integer(*len as i64),
        );
    }
    for (key, value) in cards {
        push_card(&mut header, key, value);
    }
    header.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad_to_block(&mut header, b' ');
    writer.write_all(&header)?;

    for v in data {
        writer.write_f64::<BigEndian>(*v)?;
    }
    let written = data.len() * 8;
    let padding = (BLOCK_SIZE - written % BLOCK_SIZE) % BLOCK_SIZE;
    writer.write_all(&vec![0u8; padding])?;
    Ok(())
}

fn push_card(buf: &mut Vec<u8>, key: &str, value: &HeaderValue) {
    let value = match value {
        HeaderValue::String(s) => format!("'{:<8}'", s.replace('\'', "''")),
        HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        HeaderValue::Integer(i) => format!("{i:>20}"),
        HeaderValue::Float(f) => format!("{:>20}", format!("{f:E}")),
        HeaderValue::Null => String::new(),
    };
    let card = format!("{key:<8}= {value}");
    buf.extend_from_slice(format!("{card:<80.80}").as_bytes());
}

fn pad_to_block(buf: &mut Vec<u8>, fill: u8) {
    let padding = (BLOCK_SIZE - buf.len() % BLOCK_SIZE) % BLOCK_SIZE;
    buf.extend(std::iter::repeat(fill).take(padding));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_card(text: &str) -> Vec<u8> {
        format!("{text:<80}").into_bytes()
    }

    #[test]
    fn parses_card_values() {
        assert_eq!(parse_value(" 'Orion   '  / target"), HeaderValue::String("Orion".into()));
        assert_eq!(parse_value("'it''s'"), HeaderValue::String("it's".into()));
        assert_eq!(parse_value("                   T"), HeaderValue::Bool(true));
        assert_eq!(parse_value("  42 / answer"), HeaderValue::Integer(42));
        assert_eq!(parse_value(" 1.5D3"), HeaderValue::Float(1500.0));
        assert_eq!(parse_value(" -12.25 / deg"), HeaderValue::Float(-12.25));
        assert_eq!(parse_value("   "), HeaderValue::Null);
    }

    #[test]
    fn reads_big_endian_f32_with_scaling() {
        let mut bytes = Vec::new();
        for card in [
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    2",
            "NAXIS1  =                    3",
            "NAXIS2  =                    2",
            "BSCALE  =                  2.0",
            "OBJECT  = 'Mars    '",
            "COMMENT just a note",
            "END",
        ] {
            bytes.extend(raw_card(card));
        }
        pad_to_block(&mut bytes, b' ');
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        pad_to_block(&mut bytes, 0);

        let hdu = read_primary_hdu_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(hdu.shape, vec![3, 2]);
        assert_eq!(hdu.n_rows(), 2);
        assert_eq!(hdu.row(0).unwrap(), &[2.0, 4.0, 6.0]);
        assert_eq!(hdu.row(1).unwrap(), &[8.0, 10.0, 12.0]);
        assert_eq!(hdu.header.get_str("OBJECT"), Some("Mars"));
        assert!(hdu.header.get("COMMENT").is_none());
    }

    fn header_only(cards: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for card in cards.iter().chain(["END"].iter()) {
            bytes.extend(raw_card(card));
        }
        pad_to_block(&mut bytes, b' ');
        bytes
    }

    #[test]
    fn overflowing_axes_are_an_error() {
        let bytes = header_only(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =           8589934592",
            "NAXIS2  =           8589934592",
        ]);
        assert!(matches!(
            read_primary_hdu_from(&mut Cursor::new(bytes)),
            Err(FitsError::TooLarge(shape)) if shape == vec![8589934592, 8589934592]
        ));
    }

    #[test]
    fn too_many_axes_are_rejected() {
        let bytes = header_only(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =           1000000000",
        ]);
        assert!(matches!(
            read_primary_hdu_from(&mut Cursor::new(bytes)),
            Err(FitsError::InvalidAxis { value: 1000000000, .. })
        ));
    }

    #[test]
    fn data_larger_than_the_stream_is_truncated() {
        let mut bytes = header_only(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    1",
            "NAXIS1  =           1000000000",
        ]);
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        assert!(matches!(
            read_primary_hdu_from(&mut Cursor::new(bytes)),
            Err(FitsError::Truncated { expected: 8_000_000_000, found: 8 })
        ));
    }

    #[test]
    fn writer_output_reads_back() {
        let mut bytes = Vec::new();
        let cards = [
            ("OBJECT", HeaderValue::String("Jupiter".into())),
            ("TEMP_OUT", HeaderValue::Float(-41.5)),
        ];
        let data = [0.5, -1.25, 3.0, 7.75];
        write_primary_hdu_to(&mut bytes, &cards, &[2, 2], &data).unwrap();
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);

        let hdu = read_primary_hdu_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(hdu.data, data.to_vec());
        assert_eq!(hdu.header.get_str("OBJECT"), Some("Jupiter"));
        assert_eq!(hdu.header.get_f64("TEMP_OUT"), Some(-41.5));
        let keys: Vec<&str> = hdu.header.keys().collect();
        assert_eq!(keys[..3], ["SIMPLE", "BITPIX", "NAXIS"]);
    }

    #[test]
    fn rejects_non_fits_and_unknown_bitpix() {
        let err = read_primary_hdu_from(&mut Cursor::new(raw_card("HELLO"))).unwrap_err();
        assert!(matches!(err, FitsError::NotFits(_)));

        let mut bytes = Vec::new();
        for card in ["SIMPLE  =                    T", "BITPIX  =                   12", "NAXIS   =                    0", "END"] {
            bytes.extend(raw_card(card));
        }
        pad_to_block(&mut bytes, b' ');
        let err = read_primary_hdu_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FitsError::UnsupportedBitpix(12)));
    }
}
