//! Numeric value formats for characteristic values
//!
//! Format codes follow the Bluetooth characteristic presentation format
//! convention used by mobile GATT stacks: the high nibble is the family
//! (unsigned, signed, IEEE-11073 float) and the low nibble is the width in
//! bytes. All multi-byte values are little-endian.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use thiserror::Error;

/// Declared numeric format of a characteristic value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    Uint8,
    Uint16,
    Uint24,
    Uint32,
    Sint8,
    Sint16,
    Sint24,
    Sint32,
    /// IEEE-11073 16-bit SFLOAT: 4-bit exponent, 12-bit mantissa
    Sfloat,
    /// IEEE-11073 32-bit FLOAT: 8-bit exponent, 24-bit mantissa
    Float,
}

impl ValueFormat {
    pub const fn code(self) -> u8 {
        match self {
            ValueFormat::Uint8 => 0x11,
            ValueFormat::Uint16 => 0x12,
            ValueFormat::Uint24 => 0x13,
            ValueFormat::Uint32 => 0x14,
            ValueFormat::Sint8 => 0x21,
            ValueFormat::Sint16 => 0x22,
            ValueFormat::Sint24 => 0x23,
            ValueFormat::Sint32 => 0x24,
            ValueFormat::Sfloat => 0x32,
            ValueFormat::Float => 0x34,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let format = match code {
            0x11 => ValueFormat::Uint8,
            0x12 => ValueFormat::Uint16,
            0x13 => ValueFormat::Uint24,
            0x14 => ValueFormat::Uint32,
            0x21 => ValueFormat::Sint8,
            0x22 => ValueFormat::Sint16,
            0x23 => ValueFormat::Sint24,
            0x24 => ValueFormat::Sint32,
            0x32 => ValueFormat::Sfloat,
            0x34 => ValueFormat::Float,
            _ => return None,
        };
        Some(format)
    }

    /// Width of the encoded value in bytes.
    pub const fn width(self) -> usize {
        (self.code() & 0x0F) as usize
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ValueFormat::Sfloat | ValueFormat::Float)
    }

    /// Inclusive integer range, `None` for the float formats.
    pub const fn int_range(self) -> Option<(i64, i64)> {
        let range = match self {
            ValueFormat::Uint8 => (0, u8::MAX as i64),
            ValueFormat::Uint16 => (0, u16::MAX as i64),
            ValueFormat::Uint24 => (0, 0x00FF_FFFF),
            ValueFormat::Uint32 => (0, u32::MAX as i64),
            ValueFormat::Sint8 => (i8::MIN as i64, i8::MAX as i64),
            ValueFormat::Sint16 => (i16::MIN as i64, i16::MAX as i64),
            ValueFormat::Sint24 => (-0x0080_0000, 0x007F_FFFF),
            ValueFormat::Sint32 => (i32::MIN as i64, i32::MAX as i64),
            ValueFormat::Sfloat | ValueFormat::Float => return None,
        };
        Some(range)
    }

    /// Inclusive (mantissa, exponent) ranges, `None` for the integer formats.
    const fn float_ranges(self) -> Option<((i32, i32), (i8, i8))> {
        match self {
            ValueFormat::Sfloat => Some(((-2048, 2047), (-8, 7))),
            ValueFormat::Float => Some(((-0x0080_0000, 0x007F_FFFF), (i8::MIN, i8::MAX))),
            _ => None,
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueFormat::Uint8 => "uint8",
            ValueFormat::Uint16 => "uint16",
            ValueFormat::Uint24 => "uint24",
            ValueFormat::Uint32 => "uint32",
            ValueFormat::Sint8 => "sint8",
            ValueFormat::Sint16 => "sint16",
            ValueFormat::Sint24 => "sint24",
            ValueFormat::Sint32 => "sint32",
            ValueFormat::Sfloat => "sfloat",
            ValueFormat::Float => "float",
        };
        f.write_str(name)
    }
}

/// Failure to encode or decode a characteristic value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("{value} does not fit in {format}")]
    OutOfRange { value: i64, format: ValueFormat },

    #[error("{format} is {actual} bytes wide but the characteristic declares {expected}")]
    WidthMismatch {
        format: ValueFormat,
        expected: usize,
        actual: usize,
    },

    #[error("{0} cannot carry this kind of value")]
    UnsupportedFormat(ValueFormat),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encodes an integer in the given integer format.
pub fn encode_int(value: i64, format: ValueFormat) -> Result<Vec<u8>, EncodingError> {
    let (min, max) = format
        .int_range()
        .ok_or(EncodingError::UnsupportedFormat(format))?;
    if value < min || value > max {
        return Err(EncodingError::OutOfRange { value, format });
    }

    let mut buf = vec![0u8; format.width()];
    match format {
        ValueFormat::Uint8 => buf[0] = value as u8,
        ValueFormat::Sint8 => buf[0] = value as i8 as u8,
        ValueFormat::Uint16 => LittleEndian::write_u16(&mut buf, value as u16),
        ValueFormat::Sint16 => LittleEndian::write_i16(&mut buf, value as i16),
        ValueFormat::Uint24 => LittleEndian::write_u24(&mut buf, value as u32),
        ValueFormat::Sint24 => LittleEndian::write_i24(&mut buf, value as i32),
        ValueFormat::Uint32 => LittleEndian::write_u32(&mut buf, value as u32),
        ValueFormat::Sint32 => LittleEndian::write_i32(&mut buf, value as i32),
        ValueFormat::Sfloat | ValueFormat::Float => {
            return Err(EncodingError::UnsupportedFormat(format))
        }
    }
    Ok(buf)
}

/// Decodes an integer; `bytes` must be exactly `format.width()` long.
pub fn decode_int(bytes: &[u8], format: ValueFormat) -> Result<i64, EncodingError> {
    check_len(bytes, format)?;
    let value = match format {
        ValueFormat::Uint8 => bytes[0] as i64,
        ValueFormat::Sint8 => bytes[0] as i8 as i64,
        ValueFormat::Uint16 => LittleEndian::read_u16(bytes) as i64,
        ValueFormat::Sint16 => LittleEndian::read_i16(bytes) as i64,
        ValueFormat::Uint24 => LittleEndian::read_u24(bytes) as i64,
        ValueFormat::Sint24 => LittleEndian::read_i24(bytes) as i64,
        ValueFormat::Uint32 => LittleEndian::read_u32(bytes) as i64,
        ValueFormat::Sint32 => LittleEndian::read_i32(bytes) as i64,
        ValueFormat::Sfloat | ValueFormat::Float => {
            return Err(EncodingError::UnsupportedFormat(format))
        }
    };
    Ok(value)
}

/// Encodes `mantissa * 10^exponent` in an IEEE-11073 float format.
pub fn encode_float(mantissa: i32, exponent: i8, format: ValueFormat) -> Result<Vec<u8>, EncodingError> {
    let ((m_min, m_max), (e_min, e_max)) = format
        .float_ranges()
        .ok_or(EncodingError::UnsupportedFormat(format))?;
    if mantissa < m_min || mantissa > m_max {
        return Err(EncodingError::OutOfRange {
            value: mantissa as i64,
            format,
        });
    }
    if exponent < e_min || exponent > e_max {
        return Err(EncodingError::OutOfRange {
            value: exponent as i64,
            format,
        });
    }

    let mut buf = vec![0u8; format.width()];
    if format == ValueFormat::Sfloat {
        let raw = ((exponent as u16 & 0x000F) << 12) | (mantissa as u16 & 0x0FFF);
        LittleEndian::write_u16(&mut buf, raw);
    } else {
        let raw = ((exponent as u8 as u32) << 24) | (mantissa as u32 & 0x00FF_FFFF);
        LittleEndian::write_u32(&mut buf, raw);
    }
    Ok(buf)
}

/// Decodes an IEEE-11073 float into `(mantissa, exponent)`.
pub fn decode_float(bytes: &[u8], format: ValueFormat) -> Result<(i32, i8), EncodingError> {
    check_len(bytes, format)?;
    match format {
        ValueFormat::Sfloat => {
            let raw = LittleEndian::read_u16(bytes);
            let mantissa = sign_extend((raw & 0x0FFF) as u32, 12);
            let exponent = sign_extend((raw >> 12) as u32, 4) as i8;
            Ok((mantissa, exponent))
        }
        ValueFormat::Float => {
            let raw = LittleEndian::read_u32(bytes);
            let mantissa = sign_extend(raw & 0x00FF_FFFF, 24);
            let exponent = (raw >> 24) as u8 as i8;
            Ok((mantissa, exponent))
        }
        _ => Err(EncodingError::UnsupportedFormat(format)),
    }
}

fn check_len(bytes: &[u8], format: ValueFormat) -> Result<(), EncodingError> {
    if bytes.len() != format.width() {
        return Err(EncodingError::InvalidLength {
            expected: format.width(),
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT_FORMATS: [ValueFormat; 8] = [
        ValueFormat::Uint8,
        ValueFormat::Uint16,
        ValueFormat::Uint24,
        ValueFormat::Uint32,
        ValueFormat::Sint8,
        ValueFormat::Sint16,
        ValueFormat::Sint24,
        ValueFormat::Sint32,
    ];

    #[test]
    fn test_width_comes_from_code() {
        assert_eq!(ValueFormat::Uint8.width(), 1);
        assert_eq!(ValueFormat::Sint24.width(), 3);
        assert_eq!(ValueFormat::Sfloat.width(), 2);
        assert_eq!(ValueFormat::Float.width(), 4);
        for format in INT_FORMATS {
            assert_eq!(ValueFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(ValueFormat::from_code(0x15), None);
    }

    #[test]
    fn test_range_boundaries_round_trip() {
        for format in INT_FORMATS {
            let (min, max) = format.int_range().unwrap();
            for value in [min, max, (min + max) / 2] {
                let bytes = encode_int(value, format).unwrap();
                assert_eq!(bytes.len(), format.width());
                assert_eq!(decode_int(&bytes, format).unwrap(), value, "{format}");
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        for format in INT_FORMATS {
            let (min, max) = format.int_range().unwrap();
            assert_eq!(
                encode_int(max + 1, format),
                Err(EncodingError::OutOfRange { value: max + 1, format })
            );
            assert_eq!(
                encode_int(min - 1, format),
                Err(EncodingError::OutOfRange { value: min - 1, format })
            );
        }
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(encode_int(0x1234, ValueFormat::Uint16).unwrap(), vec![0x34, 0x12]);
        assert_eq!(encode_int(-2, ValueFormat::Sint16).unwrap(), vec![0xFE, 0xFF]);
        assert_eq!(
            encode_int(-0x0080_0000, ValueFormat::Sint24).unwrap(),
            vec![0x00, 0x00, 0x80]
        );
    }

    #[test]
    fn test_sfloat_encoding() {
        // 36.6 = 366 * 10^-1
        let bytes = encode_float(366, -1, ValueFormat::Sfloat).unwrap();
        assert_eq!(bytes, vec![0x6E, 0xF1]);
        assert_eq!(decode_float(&bytes, ValueFormat::Sfloat).unwrap(), (366, -1));

        let negative = encode_float(-5, 2, ValueFormat::Sfloat).unwrap();
        assert_eq!(decode_float(&negative, ValueFormat::Sfloat).unwrap(), (-5, 2));

        assert!(matches!(
            encode_float(4000, 0, ValueFormat::Sfloat),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode_float(1, 8, ValueFormat::Sfloat),
            Err(EncodingError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_float_encoding() {
        let bytes = encode_float(-372, -1, ValueFormat::Float).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[3], 0xFF);
        assert_eq!(decode_float(&bytes, ValueFormat::Float).unwrap(), (-372, -1));
    }

    #[test]
    fn test_format_family_mismatch() {
        assert_eq!(
            encode_int(1, ValueFormat::Float),
            Err(EncodingError::UnsupportedFormat(ValueFormat::Float))
        );
        assert_eq!(
            encode_float(1, 0, ValueFormat::Uint16),
            Err(EncodingError::UnsupportedFormat(ValueFormat::Uint16))
        );
        assert_eq!(
            decode_int(&[1, 2], ValueFormat::Uint8),
            Err(EncodingError::InvalidLength { expected: 1, actual: 2 })
        );
    }
}
