//! Shared winnow-based parsing utilities used by the model and map decoders.

use winnow::Parser;
use winnow::binary::{le_f32, le_u32};
use winnow::error::ContextError;

use crate::error::FormatError;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];
/// Linear RGBA color, one `f32` per channel.
pub type ColorRgba = [f32; 4];

pub fn parse_vec2(input: &mut &[u8]) -> WResult<Vec2> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    Ok([x, y])
}

pub fn parse_vec3(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    Ok([x, y, z])
}

pub fn parse_vec4(input: &mut &[u8]) -> WResult<Vec4> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    let w = le_f32.parse_next(input)?;
    Ok([x, y, z, w])
}

pub fn parse_color(input: &mut &[u8]) -> WResult<ColorRgba> {
    parse_vec4(input)
}

/// Decode a string that ends at the first NUL byte, or at the end of `data` if
/// there is none.
///
/// Asset strings are 8-bit; bytes that are not valid UTF-8 are replaced rather
/// than rejected.
pub fn null_terminated_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Read a little-endian `u32` from a field that must be exactly four bytes.
pub fn exact_u32(id: u8, data: &[u8]) -> Result<u32, FormatError> {
    check_field_size(id, data, 4)?;
    le_u32
        .parse_next(&mut &data[..])
        .map_err(|e| FormatError::malformed("u32 field", e))
}

/// Read a little-endian `f32` from a field that must be exactly four bytes.
pub fn exact_f32(id: u8, data: &[u8]) -> Result<f32, FormatError> {
    check_field_size(id, data, 4)?;
    le_f32
        .parse_next(&mut &data[..])
        .map_err(|e| FormatError::malformed("f32 field", e))
}

/// Allocate `count` default elements, failing instead of aborting when a corrupt
/// count asks for more memory than is available.
pub fn preallocate<T: Clone + Default>(
    what: &'static str,
    count: usize,
) -> Result<Vec<T>, FormatError> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|e| FormatError::Malformed {
            what,
            detail: format!("cannot allocate {count} elements: {e}"),
        })?;
    items.resize(count, T::default());
    Ok(items)
}

fn check_field_size(id: u8, data: &[u8], expected: usize) -> Result<(), FormatError> {
    if data.len() != expected {
        return Err(FormatError::BadFieldSize {
            id,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_stops_at_nul() {
        assert_eq!(null_terminated_string(b"Hull\0garbage"), "Hull");
        assert_eq!(null_terminated_string(b"NoTerminator"), "NoTerminator");
        assert_eq!(null_terminated_string(b"\0"), "");
        assert_eq!(null_terminated_string(b""), "");
    }

    #[test]
    fn vectors_are_little_endian_floats() {
        let mut bytes = Vec::new();
        for v in [1.0f32, -2.5, 0.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let input = &mut &bytes[..];
        assert_eq!(parse_vec3(input).unwrap(), [1.0, -2.5, 0.25]);
        assert!(input.is_empty());

        let input = &mut &bytes[..8];
        assert!(parse_vec3(input).is_err());
    }

    #[test]
    fn exact_fields_reject_wrong_sizes() {
        assert_eq!(exact_u32(37, &0x201u32.to_le_bytes()).unwrap(), 0x201);
        assert_eq!(exact_f32(27, &1.5f32.to_le_bytes()).unwrap(), 1.5);
        assert_eq!(
            exact_u32(37, &[1, 0, 0]),
            Err(FormatError::BadFieldSize {
                id: 37,
                expected: 4,
                actual: 3
            })
        );
        assert!(exact_f32(29, &[0; 8]).is_err());
    }
}
