//! Little-endian field readers for fixed-layout simulator buffers.

use simhud_telemetry_core::SourceError;

pub(crate) fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    data.get(offset..offset.checked_add(4)?)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_le_bytes)
}

pub(crate) fn read_f32(data: &[u8], offset: usize) -> Option<f32> {
    data.get(offset..offset.checked_add(4)?)
        .and_then(|b| b.try_into().ok())
        .map(f32::from_le_bytes)
}

pub(crate) fn read_f64(data: &[u8], offset: usize) -> Option<f64> {
    data.get(offset..offset.checked_add(8)?)
        .and_then(|b| b.try_into().ok())
        .map(f64::from_le_bytes)
}

/// Fail with [`SourceError::Truncated`] unless `data` holds `needed` bytes.
pub(crate) fn require_len(data: &[u8], needed: usize) -> Result<(), SourceError> {
    if data.len() < needed {
        return Err(SourceError::Truncated {
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

/// Decode a NUL-terminated UTF-16LE string of at most `chars` code units.
pub(crate) fn read_wide_string(data: &[u8], offset: usize, chars: usize) -> String {
    let end = chars
        .checked_mul(2)
        .and_then(|bytes| offset.checked_add(bytes))
        .unwrap_or(usize::MAX)
        .min(data.len());
    let units = data
        .get(offset..end)
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|pair| match pair {
            [lo, hi] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        })
        .take_while(|&unit| unit != 0);

    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Decode a NUL-terminated single-byte string (ISO-8859-1).
pub(crate) fn read_latin1_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}
