fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_hexdigit())
}

// Values wider than 16 hex digits do not fit and read as unknown.
pub fn decode_hex_uint(value: &str) -> Option<u64> {
    if !is_hex(value) {
        return None;
    }
    u64::from_str_radix(value, 16).ok()
}

/// Two's-complement reinterpretation of a single byte. Longer inputs get the
/// same `- 0x100` adjustment applied to the raw integer.
pub fn decode_hex_signed_byte(value: &str) -> Option<i64> {
    let n = i64::try_from(decode_hex_uint(value)?).ok()?;
    if n >= 0x80 { Some(n - 0x100) } else { Some(n) }
}

/// Temperature stored as a count of 0.5 °C steps.
pub fn decode_hex_half_degree(value: &str) -> Option<f64> {
    let n = decode_hex_uint(value)?;
    Some(round1(n as f64 / 2.0))
}

/// Two bytes, little-endian, signed, in 0.5 °C steps.
pub fn decode_hex_le_i16_half_degree(value: &str) -> Option<f64> {
    if value.len() != 4 || !is_hex(value) {
        return None;
    }
    let lo = u8::from_str_radix(&value[0..2], 16).ok()?;
    let hi = u8::from_str_radix(&value[2..4], 16).ok()?;
    let n = i16::from_le_bytes([lo, hi]);
    Some(round1(f64::from(n) / 2.0))
}

/// Uppercase fixed-width prefix of a hex fragment, or `None` when the input
/// is shorter than `width`.
pub fn normalize_hex_code(value: &str, width: usize) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let upper = value.to_uppercase();
    if upper.chars().count() < width {
        return None;
    }
    Some(upper.chars().take(width).collect())
}

/// Inverse of [`decode_hex_half_degree`] for single-byte setpoint writes.
///
/// Callers validate the range first (see [`half_degree_in_range`]); values
/// outside it saturate.
pub fn encode_half_degree_to_hex_byte(temp_c: f64) -> String {
    let steps = (temp_c * 2.0).round().clamp(0.0, 255.0) as u8;
    format!("{steps:02X}")
}

/// Whether `temp_c` fits in one byte of half-degree steps (0..=127.5 °C).
pub fn half_degree_in_range(temp_c: f64) -> bool {
    let steps = (temp_c * 2.0).round();
    steps.is_finite() && (0.0..=255.0).contains(&steps)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
