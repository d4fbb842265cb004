//! EAN-13 symbol decoding and row synthesis.
//!
//! The decoder works on single grayscale rows: binarize against the row's
//! midpoint, run-length encode, locate the start guard behind a quiet zone,
//! then read the 59-run symbol structure (guard, six left digits, center
//! guard, six right digits, guard). Left digits resolve against the L and G
//! pattern tables, the leading digit falls out of their parity layout, and
//! the check digit is verified before a match is reported. Rows are also
//! tried in reverse so upside-down codes read the same.
//!
//! [`render_row`] produces the inverse mapping and backs both the unit
//! tests and the synthetic camera.

use crate::decode::protocol::Symbol;
use crate::decode::DecodeEngine;
use crate::frame::Frame;

/// Left digit patterns with odd parity, 7 modules each, MSB first.
const L_PATTERNS: [u8; 10] = [
    0x0D, 0x19, 0x13, 0x3D, 0x23, 0x31, 0x2F, 0x3B, 0x37, 0x0B,
];

/// Left digit patterns with even parity.
const G_PATTERNS: [u8; 10] = [
    0x27, 0x33, 0x1B, 0x21, 0x1D, 0x39, 0x05, 0x11, 0x09, 0x17,
];

/// Parity layout of the six left digits, selecting the leading digit.
/// Bit 5 is the first left digit; a set bit means even (G) parity.
const FIRST_DIGIT_PARITY: [u8; 10] = [
    0x00, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A,
];

/// Modules in one symbol, guards included.
const TOTAL_MODULES: usize = 95;
/// Light modules required on each side of the symbol when rendering.
const QUIET_MODULES: usize = 9;
/// Runs in one symbol: two 3-run guards, a 5-run center, twelve 4-run digits.
const SYMBOL_RUNS: usize = 59;
/// Minimum light/dark spread for a row to be considered at all.
const MIN_CONTRAST: u8 = 64;

/// Luminance of rendered spaces.
const LIGHT: u8 = 235;
/// Luminance of rendered bars.
const DARK: u8 = 25;

/// One maximal stretch of same-colored pixels.
#[derive(Debug, Clone, Copy)]
struct Run {
    dark: bool,
    len: usize,
}

/// Decodes EAN-13 symbols from grayscale frames by scanning rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ean13Engine;

impl Ean13Engine {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }
}

impl DecodeEngine for Ean13Engine {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        if frame.is_empty() || !frame.is_well_formed() {
            return Vec::new();
        }
        let step = (frame.height / 40).max(1);
        let mut y = 0;
        while y < frame.height {
            if let Some(code) = frame.row(y).and_then(decode_row) {
                return vec![Symbol::ean13(&code)];
            }
            y += step;
        }
        Vec::new()
    }
}

/// Attempts to read one EAN-13 code from a single luminance row.
pub fn decode_row(row: &[u8]) -> Option<String> {
    let (min, max) = row
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &px| (lo.min(px), hi.max(px)));
    if max.saturating_sub(min) < MIN_CONTRAST {
        return None;
    }
    let threshold = min + (max - min) / 2;

    let mut runs: Vec<Run> = Vec::with_capacity(row.len() / 2);
    for &px in row {
        let dark = px < threshold;
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => runs.push(Run { dark, len: 1 }),
        }
    }

    if let Some(code) = try_decode_runs(&runs) {
        return Some(code);
    }
    runs.reverse();
    try_decode_runs(&runs)
}

fn try_decode_runs(runs: &[Run]) -> Option<String> {
    for start in 0..runs.len() {
        if !runs[start].dark {
            continue;
        }
        if start + SYMBOL_RUNS > runs.len() {
            break;
        }
        if let Some(code) = decode_at(runs, start) {
            return Some(code);
        }
    }
    None
}

fn decode_at(runs: &[Run], start: usize) -> Option<String> {
    // Start guard, three single-module runs behind a quiet zone.
    let guard = &runs[start..start + 3];
    let module = guard.iter().map(|r| r.len).sum::<usize>() as f64 / 3.0;
    if !guard.iter().all(|r| run_matches(r.len, module)) {
        return None;
    }
    if start == 0 {
        return None;
    }
    let before = &runs[start - 1];
    if before.dark || (before.len as f64) < module * 3.0 {
        return None;
    }

    let mut digits = [0u8; 13];
    let mut parity: u8 = 0;
    let mut idx = start + 3;

    for slot in 1..=6 {
        let pattern = digit_pattern(&runs[idx..idx + 4])?;
        let (digit, even) = lookup_left(pattern)?;
        digits[slot] = digit;
        parity = (parity << 1) | u8::from(even);
        idx += 4;
    }

    let center = &runs[idx..idx + 5];
    let center_module = center.iter().map(|r| r.len).sum::<usize>() as f64 / 5.0;
    if !center.iter().all(|r| run_matches(r.len, center_module)) {
        return None;
    }
    idx += 5;

    for slot in 7..=12 {
        let pattern = digit_pattern(&runs[idx..idx + 4])?;
        digits[slot] = lookup_right(pattern)?;
        idx += 4;
    }

    let end = &runs[idx..idx + 3];
    let end_module = end.iter().map(|r| r.len).sum::<usize>() as f64 / 3.0;
    if !end.iter().all(|r| run_matches(r.len, end_module)) {
        return None;
    }
    if let Some(after) = runs.get(idx + 3) {
        // A row ending at the guard counts as quiet.
        if after.dark || (after.len as f64) < end_module * 3.0 {
            return None;
        }
    }

    let first = FIRST_DIGIT_PARITY.iter().position(|&p| p == parity)?;
    digits[0] = first as u8;
    if checksum_digit(&digits[..12]) != digits[12] {
        return None;
    }

    Some(digits.iter().map(|&d| char::from(b'0' + d)).collect())
}

/// Maps a 4-run stretch onto its 7-module pattern, MSB first.
fn digit_pattern(runs: &[Run]) -> Option<u8> {
    let total: usize = runs.iter().map(|r| r.len).sum();
    if total == 0 {
        return None;
    }
    let mut pattern: u8 = 0;
    let mut used = 0usize;
    for run in runs {
        let modules = ((run.len * 7 + total / 2) / total).clamp(1, 4);
        for _ in 0..modules {
            pattern = (pattern << 1) | u8::from(run.dark);
        }
        used += modules;
    }
    (used == 7).then_some(pattern)
}

fn run_matches(len: usize, module: f64) -> bool {
    let len = len as f64;
    len >= module * 0.5 && len <= module * 1.7
}

fn lookup_left(pattern: u8) -> Option<(u8, bool)> {
    if let Some(digit) = L_PATTERNS.iter().position(|&p| p == pattern) {
        return Some((digit as u8, false));
    }
    G_PATTERNS
        .iter()
        .position(|&p| p == pattern)
        .map(|digit| (digit as u8, true))
}

fn lookup_right(pattern: u8) -> Option<u8> {
    // Right patterns are the bitwise complement of the L table.
    L_PATTERNS
        .iter()
        .position(|&p| p == pattern ^ 0x7F)
        .map(|digit| digit as u8)
}

/// Check digit for the first twelve digit values.
pub fn checksum_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { u32::from(d) } else { u32::from(d) * 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// True for a 13-digit string whose check digit is consistent.
pub fn is_valid_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let digits: Vec<u8> = bytes.iter().map(|b| b - b'0').collect();
    checksum_digit(&digits) == digits[12]
}

/// Renders `code` as one luminance row of exactly `width` pixels, bars and
/// quiet zones centered, or `None` when the code is not 13 digits or the
/// row is too narrow to hold one module per pixel.
pub fn render_row(code: &str, width: usize) -> Option<Vec<u8>> {
    let modules = modules_of(code)?;
    let span = TOTAL_MODULES + 2 * QUIET_MODULES;
    let module_px = width / span;
    if module_px == 0 {
        return None;
    }
    let mut row = vec![LIGHT; width];
    let mut x = (width - span * module_px) / 2 + QUIET_MODULES * module_px;
    for dark in modules {
        if dark {
            row[x..x + module_px].fill(DARK);
        }
        x += module_px;
    }
    Some(row)
}

fn modules_of(code: &str) -> Option<Vec<bool>> {
    let bytes = code.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let digits: Vec<u8> = bytes.iter().map(|b| b - b'0').collect();
    let parity = FIRST_DIGIT_PARITY[digits[0] as usize];

    let mut modules = Vec::with_capacity(TOTAL_MODULES);
    push_pattern(&mut modules, 0b101, 3);
    for (i, &digit) in digits[1..7].iter().enumerate() {
        let even = (parity >> (5 - i)) & 1 == 1;
        let table = if even { &G_PATTERNS } else { &L_PATTERNS };
        push_pattern(&mut modules, table[digit as usize], 7);
    }
    push_pattern(&mut modules, 0b01010, 5);
    for &digit in &digits[7..13] {
        push_pattern(&mut modules, L_PATTERNS[digit as usize] ^ 0x7F, 7);
    }
    push_pattern(&mut modules, 0b101, 3);
    Some(modules)
}

fn push_pattern(modules: &mut Vec<bool>, pattern: u8, bits: u8) {
    for i in (0..bits).rev() {
        modules.push((pattern >> i) & 1 == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::protocol::EAN13_TYPE_NAME;

    #[test]
    fn checksum_matches_known_codes() {
        assert_eq!(checksum_digit(&[5, 9, 0, 1, 2, 3, 4, 1, 2, 3, 4, 5]), 7);
        assert_eq!(checksum_digit(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3]), 1);
        assert!(is_valid_code("5901234123457"));
        assert!(is_valid_code("4607004345302"));
        assert!(!is_valid_code("4607004345306"));
        assert!(!is_valid_code("590123412345"));
        assert!(!is_valid_code("590123412345x"));
    }

    #[test]
    fn decodes_ideal_row() {
        let row = render_row("5901234123457", 452).unwrap();
        assert_eq!(decode_row(&row).as_deref(), Some("5901234123457"));
    }

    #[test]
    fn decodes_reversed_row() {
        let mut row = render_row("4607004345302", 904).unwrap();
        row.reverse();
        assert_eq!(decode_row(&row).as_deref(), Some("4607004345302"));
    }

    #[test]
    fn decodes_at_one_pixel_per_module() {
        let row = render_row("5901234123457", 113).unwrap();
        assert_eq!(decode_row(&row).as_deref(), Some("5901234123457"));
    }

    #[test]
    fn rejects_corrupted_check_digit() {
        let row = render_row("5901234123450", 452).unwrap();
        assert_eq!(decode_row(&row), None);
    }

    #[test]
    fn rejects_flat_and_noise_rows() {
        assert_eq!(decode_row(&vec![128u8; 452]), None);
        let striped: Vec<u8> = (0..452u32)
            .map(|x| if x % 5 < 2 { 30 } else { 220 })
            .collect();
        assert_eq!(decode_row(&striped), None);
    }

    #[test]
    fn rejects_row_without_quiet_zone() {
        let row = render_row("5901234123457", 452).unwrap();
        let bars_start = row.iter().position(|&px| px == DARK).unwrap();
        let bars_end = row.iter().rposition(|&px| px == DARK).unwrap();
        // Strip the quiet zones so the guards sit on the row edges.
        let cropped = &row[bars_start..=bars_end];
        assert_eq!(decode_row(cropped), None);
    }

    #[test]
    fn render_requires_thirteen_digits_and_width() {
        assert!(render_row("59012", 452).is_none());
        assert!(render_row("590123412345x", 452).is_none());
        assert!(render_row("5901234123457", 100).is_none());
    }

    #[test]
    fn engine_finds_symbol_in_frame_band() {
        let width = 480u32;
        let height = 360u32;
        let code = "4607004345302";
        let band = render_row(code, width as usize).unwrap();

        let mut pixels = vec![LIGHT; (width * height) as usize];
        for y in 150..210 {
            let start = y * width as usize;
            pixels[start..start + width as usize].copy_from_slice(&band);
        }

        let frame = Frame::new(width, height, pixels);
        let symbols = Ean13Engine::new().decode(&frame);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].type_name, EAN13_TYPE_NAME);
        assert_eq!(symbols[0].payload_text(), code);
    }

    #[test]
    fn engine_returns_empty_for_blank_frame() {
        let frame = Frame::new(64, 64, vec![LIGHT; 64 * 64]);
        assert!(Ean13Engine::new().decode(&frame).is_empty());
    }

    #[test]
    fn engine_ignores_malformed_frames() {
        let frame = Frame::new(100, 100, vec![0; 50]);
        assert!(Ean13Engine::new().decode(&frame).is_empty());
        assert!(Ean13Engine::new().decode(&Frame::empty()).is_empty());
    }
}
