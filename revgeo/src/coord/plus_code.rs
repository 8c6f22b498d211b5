//! Open Location Code ("plus code") encoding.
//!
//! Only encoding is needed: the global code for a coordinate is computed
//! locally and used as the anchor token when scraping provider pages.
//!
//! Uses the integer formulation of the algorithm, which avoids the
//! floating-point drift of repeated division.

use super::types::{CoordError, MAX_LAT, MIN_LAT};

const CODE_ALPHABET: &[u8; 20] = b"23456789CFGHJMPQRVWX";
const SEPARATOR: char = '+';
const SEPARATOR_POSITION: usize = 8;
const PADDING: char = '0';

const ENCODING_BASE: i64 = 20;
const PAIR_CODE_LENGTH: usize = 10;
const GRID_CODE_LENGTH: usize = 5;
const GRID_COLUMNS: i64 = 4;
const GRID_ROWS: i64 = 5;
const MAX_DIGIT_COUNT: usize = 15;

/// 8000 * 5^5: latitude units per degree at full precision.
const FINAL_LAT_PRECISION: f64 = 25_000_000.0;

/// 8000 * 4^5: longitude units per degree at full precision.
const FINAL_LNG_PRECISION: f64 = 8_192_000.0;

/// Standard code length (~14m x 14m cell).
pub const DEFAULT_CODE_LENGTH: usize = 10;

/// Encodes a coordinate as a plus code of `code_length` digits.
///
/// Valid lengths are 2, 4, 6, 8 and anything from 10 to 15 (longer values
/// are clamped to 15). Latitude is clipped and longitude normalized, matching
/// the reference behaviour for out-of-range input.
pub fn encode_plus_code(lat: f64, lng: f64, code_length: usize) -> Result<String, CoordError> {
    if !lat.is_finite() {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !lng.is_finite() {
        return Err(CoordError::InvalidLongitude(lng));
    }
    if code_length < 2 || (code_length < PAIR_CODE_LENGTH && code_length % 2 == 1) {
        return Err(CoordError::InvalidPrecision(code_length.min(u8::MAX as usize) as u8));
    }
    let code_length = code_length.min(MAX_DIGIT_COUNT);

    let mut lat = lat.clamp(MIN_LAT, MAX_LAT);
    let lng = normalize_longitude(lng);

    // The north pole belongs to the cell below it.
    if lat == MAX_LAT {
        lat -= latitude_precision(code_length);
    }

    let mut lat_val = scaled(lat + 90.0, FINAL_LAT_PRECISION);
    let mut lng_val = scaled(lng + 180.0, FINAL_LNG_PRECISION);

    let mut reversed: Vec<u8> = Vec::with_capacity(MAX_DIGIT_COUNT + 1);

    if code_length > PAIR_CODE_LENGTH {
        for _ in 0..(MAX_DIGIT_COUNT - PAIR_CODE_LENGTH) {
            let lat_digit = lat_val % GRID_ROWS;
            let lng_digit = lng_val % GRID_COLUMNS;
            reversed.push(CODE_ALPHABET[(lat_digit * GRID_COLUMNS + lng_digit) as usize]);
            lat_val /= GRID_ROWS;
            lng_val /= GRID_COLUMNS;
        }
    } else {
        lat_val /= GRID_ROWS.pow(GRID_CODE_LENGTH as u32);
        lng_val /= GRID_COLUMNS.pow(GRID_CODE_LENGTH as u32);
    }

    for _ in 0..(PAIR_CODE_LENGTH / 2) {
        reversed.push(CODE_ALPHABET[(lng_val % ENCODING_BASE) as usize]);
        reversed.push(CODE_ALPHABET[(lat_val % ENCODING_BASE) as usize]);
        lat_val /= ENCODING_BASE;
        lng_val /= ENCODING_BASE;
    }

    let digits: String = reversed.iter().rev().map(|&b| b as char).collect();

    let mut code = String::with_capacity(MAX_DIGIT_COUNT + 1);
    if code_length >= SEPARATOR_POSITION {
        code.push_str(&digits[..SEPARATOR_POSITION]);
        code.push(SEPARATOR);
        code.push_str(&digits[SEPARATOR_POSITION..code_length]);
    } else {
        code.push_str(&digits[..code_length]);
        code.extend(std::iter::repeat(PADDING).take(SEPARATOR_POSITION - code_length));
        code.push(SEPARATOR);
    }
    Ok(code)
}

fn normalize_longitude(mut lng: f64) -> f64 {
    while lng < -180.0 {
        lng += 360.0;
    }
    while lng >= 180.0 {
        lng -= 360.0;
    }
    lng
}

fn latitude_precision(code_length: usize) -> f64 {
    if code_length <= PAIR_CODE_LENGTH {
        (ENCODING_BASE as f64).powi(2 - (code_length as i32 + 1) / 2)
    } else {
        (ENCODING_BASE as f64).powi(-3) / (GRID_ROWS as f64).powi((code_length - PAIR_CODE_LENGTH) as i32)
    }
}

/// Scales to integer units, rounding to 6 decimals first so values such as
/// 2.7821875 * 8192000 don't fall one unit short.
fn scaled(value: f64, per_degree: f64) -> i64 {
    let units = value * per_degree;
    ((units * 1e6).round() / 1e6).floor() as i64
}
