mod frequencies;
pub use frequencies::*;

mod simd;
pub use simd::*;

/// Convert a decibel value to a linear gain.
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db * 0.05)
}

/// Convert a pitch variation in cents to a playback rate factor.
pub fn cents_factor(cents: f32) -> f32 {
    2.0f32.powf(cents / 1200.0)
}

/// Normalize a 0-127 MIDI CC value to 0.0-1.0.
pub fn normalize_cc(value: u8) -> f32 {
    value as f32 / 127.0
}

/// Normalize a 0-100 percentage to 0.0-1.0.
pub fn normalize_percents(percent: f32) -> f32 {
    percent / 100.0
}

/// Normalize a -100..100 percentage to -1.0..1.0.
pub fn normalize_bipolar_percents(percent: f32) -> f32 {
    (percent / 100.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_gain() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501187).abs() < 1e-5);
        assert!((db_to_gain(6.0) - 1.995262).abs() < 1e-5);
    }

    #[test]
    fn test_cents_factor() {
        assert!((cents_factor(0.0) - 1.0).abs() < 1e-6);
        assert!((cents_factor(1200.0) - 2.0).abs() < 1e-6);
        assert!((cents_factor(-1200.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_cc(127), 1.0);
        assert_eq!(normalize_cc(0), 0.0);
        assert_eq!(normalize_percents(50.0), 0.5);
        assert_eq!(normalize_bipolar_percents(-100.0), -1.0);
        assert_eq!(normalize_bipolar_percents(250.0), 1.0);
    }
}
