use crate::config::{HALF_CC_THRESHOLD, SUSTAIN_CC};
use crate::helpers::normalize_cc;

/// A snapshot of the MIDI controller state, read by voices when they are
/// armed and when CC events arrive.
#[derive(Clone)]
pub struct MidiState {
    cc: [u8; 128],
    pitch_bend: i32,
}

impl MidiState {
    pub fn new() -> Self {
        Self {
            cc: [0; 128],
            pitch_bend: 0,
        }
    }

    pub fn cc_value(&self, cc: u8) -> u8 {
        self.cc[(cc as usize).min(127)]
    }

    /// The controller value normalized to 0.0-1.0.
    pub fn cc_normalized(&self, cc: u8) -> f32 {
        normalize_cc(self.cc_value(cc))
    }

    pub fn set_cc(&mut self, cc: u8, value: u8) {
        self.cc[(cc as usize).min(127)] = value.min(127);
    }

    pub fn sustain_held(&self) -> bool {
        self.cc_value(SUSTAIN_CC) >= HALF_CC_THRESHOLD
    }

    /// Raw 14-bit pitch bend, -8192..8191. Stored for the host; pitch bend
    /// rendering is not implemented.
    pub fn pitch_bend(&self) -> i32 {
        self.pitch_bend
    }

    pub fn set_pitch_bend(&mut self, bend: i32) {
        self.pitch_bend = bend.clamp(-8192, 8191);
    }

    pub fn reset_all_controllers(&mut self) {
        self.cc = [0; 128];
        self.pitch_bend = 0;
    }
}

impl Default for MidiState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_storage() {
        let mut state = MidiState::new();
        assert_eq!(state.cc_value(11), 0);
        state.set_cc(11, 100);
        assert_eq!(state.cc_value(11), 100);
        assert!((state.cc_normalized(11) - 100.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_sustain() {
        let mut state = MidiState::new();
        assert!(!state.sustain_held());
        state.set_cc(SUSTAIN_CC, HALF_CC_THRESHOLD);
        assert!(state.sustain_held());
        state.set_cc(SUSTAIN_CC, HALF_CC_THRESHOLD - 1);
        assert!(!state.sustain_held());
    }

    #[test]
    fn test_reset() {
        let mut state = MidiState::new();
        state.set_cc(1, 64);
        state.set_pitch_bend(1234);
        state.reset_all_controllers();
        assert_eq!(state.cc_value(1), 0);
        assert_eq!(state.pitch_bend(), 0);
    }
}
