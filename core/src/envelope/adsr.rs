use crate::config::VIRTUALLY_ZERO;

/// The stages of the amplitude envelope, in order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdsrStage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Stage lengths in samples; sustain and start are levels in 0..1.
#[derive(Debug, Clone, Copy)]
pub struct AdsrParameters {
    pub delay: usize,
    pub attack: usize,
    pub hold: usize,
    pub decay: usize,
    pub sustain: f32,
    pub release: usize,
    pub start: f32,
}

impl Default for AdsrParameters {
    fn default() -> Self {
        Self {
            delay: 0,
            attack: 0,
            hold: 0,
            decay: 0,
            sustain: 1.0,
            release: 0,
            start: 0.0,
        }
    }
}

/// The delay-attack-hold-decay-sustain-release amplitude envelope.
///
/// The attack ramp is linear; decay and release are multiplicative ramps
/// toward the sustain level and toward silence respectively, which is what
/// the ear expects from amplitude envelopes. A release can be scheduled at
/// any offset inside the next block and starts from whatever value the
/// envelope has reached at that offset.
pub struct AdsrEnvelope {
    stage: AdsrStage,
    delay: usize,
    attack: usize,
    hold: usize,
    decay: usize,
    release: usize,
    sustain: f32,
    start: f32,
    peak: f32,
    current: f32,
    step: f32,
    should_release: bool,
    release_delay: usize,
}

impl AdsrEnvelope {
    pub fn new() -> Self {
        Self {
            stage: AdsrStage::Done,
            delay: 0,
            attack: 0,
            hold: 0,
            decay: 0,
            release: 0,
            sustain: 0.0,
            start: 0.0,
            peak: 1.0,
            current: 0.0,
            step: 0.0,
            should_release: false,
            release_delay: 0,
        }
    }

    pub fn reset(&mut self, params: AdsrParameters) {
        self.delay = params.delay;
        self.attack = params.attack;
        self.hold = params.hold;
        self.decay = params.decay;
        self.release = params.release;
        self.sustain = params.sustain.clamp(0.0, 1.0);
        self.start = params.start.clamp(0.0, 1.0);
        self.peak = 1.0;
        self.current = self.start;
        self.step = 0.0;
        self.should_release = false;
        self.release_delay = 0;
        self.stage = AdsrStage::Delay;
    }

    /// Schedule the release to begin `release_delay` samples into the next
    /// rendered block.
    pub fn start_release(&mut self, release_delay: usize) {
        self.should_release = true;
        self.release_delay = release_delay;
    }

    /// False only once the envelope has fully decayed.
    pub fn is_smoothing(&self) -> bool {
        self.stage != AdsrStage::Done
    }

    pub fn stage(&self) -> AdsrStage {
        self.stage
    }

    /// Samples left in the delay stage.
    pub fn remaining_delay(&self) -> usize {
        self.delay
    }

    pub fn get_block(&mut self, output: &mut [f32]) {
        let mut pos = 0usize;

        loop {
            let remaining = output.len() - pos;
            if remaining == 0 {
                break;
            }

            match self.stage {
                AdsrStage::Delay => {
                    let length = remaining.min(self.delay);
                    output[pos..pos + length].fill(self.current);
                    self.delay -= length;
                    pos += length;
                    if self.delay > 0 {
                        break;
                    }
                    self.step = (self.peak - self.start) / self.attack.max(1) as f32;
                    self.stage = AdsrStage::Attack;
                }
                AdsrStage::Attack => {
                    let length = remaining.min(self.attack);
                    for out in output[pos..pos + length].iter_mut() {
                        self.current += self.step;
                        *out = self.current;
                    }
                    self.attack -= length;
                    pos += length;
                    if self.attack > 0 {
                        break;
                    }
                    self.current = self.peak;
                    self.stage = AdsrStage::Hold;
                }
                AdsrStage::Hold => {
                    let length = remaining.min(self.hold);
                    output[pos..pos + length].fill(self.current);
                    self.hold -= length;
                    pos += length;
                    if self.hold > 0 {
                        break;
                    }
                    self.step =
                        ((self.sustain + VIRTUALLY_ZERO).ln() / self.decay.max(1) as f32).exp();
                    self.stage = AdsrStage::Decay;
                }
                AdsrStage::Decay => {
                    let length = remaining.min(self.decay);
                    for out in output[pos..pos + length].iter_mut() {
                        self.current *= self.step;
                        *out = self.current;
                    }
                    self.decay -= length;
                    pos += length;
                    if self.decay > 0 {
                        break;
                    }
                    self.current = self.sustain;
                    self.stage = AdsrStage::Sustain;
                }
                AdsrStage::Sustain => {
                    output[pos..].fill(self.current);
                    break;
                }
                AdsrStage::Release => {
                    let length = remaining.min(self.release);
                    for out in output[pos..pos + length].iter_mut() {
                        self.current *= self.step;
                        *out = self.current;
                    }
                    self.release -= length;
                    pos += length;
                    if self.release > 0 {
                        break;
                    }
                    self.current = 0.0;
                    self.stage = AdsrStage::Done;
                }
                AdsrStage::Done => {
                    output[pos..].fill(0.0);
                    break;
                }
            }
        }

        if self.should_release {
            if self.release_delay > output.len() {
                self.release_delay -= output.len();
                return;
            }

            let offset = self.release_delay;
            self.should_release = false;
            self.release_delay = 0;
            self.stage = AdsrStage::Release;

            let tail = &mut output[offset..];
            if let Some(&front) = tail.first() {
                self.current = front;
            }
            self.step = if self.current > VIRTUALLY_ZERO {
                ((VIRTUALLY_ZERO.ln() - self.current.ln()) / self.release.max(1) as f32).exp()
            } else {
                1.0
            };

            let length = tail.len().min(self.release);
            for out in tail[..length].iter_mut() {
                self.current *= self.step;
                *out = self.current;
            }
            self.release -= length;

            if self.release == 0 {
                self.current = 0.0;
                self.stage = AdsrStage::Done;
                tail[length..].fill(0.0);
            }
        }
    }
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(lhs: &[f32], rhs: &[f32]) -> bool {
        lhs.len() == rhs.len()
            && lhs.iter().zip(rhs.iter()).all(|(a, b)| {
                let eps = (a.abs().max(b.abs()) * 1e-3).max(1e-6);
                (a - b).abs() < eps
            })
    }

    fn params(attack: usize, release: usize, sustain: f32, delay: usize) -> AdsrParameters {
        AdsrParameters {
            delay,
            attack,
            release,
            sustain,
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_state() {
        let mut envelope = AdsrEnvelope::new();
        let mut output = [-1.0; 5];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.0; 5]));
        assert!(!envelope.is_smoothing());
    }

    #[test]
    fn test_attack() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(2, 0, 1.0, 0));
        let mut output = [-1.0; 5];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.5, 1.0, 1.0, 1.0, 1.0]));

        envelope.reset(AdsrParameters {
            attack: 3,
            ..Default::default()
        });
        let mut output = [-1.0; 5];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.33333, 0.66667, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_release() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(2, 4, 1.0, 0));
        envelope.start_release(2);
        let mut output = [-1.0; 8];
        envelope.get_block(&mut output);
        assert!(approx_eq(
            &output,
            &[0.5, 1.0, 0.08409, 0.00707, 0.000594604, 0.00005, 0.0, 0.0]
        ));
        assert!(!envelope.is_smoothing());
    }

    #[test]
    fn test_delay() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(2, 4, 1.0, 2));
        envelope.start_release(4);
        let mut output = [-1.0; 10];
        envelope.get_block(&mut output);
        assert!(approx_eq(
            &output,
            &[0.0, 0.0, 0.5, 1.0, 0.08409, 0.00707, 0.000594604, 0.00005, 0.0, 0.0]
        ));
    }

    #[test]
    fn test_lower_sustain() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(2, 4, 0.5, 2));
        let mut output = [-1.0; 10];
        envelope.get_block(&mut output);
        assert!(approx_eq(
            &output,
            &[0.0, 0.0, 0.5, 1.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
        ));
        assert_eq!(envelope.stage(), AdsrStage::Sustain);
    }

    #[test]
    fn test_hold_and_decay() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(AdsrParameters {
            attack: 2,
            hold: 3,
            decay: 2,
            sustain: 0.25,
            ..Default::default()
        });
        let mut output = [-1.0; 10];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output[..2], &[0.5, 1.0]));
        assert!(approx_eq(&output[2..5], &[1.0, 1.0, 1.0]));
        // Multiplicative decay lands on the sustain level.
        assert!(output[5] > 0.25 && output[5] < 1.0);
        assert!(approx_eq(&output[7..], &[0.25, 0.25, 0.25]));
    }

    #[test]
    fn test_release_spanning_blocks() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(1, 8, 1.0, 0));
        envelope.start_release(6);
        let mut first = [-1.0; 4];
        envelope.get_block(&mut first);
        assert!(approx_eq(&first, &[1.0, 1.0, 1.0, 1.0]));

        let mut second = [-1.0; 8];
        envelope.get_block(&mut second);
        // Two sustained samples, then the release ramp starts.
        assert!(approx_eq(&second[..2], &[1.0, 1.0]));
        assert!(second[2] < 1.0);
        assert!(second[3] < second[2]);
        assert!(envelope.is_smoothing());
    }

    #[test]
    fn test_delay_reports_remaining() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(2, 0, 1.0, 10));
        assert_eq!(envelope.remaining_delay(), 10);
        let mut output = [-1.0; 4];
        envelope.get_block(&mut output);
        assert_eq!(envelope.remaining_delay(), 6);
    }

    #[test]
    fn test_zero_release_cuts_immediately() {
        let mut envelope = AdsrEnvelope::new();
        envelope.reset(params(0, 0, 1.0, 0));
        envelope.start_release(3);
        let mut output = [-1.0; 6];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]));
        assert!(!envelope.is_smoothing());
    }
}
