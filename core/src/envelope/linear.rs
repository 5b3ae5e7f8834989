/// A smoothing envelope holding a current value and a schedule of
/// `(offset, target)` events inside the next rendered block.
///
/// `get_block` ramps linearly from the current value to each scheduled
/// target at its offset, then holds the last target once no events remain.
pub struct LinearEnvelope {
    current: f32,
    events: Vec<(usize, f32)>,
}

impl LinearEnvelope {
    pub fn new() -> Self {
        Self {
            current: 0.0,
            events: Vec::with_capacity(8),
        }
    }

    /// Set the current value and forget any pending events.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.events.clear();
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    /// Schedule `target` to be reached `offset` samples into the next block.
    pub fn register_event(&mut self, offset: usize, target: f32) {
        // Keep the schedule ordered; later registrations at the same offset win.
        let index = self
            .events
            .iter()
            .position(|&(o, _)| o > offset)
            .unwrap_or(self.events.len());
        self.events.insert(index, (offset, target));
    }

    pub fn get_block(&mut self, output: &mut [f32]) {
        let mut start = 0usize;
        for (offset, target) in self.events.drain(..) {
            let offset = offset.min(output.len());
            if offset > start {
                let length = (offset - start) as f32;
                let from = self.current;
                let step = (target - from) / length;
                for (i, out) in output[start..offset].iter_mut().enumerate() {
                    *out = from + step * (i + 1) as f32;
                }
            }
            self.current = target;
            start = offset.max(start);
        }

        for out in output[start..].iter_mut() {
            *out = self.current;
        }
    }
}

impl Default for LinearEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(lhs: &[f32], rhs: &[f32]) -> bool {
        lhs.len() == rhs.len()
            && lhs
                .iter()
                .zip(rhs.iter())
                .all(|(a, b)| (a - b).abs() < 1e-5)
    }

    #[test]
    fn test_flat_block() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.5);
        let mut output = [0.0; 5];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.5; 5]));
    }

    #[test]
    fn test_single_ramp() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.0);
        envelope.register_event(4, 1.0);
        let mut output = [0.0; 8];
        envelope.get_block(&mut output);
        assert!(approx_eq(
            &output,
            &[0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0]
        ));
    }

    #[test]
    fn test_two_ramps() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.0);
        envelope.register_event(2, 1.0);
        envelope.register_event(4, 0.0);
        let mut output = [0.0; 6];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.5, 1.0, 0.5, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_unordered_registration() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.0);
        envelope.register_event(4, 0.0);
        envelope.register_event(2, 1.0);
        let mut output = [0.0; 6];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.5, 1.0, 0.5, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_event_at_zero_jumps() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.0);
        envelope.register_event(0, 1.0);
        let mut output = [0.0; 4];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[1.0; 4]));
    }

    #[test]
    fn test_event_past_block_is_clamped() {
        let mut envelope = LinearEnvelope::new();
        envelope.reset(0.0);
        envelope.register_event(100, 1.0);
        let mut output = [0.0; 4];
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[0.25, 0.5, 0.75, 1.0]));
        // The schedule was consumed; the next block holds the target.
        envelope.get_block(&mut output);
        assert!(approx_eq(&output, &[1.0; 4]));
    }
}
