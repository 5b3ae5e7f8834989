use std::f32::consts::{FRAC_PI_4, SQRT_2, TAU};
use std::sync::Arc;

use tracing::debug;

use crate::audio_buffer::{AudioBuffer, AudioSpanMut};
use crate::buffer::AlignedBuffer;
use crate::config::{self, POWER_HISTORY_LENGTH};
use crate::envelope::{AdsrEnvelope, AdsrParameters, LinearEnvelope};
use crate::file_pool::{FilePool, FilePromise, Oversampling};
use crate::helpers::{
    apply_gain_simd, db_to_gain, midi_note_frequency, normalize_bipolar_percents, normalize_cc,
    normalize_percents,
};
use crate::midi_state::MidiState;
use crate::region::{LoopMode, Region};

/// What caused a voice to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    NoteOn,
    NoteOff,
    Cc,
}

/// The event that armed a voice.
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent {
    pub kind: TriggerType,
    pub channel: u8,
    /// Note number, or controller number for CC triggers.
    pub number: u8,
    /// Velocity, or controller value for CC triggers.
    pub value: u8,
}

impl TriggerEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: TriggerType::NoteOn,
            channel,
            number: note,
            value: velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Playing,
    Release,
}

/// A ring of recent block powers, averaged for steal decisions.
struct PowerHistory {
    values: Vec<f32>,
    index: usize,
}

impl PowerHistory {
    fn new(length: usize) -> Self {
        Self {
            values: vec![0.0; length.max(1)],
            index: 0,
        }
    }

    fn push(&mut self, value: f32) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
    }

    fn average(&self) -> f32 {
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    fn reset(&mut self) {
        self.values.fill(0.0);
        self.index = 0;
    }
}

/// A single sounding instance of a region.
///
/// A voice is idle until armed by [`Voice::start_voice`]. It then advances a
/// fractional read pointer through its sample source at a pitch dependent
/// rate, stacks its envelopes on top, and returns to idle once the
/// amplitude envelope has fully decayed. The audio thread owns the voice;
/// rendering never allocates and never blocks.
pub struct Voice {
    state: State,
    region: Option<Arc<Region>>,
    trigger: TriggerEvent,
    note_is_off: bool,
    trigger_delay: Option<usize>,

    speed_ratio: f32,
    pitch_ratio: f32,
    base_volume_db: f32,
    base_gain: f32,
    base_pan: f32,
    base_position: f32,
    base_width: f32,
    base_frequency: f32,
    phase: f32,

    source_position: usize,
    float_position_offset: f32,
    initial_delay: usize,

    current_promise: Option<Arc<FilePromise>>,
    /// A full-file buffer delivered through the ticket path.
    delivered_data: Option<AudioBuffer<f32>>,
    expected_ticket: Option<u64>,

    sample_rate: f32,
    samples_per_block: usize,

    temp1: AlignedBuffer<f32>,
    temp2: AlignedBuffer<f32>,
    indices: AlignedBuffer<i32>,

    eg_envelope: AdsrEnvelope,
    amplitude_envelope: LinearEnvelope,
    volume_envelope: LinearEnvelope,
    pan_envelope: LinearEnvelope,
    position_envelope: LinearEnvelope,
    width_envelope: LinearEnvelope,

    power_history: PowerHistory,
}

impl Voice {
    pub fn new() -> Self {
        let samples_per_block = config::DEFAULT_SAMPLES_PER_BLOCK;
        Self {
            state: State::Idle,
            region: None,
            trigger: TriggerEvent::note_on(0, 0, 0),
            note_is_off: false,
            trigger_delay: None,
            speed_ratio: 1.0,
            pitch_ratio: 1.0,
            base_volume_db: 0.0,
            base_gain: 1.0,
            base_pan: 0.0,
            base_position: 0.0,
            base_width: 0.0,
            base_frequency: 440.0,
            phase: 0.0,
            source_position: 0,
            float_position_offset: 0.0,
            initial_delay: 0,
            current_promise: None,
            delivered_data: None,
            expected_ticket: None,
            sample_rate: config::DEFAULT_SAMPLE_RATE,
            samples_per_block,
            temp1: AlignedBuffer::new(samples_per_block),
            temp2: AlignedBuffer::new(samples_per_block),
            indices: AlignedBuffer::new(samples_per_block),
            eg_envelope: AdsrEnvelope::new(),
            amplitude_envelope: LinearEnvelope::new(),
            volume_envelope: LinearEnvelope::new(),
            pan_envelope: LinearEnvelope::new(),
            position_envelope: LinearEnvelope::new(),
            width_envelope: LinearEnvelope::new(),
            power_history: PowerHistory::new(POWER_HISTORY_LENGTH),
        }
    }

    /// Propagated from the host; all pitch related values derive from it.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Size the scratch buffers for the expected block size. Rendering
    /// itself never allocates.
    pub fn set_samples_per_block(&mut self, samples_per_block: usize) {
        self.samples_per_block = samples_per_block;
        self.temp1.resize(samples_per_block);
        self.temp2.resize(samples_per_block);
        self.indices.resize(samples_per_block);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn samples_per_block(&self) -> usize {
        self.samples_per_block
    }

    /// Arm the voice to play `region` after `delay` samples.
    pub fn start_voice(
        &mut self,
        region: &Arc<Region>,
        delay: usize,
        trigger: TriggerEvent,
        file_pool: &FilePool,
        midi: &MidiState,
    ) {
        self.trigger = trigger;
        self.region = Some(region.clone());
        self.state = State::Playing;
        self.note_is_off = false;
        self.delivered_data = None;

        let oversampling;
        if !region.is_generator() {
            let promise = file_pool.get_file_promise(&region.sample);
            if promise.is_empty() {
                debug!(sample = %region.sample, "no preloaded data for sample");
                self.reset();
                return;
            }
            self.speed_ratio = promise.sample_rate() / self.sample_rate;
            oversampling = promise.oversampling();
            self.current_promise = Some(promise);
        } else {
            self.speed_ratio = 1.0;
            oversampling = Oversampling::X1;
        }

        self.pitch_ratio = region.base_pitch_variation(trigger.number, trigger.value);

        self.base_volume_db = region.base_volume_db(trigger.number);
        let mut volume_db = self.base_volume_db;
        if let Some(modulation) = region.volume_cc {
            volume_db += midi.cc_normalized(modulation.cc) * modulation.depth;
        }
        self.volume_envelope
            .reset(db_to_gain(Region::clamped_volume_db(volume_db)));

        self.base_gain = region.base_gain() * region.crossfade_gain(midi);
        if trigger.kind != TriggerType::Cc {
            self.base_gain *= region.note_gain(trigger.number, trigger.value);
        }
        let mut gain = self.base_gain;
        if let Some(modulation) = region.amplitude_cc {
            gain *= midi.cc_normalized(modulation.cc) * normalize_percents(modulation.depth);
        }
        self.amplitude_envelope.reset(gain);

        self.base_pan = normalize_bipolar_percents(region.pan);
        let mut pan = self.base_pan;
        if let Some(modulation) = region.pan_cc {
            pan += midi.cc_normalized(modulation.cc) * normalize_bipolar_percents(modulation.depth);
        }
        self.pan_envelope.reset(pan);

        self.base_position = normalize_bipolar_percents(region.position);
        let mut position = self.base_position;
        if let Some(modulation) = region.position_cc {
            position +=
                midi.cc_normalized(modulation.cc) * normalize_bipolar_percents(modulation.depth);
        }
        self.position_envelope.reset(position);

        self.base_width = normalize_bipolar_percents(region.width);
        let mut width = self.base_width;
        if let Some(modulation) = region.width_cc {
            width +=
                midi.cc_normalized(modulation.cc) * normalize_bipolar_percents(modulation.depth);
        }
        self.width_envelope.reset(width);

        self.source_position = region.offset(oversampling) as usize;
        self.float_position_offset = 0.0;
        self.trigger_delay = Some(delay);
        self.initial_delay = delay + (region.delay * self.sample_rate) as usize;
        self.base_frequency = midi_note_frequency(trigger.number);
        self.phase = 0.0;

        self.prepare_eg_envelope(region, self.initial_delay, trigger.value, midi);
    }

    fn prepare_eg_envelope(
        &mut self,
        region: &Region,
        delay: usize,
        velocity: u8,
        midi: &MidiState,
    ) {
        let sample_rate = self.sample_rate;
        let seconds_to_samples = |seconds: f32| (seconds * sample_rate) as usize;
        let eg = &region.amp_eg;

        self.eg_envelope.reset(AdsrParameters {
            delay: delay + seconds_to_samples(eg.get_delay(midi, velocity)),
            attack: seconds_to_samples(eg.get_attack(midi, velocity)),
            hold: seconds_to_samples(eg.get_hold(midi, velocity)),
            decay: seconds_to_samples(eg.get_decay(midi, velocity)),
            sustain: normalize_percents(eg.get_sustain(midi, velocity)),
            release: seconds_to_samples(eg.get_release(midi, velocity)),
            start: normalize_percents(eg.get_start(midi, velocity)),
        });
    }

    /// Register a note-off event; this may release the voice.
    pub fn register_note_off(
        &mut self,
        delay: usize,
        channel: u8,
        note: u8,
        _velocity: u8,
        midi: &MidiState,
    ) {
        let region = match &self.region {
            Some(region) => region.clone(),
            None => return,
        };
        if self.state != State::Playing {
            return;
        }

        if channel == self.trigger.channel && note == self.trigger.number {
            self.note_is_off = true;

            if region.loop_mode == LoopMode::OneShot {
                return;
            }

            if !region.check_sustain || !midi.sustain_held() {
                self.release(delay);
            }
        }
    }

    /// Register a CC event. Releases a held note when the sustain pedal is
    /// lifted, and schedules new envelope targets for any parameter the
    /// controller modulates.
    pub fn register_cc(&mut self, delay: usize, channel: u8, cc: u8, value: u8) {
        let region = match &self.region {
            Some(region) => region.clone(),
            None => return,
        };
        if self.state == State::Idle || channel != self.trigger.channel {
            return;
        }

        if region.check_sustain
            && self.note_is_off
            && cc == config::SUSTAIN_CC
            && value < config::HALF_CC_THRESHOLD
        {
            self.release(delay);
        }

        if let Some(modulation) = region.amplitude_cc {
            if cc == modulation.cc {
                let gain =
                    self.base_gain * normalize_cc(value) * normalize_percents(modulation.depth);
                self.amplitude_envelope.register_event(delay, gain);
            }
        }

        if let Some(modulation) = region.volume_cc {
            if cc == modulation.cc {
                let volume_db = Region::clamped_volume_db(
                    self.base_volume_db + normalize_cc(value) * modulation.depth,
                );
                self.volume_envelope
                    .register_event(delay, db_to_gain(volume_db));
            }
        }

        if let Some(modulation) = region.pan_cc {
            if cc == modulation.cc {
                let pan = self.base_pan
                    + normalize_cc(value) * normalize_bipolar_percents(modulation.depth);
                self.pan_envelope.register_event(delay, pan);
            }
        }

        if let Some(modulation) = region.position_cc {
            if cc == modulation.cc {
                let position = self.base_position
                    + normalize_cc(value) * normalize_bipolar_percents(modulation.depth);
                self.position_envelope.register_event(delay, position);
            }
        }

        if let Some(modulation) = region.width_cc {
            if cc == modulation.cc {
                let width = self.base_width
                    + normalize_cc(value) * normalize_bipolar_percents(modulation.depth);
                self.width_envelope.register_event(delay, width);
            }
        }
    }

    /// Accepted but inert; pitch wheel rendering is not implemented.
    pub fn register_pitch_wheel(&mut self, _delay: usize, _bend: i32) {}

    /// Accepted but inert.
    pub fn register_aftertouch(&mut self, _delay: usize, _aftertouch: u8) {}

    /// Accepted but inert.
    pub fn register_tempo(&mut self, _delay: usize, _seconds_per_quarter: f32) {}

    /// Release the voice if a new voice starts in `group` and this region
    /// is configured to be offed by it.
    pub fn check_off_group(&mut self, delay: usize, group: u32) -> bool {
        let region = match &self.region {
            Some(region) => region.clone(),
            None => return false,
        };

        if Some(delay) == self.trigger_delay {
            return false;
        }

        if self.trigger.kind == TriggerType::NoteOn && region.off_by == Some(group) {
            self.release(delay);
            return true;
        }

        false
    }

    /// Transition playing to release, with the amplitude envelope starting
    /// its release `delay` samples into the next block.
    pub fn release(&mut self, delay: usize) {
        if self.state != State::Playing {
            return;
        }

        // Nothing audible happened yet when the envelope is still inside
        // its delay stage past the release point.
        if self.eg_envelope.remaining_delay() > delay.saturating_sub(self.initial_delay) {
            self.reset();
        } else {
            self.state = State::Release;
            self.eg_envelope.start_release(delay);
        }
    }

    /// Announce that a full-file buffer with this ticket may be delivered.
    pub fn expect_file_data(&mut self, ticket: u64) {
        self.expected_ticket = Some(ticket);
    }

    /// Deliver a full-file buffer. The buffer is dropped when the ticket
    /// does not match the expected one, so a late load for a voice that
    /// has since been re-armed cannot corrupt playback.
    pub fn set_file_data(&mut self, buffer: AudioBuffer<f32>, ticket: u64) -> bool {
        if self.expected_ticket == Some(ticket) {
            self.delivered_data = Some(buffer);
            self.expected_ticket = None;
            true
        } else {
            debug!(ticket, "dropping file data with a stale ticket");
            false
        }
    }

    /// Render one block into `buffer` (stereo). Idle voices write silence.
    pub fn render_block(&mut self, buffer: &mut AudioSpanMut<f32>) {
        debug_assert!(buffer.num_frames() <= self.samples_per_block);
        buffer.fill(0.0);

        let region = match (self.state, &self.region) {
            (State::Idle, _) | (_, None) => {
                self.power_history.push(0.0);
                return;
            }
            (_, Some(region)) => region.clone(),
        };

        let delay = self.initial_delay.min(buffer.num_frames());
        self.initial_delay -= delay;
        let mut delayed = buffer.reborrow().subspan(delay);

        if region.is_generator() {
            self.fill_with_generator(&mut delayed);
        } else {
            self.fill_with_data(&region, &mut delayed);
        }

        if region.is_stereo {
            self.process_stereo(buffer);
        } else {
            self.process_mono(buffer);
        }

        if !self.eg_envelope.is_smoothing() {
            self.reset();
        }

        self.power_history.push(buffer.mean_squared());
        self.trigger_delay = None;
    }

    /// Pull interpolated frames from the sample source into the block.
    fn fill_with_data(&mut self, region: &Region, out: &mut AudioSpanMut<f32>) {
        let frames = out.num_frames();
        if frames == 0 {
            return;
        }

        let promise = match &self.current_promise {
            Some(promise) => promise.clone(),
            None => {
                debug!("missing file promise while rendering");
                return;
            }
        };
        let oversampling = promise.oversampling();

        let step = self.pitch_ratio * self.speed_ratio;
        let start_position = self.source_position as i32;

        let last_index;
        let last_fraction;
        let mut release_offset = None;
        let looping;
        let loop_offset;
        let sample_end;

        {
            // The promise tail once ready, otherwise the preload head. A
            // buffer delivered through the ticket path wins over both.
            let source: &AudioBuffer<f32> = if let Some(delivered) = self.delivered_data.as_ref() {
                delivered
            } else if let Some(file_data) = promise.file_data() {
                file_data
            } else if let Some(preloaded) = promise.preloaded_data() {
                preloaded
            } else {
                return;
            };

            let source_frames = source.num_frames();
            let true_end = (region.true_sample_end(oversampling) as usize).min(source_frames);
            if true_end == 0 {
                return;
            }
            sample_end = true_end as i32 - 1;

            looping = region.should_loop()
                && (region.loop_end(oversampling) as usize) <= source_frames;
            loop_offset = sample_end - region.loop_start(oversampling) as i32;

            let indices = &mut self.indices.as_slice_mut()[..frames];
            let left_coeffs = &mut self.temp1.as_slice_mut()[..frames];
            let right_coeffs = &mut self.temp2.as_slice_mut()[..frames];

            // Per-sample fractional read positions, advancing by the pitch
            // dependent step.
            let mut position = self.float_position_offset;
            for i in 0..frames {
                let whole = position.floor();
                let fraction = position - whole;
                indices[i] = start_position + whole as i32;
                left_coeffs[i] = 1.0 - fraction;
                right_coeffs[i] = fraction;
                position += step;
            }

            if looping && loop_offset > 0 {
                for index in indices.iter_mut() {
                    while *index > sample_end {
                        *index -= loop_offset;
                    }
                }
            } else {
                // Hold at the last frame once the sample is exhausted.
                for i in 0..frames {
                    if indices[i] > sample_end {
                        for j in i..frames {
                            indices[j] = sample_end;
                            left_coeffs[j] = 0.0;
                            right_coeffs[j] = 1.0;
                        }
                        break;
                    }
                }
            }

            let left_source = source.padded_channel(0);
            if source.num_channels() == 1 {
                let left = out.channel_mut(0);
                for i in 0..frames {
                    let index = indices[i].max(0) as usize;
                    left[i] = left_source[index] * left_coeffs[i]
                        + left_source[index + 1] * right_coeffs[i];
                }
            } else {
                let right_source = source.padded_channel(1);
                let (left, right) = out.stereo_mut();
                for i in 0..frames {
                    let index = indices[i].max(0) as usize;
                    left[i] = left_source[index] * left_coeffs[i]
                        + left_source[index + 1] * right_coeffs[i];
                    right[i] = right_source[index] * left_coeffs[i]
                        + right_source[index + 1] * right_coeffs[i];
                }
            }

            last_index = indices[frames - 1];
            last_fraction = right_coeffs[frames - 1];

            if self.state != State::Release && !looping && last_index == sample_end {
                release_offset = indices.iter().position(|&index| index == sample_end);
            }
        }

        // Store the position of the next frame to read, keeping the
        // fractional part in [0, 1).
        let carry = last_fraction + step;
        let mut next_index = last_index + carry.floor() as i32;
        if looping && loop_offset > 0 {
            while next_index > sample_end {
                next_index -= loop_offset;
            }
        } else {
            next_index = next_index.min(sample_end);
        }
        self.source_position = next_index.max(0) as usize;
        self.float_position_offset = carry.fract();

        if let Some(first) = release_offset {
            self.release(first + 1);
            let mut tail = out.reborrow().subspan(first + 1);
            tail.fill(0.0);
        }
    }

    /// Synthesize the generator signal (only `*sine` exists).
    fn fill_with_generator(&mut self, out: &mut AudioSpanMut<f32>) {
        let frames = out.num_frames();
        if frames == 0 {
            return;
        }

        let step = self.base_frequency * TAU / self.sample_rate;
        let mut phase = self.phase;

        let (left, right) = out.stereo_mut();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            phase += step;
            let value = phase.sin();
            *l = value;
            *r = value;
        }

        // Wrap so longer notes do not lose precision.
        self.phase = phase % TAU;
    }

    /// Envelope stack and equal-power panning for a mono source.
    fn process_mono(&mut self, buffer: &mut AudioSpanMut<f32>) {
        let frames = buffer.num_frames();
        let block = &mut self.temp1.as_slice_mut()[..frames];

        self.amplitude_envelope.get_block(block);
        apply_gain_simd(block, buffer.channel_mut(0));

        self.eg_envelope.get_block(block);
        apply_gain_simd(block, buffer.channel_mut(0));

        self.volume_envelope.get_block(block);
        apply_gain_simd(block, buffer.channel_mut(0));

        let (left, right) = buffer.stereo_mut();
        right.copy_from_slice(left);

        self.pan_envelope.get_block(block);
        for i in 0..frames {
            let theta = (block[i] + 1.0) * FRAC_PI_4;
            left[i] *= theta.cos();
            right[i] *= theta.sin();
        }
    }

    /// Envelope stack, width and position processing for a stereo source.
    ///
    /// Width works on the mid/side decomposition: full width keeps the
    /// equal-power balance of mid and side, width zero collapses to the mid
    /// signal, negative widths flip the image. Position then pans the mid
    /// channel with the equal-power law before left/right are recovered.
    fn process_stereo(&mut self, buffer: &mut AudioSpanMut<f32>) {
        const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;

        let frames = buffer.num_frames();
        let block = &mut self.temp1.as_slice_mut()[..frames];

        self.amplitude_envelope.get_block(block);
        buffer.apply_gain_block(block);

        self.eg_envelope.get_block(block);
        buffer.apply_gain_block(block);

        self.volume_envelope.get_block(block);
        buffer.apply_gain_block(block);

        let (left, right) = buffer.stereo_mut();

        // Mid in the left lane, side in the right lane.
        for i in 0..frames {
            let mid = (left[i] + right[i]) * INV_SQRT2;
            let side = (left[i] - right[i]) * INV_SQRT2;
            left[i] = mid;
            right[i] = side;
        }

        self.width_envelope.get_block(block);
        for i in 0..frames {
            let theta = block[i] * FRAC_PI_4;
            left[i] *= theta.cos();
            right[i] *= theta.sin();
        }

        self.position_envelope.get_block(block);
        for i in 0..frames {
            let theta = (block[i] + 1.0) * FRAC_PI_4;
            let mid = left[i];
            let side = right[i];
            left[i] = (mid * theta.cos() * SQRT_2 + side) * INV_SQRT2;
            right[i] = (mid * theta.sin() * SQRT_2 - side) * INV_SQRT2;
        }
    }

    /// Return the voice to idle and drop its promise.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.region = None;
        self.current_promise = None;
        self.delivered_data = None;
        self.expected_ticket = None;
        self.source_position = 0;
        self.float_position_offset = 0.0;
        self.initial_delay = 0;
        self.note_is_off = false;
        self.phase = 0.0;
    }

    pub fn is_free(&self) -> bool {
        self.state == State::Idle
    }

    /// Only releasing voices may be stolen.
    pub fn can_be_stolen(&self) -> bool {
        self.state == State::Release
    }

    /// The average power of the recently rendered blocks.
    pub fn mean_squared_average(&self) -> f32 {
        self.power_history.average()
    }

    pub fn trigger(&self) -> TriggerEvent {
        self.trigger
    }

    pub fn region(&self) -> Option<&Arc<Region>> {
        self.region.as_ref()
    }

    pub fn source_position(&self) -> usize {
        self.source_position
    }

    /// Clear the power history along with the voice state; used when a
    /// voice is recycled wholesale.
    pub fn garbage_collect(&mut self) {
        self.reset();
        self.power_history.reset();
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}
