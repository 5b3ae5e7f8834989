use crate::config::{CENTS_PER_SEMITONE, MAX_VOLUME_DB, MIN_VOLUME_DB};
use crate::file_pool::Oversampling;
use crate::helpers::{cents_factor, db_to_gain, normalize_cc, normalize_percents};
use crate::midi_state::MidiState;

/// How a region reacts to the end of its sample and to note-off events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play through once; note-off releases the voice.
    #[default]
    NoLoop,
    /// Play through once, ignoring note-off.
    OneShot,
    /// Loop between the loop points for as long as the voice sounds.
    Continuous,
}

/// Whether a region plays a sample or synthesizes its signal. The only
/// generator recognized by name is `*sine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorKind {
    #[default]
    Sampled,
    Sine,
}

/// A modulation route from a MIDI controller to a region parameter, with
/// the depth expressed in the parameter's own unit.
#[derive(Debug, Clone, Copy)]
pub struct CcModulation {
    pub cc: u8,
    pub depth: f32,
}

/// A closed value range.
#[derive(Debug, Clone, Copy)]
pub struct Range<T> {
    pub start: T,
    pub end: T,
}

impl<T: Copy + PartialOrd> Range<T> {
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.start && value <= self.end
    }
}

/// The shape of key and velocity crossfades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    /// Linear in gain.
    Gain,
    /// Square root, preserving perceived power across the fade.
    #[default]
    Power,
}

fn crossfade_in(range: Range<u8>, value: u8, curve: CrossfadeCurve) -> f32 {
    if value < range.start {
        0.0
    } else if value < range.end {
        let length = (range.end - range.start).max(1) as f32;
        let position = (value - range.start) as f32 / length;
        match curve {
            CrossfadeCurve::Power => position.sqrt(),
            CrossfadeCurve::Gain => position,
        }
    } else {
        1.0
    }
}

fn crossfade_out(range: Range<u8>, value: u8, curve: CrossfadeCurve) -> f32 {
    if value > range.end {
        0.0
    } else if value > range.start {
        let length = (range.end - range.start).max(1) as f32;
        let position = (value - range.start) as f32 / length;
        match curve {
            CrossfadeCurve::Power => (1.0 - position).sqrt(),
            CrossfadeCurve::Gain => 1.0 - position,
        }
    } else {
        1.0
    }
}

/// One stage set of the amplitude envelope generator, in seconds (sustain
/// and start in percent), each modulated by velocity and optionally by a
/// controller.
#[derive(Debug, Clone, Copy)]
pub struct EgDescription {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub start: f32,

    pub vel2delay: f32,
    pub vel2attack: f32,
    pub vel2hold: f32,
    pub vel2decay: f32,
    pub vel2sustain: f32,
    pub vel2release: f32,

    pub cc_delay: Option<CcModulation>,
    pub cc_attack: Option<CcModulation>,
    pub cc_hold: Option<CcModulation>,
    pub cc_decay: Option<CcModulation>,
    pub cc_sustain: Option<CcModulation>,
    pub cc_release: Option<CcModulation>,
}

impl Default for EgDescription {
    fn default() -> Self {
        Self {
            delay: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 100.0,
            release: 0.0,
            start: 0.0,
            vel2delay: 0.0,
            vel2attack: 0.0,
            vel2hold: 0.0,
            vel2decay: 0.0,
            vel2sustain: 0.0,
            vel2release: 0.0,
            cc_delay: None,
            cc_attack: None,
            cc_hold: None,
            cc_decay: None,
            cc_sustain: None,
            cc_release: None,
        }
    }
}

const EG_TIME_RANGE: (f32, f32) = (0.0, 100.0);

impl EgDescription {
    fn stage_value(
        base: f32,
        vel2: f32,
        cc: Option<CcModulation>,
        midi: &MidiState,
        velocity: u8,
    ) -> f32 {
        let mut value = base + vel2 * normalize_cc(velocity);
        if let Some(modulation) = cc {
            value += modulation.depth * midi.cc_normalized(modulation.cc);
        }
        value.clamp(EG_TIME_RANGE.0, EG_TIME_RANGE.1)
    }

    pub fn get_delay(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(self.delay, self.vel2delay, self.cc_delay, midi, velocity)
    }

    pub fn get_attack(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(self.attack, self.vel2attack, self.cc_attack, midi, velocity)
    }

    pub fn get_hold(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(self.hold, self.vel2hold, self.cc_hold, midi, velocity)
    }

    pub fn get_decay(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(self.decay, self.vel2decay, self.cc_decay, midi, velocity)
    }

    /// Sustain level in percent.
    pub fn get_sustain(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(
            self.sustain,
            self.vel2sustain,
            self.cc_sustain,
            midi,
            velocity,
        )
    }

    pub fn get_release(&self, midi: &MidiState, velocity: u8) -> f32 {
        Self::stage_value(
            self.release,
            self.vel2release,
            self.cc_release,
            midi,
            velocity,
        )
    }

    /// Start level in percent.
    pub fn get_start(&self, _midi: &MidiState, _velocity: u8) -> f32 {
        self.start.clamp(0.0, 100.0)
    }
}

/// One unit of the instrument description: a sample (or generator), its
/// trigger conditions and its modulation routes. Regions are immutable
/// while any voice plays them.
#[derive(Debug, Clone)]
pub struct Region {
    /// Sample file name relative to the pool root, or a generator name.
    pub sample: String,
    pub generator: GeneratorKind,
    pub is_stereo: bool,

    pub key_range: Range<u8>,
    pub vel_range: Range<u8>,

    pub pitch_keycenter: u8,
    /// Cents added per key away from the key center.
    pub pitch_keytrack: f32,
    /// Cents added at full velocity.
    pub pitch_veltrack: f32,
    /// Sample tuning in cents.
    pub tune: f32,
    /// Transposition in semitones.
    pub transpose: i32,

    /// Base volume in dB.
    pub volume: f32,
    /// Base amplitude in percent.
    pub amplitude: f32,
    /// Pan, position and width in signed percent.
    pub pan: f32,
    pub position: f32,
    pub width: f32,

    /// dB added per key away from the amplitude key center.
    pub amp_keytrack: f32,
    pub amp_keycenter: u8,
    /// Velocity tracking amount in percent.
    pub amp_veltrack: f32,

    pub crossfade_key_in: Option<Range<u8>>,
    pub crossfade_key_out: Option<Range<u8>>,
    pub crossfade_vel_in: Option<Range<u8>>,
    pub crossfade_vel_out: Option<Range<u8>>,
    pub crossfade_key_curve: CrossfadeCurve,
    pub crossfade_vel_curve: CrossfadeCurve,
    pub crossfade_cc_in: Vec<(u8, Range<u8>)>,
    pub crossfade_cc_out: Vec<(u8, Range<u8>)>,
    pub crossfade_cc_curve: CrossfadeCurve,

    /// Modulation routes; depths in percent for amplitude, dB for volume,
    /// signed percent for pan, position and width.
    pub amplitude_cc: Option<CcModulation>,
    pub volume_cc: Option<CcModulation>,
    pub pan_cc: Option<CcModulation>,
    pub position_cc: Option<CcModulation>,
    pub width_cc: Option<CcModulation>,

    /// Start offset, end and loop points in native sample frames.
    pub offset: u32,
    pub sample_end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub loop_mode: LoopMode,

    /// Delay before the voice starts, in seconds.
    pub delay: f32,

    /// Polyphony group this region belongs to; zero means none.
    pub group: u32,
    /// Starting a voice in this group releases this region's voices.
    pub off_by: Option<u32>,
    /// Whether the sustain pedal holds note-offs back.
    pub check_sustain: bool,

    pub amp_eg: EgDescription,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            sample: String::new(),
            generator: GeneratorKind::Sampled,
            is_stereo: false,
            key_range: Range::new(0, 127),
            vel_range: Range::new(0, 127),
            pitch_keycenter: 60,
            pitch_keytrack: 100.0,
            pitch_veltrack: 0.0,
            tune: 0.0,
            transpose: 0,
            volume: 0.0,
            amplitude: 100.0,
            pan: 0.0,
            position: 0.0,
            width: 100.0,
            amp_keytrack: 0.0,
            amp_keycenter: 60,
            amp_veltrack: 100.0,
            crossfade_key_in: None,
            crossfade_key_out: None,
            crossfade_vel_in: None,
            crossfade_vel_out: None,
            crossfade_key_curve: CrossfadeCurve::default(),
            crossfade_vel_curve: CrossfadeCurve::default(),
            crossfade_cc_in: Vec::new(),
            crossfade_cc_out: Vec::new(),
            crossfade_cc_curve: CrossfadeCurve::Gain,
            amplitude_cc: None,
            volume_cc: None,
            pan_cc: None,
            position_cc: None,
            width_cc: None,
            offset: 0,
            sample_end: u32::MAX,
            loop_start: 0,
            loop_end: u32::MAX,
            loop_mode: LoopMode::default(),
            delay: 0.0,
            group: 0,
            off_by: None,
            check_sustain: true,
            amp_eg: EgDescription::default(),
        }
    }
}

impl Region {
    /// A region playing the named sample across the whole key range.
    pub fn with_sample(sample: impl Into<String>) -> Self {
        let sample = sample.into();
        let generator = if sample == "*sine" {
            GeneratorKind::Sine
        } else {
            GeneratorKind::Sampled
        };
        Self {
            sample,
            generator,
            ..Default::default()
        }
    }

    pub fn is_generator(&self) -> bool {
        self.generator != GeneratorKind::Sampled
    }

    pub fn should_loop(&self) -> bool {
        self.loop_mode == LoopMode::Continuous
    }

    pub fn matches(&self, note: u8, velocity: u8) -> bool {
        self.key_range.contains(note) && self.vel_range.contains(velocity)
    }

    /// The playback rate factor for a note and velocity, from key tracking,
    /// tuning, transposition and velocity tracking.
    pub fn base_pitch_variation(&self, note: u8, velocity: u8) -> f32 {
        let mut cents = self.pitch_keytrack * (note as f32 - self.pitch_keycenter as f32);
        cents += self.tune;
        cents += CENTS_PER_SEMITONE * self.transpose as f32;
        cents += normalize_cc(velocity) * self.pitch_veltrack;
        cents_factor(cents)
    }

    pub fn base_volume_db(&self, _note: u8) -> f32 {
        self.volume
    }

    pub fn base_gain(&self) -> f32 {
        normalize_percents(self.amplitude)
    }

    /// The gain contribution of key and velocity: amplitude key tracking,
    /// the velocity curve and the key/velocity crossfades.
    pub fn note_gain(&self, note: u8, velocity: u8) -> f32 {
        let mut gain = db_to_gain(self.amp_keytrack * (note as f32 - self.amp_keycenter as f32));

        if let Some(range) = self.crossfade_key_in {
            gain *= crossfade_in(range, note, self.crossfade_key_curve);
        }
        if let Some(range) = self.crossfade_key_out {
            gain *= crossfade_out(range, note, self.crossfade_key_curve);
        }

        gain *= self.velocity_curve(velocity);

        if let Some(range) = self.crossfade_vel_in {
            gain *= crossfade_in(range, velocity, self.crossfade_vel_curve);
        }
        if let Some(range) = self.crossfade_vel_out {
            gain *= crossfade_out(range, velocity, self.crossfade_vel_curve);
        }

        gain
    }

    /// The gain contribution of controller crossfades for the current CC
    /// snapshot.
    pub fn crossfade_gain(&self, midi: &MidiState) -> f32 {
        let mut gain = 1.0;

        for &(cc, range) in self.crossfade_cc_in.iter() {
            gain *= crossfade_in(range, midi.cc_value(cc), self.crossfade_cc_curve);
        }
        for &(cc, range) in self.crossfade_cc_out.iter() {
            gain *= crossfade_out(range, midi.cc_value(cc), self.crossfade_cc_curve);
        }

        gain
    }

    fn velocity_curve(&self, velocity: u8) -> f32 {
        let float_velocity = normalize_cc(velocity);
        let gain_db = if self.amp_veltrack >= 0.0 {
            if float_velocity == 0.0 {
                -90.0
            } else {
                40.0 * float_velocity.log10()
            }
        } else if float_velocity == 1.0 {
            -90.0
        } else {
            40.0 * (1.0 - float_velocity).log10()
        };

        db_to_gain(gain_db * self.amp_veltrack.abs() / 100.0)
    }

    pub fn clamped_volume_db(db: f32) -> f32 {
        db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
    }

    pub fn offset(&self, factor: Oversampling) -> u32 {
        self.offset.saturating_mul(factor.factor())
    }

    /// The last frame the voice may address, before clamping to the
    /// actual source length.
    pub fn true_sample_end(&self, factor: Oversampling) -> u32 {
        self.sample_end
            .min(self.loop_end)
            .saturating_mul(factor.factor())
    }

    pub fn loop_start(&self, factor: Oversampling) -> u32 {
        self.loop_start.saturating_mul(factor.factor())
    }

    pub fn loop_end(&self, factor: Oversampling) -> u32 {
        self.loop_end.saturating_mul(factor.factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_variation() {
        let region = Region::with_sample("a.wav");
        assert!((region.base_pitch_variation(60, 64) - 1.0).abs() < 1e-6);
        assert!((region.base_pitch_variation(72, 64) - 2.0).abs() < 1e-5);
        assert!((region.base_pitch_variation(48, 64) - 0.5).abs() < 1e-5);

        let region = Region {
            tune: 100.0,
            ..Region::with_sample("a.wav")
        };
        let semitone = 2f32.powf(1.0 / 12.0);
        assert!((region.base_pitch_variation(60, 64) - semitone).abs() < 1e-5);

        let region = Region {
            transpose: 12,
            ..Region::with_sample("a.wav")
        };
        assert!((region.base_pitch_variation(60, 64) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_generator_recognition() {
        assert!(Region::with_sample("*sine").is_generator());
        assert!(!Region::with_sample("kick.wav").is_generator());
    }

    #[test]
    fn test_velocity_curve() {
        let region = Region::with_sample("a.wav");
        assert!((region.note_gain(60, 127) - 1.0).abs() < 1e-5);
        assert!(region.note_gain(60, 64) < region.note_gain(60, 127));
        assert!(region.note_gain(60, 0) < 1e-4);

        // With no velocity tracking the gain stays flat.
        let region = Region {
            amp_veltrack: 0.0,
            ..Region::with_sample("a.wav")
        };
        assert!((region.note_gain(60, 1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_amp_keytrack() {
        let region = Region {
            amp_keytrack: 6.0,
            amp_veltrack: 0.0,
            ..Region::with_sample("a.wav")
        };
        let up = region.note_gain(61, 127);
        assert!((up - db_to_gain(6.0)).abs() < 1e-5);
    }

    #[test]
    fn test_key_crossfades() {
        let region = Region {
            crossfade_key_in: Some(Range::new(10, 20)),
            crossfade_key_curve: CrossfadeCurve::Gain,
            amp_veltrack: 0.0,
            ..Region::with_sample("a.wav")
        };
        assert_eq!(region.note_gain(5, 127), 0.0);
        assert!((region.note_gain(15, 127) - 0.5).abs() < 1e-5);
        assert_eq!(region.note_gain(25, 127), 1.0);
    }

    #[test]
    fn test_cc_crossfade_gain() {
        let region = Region {
            crossfade_cc_in: vec![(20, Range::new(0, 100))],
            ..Region::with_sample("a.wav")
        };
        let mut midi = MidiState::new();
        assert_eq!(region.crossfade_gain(&midi), 0.0);
        midi.set_cc(20, 50);
        assert!((region.crossfade_gain(&midi) - 0.5).abs() < 1e-5);
        midi.set_cc(20, 110);
        assert_eq!(region.crossfade_gain(&midi), 1.0);
    }

    #[test]
    fn test_eg_description_modulation() {
        let eg = EgDescription {
            attack: 1.0,
            vel2attack: -1.27,
            cc_attack: Some(CcModulation {
                cc: 63,
                depth: 1.27,
            }),
            ..Default::default()
        };
        let mut midi = MidiState::new();
        assert!((eg.get_attack(&midi, 0) - 1.0).abs() < 1e-5);
        assert!((eg.get_attack(&midi, 127) - 0.0).abs() < 1e-5);
        midi.set_cc(63, 127);
        assert!((eg.get_attack(&midi, 127) - 1.0).abs() < 1e-5);
        assert!((eg.get_attack(&midi, 0) - 2.27).abs() < 1e-5);

        let eg = EgDescription {
            attack: 1.0,
            cc_attack: Some(CcModulation {
                cc: 63,
                depth: 127.0,
            }),
            ..Default::default()
        };
        assert!((eg.get_attack(&midi, 0) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_oversampled_boundaries() {
        let region = Region {
            offset: 10,
            sample_end: 1000,
            loop_start: 100,
            loop_end: 900,
            ..Region::with_sample("a.wav")
        };
        assert_eq!(region.offset(Oversampling::X2), 20);
        assert_eq!(region.true_sample_end(Oversampling::X2), 1800);
        assert_eq!(region.loop_start(Oversampling::X4), 400);
        assert_eq!(region.loop_end(Oversampling::X8), 7200);
    }

    #[test]
    fn test_matching() {
        let region = Region {
            key_range: Range::new(40, 60),
            vel_range: Range::new(1, 127),
            ..Region::with_sample("a.wav")
        };
        assert!(region.matches(40, 64));
        assert!(region.matches(60, 127));
        assert!(!region.matches(61, 64));
        assert!(!region.matches(50, 0));
    }
}
