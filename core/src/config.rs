use crate::file_pool::Oversampling;

/// Default sample rate assumed before the host pushes its own.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Default (and maximum expected) block size before `set_samples_per_block`.
pub const DEFAULT_SAMPLES_PER_BLOCK: usize = 1024;

/// Number of frames kept resident per sample file, on top of the region offset.
pub const PRELOAD_SIZE: u32 = 8192;

/// Upper bound of simultaneously sounding voices. Also the capacity of the
/// file loading queues.
pub const MAX_VOICES: usize = 64;

/// Number of background file loading threads.
pub const NUM_BACKGROUND_THREADS: usize = 4;

/// Output channel count. Only stereo output is supported.
pub const NUM_CHANNELS: usize = 2;

/// Maximum channel count of any audio buffer or span.
pub const MAX_CHANNELS: usize = 2;

/// The MIDI CC number of the sustain pedal.
pub const SUSTAIN_CC: u8 = 64;

/// CC values at or above this threshold count as "pedal down".
pub const HALF_CC_THRESHOLD: u8 = 64;

/// Byte alignment of audio storage, matching the widest vector loads in use.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Envelope values below this are considered silent.
pub const VIRTUALLY_ZERO: f32 = 0.00005;

/// Number of past blocks tracked for the voice power average.
pub const POWER_HISTORY_LENGTH: usize = 16;

pub const MIN_VOLUME_DB: f32 = -144.0;
pub const MAX_VOLUME_DB: f32 = 6.0;

pub const CENTS_PER_SEMITONE: f32 = 100.0;

/// Tunable engine parameters. The constants above are the defaults.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub samples_per_block: usize,
    pub preload_size: u32,
    pub oversampling_factor: Oversampling,
    pub num_background_threads: usize,
    pub max_voices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples_per_block: DEFAULT_SAMPLES_PER_BLOCK,
            preload_size: PRELOAD_SIZE,
            oversampling_factor: Oversampling::X1,
            num_background_threads: NUM_BACKGROUND_THREADS,
            max_voices: MAX_VOICES,
        }
    }
}
