use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::audio_buffer::{AudioBuffer, AudioSpanMut};
use crate::audio_stream::{AudioStreamParams, ChannelCount};
use crate::config::{EngineConfig, NUM_CHANNELS};
use crate::file_pool::FilePool;
use crate::midi_state::MidiState;
use crate::region::Region;
use crate::voice::{TriggerEvent, Voice};

/// The polyphony driver: a fixed voice set, the sample pool and the MIDI
/// snapshot, with event dispatch and the block render loop on top.
///
/// All event and render entry points are allocation free and never block;
/// configuration entry points (regions, preload size, oversampling) belong
/// on a control thread.
pub struct Engine {
    voices: Vec<Voice>,
    file_pool: FilePool,
    midi_state: MidiState,
    regions: Vec<Arc<Region>>,
    scratch: AudioBuffer<f32>,
    master_gain: f32,
    sample_rate: f32,
    samples_per_block: usize,
}

impl Engine {
    pub fn new(root_directory: impl Into<PathBuf>, config: EngineConfig) -> Self {
        let file_pool = FilePool::new(root_directory, &config);

        let mut voices = Vec::with_capacity(config.max_voices);
        for _ in 0..config.max_voices {
            let mut voice = Voice::new();
            voice.set_sample_rate(config.sample_rate);
            voice.set_samples_per_block(config.samples_per_block);
            voices.push(voice);
        }

        Self {
            voices,
            file_pool,
            midi_state: MidiState::new(),
            regions: Vec::new(),
            scratch: AudioBuffer::new(NUM_CHANNELS, config.samples_per_block),
            master_gain: 1.0,
            sample_rate: config.sample_rate,
            samples_per_block: config.samples_per_block,
        }
    }

    pub fn file_pool(&self) -> &FilePool {
        &self.file_pool
    }

    pub fn file_pool_mut(&mut self) -> &mut FilePool {
        &mut self.file_pool
    }

    pub fn midi_state(&self) -> &MidiState {
        &self.midi_state
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// The parameters of the stream this engine renders.
    pub fn stream_params(&self) -> AudioStreamParams {
        AudioStreamParams::new(self.sample_rate as u32, ChannelCount::Stereo)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in self.voices.iter_mut() {
            voice.set_sample_rate(sample_rate);
        }
    }

    pub fn set_samples_per_block(&mut self, samples_per_block: usize) {
        self.samples_per_block = samples_per_block;
        self.scratch = AudioBuffer::new(NUM_CHANNELS, samples_per_block);
        for voice in self.voices.iter_mut() {
            voice.set_samples_per_block(samples_per_block);
        }
    }

    /// Master output gain, linear.
    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    /// Register a region, preloading its sample. Returns false when the
    /// sample cannot be loaded; the region is not registered in that case.
    pub fn add_region(&mut self, region: Region) -> bool {
        if !region.is_generator() && !self.file_pool.preload_file(&region.sample, region.offset) {
            return false;
        }
        self.regions.push(Arc::new(region));
        true
    }

    /// Register a bank of regions, preloading their samples in parallel.
    /// Regions whose samples fail to load are skipped.
    pub fn add_regions(&mut self, regions: Vec<Region>) -> bool {
        let files: Vec<(String, u32)> = regions
            .iter()
            .filter(|region| !region.is_generator())
            .map(|region| (region.sample.clone(), region.offset))
            .collect();
        let mut all_ok = self.file_pool.preload_files(&files);

        for region in regions {
            if region.is_generator() || self.file_pool.is_preloaded(&region.sample) {
                self.regions.push(Arc::new(region));
            } else {
                debug!(sample = %region.sample, "skipping region with unloadable sample");
                all_ok = false;
            }
        }
        all_ok
    }

    /// Start voices for every region matching the note and velocity.
    pub fn note_on(&mut self, delay: usize, channel: u8, note: u8, velocity: u8) {
        for index in 0..self.regions.len() {
            let region = self.regions[index].clone();
            if !region.matches(note, velocity) {
                continue;
            }

            // A region in a polyphony group silences the voices configured
            // to be offed by that group.
            if region.group != 0 {
                for voice in self.voices.iter_mut() {
                    voice.check_off_group(delay, region.group);
                }
            }

            let trigger = TriggerEvent::note_on(channel, note, velocity);
            match self.find_voice_index() {
                Some(voice_index) => {
                    let voice = &mut self.voices[voice_index];
                    voice.start_voice(&region, delay, trigger, &self.file_pool, &self.midi_state);
                }
                None => {
                    debug!(note, "no voice available for note on");
                }
            }
        }
    }

    pub fn note_off(&mut self, delay: usize, channel: u8, note: u8, velocity: u8) {
        for voice in self.voices.iter_mut() {
            voice.register_note_off(delay, channel, note, velocity, &self.midi_state);
        }
    }

    pub fn cc(&mut self, delay: usize, channel: u8, cc: u8, value: u8) {
        self.midi_state.set_cc(cc, value);
        for voice in self.voices.iter_mut() {
            voice.register_cc(delay, channel, cc, value);
        }
    }

    pub fn pitch_wheel(&mut self, delay: usize, bend: i32) {
        self.midi_state.set_pitch_bend(bend);
        for voice in self.voices.iter_mut() {
            voice.register_pitch_wheel(delay, bend);
        }
    }

    /// A free voice, or the quietest stealable one.
    fn find_voice_index(&self) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|voice| voice.is_free()) {
            return Some(index);
        }

        let mut quietest: Option<(usize, f32)> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if !voice.can_be_stolen() {
                continue;
            }
            let power = voice.mean_squared_average();
            if quietest.map_or(true, |(_, best)| power < best) {
                quietest = Some((index, power));
            }
        }
        quietest.map(|(index, _)| index)
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|voice| !voice.is_free()).count()
    }

    /// Render one block of all sounding voices into `out` and run the
    /// pool's promise cleanup.
    pub fn render(&mut self, out: &mut AudioSpanMut<f32>) {
        out.fill(0.0);
        let frames = out.num_frames().min(self.samples_per_block);

        for index in 0..self.voices.len() {
            if self.voices[index].is_free() {
                continue;
            }

            let mut scratch = self.scratch.span_mut().first(frames);
            self.voices[index].render_block(&mut scratch);
            out.add(&scratch.as_span());
        }

        if self.master_gain != 1.0 {
            out.apply_gain(self.master_gain);
        }

        self.file_pool.cleanup_promises();
    }

    /// Reclaim promises outside of the render call.
    pub fn garbage_collect(&mut self) {
        self.file_pool.cleanup_promises();
    }

    /// Silence everything and return every voice to idle.
    pub fn all_sound_off(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
    }
}
