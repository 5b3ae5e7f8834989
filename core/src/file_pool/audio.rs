use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBuffer as DecodedBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

use super::{FileInformation, Oversampling};
use crate::audio_buffer::AudioBuffer;
use crate::audio_stream::ChannelCount;

/// Errors that can be generated when loading an audio file.
#[derive(Debug, Error)]
pub enum AudioLoadError {
    #[error("IO Error")]
    IoError(#[from] io::Error),

    #[error("Audio decoding failed for {0}")]
    DecodingFailed(PathBuf, Error),

    #[error("Audio file {0} has an invalid channel count ({1})")]
    InvalidChannelCount(PathBuf, usize),

    #[error("Audio file {0} has no tracks")]
    NoTracks(PathBuf),
}

fn probe_format(
    path: &Path,
) -> Result<Box<dyn symphonia::core::formats::FormatReader>, AudioLoadError> {
    let extension = path.extension().and_then(|ext| ext.to_str());

    let file = Box::new(File::open(path)?);
    let mss = MediaSourceStream::new(file, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| AudioLoadError::DecodingFailed(path.to_path_buf(), e))?;

    Ok(probed.format)
}

/// Read the stream parameters of a file without decoding its contents.
pub(super) fn probe_file_information(path: &Path) -> Result<FileInformation, AudioLoadError> {
    let format = probe_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| AudioLoadError::NoTracks(path.to_path_buf()))?;

    let num_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    if ChannelCount::from_count(num_channels as u16).is_none() {
        return Err(AudioLoadError::InvalidChannelCount(
            path.to_path_buf(),
            num_channels,
        ));
    }

    Ok(FileInformation {
        frames: track.codec_params.n_frames.unwrap_or(0) as u32,
        sample_rate: track.codec_params.sample_rate.unwrap_or(44100),
        num_channels,
    })
}

/// Decode a file into planar float channels, stopping after `max_frames`
/// when given, and apply the oversampling pre-pass.
///
/// Returns the decoded buffer and the file's native sample rate.
pub(super) fn load_audio_file(
    path: &Path,
    max_frames: Option<u32>,
    oversampling: Oversampling,
) -> Result<(AudioBuffer<f32>, u32), AudioLoadError> {
    let mut format = probe_format(path)?;

    let track = format
        .default_track()
        .ok_or_else(|| AudioLoadError::NoTracks(path.to_path_buf()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let num_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    if ChannelCount::from_count(num_channels as u16).is_none() {
        return Err(AudioLoadError::InvalidChannelCount(
            path.to_path_buf(),
            num_channels,
        ));
    }

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| AudioLoadError::DecodingFailed(path.to_path_buf(), e))?;

    let track_id = track.id;

    let mut builder = ChannelVecsBuilder::new(num_channels);

    loop {
        if let Some(max_frames) = max_frames {
            if builder.frames() >= max_frames as usize {
                break;
            }
        }

        let packet = match format.next_packet() {
            Err(Error::IoError(error)) if error.kind() == io::ErrorKind::UnexpectedEof => {
                // Audio source ended. Currently the lib has no cleaner way of detecting this.
                break;
            }
            Err(error) => return Err(AudioLoadError::DecodingFailed(path.to_path_buf(), error)),
            Ok(packet) => packet,
        };

        if packet.track_id() != track_id {
            continue;
        }

        // Decode the packet into audio samples, ignoring any decode errors.
        match decoder.decode(&packet) {
            Ok(audio_buf) => builder.push(audio_buf),
            Err(Error::DecodeError(_)) => (),
            Err(e) => return Err(AudioLoadError::DecodingFailed(path.to_path_buf(), e)),
        }
    }

    let buffer = builder.finish(max_frames.map(|f| f as usize), oversampling);
    Ok((buffer, sample_rate))
}

/// Accumulates decoded packets as planar float channels.
struct ChannelVecsBuilder {
    vecs: Vec<Vec<f32>>,
}

impl ChannelVecsBuilder {
    fn new(channels: usize) -> Self {
        let mut vecs = Vec::new();
        for _ in 0..channels {
            vecs.push(Vec::new());
        }

        Self { vecs }
    }

    fn frames(&self) -> usize {
        self.vecs.first().map(|v| v.len()).unwrap_or(0)
    }

    fn push(&mut self, buffer: AudioBufferRef) {
        match buffer {
            AudioBufferRef::U8(buf) => self.push_buffer(&buf),
            AudioBufferRef::U16(buf) => self.push_buffer(&buf),
            AudioBufferRef::U24(buf) => self.push_buffer(&buf),
            AudioBufferRef::U32(buf) => self.push_buffer(&buf),
            AudioBufferRef::S8(buf) => self.push_buffer(&buf),
            AudioBufferRef::S16(buf) => self.push_buffer(&buf),
            AudioBufferRef::S24(buf) => self.push_buffer(&buf),
            AudioBufferRef::S32(buf) => self.push_buffer(&buf),
            AudioBufferRef::F32(buf) => self.push_buffer(&buf),
            AudioBufferRef::F64(buf) => self.push_buffer(&buf),
        }
    }

    fn push_buffer(&mut self, buffer: &DecodedBuffer<impl Sample + IntoSample<f32>>) {
        let channels = buffer.spec().channels.count().min(self.vecs.len());

        for c in 0..channels {
            let channel = buffer.chan(c);
            self.vecs[c].reserve(channel.len());
            for &sample in channel.iter() {
                self.vecs[c].push(sample.into_sample());
            }
        }
    }

    fn finish(self, max_frames: Option<usize>, oversampling: Oversampling) -> AudioBuffer<f32> {
        let factor = oversampling.factor() as usize;

        let mut frames = self.frames();
        if let Some(max_frames) = max_frames {
            frames = frames.min(max_frames);
        }

        let mut buffer = AudioBuffer::new(self.vecs.len(), frames * factor);
        for (index, source) in self.vecs.iter().enumerate() {
            upsample_linear(&source[..frames], buffer.channel_mut(index), factor);
        }
        buffer
    }
}

/// Linear-interpolation upsampling by an integer factor. The last input
/// frame is held, since there is no successor to interpolate toward.
fn upsample_linear(source: &[f32], target: &mut [f32], factor: usize) {
    if factor == 1 {
        target.copy_from_slice(source);
        return;
    }

    for (i, out) in target.iter_mut().enumerate() {
        let position = i / factor;
        let fraction = (i % factor) as f32 / factor as f32;
        let current = source[position];
        let next = if position + 1 < source.len() {
            source[position + 1]
        } else {
            current
        };
        *out = current + (next - current) * fraction;
    }
}
