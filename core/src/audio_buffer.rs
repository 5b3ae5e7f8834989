use std::marker::PhantomData;
use std::ptr;

use crate::buffer::{AlignedBuffer, Scalar};
use crate::config::MAX_CHANNELS;
use crate::helpers::{apply_gain_simd, apply_uniform_gain_simd, mean_squared_simd, sum_simd};

/// An owning multi-channel audio storage. Each channel is a separately
/// allocated [`AlignedBuffer`] of the same frame count.
pub struct AudioBuffer<T: Scalar> {
    channels: Vec<AlignedBuffer<T>>,
    num_frames: usize,
}

impl<T: Scalar> AudioBuffer<T> {
    pub fn new(num_channels: usize, num_frames: usize) -> Self {
        debug_assert!(num_channels <= MAX_CHANNELS);
        let channels = (0..num_channels.min(MAX_CHANNELS))
            .map(|_| AlignedBuffer::new(num_frames))
            .collect();
        Self {
            channels,
            num_frames,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn channel(&self, index: usize) -> &[T] {
        self.channels[index].as_slice()
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        self.channels[index].as_slice_mut()
    }

    /// A channel extended over its zeroed end padding, for readers that
    /// fetch one element past the last frame.
    pub fn padded_channel(&self, index: usize) -> &[T] {
        self.channels[index].padded_slice()
    }

    pub fn span(&self) -> AudioSpan<'_, T> {
        let mut channels = [ptr::null(); MAX_CHANNELS];
        for (ptr, buffer) in channels.iter_mut().zip(self.channels.iter()) {
            *ptr = buffer.data();
        }
        AudioSpan {
            channels,
            num_channels: self.channels.len(),
            num_frames: self.num_frames,
            _marker: PhantomData,
        }
    }

    pub fn span_mut(&mut self) -> AudioSpanMut<'_, T> {
        let num_channels = self.channels.len();
        let mut channels = [ptr::null_mut(); MAX_CHANNELS];
        for (ptr, buffer) in channels.iter_mut().zip(self.channels.iter_mut()) {
            *ptr = buffer.data_mut();
        }
        AudioSpanMut {
            channels,
            num_channels,
            num_frames: self.num_frames,
            _marker: PhantomData,
        }
    }
}

/// A borrowed, read-only view over up to [`MAX_CHANNELS`] channels sharing
/// one frame count. Cheap to copy and pass around.
#[derive(Clone, Copy)]
pub struct AudioSpan<'a, T: Scalar> {
    channels: [*const T; MAX_CHANNELS],
    num_channels: usize,
    num_frames: usize,
    _marker: PhantomData<&'a [T]>,
}

impl<'a, T: Scalar> AudioSpan<'a, T> {
    /// Build a span from per-channel slices. The frame count is the minimum
    /// of the source lengths.
    pub fn from_slices(slices: &[&'a [T]]) -> Self {
        let num_channels = slices.len().min(MAX_CHANNELS);
        let num_frames = slices[..num_channels]
            .iter()
            .map(|s| s.len())
            .min()
            .unwrap_or(0);

        let mut channels = [ptr::null(); MAX_CHANNELS];
        for (ptr, slice) in channels.iter_mut().zip(slices.iter()) {
            *ptr = slice.as_ptr();
        }

        Self {
            channels,
            num_channels,
            num_frames,
            _marker: PhantomData,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn channel(&self, index: usize) -> &'a [T] {
        assert!(index < self.num_channels);
        unsafe { std::slice::from_raw_parts(self.channels[index], self.num_frames) }
    }

    pub fn first(self, num_frames: usize) -> Self {
        Self {
            num_frames: num_frames.min(self.num_frames),
            ..self
        }
    }

    pub fn last(self, num_frames: usize) -> Self {
        let num_frames = num_frames.min(self.num_frames);
        self.subspan(self.num_frames - num_frames)
    }

    pub fn subspan(self, offset: usize) -> Self {
        let offset = offset.min(self.num_frames);
        let mut channels = self.channels;
        for ptr in channels[..self.num_channels].iter_mut() {
            *ptr = unsafe { ptr.add(offset) };
        }
        Self {
            channels,
            num_frames: self.num_frames - offset,
            ..self
        }
    }

    pub fn subspan_len(self, offset: usize, num_frames: usize) -> Self {
        self.subspan(offset).first(num_frames)
    }
}

impl AudioSpan<'_, f32> {
    /// Mean of the squared samples over all channels and frames.
    pub fn mean_squared(&self) -> f32 {
        if self.num_channels == 0 {
            return 0.0;
        }
        let mut sum = 0.0;
        for channel in 0..self.num_channels {
            sum += mean_squared_simd(self.channel(channel));
        }
        sum / self.num_channels as f32
    }
}

/// The mutable counterpart of [`AudioSpan`]. Mutating block operations only
/// exist here, so read-only data cannot be written through a span.
pub struct AudioSpanMut<'a, T: Scalar> {
    channels: [*mut T; MAX_CHANNELS],
    num_channels: usize,
    num_frames: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T: Scalar> AudioSpanMut<'a, T> {
    pub fn from_mono(channel: &'a mut [T]) -> Self {
        let num_frames = channel.len();
        let mut channels = [ptr::null_mut(); MAX_CHANNELS];
        channels[0] = channel.as_mut_ptr();
        Self {
            channels,
            num_channels: 1,
            num_frames,
            _marker: PhantomData,
        }
    }

    /// Build a stereo span from two channel slices. The frame count is the
    /// minimum of the two lengths.
    pub fn from_stereo(left: &'a mut [T], right: &'a mut [T]) -> Self {
        let num_frames = left.len().min(right.len());
        let mut channels = [ptr::null_mut(); MAX_CHANNELS];
        channels[0] = left.as_mut_ptr();
        channels[1] = right.as_mut_ptr();
        Self {
            channels,
            num_channels: 2,
            num_frames,
            _marker: PhantomData,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn channel(&self, index: usize) -> &[T] {
        assert!(index < self.num_channels);
        unsafe { std::slice::from_raw_parts(self.channels[index], self.num_frames) }
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [T] {
        assert!(index < self.num_channels);
        unsafe { std::slice::from_raw_parts_mut(self.channels[index], self.num_frames) }
    }

    /// Both channels of a stereo span, borrowed at once.
    pub fn stereo_mut(&mut self) -> (&mut [T], &mut [T]) {
        assert!(self.num_channels >= 2);
        unsafe {
            (
                std::slice::from_raw_parts_mut(self.channels[0], self.num_frames),
                std::slice::from_raw_parts_mut(self.channels[1], self.num_frames),
            )
        }
    }

    /// A new exclusive view over the same frames, for chaining view
    /// adapters without giving up the original span.
    pub fn reborrow(&mut self) -> AudioSpanMut<'_, T> {
        AudioSpanMut {
            channels: self.channels,
            num_channels: self.num_channels,
            num_frames: self.num_frames,
            _marker: PhantomData,
        }
    }

    pub fn as_span(&self) -> AudioSpan<'_, T> {
        let mut channels = [ptr::null(); MAX_CHANNELS];
        for (dst, src) in channels.iter_mut().zip(self.channels.iter()) {
            *dst = *src as *const T;
        }
        AudioSpan {
            channels,
            num_channels: self.num_channels,
            num_frames: self.num_frames,
            _marker: PhantomData,
        }
    }

    pub fn first(self, num_frames: usize) -> Self {
        Self {
            num_frames: num_frames.min(self.num_frames),
            ..self
        }
    }

    pub fn last(self, num_frames: usize) -> Self {
        let num_frames = num_frames.min(self.num_frames);
        let offset = self.num_frames - num_frames;
        self.subspan(offset)
    }

    pub fn subspan(self, offset: usize) -> Self {
        let offset = offset.min(self.num_frames);
        let mut channels = self.channels;
        for ptr in channels[..self.num_channels].iter_mut() {
            *ptr = unsafe { ptr.add(offset) };
        }
        Self {
            channels,
            num_frames: self.num_frames - offset,
            ..self
        }
    }

    pub fn subspan_len(self, offset: usize, num_frames: usize) -> Self {
        self.subspan(offset).first(num_frames)
    }

    pub fn fill(&mut self, value: T) {
        for channel in 0..self.num_channels {
            self.channel_mut(channel).fill(value);
        }
    }

    pub fn copy_from(&mut self, other: &AudioSpan<'_, T>) {
        debug_assert_eq!(self.num_channels, other.num_channels());
        let frames = self.num_frames.min(other.num_frames());
        for channel in 0..self.num_channels.min(other.num_channels()) {
            self.channel_mut(channel)[..frames].copy_from_slice(&other.channel(channel)[..frames]);
        }
    }
}

impl AudioSpanMut<'_, f32> {
    pub fn apply_gain(&mut self, gain: f32) {
        for channel in 0..self.num_channels {
            apply_uniform_gain_simd(gain, self.channel_mut(channel));
        }
    }

    /// Multiply every channel by a per-sample gain block.
    pub fn apply_gain_block(&mut self, gain: &[f32]) {
        for channel in 0..self.num_channels {
            apply_gain_simd(gain, self.channel_mut(channel));
        }
    }

    pub fn add(&mut self, other: &AudioSpan<'_, f32>) {
        debug_assert_eq!(self.num_channels, other.num_channels());
        let frames = self.num_frames.min(other.num_frames());
        for channel in 0..self.num_channels.min(other.num_channels()) {
            sum_simd(
                &other.channel(channel)[..frames],
                &mut self.channel_mut(channel)[..frames],
            );
        }
    }

    pub fn mean_squared(&self) -> f32 {
        self.as_span().mean_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_shape() {
        let buffer = AudioBuffer::<f32>::new(2, 512);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_frames(), 512);
        assert_eq!(buffer.channel(0).len(), 512);
        assert!(buffer.padded_channel(0).len() > 512);
    }

    #[test]
    fn test_span_frames_are_minimum_of_sources() {
        let left = vec![1.0f32; 16];
        let right = vec![1.0f32; 10];
        let span = AudioSpan::from_slices(&[&left, &right]);
        assert_eq!(span.num_channels(), 2);
        assert_eq!(span.num_frames(), 10);
    }

    #[test]
    fn test_subspan_preserves_channels() {
        let mut buffer = AudioBuffer::<f32>::new(2, 64);
        for i in 0..64 {
            buffer.channel_mut(0)[i] = i as f32;
            buffer.channel_mut(1)[i] = -(i as f32);
        }

        let span = buffer.span().subspan(10);
        assert_eq!(span.num_channels(), 2);
        assert_eq!(span.num_frames(), 54);
        assert_eq!(span.channel(0)[0], 10.0);
        assert_eq!(span.channel(1)[0], -10.0);

        let span = buffer.span().first(8);
        assert_eq!(span.num_frames(), 8);

        let span = buffer.span().last(4);
        assert_eq!(span.channel(0)[0], 60.0);

        let span = buffer.span().subspan_len(60, 100);
        assert_eq!(span.num_frames(), 4);
    }

    #[test]
    fn test_subspan_out_of_range_is_clamped() {
        let buffer = AudioBuffer::<f32>::new(2, 8);
        let span = buffer.span().subspan(100);
        assert_eq!(span.num_frames(), 0);
    }

    #[test]
    fn test_fill_and_gain() {
        let mut buffer = AudioBuffer::<f32>::new(2, 32);
        let mut span = buffer.span_mut();
        span.fill(2.0);
        span.apply_gain(0.5);
        assert!(buffer.channel(0).iter().all(|&v| v == 1.0));
        assert!(buffer.channel(1).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_gain_block() {
        let mut buffer = AudioBuffer::<f32>::new(2, 4);
        buffer.span_mut().fill(2.0);
        let gain = [0.0, 0.5, 1.0, 2.0];
        buffer.span_mut().apply_gain_block(&gain);
        assert_eq!(buffer.channel(0), &[0.0, 1.0, 2.0, 4.0]);
        assert_eq!(buffer.channel(1), &[0.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_copy_and_add() {
        let mut source = AudioBuffer::<f32>::new(2, 8);
        source.span_mut().fill(1.5);

        let mut target = AudioBuffer::<f32>::new(2, 8);
        target.span_mut().copy_from(&source.span());
        assert!(target.channel(0).iter().all(|&v| v == 1.5));

        target.span_mut().add(&source.span());
        assert!(target.channel(1).iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_mean_squared() {
        let mut buffer = AudioBuffer::<f32>::new(2, 16);
        buffer.span_mut().fill(2.0);
        assert!((buffer.span().mean_squared() - 4.0).abs() < 1e-6);

        buffer.channel_mut(1).fill(0.0);
        assert!((buffer.span().mean_squared() - 2.0).abs() < 1e-6);
    }
}
