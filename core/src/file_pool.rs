use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rayon::prelude::*;
use tracing::{debug, warn};

mod audio;
pub use audio::AudioLoadError;
use audio::{load_audio_file, probe_file_information};

use crate::audio_buffer::AudioBuffer;
use crate::config::{self, EngineConfig};

/// Integer oversampling applied when a sample is loaded, increasing its
/// effective sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversampling {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl Oversampling {
    pub fn factor(&self) -> u32 {
        match self {
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
        }
    }
}

/// Stream parameters of a sample file, read without decoding.
#[derive(Debug, Clone, Copy)]
pub struct FileInformation {
    /// Total frame count; zero when the container does not announce it.
    pub frames: u32,
    pub sample_rate: u32,
    pub num_channels: usize,
}

/// The resident prefix of a sample file.
struct PreloadedFileHandle {
    path: Arc<PathBuf>,
    data: Arc<AudioBuffer<f32>>,
    /// Native rate times the oversampling factor.
    sample_rate: f32,
}

/// A handle shared between the audio thread and a loader thread, bearing
/// the future full-file buffer.
///
/// The preload head is available immediately; `file_data` is written once
/// by exactly one loader thread and only read after `data_ready` has been
/// observed true. The release store in [`FilePromise::fulfill`] paired with
/// the acquire load in [`FilePromise::file_data`] is the only
/// synchronization edge between the two sides.
pub struct FilePromise {
    path: Arc<PathBuf>,
    preloaded: Option<Arc<AudioBuffer<f32>>>,
    file_data: UnsafeCell<Option<AudioBuffer<f32>>>,
    data_ready: AtomicBool,
    sample_rate: f32,
    oversampling: Oversampling,
}

unsafe impl Send for FilePromise {}
unsafe impl Sync for FilePromise {}

impl FilePromise {
    fn empty() -> Self {
        Self {
            path: Arc::new(PathBuf::new()),
            preloaded: None,
            file_data: UnsafeCell::new(None),
            data_ready: AtomicBool::new(false),
            sample_rate: config::DEFAULT_SAMPLE_RATE,
            oversampling: Oversampling::default(),
        }
    }

    /// An empty promise carries no preload head; the requested file was
    /// unknown to the pool.
    pub fn is_empty(&self) -> bool {
        self.preloaded.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preloaded_data(&self) -> Option<&Arc<AudioBuffer<f32>>> {
        self.preloaded.as_ref()
    }

    pub fn data_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    /// The full-file buffer, once the background load has finished.
    pub fn file_data(&self) -> Option<&AudioBuffer<f32>> {
        if self.data_ready.load(Ordering::Acquire) {
            unsafe { (*self.file_data.get()).as_ref() }
        } else {
            None
        }
    }

    /// The sample rate a voice should assume for this file, already
    /// multiplied by the oversampling factor.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn oversampling(&self) -> Oversampling {
        self.oversampling
    }

    /// Publish the full-file buffer. Called by exactly one loader thread,
    /// at most once per promise.
    fn fulfill(&self, buffer: AudioBuffer<f32>) {
        unsafe {
            *self.file_data.get() = Some(buffer);
        }
        self.data_ready.store(true, Ordering::Release);
    }
}

/// Flags shared between the pool and its loader threads.
struct PoolSignals {
    quit: AtomicBool,
    empty_requested: AtomicBool,
    loading: AtomicUsize,
}

/// The two-tier sample storage bridging the audio thread and the loader
/// threads.
///
/// Files are preloaded up to a configurable prefix which stays resident.
/// When a voice starts it receives a [`FilePromise`] carrying that preload
/// head; a loader thread then decodes the whole file in the background and
/// publishes it through the promise. Promises come back to the audio
/// thread through the `filled` queue and are destroyed only in
/// [`FilePool::cleanup_promises`], so audio buffers are never freed on a
/// loader thread.
pub struct FilePool {
    root_directory: PathBuf,
    preload_size: u32,
    oversampling: Oversampling,
    preloaded_files: HashMap<String, PreloadedFileHandle>,

    pending: Sender<Arc<FilePromise>>,
    filled: Receiver<Arc<FilePromise>>,
    signals: Arc<PoolSignals>,

    temporary_promises: Vec<Arc<FilePromise>>,
    promises_to_drop: Vec<Arc<FilePromise>>,

    workers: Vec<JoinHandle<()>>,
}

impl FilePool {
    pub fn new(root_directory: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        let (pending_tx, pending_rx) = bounded(config.max_voices);
        let (filled_tx, filled_rx) = bounded(config.max_voices);

        let signals = Arc::new(PoolSignals {
            quit: AtomicBool::new(false),
            empty_requested: AtomicBool::new(false),
            loading: AtomicUsize::new(0),
        });

        let workers = (0..config.num_background_threads.max(1))
            .map(|index| {
                let pending = pending_rx.clone();
                let filled = filled_tx.clone();
                let signals = signals.clone();
                thread::Builder::new()
                    .name(format!("voxen_file_loader_{index}"))
                    .spawn(move || loading_thread(pending, filled, signals))
                    .unwrap()
            })
            .collect();

        Self {
            root_directory: root_directory.into(),
            preload_size: config.preload_size,
            oversampling: config.oversampling_factor,
            preloaded_files: HashMap::new(),
            pending: pending_tx,
            filled: filled_rx,
            signals,
            temporary_promises: Vec::with_capacity(config.max_voices),
            promises_to_drop: Vec::with_capacity(config.max_voices),
            workers,
        }
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn num_preloaded_samples(&self) -> usize {
        self.preloaded_files.len()
    }

    pub fn is_preloaded(&self, filename: &str) -> bool {
        self.preloaded_files.contains_key(filename)
    }

    pub fn preload_size(&self) -> u32 {
        self.preload_size
    }

    pub fn oversampling_factor(&self) -> Oversampling {
        self.oversampling
    }

    /// Number of files currently being decoded by loader threads.
    pub fn loading_count(&self) -> usize {
        self.signals.loading.load(Ordering::Relaxed)
    }

    /// Read a file's stream parameters without decoding it.
    pub fn get_file_information(&self, filename: &str) -> Option<FileInformation> {
        let path = self.root_directory.join(filename);
        match probe_file_information(&path) {
            Ok(info) => Some(info),
            Err(err) => {
                debug!(filename, %err, "failed to probe file");
                None
            }
        }
    }

    /// Ensure the first `max_offset + preload_size` frames of a file are
    /// resident. Returns false when the file is missing, cannot be decoded,
    /// or has an unsupported channel count.
    pub fn preload_file(&mut self, filename: &str, max_offset: u32) -> bool {
        let preload_size = self.preload_size;
        let oversampling = self.oversampling;
        match self.load_preload(filename, max_offset, preload_size, oversampling) {
            Some(Some(handle)) => {
                self.preloaded_files.insert(filename.to_string(), handle);
                true
            }
            // Already resident with a sufficient prefix.
            Some(None) => true,
            None => false,
        }
    }

    /// Preload a batch of files in parallel.
    pub fn preload_files(&mut self, files: &[(String, u32)]) -> bool {
        let preload_size = self.preload_size;
        let oversampling = self.oversampling;
        let loaded: Vec<_> = files
            .par_iter()
            .map(|(filename, max_offset)| {
                (
                    filename,
                    self.load_preload(filename, *max_offset, preload_size, oversampling),
                )
            })
            .collect();

        let mut all_ok = true;
        for (filename, result) in loaded {
            match result {
                Some(Some(handle)) => {
                    self.preloaded_files.insert(filename.clone(), handle);
                }
                Some(None) => {}
                None => all_ok = false,
            }
        }
        all_ok
    }

    /// Returns `Some(Some(handle))` with a freshly loaded head,
    /// `Some(None)` when the resident head already covers the requested
    /// prefix, and `None` on failure.
    fn load_preload(
        &self,
        filename: &str,
        max_offset: u32,
        preload_size: u32,
        oversampling: Oversampling,
    ) -> Option<Option<PreloadedFileHandle>> {
        let path = self.root_directory.join(filename);

        let info = match probe_file_information(&path) {
            Ok(info) => info,
            Err(err) => {
                warn!(filename, %err, "cannot preload file");
                return None;
            }
        };

        // A preload size of zero means the whole file stays resident.
        let frames_to_load = if preload_size == 0 {
            info.frames
        } else if info.frames == 0 {
            max_offset.saturating_add(preload_size)
        } else {
            info.frames.min(max_offset.saturating_add(preload_size))
        };

        if let Some(existing) = self.preloaded_files.get(filename) {
            let resident = existing.data.num_frames() as u32;
            if resident >= frames_to_load.saturating_mul(oversampling.factor()) {
                return Some(None);
            }
        }

        let max_frames = if frames_to_load == 0 {
            None
        } else {
            Some(frames_to_load)
        };
        match load_audio_file(&path, max_frames, oversampling) {
            Ok((buffer, sample_rate)) => Some(Some(PreloadedFileHandle {
                path: Arc::new(path),
                data: Arc::new(buffer),
                sample_rate: (sample_rate * oversampling.factor()) as f32,
            })),
            Err(err) => {
                warn!(filename, %err, "cannot preload file");
                None
            }
        }
    }

    /// Get a promise for a file. If the file is preloaded, the promise
    /// carries the preload head and a background load of the tail is
    /// queued; otherwise the promise is empty.
    ///
    /// Never blocks: when the pending queue is full the tail load is
    /// skipped and the voice keeps playing from the preload head.
    pub fn get_file_promise(&self, filename: &str) -> Arc<FilePromise> {
        let handle = match self.preloaded_files.get(filename) {
            Some(handle) => handle,
            None => return Arc::new(FilePromise::empty()),
        };

        let promise = Arc::new(FilePromise {
            path: handle.path.clone(),
            preloaded: Some(handle.data.clone()),
            file_data: UnsafeCell::new(None),
            data_ready: AtomicBool::new(false),
            sample_rate: handle.sample_rate,
            oversampling: self.oversampling,
        });

        match self.pending.try_send(promise.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(filename, "file loading queue is full, playing the preload head only");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(filename, "file loading queue is gone, playing the preload head only");
            }
        }

        promise
    }

    /// Move filled promises into linear storage and drop the ones nobody
    /// references anymore.
    ///
    /// This is the only place promises are destroyed, and it has to run on
    /// the audio thread between blocks so that audio buffers are never
    /// freed on a loader thread.
    pub fn cleanup_promises(&mut self) {
        while let Ok(promise) = self.filled.try_recv() {
            self.temporary_promises.push(promise);
        }

        let mut index = 0;
        while index < self.temporary_promises.len() {
            if Arc::strong_count(&self.temporary_promises[index]) == 1 {
                let promise = self.temporary_promises.swap_remove(index);
                self.promises_to_drop.push(promise);
            } else {
                index += 1;
            }
        }

        self.promises_to_drop.clear();
    }

    /// Ask the loader threads to drain the pending queue without doing any
    /// work, and wait for the acknowledgement.
    ///
    /// Spins at millisecond granularity; never call this from the audio
    /// thread.
    pub fn empty_file_loading_queues(&self) {
        self.signals.empty_requested.store(true, Ordering::Release);
        while self.signals.empty_requested.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait until every queued background load has finished.
    pub fn wait_for_background_loading(&self) {
        while !self.pending.is_empty() {
            thread::sleep(Duration::from_micros(100));
        }
        while self.signals.loading.load(Ordering::Relaxed) > 0 {
            thread::sleep(Duration::from_micros(100));
        }
    }

    /// Change the preload size, reloading every resident head. Not for the
    /// audio thread.
    pub fn set_preload_size(&mut self, preload_size: u32) {
        let old_preload = self.preload_size;
        let factor = self.oversampling.factor();

        for (filename, handle) in self.preloaded_files.iter_mut() {
            let num_frames = handle.data.num_frames() as u32 / factor;
            let max_offset = num_frames.saturating_sub(old_preload);
            let frames_to_load = preload_size.saturating_add(max_offset);
            match load_audio_file(&handle.path, Some(frames_to_load), self.oversampling) {
                Ok((buffer, _)) => handle.data = Arc::new(buffer),
                Err(err) => warn!(filename, %err, "failed to reload preloaded file"),
            }
        }

        self.preload_size = preload_size;
    }

    /// Change the oversampling factor, reloading every resident head and
    /// re-deriving the stored sample rates so that voices observe a
    /// coherent rate/oversampling pair. Not for the audio thread.
    pub fn set_oversampling_factor(&mut self, factor: Oversampling) {
        let rate_change = factor.factor() as f32 / self.oversampling.factor() as f32;
        let old_factor = self.oversampling.factor();
        let preload_size = self.preload_size;

        for (filename, handle) in self.preloaded_files.iter_mut() {
            let num_frames = handle.data.num_frames() as u32 / old_factor;
            let max_offset = num_frames.saturating_sub(preload_size);
            let frames_to_load = preload_size.saturating_add(max_offset);
            match load_audio_file(&handle.path, Some(frames_to_load), factor) {
                Ok((buffer, _)) => {
                    handle.data = Arc::new(buffer);
                    handle.sample_rate *= rate_change;
                }
                Err(err) => warn!(filename, %err, "failed to reload preloaded file"),
            }
        }

        self.oversampling = factor;
    }

    /// Drop every preloaded file and all promise storage. Not for the
    /// audio thread.
    pub fn clear(&mut self) {
        self.empty_file_loading_queues();
        self.preloaded_files.clear();
        self.temporary_promises.clear();
        self.promises_to_drop.clear();
    }
}

impl Drop for FilePool {
    fn drop(&mut self) {
        self.signals.quit.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            worker.join().ok();
        }
    }
}

fn loading_thread(
    pending: Receiver<Arc<FilePromise>>,
    filled: Sender<Arc<FilePromise>>,
    signals: Arc<PoolSignals>,
) {
    while !signals.quit.load(Ordering::Acquire) {
        if signals.empty_requested.load(Ordering::Acquire) {
            while pending.try_recv().is_ok() {}
            signals.empty_requested.store(false, Ordering::Release);
            continue;
        }

        let promise = match pending.recv_timeout(Duration::from_millis(50)) {
            Ok(promise) => promise,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        // When the voice has already abandoned the promise, skip the I/O.
        if Arc::strong_count(&promise) > 1 {
            signals.loading.fetch_add(1, Ordering::AcqRel);

            debug!(path = %promise.path().display(), "loading file in the background");
            match load_audio_file(promise.path(), None, promise.oversampling()) {
                Ok((buffer, _)) => promise.fulfill(buffer),
                Err(err) => {
                    warn!(path = %promise.path().display(), %err, "background load failed")
                }
            }

            signals.loading.fetch_sub(1, Ordering::AcqRel);
        }

        // The promise always flows through the filled queue so that it is
        // freed on the audio thread, never here.
        let mut promise = promise;
        loop {
            match filled.try_send(promise) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    if signals.quit.load(Ordering::Acquire) {
                        return;
                    }
                    debug!("filled promise queue is full, retrying");
                    promise = returned;
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn write_wav(dir: &Path, name: &str, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
        for frame in 0..frames {
            for _ in 0..channels {
                writer.write_sample(frame as f32 / frames as f32).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            preload_size: 64,
            num_background_threads: 2,
            max_voices: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = FilePool::new(dir.path(), &test_config());

        assert!(!pool.preload_file("missing.wav", 0));
        assert!(pool.get_file_promise("missing.wav").is_empty());
        assert_eq!(pool.num_preloaded_samples(), 0);
    }

    #[test]
    fn test_unsupported_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "quad.wav", 4, 44100, 32);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(!pool.preload_file("quad.wav", 0));
    }

    #[test]
    fn test_preload_head_size() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "long.wav", 1, 44100, 1000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("long.wav", 0));

        let promise = pool.get_file_promise("long.wav");
        let head = promise.preloaded_data().unwrap();
        assert_eq!(head.num_frames(), 64);
        assert_eq!(head.num_channels(), 1);
    }

    #[test]
    fn test_preload_whole_file_when_size_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "all.wav", 2, 48000, 200);

        let mut pool = FilePool::new(
            dir.path(),
            &EngineConfig {
                preload_size: 0,
                ..test_config()
            },
        );
        assert!(pool.preload_file("all.wav", 0));
        let promise = pool.get_file_promise("all.wav");
        assert_eq!(promise.preloaded_data().unwrap().num_frames(), 200);
        assert_eq!(promise.preloaded_data().unwrap().num_channels(), 2);
    }

    #[test]
    fn test_preload_twice_keeps_head() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "a.wav", 1, 44100, 1000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("a.wav", 0));
        let first = pool.get_file_promise("a.wav").preloaded_data().unwrap().clone();

        assert!(pool.preload_file("a.wav", 0));
        let second = pool.get_file_promise("a.wav").preloaded_data().unwrap().clone();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_preload_extends_for_larger_offset() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "a.wav", 1, 44100, 1000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("a.wav", 0));
        assert_eq!(
            pool.get_file_promise("a.wav").preloaded_data().unwrap().num_frames(),
            64
        );

        assert!(pool.preload_file("a.wav", 500));
        assert_eq!(
            pool.get_file_promise("a.wav").preloaded_data().unwrap().num_frames(),
            564
        );
    }

    #[test]
    fn test_background_load_fills_promise() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "tail.wav", 1, 44100, 500);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("tail.wav", 0));

        let promise = pool.get_file_promise("tail.wav");
        assert!(!promise.is_empty());
        assert!(wait_until(|| promise.data_ready()));

        let data = promise.file_data().unwrap();
        assert_eq!(data.num_frames(), 500);
        assert_eq!(promise.sample_rate(), 44100.0);

        // The worker pushed the promise into the filled queue; after the
        // voice drops its handle, cleanup is the one to free it.
        drop(promise);
        assert!(wait_until(|| {
            pool.cleanup_promises();
            pool.temporary_promises.is_empty()
        }));
        assert!(pool.promises_to_drop.is_empty());
    }

    #[test]
    fn test_abandoned_promise_skips_io() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "b.wav", 1, 44100, 100000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("b.wav", 0));

        // Drop the promise before a worker can reasonably pick it up; either
        // way the promise must come back through cleanup without leaking.
        drop(pool.get_file_promise("b.wav"));

        pool.wait_for_background_loading();
        assert!(wait_until(|| {
            pool.cleanup_promises();
            pool.temporary_promises.is_empty()
        }));
    }

    #[test]
    fn test_oversampling_doubles_frames_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "c.wav", 1, 44100, 1000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("c.wav", 0));
        assert_eq!(pool.get_file_promise("c.wav").sample_rate(), 44100.0);

        pool.set_oversampling_factor(Oversampling::X2);
        let promise = pool.get_file_promise("c.wav");
        assert_eq!(promise.sample_rate(), 88200.0);
        assert_eq!(promise.preloaded_data().unwrap().num_frames(), 128);

        // Setting the same factor twice is idempotent.
        pool.set_oversampling_factor(Oversampling::X2);
        let promise = pool.get_file_promise("c.wav");
        assert_eq!(promise.sample_rate(), 88200.0);
        assert_eq!(promise.preloaded_data().unwrap().num_frames(), 128);
    }

    #[test]
    fn test_set_preload_size_reloads() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "d.wav", 1, 44100, 1000);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("d.wav", 0));

        pool.set_preload_size(256);
        assert_eq!(pool.preload_size(), 256);
        assert_eq!(
            pool.get_file_promise("d.wav").preloaded_data().unwrap().num_frames(),
            256
        );
    }

    #[test]
    fn test_empty_queues_handshake() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "e.wav", 1, 44100, 100);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("e.wav", 0));
        let _promises: Vec<_> = (0..4).map(|_| pool.get_file_promise("e.wav")).collect();

        // Returns only after a worker acknowledged the drain request.
        pool.empty_file_loading_queues();
        assert!(!pool.signals.empty_requested.load(Ordering::Acquire));
    }

    #[test]
    fn test_clear_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "f.wav", 1, 44100, 100);

        let mut pool = FilePool::new(dir.path(), &test_config());
        assert!(pool.preload_file("f.wav", 0));
        pool.clear();
        assert_eq!(pool.num_preloaded_samples(), 0);
        assert!(pool.get_file_promise("f.wav").is_empty());
    }

    #[test]
    fn test_file_information() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "g.wav", 2, 48000, 300);

        let pool = FilePool::new(dir.path(), &test_config());
        let info = pool.get_file_information("g.wav").unwrap();
        assert_eq!(info.frames, 300);
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.num_channels, 2);
        assert!(pool.get_file_information("missing.wav").is_none());
    }
}
