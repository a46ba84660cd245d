//! NDI sending functionality for video, audio, and metadata.

use std::{
    ffi::CString,
    fmt, ptr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::{
    finder::Source,
    frames::{AudioFrame, MetadataFrame, OwnedVideoFrame, VideoFrame},
    handle::{NativeHandle, SenderKind},
    native::{RawSendCreate, RawTally},
    offload::{self, BlockingTask},
    receiver::Tally,
    Error, Result, NDI,
};

/// Default timeout for the sender status queries, in milliseconds.
pub const DEFAULT_STATUS_TIMEOUT_MS: u32 = 0;

/// The one video buffer the native library may still be reading after an
/// async send returned.
///
/// The library releases a queued buffer only when the next async send (or a
/// null "drain" send) completes. A pending buffer is therefore always freed
/// after that signal, never before.
#[derive(Debug)]
pub(crate) enum AsyncSendSlot<B> {
    Empty,
    PendingBuffer(B),
}

impl<B> AsyncSendSlot<B> {
    /// Drains and frees any pending buffer, then sends `next` and keeps it.
    pub(crate) fn replace(&mut self, next: B, drain: impl FnOnce(), send: impl FnOnce(&B)) {
        self.drain(drain);
        send(&next);
        *self = AsyncSendSlot::PendingBuffer(next);
    }

    /// Runs `drain` and then frees the pending buffer, if there is one.
    ///
    /// Returns whether a buffer was pending.
    pub(crate) fn drain(&mut self, drain: impl FnOnce()) -> bool {
        if !self.is_pending() {
            return false;
        }
        drain();
        *self = AsyncSendSlot::Empty;
        true
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, AsyncSendSlot::PendingBuffer(_))
    }
}

/// Configuration for an NDI sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOptions {
    /// Name the source is announced under. Required.
    pub name: String,
    pub groups: Option<String>,
    /// Pace video sends to the frame rate.
    pub clock_video: bool,
    /// Pace audio sends to the sample rate.
    pub clock_audio: bool,
}

impl SenderOptions {
    /// Create a builder for configuring send options
    pub fn builder<S: Into<String>>(name: S) -> SenderOptionsBuilder {
        SenderOptionsBuilder::new(name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "name is required in options".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for configuring `SenderOptions` with ergonomic method chaining
#[derive(Debug, Clone)]
pub struct SenderOptionsBuilder {
    name: String,
    groups: Option<String>,
    clock_video: Option<bool>,
    clock_audio: Option<bool>,
}

impl SenderOptionsBuilder {
    /// Create a new builder with the specified name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            groups: None,
            clock_video: None,
            clock_audio: None,
        }
    }

    /// Set the groups for this sender
    #[must_use]
    pub fn groups<S: Into<String>>(mut self, groups: S) -> Self {
        self.groups = Some(groups.into());
        self
    }

    /// Configure whether to clock video
    #[must_use]
    pub fn clock_video(mut self, clock: bool) -> Self {
        self.clock_video = Some(clock);
        self
    }

    /// Configure whether to clock audio
    #[must_use]
    pub fn clock_audio(mut self, clock: bool) -> Self {
        self.clock_audio = Some(clock);
        self
    }

    /// Build the `SenderOptions`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the name is empty or contains
    /// only whitespace.
    pub fn build(self) -> Result<SenderOptions> {
        let options = SenderOptions {
            name: self.name,
            groups: self.groups,
            clock_video: self.clock_video.unwrap_or(true),
            clock_audio: self.clock_audio.unwrap_or(true),
        };
        options.validate()?;
        Ok(options)
    }
}

struct SenderInner {
    handle: NativeHandle<SenderKind>,
    /// Locked after `handle`, never before.
    async_slot: Mutex<AsyncSendSlot<OwnedVideoFrame>>,
}

impl SenderInner {
    fn slot(&self) -> MutexGuard<'_, AsyncSendSlot<OwnedVideoFrame>> {
        self.async_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn destroy(&self) -> bool {
        self.handle.destroy_with(|lib, instance| {
            // SAFETY: the instance is still live; destroy runs after this closure.
            let drained = self
                .slot()
                .drain(|| unsafe { lib.send_video_async(instance, None) });
            if drained {
                debug!("released pending async video buffer before destroying sender");
            }
        })
    }
}

impl Drop for SenderInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Publishes video, audio and metadata as an NDI source.
///
/// Cloning shares the native sender.
///
/// # Examples
///
/// ```no_run
/// # use ndi_bridge::{NDI, Sender, SenderOptions, VideoFrame, PixelFormat};
/// # fn main() -> Result<(), ndi_bridge::Error> {
/// let ndi = NDI::global().expect("a native library is installed");
/// ndi.initialize();
/// let sender = Sender::new(ndi, &SenderOptions::builder("CAM1").build()?)?;
///
/// let frame = VideoFrame::builder()
///     .resolution(1920, 1080)
///     .pixel_format(PixelFormat::BGRA)
///     .data(vec![0u8; 1920 * 1080 * 4])
///     .build()?;
/// sender.send_video(&frame)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Sender {
    inner: Arc<SenderInner>,
}

impl Sender {
    /// Creates a new NDI send instance.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if `ndi` is not initialized
    /// - [`Error::InvalidConfiguration`] if the name is blank
    /// - [`Error::InvalidCString`] if the name or groups contain a null byte
    /// - [`Error::InitializationFailed`] if the native sender cannot be created
    pub fn new(ndi: &NDI, options: &SenderOptions) -> Result<Self> {
        options.validate()?;
        let lib = ndi.running_lib()?;
        let name = CString::new(options.name.as_str())?;
        let groups = options.groups.as_deref().map(CString::new).transpose()?;

        let settings = RawSendCreate {
            p_ndi_name: name.as_ptr(),
            p_groups: groups.as_ref().map_or(ptr::null(), |g| g.as_ptr()),
            clock_video: options.clock_video,
            clock_audio: options.clock_audio,
        };

        // SAFETY: the name and groups copies outlive the call.
        let instance = unsafe { lib.send_create(&settings) };
        let handle = NativeHandle::new(lib, instance)?;
        Ok(Self {
            inner: Arc::new(SenderInner {
                handle,
                async_slot: Mutex::new(AsyncSendSlot::Empty),
            }),
        })
    }

    /// Sends a video frame. The library copies the pixels before returning,
    /// pacing to the frame rate when video clocking is on.
    pub fn send_video(&self, frame: &VideoFrame) -> Result<()> {
        let live = self.inner.handle.live()?;
        let frame = frame.encode()?;
        // SAFETY: `frame` owns the buffers for the duration of the call.
        unsafe { live.lib.send_video(live.instance, frame.raw()) };
        Ok(())
    }

    /// Queues a video frame and returns without waiting for the library.
    ///
    /// The frame is copied into a buffer the sender keeps until the library has
    /// released it, which happens on the next async send or on destroy.
    pub fn send_video_async(&self, frame: &VideoFrame) -> Result<()> {
        let live = self.inner.handle.live()?;
        let frame = frame.encode()?;
        let mut slot = self.inner.slot();
        let (lib, instance) = (live.lib, live.instance);

        if slot.is_pending() {
            debug!("draining previous async video buffer");
        }
        // SAFETY: the slot keeps each queued buffer alive until the next drain.
        slot.replace(
            frame,
            || unsafe { lib.send_video_async(instance, None) },
            |frame| unsafe { lib.send_video_async(instance, Some(frame.raw())) },
        );
        Ok(())
    }

    /// Offloaded [`Sender::send_video`]. The task resolves once the library has
    /// taken the frame.
    pub fn send_video_promise(&self, frame: &VideoFrame) -> Result<BlockingTask<()>> {
        self.inner.handle.live()?;
        let frame = frame.encode()?;
        let inner = Arc::clone(&self.inner);
        offload::spawn(move || {
            if let Ok(live) = inner.handle.live() {
                // SAFETY: the worker owns `frame` for the duration of the call.
                unsafe { live.lib.send_video(live.instance, frame.raw()) };
            }
        })
    }

    /// Sends an audio frame. The library copies the samples before returning.
    pub fn send_audio(&self, frame: &AudioFrame) -> Result<()> {
        let live = self.inner.handle.live()?;
        let frame = frame.encode()?;
        // SAFETY: `frame` owns the buffers for the duration of the call.
        unsafe { live.lib.send_audio(live.instance, frame.raw()) };
        Ok(())
    }

    /// Offloaded [`Sender::send_audio`].
    pub fn send_audio_promise(&self, frame: &AudioFrame) -> Result<BlockingTask<()>> {
        self.inner.handle.live()?;
        let frame = frame.encode()?;
        let inner = Arc::clone(&self.inner);
        offload::spawn(move || {
            if let Ok(live) = inner.handle.live() {
                // SAFETY: the worker owns `frame` for the duration of the call.
                unsafe { live.lib.send_audio(live.instance, frame.raw()) };
            }
        })
    }

    pub fn send_metadata(&self, frame: &MetadataFrame) -> Result<()> {
        let live = self.inner.handle.live()?;
        let frame = frame.encode()?;
        // SAFETY: `frame` owns the string for the duration of the call.
        unsafe { live.lib.send_metadata(live.instance, frame.raw()) };
        Ok(())
    }

    /// Waits up to `timeout_ms` for a tally change.
    ///
    /// Returns `None` if the tally did not change within the timeout.
    pub fn get_tally(&self, timeout_ms: u32) -> Result<Option<Tally>> {
        get_tally(&self.inner, timeout_ms)
    }

    pub fn get_tally_async(&self, timeout_ms: u32) -> Result<BlockingTask<Option<Tally>>> {
        self.inner.handle.live()?;
        let inner = Arc::clone(&self.inner);
        offload::spawn(move || get_tally(&inner, timeout_ms).ok().flatten())
    }

    /// Tally is set by receivers; a sender only reads it. This checks that the
    /// sender is live and otherwise does nothing.
    pub fn set_tally(&self, _tally: &Tally) -> Result<()> {
        self.inner.handle.live()?;
        Ok(())
    }

    /// Number of connected receivers, waiting up to `timeout_ms` for at least one.
    pub fn get_connections(&self, timeout_ms: u32) -> Result<i32> {
        get_connections(&self.inner, timeout_ms)
    }

    pub fn get_connections_async(&self, timeout_ms: u32) -> Result<BlockingTask<i32>> {
        self.inner.handle.live()?;
        let inner = Arc::clone(&self.inner);
        offload::spawn(move || get_connections(&inner, timeout_ms).unwrap_or(0))
    }

    /// The name the library announced this source under, which may include a
    /// machine prefix.
    pub fn get_source_name(&self) -> Result<Option<String>> {
        let live = self.inner.handle.live()?;
        // SAFETY: the returned descriptor is owned by the sender and copied out
        // before the read lock is released.
        let source = unsafe {
            live.lib
                .send_get_source_name(live.instance)
                .map(|raw| Source::from_raw(&raw))
        };
        Ok(source.and_then(|s| s.name))
    }

    /// Removes all metadata sent to new connections.
    pub fn clear_connection_metadata(&self) -> Result<()> {
        let live = self.inner.handle.live()?;
        // SAFETY: `live` keeps the instance alive for the call.
        unsafe { live.lib.send_clear_connection_metadata(live.instance) };
        Ok(())
    }

    /// Adds metadata that every new connection receives on connect.
    pub fn add_connection_metadata(&self, frame: &MetadataFrame) -> Result<()> {
        let live = self.inner.handle.live()?;
        let frame = frame.encode()?;
        // SAFETY: the library copies the string before returning.
        unsafe { live.lib.send_add_connection_metadata(live.instance, frame.raw()) };
        Ok(())
    }

    /// Releases any pending async buffer, then destroys the native sender.
    /// Later calls are no-ops.
    ///
    /// Blocks until any in-flight call on this sender returns, including an
    /// offloaded `get_tally_async` or `get_connections_async` still inside its
    /// timeout. Avoid calling it from an async task while such a call is pending.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_live()
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("valid", &self.is_valid())
            .field("async_pending", &self.inner.slot().is_pending())
            .finish()
    }
}

fn get_tally(inner: &SenderInner, timeout_ms: u32) -> Result<Option<Tally>> {
    let live = inner.handle.live()?;
    let mut raw = RawTally::default();
    // SAFETY: `live` keeps the instance alive for the call.
    let changed = unsafe { live.lib.send_get_tally(live.instance, &mut raw, timeout_ms) };
    Ok(changed.then(|| Tally::from_raw(raw)))
}

fn get_connections(inner: &SenderInner, timeout_ms: u32) -> Result<i32> {
    let live = inner.handle.live()?;
    // SAFETY: `live` keeps the instance alive for the call.
    Ok(unsafe { live.lib.send_get_no_connections(live.instance, timeout_ms) })
}
