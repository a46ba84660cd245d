//! NDI receiving functionality for video, audio, and metadata.

use std::{
    ffi::CString,
    fmt, ptr,
    sync::Arc,
};

use crate::{
    capture::{self, AudioKind, CaptureKind, MetadataKind, VideoKind},
    finder::Source,
    frames::{AudioFrame, MetadataFrame, VideoFrame},
    handle::{NativeHandle, ReceiverKind},
    native::{PtzCommand, RawRecvCreate, RawSource, RawTally},
    offload::{self, BlockingTask},
    Result, NDI,
};

/// Default timeout for the capture calls, in milliseconds.
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u32 = 1000;

string_enum! {
    /// Pixel layout the receiver asks the library to deliver.
    ///
    /// The first half of each name applies to frames without alpha, the second
    /// to frames with alpha.
    #[allow(non_camel_case_types)]
    pub enum ColorFormat: i32 {
        BGRX_BGRA = 0 => "BGRX_BGRA",
        UYVY_BGRA = 1 => "UYVY_BGRA",
        RGBX_RGBA = 2 => "RGBX_RGBA",
        UYVY_RGBA = 3 => "UYVY_RGBA",
        /// Whatever needs the least conversion.
        Fastest = 100 => "fastest",
        /// Highest quality the source offers.
        Best = 101 => "best",
    }
    unknown = "unknown";
    default = BGRX_BGRA;
}

string_enum! {
    pub enum Bandwidth: i32 {
        MetadataOnly = -10 => "metadata_only",
        AudioOnly = 10 => "audio_only",
        Lowest = 0 => "lowest",
        Highest = 100 => "highest",
    }
    unknown = "unknown";
    default = Highest;
}

string_enum! {
    /// What a native capture call produced.
    pub enum FrameType: i32 {
        None = 0 => "none",
        Video = 1 => "video",
        Audio = 2 => "audio",
        Metadata = 3 => "metadata",
        Error = 4 => "error",
        StatusChange = 100 => "status_change",
    }
    unknown = "unknown";
    default = None;
}

/// Tally state: whether a source is on program and/or preview output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tally {
    pub on_program: bool,
    pub on_preview: bool,
}

impl Tally {
    pub fn new(on_program: bool, on_preview: bool) -> Self {
        Tally {
            on_program,
            on_preview,
        }
    }

    pub(crate) fn to_raw(self) -> RawTally {
        RawTally {
            on_program: self.on_program,
            on_preview: self.on_preview,
        }
    }

    pub(crate) fn from_raw(raw: RawTally) -> Self {
        Tally::new(raw.on_program, raw.on_preview)
    }
}

/// The outcome of [`Receiver::capture`].
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
    Metadata(MetadataFrame),
    /// Nothing was captured. Carries what the library reported instead:
    /// `None` on timeout, `Error`, `StatusChange` or an unknown code.
    Empty(FrameType),
}

impl CapturedFrame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            CapturedFrame::Video(_) => FrameType::Video,
            CapturedFrame::Audio(_) => FrameType::Audio,
            CapturedFrame::Metadata(_) => FrameType::Metadata,
            CapturedFrame::Empty(frame_type) => *frame_type,
        }
    }

    /// Whether no frame arrived.
    pub fn is_none(&self) -> bool {
        matches!(self, CapturedFrame::Empty(_))
    }
}

/// Configuration for an NDI receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverOptions {
    /// Source to connect to on creation. `None` creates an unconnected receiver.
    pub source: Option<Source>,
    pub color_format: ColorFormat,
    pub bandwidth: Bandwidth,
    pub allow_video_fields: bool,
    /// Name this receiver announces to sources.
    pub name: Option<String>,
}

impl ReceiverOptions {
    /// Create a builder for configuring a receiver
    pub fn builder() -> ReceiverOptionsBuilder {
        ReceiverOptionsBuilder::new()
    }
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        ReceiverOptions {
            source: None,
            color_format: ColorFormat::default(),
            bandwidth: Bandwidth::default(),
            allow_video_fields: true,
            name: None,
        }
    }
}

/// Builder for configuring a Receiver with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct ReceiverOptionsBuilder {
    options: ReceiverOptions,
}

impl ReceiverOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source to connect to as soon as the receiver exists
    #[must_use]
    pub fn source(mut self, source: Source) -> Self {
        self.options.source = Some(source);
        self
    }

    #[must_use]
    pub fn color(mut self, format: ColorFormat) -> Self {
        self.options.color_format = format;
        self
    }

    #[must_use]
    pub fn bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.options.bandwidth = bandwidth;
        self
    }

    #[must_use]
    pub fn allow_video_fields(mut self, allow: bool) -> Self {
        self.options.allow_video_fields = allow;
        self
    }

    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.options.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ReceiverOptions {
        self.options
    }
}

/// Receives video, audio and metadata from one NDI source.
///
/// Cloning shares the native receiver. Two captures running at the same time on
/// one receiver are not supported by the native library; keep to one capture
/// loop per receiver.
///
/// # Examples
///
/// ```no_run
/// # use ndi_bridge::{NDI, ReceiverOptions, Receiver, Source, CapturedFrame};
/// # fn main() -> Result<(), ndi_bridge::Error> {
/// let ndi = NDI::global().expect("a native library is installed");
/// ndi.initialize();
/// let options = ReceiverOptions::builder()
///     .source(Source::new("CAM1"))
///     .name("monitor")
///     .build();
/// let receiver = Receiver::new(ndi, &options)?;
///
/// match receiver.capture(1000)? {
///     CapturedFrame::Video(frame) => println!("{}x{}", frame.width, frame.height),
///     other => println!("got {}", other.frame_type()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Receiver {
    handle: Arc<NativeHandle<ReceiverKind>>,
}

impl Receiver {
    /// Creates a receiver, optionally already connected to `options.source`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotInitialized`] if `ndi` is not initialized
    /// - [`crate::Error::InvalidCString`] if a source string or the name contains a null byte
    /// - [`crate::Error::InitializationFailed`] if the native receiver cannot be created
    pub fn new(ndi: &NDI, options: &ReceiverOptions) -> Result<Self> {
        let lib = ndi.running_lib()?;
        let source = options.source.as_ref().map(Source::to_owned_raw).transpose()?;
        let name = options.name.as_deref().map(CString::new).transpose()?;

        let settings = RawRecvCreate {
            source_to_connect_to: source.as_ref().map_or_else(RawSource::default, |s| *s.raw()),
            color_format: options.color_format.encode(),
            bandwidth: options.bandwidth.encode(),
            allow_video_fields: options.allow_video_fields,
            p_ndi_recv_name: name.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
        };

        // SAFETY: the source and name copies outlive the call.
        let instance = unsafe { lib.recv_create(&settings) };
        let handle = NativeHandle::new(lib, instance)?;
        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Switches the receiver to `source`.
    pub fn connect(&self, source: &Source) -> Result<()> {
        let live = self.handle.live()?;
        let source = source.to_owned_raw()?;
        // SAFETY: `source` owns the strings for the duration of the call.
        unsafe { live.lib.recv_connect(live.instance, source.raw()) };
        Ok(())
    }

    /// Waits up to `timeout_ms` for the next frame of any kind.
    pub fn capture(&self, timeout_ms: u32) -> Result<CapturedFrame> {
        capture_any(&self.handle, timeout_ms)
    }

    /// Offloaded [`Receiver::capture`]. Resolves with `Empty(None)` if the
    /// receiver is destroyed before the worker runs.
    pub fn capture_async(&self, timeout_ms: u32) -> Result<BlockingTask<CapturedFrame>> {
        self.handle.live()?;
        let handle = Arc::clone(&self.handle);
        offload::spawn(move || {
            capture_any(&handle, timeout_ms).unwrap_or(CapturedFrame::Empty(FrameType::None))
        })
    }

    /// Waits up to `timeout_ms` for a video frame.
    ///
    /// Returns `Ok(None)` on timeout, and also when the library reports an
    /// error or another frame type.
    pub fn capture_video(&self, timeout_ms: u32) -> Result<Option<VideoFrame>> {
        capture_one::<VideoKind>(&self.handle, timeout_ms)
    }

    pub fn capture_video_async(&self, timeout_ms: u32) -> Result<BlockingTask<Option<VideoFrame>>> {
        self.capture_one_async::<VideoKind>(timeout_ms)
    }

    /// Waits up to `timeout_ms` for an audio frame.
    pub fn capture_audio(&self, timeout_ms: u32) -> Result<Option<AudioFrame>> {
        capture_one::<AudioKind>(&self.handle, timeout_ms)
    }

    pub fn capture_audio_async(&self, timeout_ms: u32) -> Result<BlockingTask<Option<AudioFrame>>> {
        self.capture_one_async::<AudioKind>(timeout_ms)
    }

    /// Waits up to `timeout_ms` for a metadata frame.
    pub fn capture_metadata(&self, timeout_ms: u32) -> Result<Option<MetadataFrame>> {
        capture_one::<MetadataKind>(&self.handle, timeout_ms)
    }

    pub fn capture_metadata_async(
        &self,
        timeout_ms: u32,
    ) -> Result<BlockingTask<Option<MetadataFrame>>> {
        self.capture_one_async::<MetadataKind>(timeout_ms)
    }

    fn capture_one_async<K>(&self, timeout_ms: u32) -> Result<BlockingTask<Option<K::Frame>>>
    where
        K: CaptureKind + 'static,
        K::Frame: Send + 'static,
    {
        self.handle.live()?;
        let handle = Arc::clone(&self.handle);
        offload::spawn(move || capture_one::<K>(&handle, timeout_ms).ok().flatten())
    }

    /// Tells the connected source whether it is on program or preview.
    ///
    /// Returns the library's acknowledgement.
    pub fn set_tally(&self, tally: &Tally) -> Result<bool> {
        let live = self.handle.live()?;
        // SAFETY: `live` keeps the instance alive for the call.
        Ok(unsafe { live.lib.recv_set_tally(live.instance, &tally.to_raw()) })
    }

    /// Sends a metadata frame upstream to the connected source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCString`] if the data contains a null byte.
    pub fn send_metadata(&self, frame: &MetadataFrame) -> Result<bool> {
        let live = self.handle.live()?;
        let frame = frame.encode()?;
        // SAFETY: `frame` owns the string for the duration of the call.
        Ok(unsafe { live.lib.recv_send_metadata(live.instance, frame.raw()) })
    }

    /// Whether the connected source accepts PTZ commands.
    pub fn ptz_is_supported(&self) -> Result<bool> {
        let live = self.handle.live()?;
        // SAFETY: `live` keeps the instance alive for the call.
        Ok(unsafe { live.lib.recv_ptz_is_supported(live.instance) })
    }

    /// Zoom to an absolute value (0.0 = zoomed in, 1.0 = zoomed out)
    pub fn ptz_zoom(&self, zoom_value: f32) -> Result<bool> {
        self.ptz(PtzCommand::Zoom(zoom_value))
    }

    /// Pan and tilt to an absolute position, each in -1.0..=1.0
    pub fn ptz_pan_tilt(&self, pan: f32, tilt: f32) -> Result<bool> {
        self.ptz(PtzCommand::PanTilt { pan, tilt })
    }

    pub fn ptz_pan_tilt_speed(&self, pan_speed: f32, tilt_speed: f32) -> Result<bool> {
        self.ptz(PtzCommand::PanTiltSpeed {
            pan_speed,
            tilt_speed,
        })
    }

    /// Store the current position as preset `preset` (0..=99)
    pub fn ptz_store_preset(&self, preset: i32) -> Result<bool> {
        self.ptz(PtzCommand::StorePreset(preset))
    }

    pub fn ptz_recall_preset(&self, preset: i32, speed: f32) -> Result<bool> {
        self.ptz(PtzCommand::RecallPreset { preset, speed })
    }

    pub fn ptz_auto_focus(&self) -> Result<bool> {
        self.ptz(PtzCommand::AutoFocus)
    }

    pub fn ptz_focus(&self, focus_value: f32) -> Result<bool> {
        self.ptz(PtzCommand::Focus(focus_value))
    }

    pub fn ptz_focus_speed(&self, focus_speed: f32) -> Result<bool> {
        self.ptz(PtzCommand::FocusSpeed(focus_speed))
    }

    pub fn ptz_white_balance_auto(&self) -> Result<bool> {
        self.ptz(PtzCommand::WhiteBalanceAuto)
    }

    pub fn ptz_white_balance_indoor(&self) -> Result<bool> {
        self.ptz(PtzCommand::WhiteBalanceIndoor)
    }

    pub fn ptz_white_balance_outdoor(&self) -> Result<bool> {
        self.ptz(PtzCommand::WhiteBalanceOutdoor)
    }

    pub fn ptz_white_balance_oneshot(&self) -> Result<bool> {
        self.ptz(PtzCommand::WhiteBalanceOneshot)
    }

    pub fn ptz_white_balance_manual(&self, red: f32, blue: f32) -> Result<bool> {
        self.ptz(PtzCommand::WhiteBalanceManual { red, blue })
    }

    pub fn ptz_exposure_auto(&self) -> Result<bool> {
        self.ptz(PtzCommand::ExposureAuto)
    }

    pub fn ptz_exposure_manual(&self, exposure_level: f32) -> Result<bool> {
        self.ptz(PtzCommand::ExposureManual(exposure_level))
    }

    fn ptz(&self, command: PtzCommand) -> Result<bool> {
        let live = self.handle.live()?;
        // SAFETY: `live` keeps the instance alive for the call.
        Ok(unsafe { live.lib.recv_ptz(live.instance, command) })
    }

    /// Destroys the native receiver. Later calls are no-ops.
    ///
    /// Blocks until any in-flight call on this receiver returns, including an
    /// offloaded capture still inside its timeout. Until then `is_valid` blocks
    /// too. Avoid calling it from an async task while such a capture is pending.
    pub fn destroy(&self) {
        self.handle.destroy();
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_live()
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn capture_any(handle: &NativeHandle<ReceiverKind>, timeout_ms: u32) -> Result<CapturedFrame> {
    let live = handle.live()?;
    // SAFETY: `live` keeps the instance alive until the frame is copied out and freed.
    Ok(unsafe { capture::capture_any(live.lib, live.instance, timeout_ms) })
}

fn capture_one<K: CaptureKind>(
    handle: &NativeHandle<ReceiverKind>,
    timeout_ms: u32,
) -> Result<Option<K::Frame>> {
    let live = handle.live()?;
    // SAFETY: `live` keeps the instance alive until the frame is copied out and freed.
    Ok(unsafe { capture::capture_one::<K>(live.lib, live.instance, timeout_ms) })
}
