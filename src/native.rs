//! The native capability set the binding core drives.
//!
//! Everything the core needs from the NDI library goes through [`NativeLib`].
//! The raw descriptors below mirror the SDK structs field for field and carry
//! the same borrowed raw pointers; they never leave the core. Caller-facing
//! values are produced by the codec in [`crate::frames`], [`crate::finder`] and
//! [`crate::receiver`], which copies everything out before native memory is
//! released.
//!
//! [`crate::sdk::SdkLib`] (feature `ndi-sdk`) implements the trait over the
//! bindgen-generated SDK. Tests implement it with a counting double.

use std::{
    ffi::c_void,
    os::raw::c_char,
    ptr::{self, NonNull},
};

/// Opaque native instance pointer (finder, receiver or sender).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instance(NonNull<c_void>);

impl Instance {
    /// Wraps a pointer returned by a native create call. Null yields `None`.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

// SAFETY: the pointer is an opaque token owned by the native library, which is
// thread-safe for every entry point the core calls concurrently. The core
// serializes create/destroy against use through `NativeHandle`.
unsafe impl Send for Instance {}
unsafe impl Sync for Instance {}

/// Mirror of `NDIlib_source_t`. Both strings may be null.
#[derive(Debug, Clone, Copy)]
pub struct RawSource {
    pub p_ndi_name: *const c_char,
    pub p_url_address: *const c_char,
}

impl Default for RawSource {
    fn default() -> Self {
        Self {
            p_ndi_name: ptr::null(),
            p_url_address: ptr::null(),
        }
    }
}

/// Mirror of `NDIlib_video_frame_v2_t` (line-stride layout).
#[derive(Debug, Clone, Copy)]
pub struct RawVideoFrame {
    pub xres: i32,
    pub yres: i32,
    pub fourcc: u32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub picture_aspect_ratio: f32,
    pub frame_format_type: i32,
    pub timecode: i64,
    pub p_data: *mut u8,
    pub line_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

impl Default for RawVideoFrame {
    fn default() -> Self {
        Self {
            xres: 0,
            yres: 0,
            fourcc: 0,
            frame_rate_n: 0,
            frame_rate_d: 0,
            picture_aspect_ratio: 0.0,
            frame_format_type: 0,
            timecode: 0,
            p_data: ptr::null_mut(),
            line_stride_in_bytes: 0,
            p_metadata: ptr::null(),
            timestamp: 0,
        }
    }
}

/// Mirror of `NDIlib_audio_frame_v2_t` (planar 32-bit float).
#[derive(Debug, Clone, Copy)]
pub struct RawAudioFrame {
    pub sample_rate: i32,
    pub no_channels: i32,
    pub no_samples: i32,
    pub timecode: i64,
    pub p_data: *mut f32,
    pub channel_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

impl Default for RawAudioFrame {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            no_channels: 0,
            no_samples: 0,
            timecode: 0,
            p_data: ptr::null_mut(),
            channel_stride_in_bytes: 0,
            p_metadata: ptr::null(),
            timestamp: 0,
        }
    }
}

/// Mirror of `NDIlib_metadata_frame_t`.
#[derive(Debug, Clone, Copy)]
pub struct RawMetadataFrame {
    pub length: i32,
    pub timecode: i64,
    pub p_data: *mut c_char,
}

impl Default for RawMetadataFrame {
    fn default() -> Self {
        Self {
            length: 0,
            timecode: 0,
            p_data: ptr::null_mut(),
        }
    }
}

/// Mirror of `NDIlib_tally_t`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawTally {
    pub on_program: bool,
    pub on_preview: bool,
}

/// Mirror of `NDIlib_find_create_t`.
#[derive(Debug, Clone, Copy)]
pub struct RawFindCreate {
    pub show_local_sources: bool,
    pub p_groups: *const c_char,
    pub p_extra_ips: *const c_char,
}

/// Mirror of `NDIlib_recv_create_v3_t`.
#[derive(Debug, Clone, Copy)]
pub struct RawRecvCreate {
    pub source_to_connect_to: RawSource,
    pub color_format: i32,
    pub bandwidth: i32,
    pub allow_video_fields: bool,
    pub p_ndi_recv_name: *const c_char,
}

/// Mirror of `NDIlib_send_create_t`.
#[derive(Debug, Clone, Copy)]
pub struct RawSendCreate {
    pub p_ndi_name: *const c_char,
    pub p_groups: *const c_char,
    pub clock_video: bool,
    pub clock_audio: bool,
}

/// Pan-tilt-zoom commands a receiver can forward to its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PtzCommand {
    Zoom(f32),
    PanTilt { pan: f32, tilt: f32 },
    PanTiltSpeed { pan_speed: f32, tilt_speed: f32 },
    StorePreset(i32),
    RecallPreset { preset: i32, speed: f32 },
    AutoFocus,
    Focus(f32),
    FocusSpeed(f32),
    WhiteBalanceAuto,
    WhiteBalanceIndoor,
    WhiteBalanceOutdoor,
    WhiteBalanceOneshot,
    WhiteBalanceManual { red: f32, blue: f32 },
    ExposureAuto,
    ExposureManual(f32),
}

/// The native discovery/receive/send library.
///
/// # Safety
///
/// Methods taking an [`Instance`] require one returned by the matching create
/// call that has not been passed to the matching destroy call. Descriptor
/// pointers must be valid for the duration of the call. Pointers returned by the
/// library (sources, captured frames, version) stay valid only until the next
/// call on the same instance, or until the matching free call for captured
/// frames.
pub trait NativeLib: Send + Sync + 'static {
    fn initialize(&self) -> bool;
    fn destroy(&self);
    fn version(&self) -> *const c_char;

    unsafe fn find_create(&self, settings: &RawFindCreate) -> Option<Instance>;
    unsafe fn find_destroy(&self, instance: Instance);
    unsafe fn find_wait_for_sources(&self, instance: Instance, timeout_ms: u32) -> bool;
    /// Returns borrowed source descriptors owned by the finder.
    unsafe fn find_get_current_sources(&self, instance: Instance) -> Vec<RawSource>;

    unsafe fn recv_create(&self, settings: &RawRecvCreate) -> Option<Instance>;
    unsafe fn recv_destroy(&self, instance: Instance);
    unsafe fn recv_connect(&self, instance: Instance, source: &RawSource);
    /// Fills at most one of the provided slots and returns the native frame
    /// type code.
    unsafe fn recv_capture(
        &self,
        instance: Instance,
        video: Option<&mut RawVideoFrame>,
        audio: Option<&mut RawAudioFrame>,
        metadata: Option<&mut RawMetadataFrame>,
        timeout_ms: u32,
    ) -> i32;
    unsafe fn recv_free_video(&self, instance: Instance, frame: &RawVideoFrame);
    unsafe fn recv_free_audio(&self, instance: Instance, frame: &RawAudioFrame);
    unsafe fn recv_free_metadata(&self, instance: Instance, frame: &RawMetadataFrame);
    unsafe fn recv_set_tally(&self, instance: Instance, tally: &RawTally) -> bool;
    unsafe fn recv_send_metadata(&self, instance: Instance, frame: &RawMetadataFrame) -> bool;
    unsafe fn recv_ptz_is_supported(&self, instance: Instance) -> bool;
    unsafe fn recv_ptz(&self, instance: Instance, command: PtzCommand) -> bool;

    unsafe fn send_create(&self, settings: &RawSendCreate) -> Option<Instance>;
    unsafe fn send_destroy(&self, instance: Instance);
    unsafe fn send_video(&self, instance: Instance, frame: &RawVideoFrame);
    /// Queues `frame` without copying it. `None` blocks until the library has
    /// released the previously queued buffer.
    unsafe fn send_video_async(&self, instance: Instance, frame: Option<&RawVideoFrame>);
    unsafe fn send_audio(&self, instance: Instance, frame: &RawAudioFrame);
    unsafe fn send_metadata(&self, instance: Instance, frame: &RawMetadataFrame);
    unsafe fn send_get_tally(&self, instance: Instance, tally: &mut RawTally, timeout_ms: u32)
        -> bool;
    unsafe fn send_get_no_connections(&self, instance: Instance, timeout_ms: u32) -> i32;
    unsafe fn send_get_source_name(&self, instance: Instance) -> Option<RawSource>;
    unsafe fn send_clear_connection_metadata(&self, instance: Instance);
    unsafe fn send_add_connection_metadata(&self, instance: Instance, frame: &RawMetadataFrame);
}
