//! Video, audio and metadata frames as they cross the boundary.
//!
//! Receiving decodes a native descriptor into an owned value, copying every
//! byte out before the native buffer is freed. Sending encodes a value into an
//! owned native-layout buffer (`Owned*Frame`) whose storage outlives the native
//! call; the guard frees it when dropped.
//!
//! Timecodes and timestamps are carried as `f64`. Native values are 64-bit
//! integers, so anything above 2^53 loses precision on the way through.

use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
    ptr, slice,
};

use crate::{
    native::{RawAudioFrame, RawMetadataFrame, RawVideoFrame},
    Error, Result,
};

pub const DEFAULT_FRAME_RATE_N: i32 = 30000;
pub const DEFAULT_FRAME_RATE_D: i32 = 1001;
pub const DEFAULT_SAMPLE_RATE: i32 = 48000;
pub const DEFAULT_CHANNEL_COUNT: i32 = 2;

const BYTES_PER_SAMPLE: i32 = std::mem::size_of::<f32>() as i32;

string_enum! {
    /// Pixel layout of a video frame (the NDI FourCC code).
    pub enum PixelFormat: u32 {
        /// 4:2:2 packed, 16 bits per pixel.
        UYVY = 0x5956_5955 => "UYVY",
        BGRA = 0x4152_4742 => "BGRA",
        BGRX = 0x5852_4742 => "BGRX",
        RGBA = 0x4142_4752 => "RGBA",
        RGBX = 0x5842_4752 => "RGBX",
        /// Planar 4:2:0.
        I420 = 0x3032_3449 => "I420",
        /// Semi-planar 4:2:0.
        NV12 = 0x3231_564E => "NV12",
        /// 16-bit 4:2:2 semi-planar.
        P216 = 0x3631_3250 => "P216",
        /// P216 with a trailing 16-bit alpha plane.
        PA16 = 0x3631_4150 => "PA16",
    }
    unknown = "UNKNOWN";
    default = BGRA;
}

impl PixelFormat {
    /// Bytes per pixel used to derive a default line stride.
    pub fn bytes_per_pixel(self) -> i32 {
        match self {
            PixelFormat::UYVY => 2,
            _ => 4,
        }
    }
}

string_enum! {
    /// Scan layout of a video frame.
    pub enum FrameFormat: i32 {
        Interleaved = 0 => "interleaved",
        Progressive = 1 => "progressive",
        Field0 = 2 => "field0",
        Field1 = 3 => "field1",
    }
    unknown = "unknown";
    default = Progressive;
}

/// A video frame value.
///
/// Fields that have an encode default are `Option`s. A decoded frame always has
/// every one of them set; a frame built for sending may leave them empty:
///
/// | field | default when `None` |
/// |---|---|
/// | `pixel_format` | BGRA |
/// | `frame_rate_n` / `frame_rate_d` | 30000 / 1001 |
/// | `picture_aspect_ratio` | `width / height` |
/// | `frame_format` | progressive |
/// | `line_stride` | `width * bytes_per_pixel` (2 for UYVY, 4 otherwise) |
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    pub width: i32,
    pub height: i32,
    pub pixel_format: Option<PixelFormat>,
    pub frame_rate_n: Option<i32>,
    pub frame_rate_d: Option<i32>,
    pub picture_aspect_ratio: Option<f32>,
    pub frame_format: Option<FrameFormat>,
    pub timecode: f64,
    pub line_stride: Option<i32>,
    pub timestamp: f64,
    pub metadata: Option<String>,
    /// `line_stride * height` bytes of pixel data.
    pub data: Option<Vec<u8>>,
}

impl VideoFrame {
    /// Create a builder for a video frame
    pub fn builder() -> VideoFrameBuilder {
        VideoFrameBuilder::new()
    }

    /// Line stride after defaulting.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFrame`] if the default stride for `width` overflows.
    pub fn effective_line_stride(&self) -> Result<i32> {
        match self.line_stride {
            Some(stride) => Ok(stride),
            None => self
                .width
                .checked_mul(self.pixel_format.unwrap_or_default().bytes_per_pixel())
                .ok_or_else(|| {
                    Error::InvalidFrame(format!(
                        "line stride for a width of {} overflows",
                        self.width
                    ))
                }),
        }
    }

    /// Number of pixel bytes the frame describes.
    pub fn expected_data_len(&self) -> Result<usize> {
        non_negative(self.effective_line_stride()?)
            .checked_mul(non_negative(self.height))
            .ok_or_else(|| Error::InvalidFrame("video frame size overflows".into()))
    }

    /// Decodes a captured native frame, copying pixel data and metadata out.
    ///
    /// # Safety
    ///
    /// `p_data` must be null or point to `line_stride_in_bytes * yres` readable
    /// bytes, and `p_metadata` must be null or a NUL-terminated string.
    pub(crate) unsafe fn from_raw(raw: &RawVideoFrame) -> Self {
        let data = if !raw.p_data.is_null() && raw.yres > 0 && raw.line_stride_in_bytes > 0 {
            let len = raw.line_stride_in_bytes as usize * raw.yres as usize;
            Some(slice::from_raw_parts(raw.p_data, len).to_vec())
        } else {
            None
        };

        VideoFrame {
            width: raw.xres,
            height: raw.yres,
            pixel_format: Some(PixelFormat::from_code(raw.fourcc)),
            frame_rate_n: Some(raw.frame_rate_n),
            frame_rate_d: Some(raw.frame_rate_d),
            picture_aspect_ratio: Some(raw.picture_aspect_ratio),
            frame_format: Some(FrameFormat::from_code(raw.frame_format_type)),
            timecode: timecode_from_native(raw.timecode),
            line_stride: Some(raw.line_stride_in_bytes),
            timestamp: timecode_from_native(raw.timestamp),
            metadata: copy_c_str(raw.p_metadata),
            data,
        }
    }

    /// Copies the frame into a freshly allocated native-layout buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFrame`] if `data` is shorter than `line_stride * height`,
    ///   or the default stride overflows
    /// - [`Error::InvalidCString`] if the metadata contains a null byte
    pub fn encode(&self) -> Result<OwnedVideoFrame> {
        let pixel_format = self.pixel_format.unwrap_or_default();
        let line_stride = self.effective_line_stride()?;

        if let Some(data) = &self.data {
            let expected = self.expected_data_len()?;
            if data.len() < expected {
                return Err(Error::InvalidFrame(format!(
                    "video data is {} bytes but a {}x{} frame with stride {} needs {}",
                    data.len(),
                    self.width,
                    self.height,
                    line_stride,
                    expected
                )));
            }
        }

        let picture_aspect_ratio = self.picture_aspect_ratio.unwrap_or_else(|| {
            if self.height != 0 {
                self.width as f32 / self.height as f32
            } else {
                0.0
            }
        });

        let mut data: Option<Box<[u8]>> = self.data.as_deref().map(Box::from);
        let metadata = self.metadata.as_deref().map(CString::new).transpose()?;

        let raw = RawVideoFrame {
            xres: self.width,
            yres: self.height,
            fourcc: pixel_format.encode(),
            frame_rate_n: self.frame_rate_n.unwrap_or(DEFAULT_FRAME_RATE_N),
            frame_rate_d: self.frame_rate_d.unwrap_or(DEFAULT_FRAME_RATE_D),
            picture_aspect_ratio,
            frame_format_type: self.frame_format.unwrap_or_default().encode(),
            timecode: timecode_to_native(self.timecode),
            p_data: data.as_mut().map_or(ptr::null_mut(), |d| d.as_mut_ptr()),
            line_stride_in_bytes: line_stride,
            p_metadata: metadata.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
            timestamp: timecode_to_native(self.timestamp),
        };

        Ok(OwnedVideoFrame {
            raw,
            _data: data,
            _metadata: metadata,
        })
    }
}

/// A native video descriptor that owns the buffers it points into.
///
/// Dropping it frees the pixel copy and the metadata string, so it must outlive
/// any native call that may still read them.
#[derive(Debug)]
pub struct OwnedVideoFrame {
    raw: RawVideoFrame,
    _data: Option<Box<[u8]>>,
    _metadata: Option<CString>,
}

impl OwnedVideoFrame {
    pub(crate) fn raw(&self) -> &RawVideoFrame {
        &self.raw
    }
}

// SAFETY: the raw pointers only point into the boxed buffers this value owns.
unsafe impl Send for OwnedVideoFrame {}
unsafe impl Sync for OwnedVideoFrame {}

/// Builder for [`VideoFrame`].
#[derive(Debug, Clone, Default)]
pub struct VideoFrameBuilder {
    frame: VideoFrame,
}

impl VideoFrameBuilder {
    /// Create a new builder with no fields set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the video resolution
    #[must_use]
    pub fn resolution(mut self, width: i32, height: i32) -> Self {
        self.frame.width = width;
        self.frame.height = height;
        self
    }

    #[must_use]
    pub fn pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.frame.pixel_format = Some(pixel_format);
        self
    }

    /// Set the frame rate as a fraction (e.g., 30000/1001 for 29.97fps)
    #[must_use]
    pub fn frame_rate(mut self, numerator: i32, denominator: i32) -> Self {
        self.frame.frame_rate_n = Some(numerator);
        self.frame.frame_rate_d = Some(denominator);
        self
    }

    #[must_use]
    pub fn aspect_ratio(mut self, ratio: f32) -> Self {
        self.frame.picture_aspect_ratio = Some(ratio);
        self
    }

    #[must_use]
    pub fn frame_format(mut self, frame_format: FrameFormat) -> Self {
        self.frame.frame_format = Some(frame_format);
        self
    }

    #[must_use]
    pub fn line_stride(mut self, stride: i32) -> Self {
        self.frame.line_stride = Some(stride);
        self
    }

    #[must_use]
    pub fn timecode(mut self, timecode: f64) -> Self {
        self.frame.timecode = timecode;
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.frame.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn metadata<S: Into<String>>(mut self, metadata: S) -> Self {
        self.frame.metadata = Some(metadata.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.frame.data = Some(data);
        self
    }

    /// Build the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a non-positive resolution and
    /// [`Error::InvalidFrame`] if the data is shorter than the frame describes.
    pub fn build(self) -> Result<VideoFrame> {
        let frame = self.frame;
        if frame.width <= 0 || frame.height <= 0 {
            return Err(Error::InvalidConfiguration(format!(
                "video resolution must be positive, got {}x{}",
                frame.width, frame.height
            )));
        }
        let expected = frame.expected_data_len()?;
        if let Some(data) = &frame.data {
            if data.len() < expected {
                return Err(Error::InvalidFrame(format!(
                    "video data is {} bytes, expected at least {}",
                    data.len(),
                    expected
                )));
            }
        }
        Ok(frame)
    }
}

/// An audio frame value with planar 32-bit float samples.
///
/// | field | default when `None` |
/// |---|---|
/// | `sample_rate` | 48000 |
/// | `channel_count` | 2 |
/// | `channel_stride_bytes` | `sample_count * 4` |
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFrame {
    pub sample_rate: Option<i32>,
    pub channel_count: Option<i32>,
    pub sample_count: i32,
    pub timecode: f64,
    pub channel_stride_bytes: Option<i32>,
    pub timestamp: f64,
    pub metadata: Option<String>,
    /// `channel_count * channel_stride_bytes / 4` samples, one plane per channel.
    pub data: Option<Vec<f32>>,
}

impl AudioFrame {
    /// Create a builder for an audio frame
    pub fn builder() -> AudioFrameBuilder {
        AudioFrameBuilder::new()
    }

    pub fn effective_channel_count(&self) -> i32 {
        self.channel_count.unwrap_or(DEFAULT_CHANNEL_COUNT)
    }

    /// Channel stride after defaulting.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFrame`] if the default stride for `sample_count` overflows.
    pub fn effective_channel_stride(&self) -> Result<i32> {
        match self.channel_stride_bytes {
            Some(stride) => Ok(stride),
            None => self.sample_count.checked_mul(BYTES_PER_SAMPLE).ok_or_else(|| {
                Error::InvalidFrame(format!(
                    "channel stride for {} samples overflows",
                    self.sample_count
                ))
            }),
        }
    }

    /// Number of samples across all planes the frame describes.
    pub fn expected_data_len(&self) -> Result<usize> {
        non_negative(self.effective_channel_count())
            .checked_mul(non_negative(self.effective_channel_stride()?))
            .map(|bytes| bytes / BYTES_PER_SAMPLE as usize)
            .ok_or_else(|| Error::InvalidFrame("audio frame size overflows".into()))
    }

    /// Samples of one channel, or `None` if out of range or there is no data.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        let data = self.data.as_deref()?;
        if index >= non_negative(self.effective_channel_count()) {
            return None;
        }
        let plane = non_negative(self.effective_channel_stride().ok()?) / BYTES_PER_SAMPLE as usize;
        let start = index * plane;
        let len = non_negative(self.sample_count).min(plane);
        data.get(start..start + len)
    }

    /// Decodes a captured native frame, copying samples and metadata out.
    ///
    /// # Safety
    ///
    /// `p_data` must be null or point to `no_channels * channel_stride_in_bytes`
    /// readable bytes, and `p_metadata` must be null or a NUL-terminated string.
    pub(crate) unsafe fn from_raw(raw: &RawAudioFrame) -> Self {
        let data = if !raw.p_data.is_null() && raw.no_channels > 0 && raw.no_samples > 0 {
            let len = raw.no_channels as usize * non_negative(raw.channel_stride_in_bytes)
                / BYTES_PER_SAMPLE as usize;
            Some(slice::from_raw_parts(raw.p_data, len).to_vec())
        } else {
            None
        };

        AudioFrame {
            sample_rate: Some(raw.sample_rate),
            channel_count: Some(raw.no_channels),
            sample_count: raw.no_samples,
            timecode: timecode_from_native(raw.timecode),
            channel_stride_bytes: Some(raw.channel_stride_in_bytes),
            timestamp: timecode_from_native(raw.timestamp),
            metadata: copy_c_str(raw.p_metadata),
            data,
        }
    }

    /// Copies the frame into a freshly allocated native-layout buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFrame`] if `data` holds fewer samples than the frame describes,
    ///   or the default stride overflows
    /// - [`Error::InvalidCString`] if the metadata contains a null byte
    pub fn encode(&self) -> Result<OwnedAudioFrame> {
        let channel_stride = self.effective_channel_stride()?;

        if let Some(data) = &self.data {
            let expected = self.expected_data_len()?;
            if data.len() < expected {
                return Err(Error::InvalidFrame(format!(
                    "audio data holds {} samples but {} channels with stride {} need {}",
                    data.len(),
                    self.effective_channel_count(),
                    channel_stride,
                    expected
                )));
            }
        }

        let mut data: Option<Box<[f32]>> = self.data.as_deref().map(Box::from);
        let metadata = self.metadata.as_deref().map(CString::new).transpose()?;

        let raw = RawAudioFrame {
            sample_rate: self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            no_channels: self.effective_channel_count(),
            no_samples: self.sample_count,
            timecode: timecode_to_native(self.timecode),
            p_data: data.as_mut().map_or(ptr::null_mut(), |d| d.as_mut_ptr()),
            channel_stride_in_bytes: channel_stride,
            p_metadata: metadata.as_ref().map_or(ptr::null(), |m| m.as_ptr()),
            timestamp: timecode_to_native(self.timestamp),
        };

        Ok(OwnedAudioFrame {
            raw,
            _data: data,
            _metadata: metadata,
        })
    }
}

/// A native audio descriptor that owns the buffers it points into.
#[derive(Debug)]
pub struct OwnedAudioFrame {
    raw: RawAudioFrame,
    _data: Option<Box<[f32]>>,
    _metadata: Option<CString>,
}

impl OwnedAudioFrame {
    pub(crate) fn raw(&self) -> &RawAudioFrame {
        &self.raw
    }
}

// SAFETY: the raw pointers only point into the boxed buffers this value owns.
unsafe impl Send for OwnedAudioFrame {}
unsafe impl Sync for OwnedAudioFrame {}

/// Builder for [`AudioFrame`].
#[derive(Debug, Clone, Default)]
pub struct AudioFrameBuilder {
    frame: AudioFrame,
}

impl AudioFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sample_rate(mut self, rate: i32) -> Self {
        self.frame.sample_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn channels(mut self, channels: i32) -> Self {
        self.frame.channel_count = Some(channels);
        self
    }

    #[must_use]
    pub fn samples(mut self, samples: i32) -> Self {
        self.frame.sample_count = samples;
        self
    }

    #[must_use]
    pub fn channel_stride(mut self, stride_bytes: i32) -> Self {
        self.frame.channel_stride_bytes = Some(stride_bytes);
        self
    }

    #[must_use]
    pub fn timecode(mut self, timecode: f64) -> Self {
        self.frame.timecode = timecode;
        self
    }

    #[must_use]
    pub fn metadata<S: Into<String>>(mut self, metadata: S) -> Self {
        self.frame.metadata = Some(metadata.into());
        self
    }

    /// Planar samples: all of channel 0, then all of channel 1, and so on.
    #[must_use]
    pub fn data(mut self, data: Vec<f32>) -> Self {
        self.frame.data = Some(data);
        self
    }

    /// Build the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a non-positive channel count or
    /// a negative sample count, and [`Error::InvalidFrame`] for short data.
    pub fn build(self) -> Result<AudioFrame> {
        let frame = self.frame;
        if frame.effective_channel_count() <= 0 {
            return Err(Error::InvalidConfiguration(
                "audio channel count must be positive".into(),
            ));
        }
        if frame.sample_count < 0 {
            return Err(Error::InvalidConfiguration(
                "audio sample count cannot be negative".into(),
            ));
        }
        let expected = frame.expected_data_len()?;
        if let Some(data) = &frame.data {
            if data.len() < expected {
                return Err(Error::InvalidFrame(format!(
                    "audio data holds {} samples, expected at least {}",
                    data.len(),
                    expected
                )));
            }
        }
        Ok(frame)
    }
}

/// A metadata frame carrying an XML-like string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFrame {
    pub data: String,
    pub timecode: f64,
}

impl MetadataFrame {
    pub fn new<S: Into<String>>(data: S) -> Self {
        Self {
            data: data.into(),
            timecode: 0.0,
        }
    }

    #[must_use]
    pub fn with_timecode(mut self, timecode: f64) -> Self {
        self.timecode = timecode;
        self
    }

    /// Byte length of `data`.
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// # Safety
    ///
    /// `p_data` must be null or a NUL-terminated string.
    pub(crate) unsafe fn from_raw(raw: &RawMetadataFrame) -> Self {
        MetadataFrame {
            data: copy_c_str(raw.p_data).unwrap_or_default(),
            timecode: timecode_from_native(raw.timecode),
        }
    }

    /// Copies the string into an owned NUL-terminated buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCString`] if the data contains a null byte.
    pub fn encode(&self) -> Result<OwnedMetadataFrame> {
        let length = i32::try_from(self.length()).map_err(|_| {
            Error::InvalidFrame(format!("metadata of {} bytes is too long", self.length()))
        })?;
        let data = CString::new(self.data.as_str())?;
        let raw = RawMetadataFrame {
            length,
            timecode: timecode_to_native(self.timecode),
            // The native side never writes through a send-side descriptor.
            p_data: data.as_ptr() as *mut c_char,
        };
        Ok(OwnedMetadataFrame { raw, _data: data })
    }
}

/// A native metadata descriptor that owns its string.
#[derive(Debug)]
pub struct OwnedMetadataFrame {
    raw: RawMetadataFrame,
    _data: CString,
}

impl OwnedMetadataFrame {
    pub(crate) fn raw(&self) -> &RawMetadataFrame {
        &self.raw
    }
}

// SAFETY: `raw.p_data` only points into the owned CString.
unsafe impl Send for OwnedMetadataFrame {}
unsafe impl Sync for OwnedMetadataFrame {}

pub(crate) fn timecode_from_native(value: i64) -> f64 {
    value as f64
}

/// Saturates at the `i64` range; NaN becomes 0.
pub(crate) fn timecode_to_native(value: f64) -> i64 {
    value as i64
}

/// Copies a nullable C string. Null stays `None`; an empty string stays `Some("")`.
///
/// # Safety
///
/// `ptr` must be null or a NUL-terminated string.
pub(crate) unsafe fn copy_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

fn non_negative(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}
