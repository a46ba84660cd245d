//! Receive-side frame ownership.
//!
//! A captured frame points into a native buffer that stays valid until the
//! matching `recv_free_*` call. [`RecvGuard`] owns that obligation: the frame is
//! decoded (copied out) while the guard is alive and the guard frees it on drop,
//! so exactly one free runs per populated frame on every path.
//!
//! [`CaptureKind`] carries the per-type differences so that video, audio and
//! metadata share one capture path.

use tracing::trace;

use crate::{
    frames::{AudioFrame, MetadataFrame, VideoFrame},
    native::{Instance, NativeLib, RawAudioFrame, RawMetadataFrame, RawVideoFrame},
    receiver::{CapturedFrame, FrameType},
};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::VideoKind {}
    impl Sealed for super::AudioKind {}
    impl Sealed for super::MetadataKind {}
}

type Slots<'f> = (
    Option<&'f mut RawVideoFrame>,
    Option<&'f mut RawAudioFrame>,
    Option<&'f mut RawMetadataFrame>,
);

/// Frame-type-specific behavior for the shared capture path.
///
/// Sealed: implemented only by [`VideoKind`], [`AudioKind`] and [`MetadataKind`].
pub(crate) trait CaptureKind: sealed::Sealed {
    /// Native descriptor the library fills in.
    type RawFrame: Default + Copy;
    /// Owned value handed to callers.
    type Frame;

    /// Frame type the native capture reports when it filled this kind's slot.
    const FRAME_TYPE: FrameType;

    /// Exposes only this kind's slot to the native capture.
    fn slots(frame: &mut Self::RawFrame) -> Slots<'_>;

    /// # Safety
    ///
    /// `frame` must have been populated by a capture on `instance` that reported
    /// `FRAME_TYPE`, and must not have been freed yet.
    unsafe fn free_frame(lib: &dyn NativeLib, instance: Instance, frame: &Self::RawFrame);

    /// # Safety
    ///
    /// Same as [`CaptureKind::free_frame`]: the buffers `frame` points to are still
    /// owned by the native library.
    unsafe fn copy_out(frame: &Self::RawFrame) -> Self::Frame;
}

pub(crate) struct VideoKind;

impl CaptureKind for VideoKind {
    type RawFrame = RawVideoFrame;
    type Frame = VideoFrame;
    const FRAME_TYPE: FrameType = FrameType::Video;

    fn slots(frame: &mut Self::RawFrame) -> Slots<'_> {
        (Some(frame), None, None)
    }

    unsafe fn free_frame(lib: &dyn NativeLib, instance: Instance, frame: &Self::RawFrame) {
        lib.recv_free_video(instance, frame);
    }

    unsafe fn copy_out(frame: &Self::RawFrame) -> Self::Frame {
        VideoFrame::from_raw(frame)
    }
}

pub(crate) struct AudioKind;

impl CaptureKind for AudioKind {
    type RawFrame = RawAudioFrame;
    type Frame = AudioFrame;
    const FRAME_TYPE: FrameType = FrameType::Audio;

    fn slots(frame: &mut Self::RawFrame) -> Slots<'_> {
        (None, Some(frame), None)
    }

    unsafe fn free_frame(lib: &dyn NativeLib, instance: Instance, frame: &Self::RawFrame) {
        lib.recv_free_audio(instance, frame);
    }

    unsafe fn copy_out(frame: &Self::RawFrame) -> Self::Frame {
        AudioFrame::from_raw(frame)
    }
}

pub(crate) struct MetadataKind;

impl CaptureKind for MetadataKind {
    type RawFrame = RawMetadataFrame;
    type Frame = MetadataFrame;
    const FRAME_TYPE: FrameType = FrameType::Metadata;

    fn slots(frame: &mut Self::RawFrame) -> Slots<'_> {
        (None, None, Some(frame))
    }

    unsafe fn free_frame(lib: &dyn NativeLib, instance: Instance, frame: &Self::RawFrame) {
        lib.recv_free_metadata(instance, frame);
    }

    unsafe fn copy_out(frame: &Self::RawFrame) -> Self::Frame {
        MetadataFrame::from_raw(frame)
    }
}

/// Owns one populated native frame and frees it exactly once on drop.
///
/// The borrow of `lib` ties the guard to the receiver's read lock, so the
/// receiver cannot be destroyed while the frame is outstanding.
pub(crate) struct RecvGuard<'rx, K: CaptureKind> {
    lib: &'rx dyn NativeLib,
    instance: Instance,
    frame: K::RawFrame,
}

impl<'rx, K: CaptureKind> RecvGuard<'rx, K> {
    /// # Safety
    ///
    /// `frame` must have been populated by a capture on `instance` that reported
    /// `K::FRAME_TYPE`.
    unsafe fn new(lib: &'rx dyn NativeLib, instance: Instance, frame: K::RawFrame) -> Self {
        Self {
            lib,
            instance,
            frame,
        }
    }

    /// Decodes the frame into an owned value.
    fn copy_out(&self) -> K::Frame {
        // SAFETY: the frame stays owned by the library until `drop`.
        unsafe { K::copy_out(&self.frame) }
    }
}

impl<K: CaptureKind> Drop for RecvGuard<'_, K> {
    fn drop(&mut self) {
        // SAFETY: `new` guarantees the frame was populated and not yet freed.
        unsafe { K::free_frame(self.lib, self.instance, &self.frame) }
    }
}

/// Captures one frame of kind `K`.
///
/// Returns `None` on timeout, on an error or status-change report, or when a
/// frame of another kind arrived; in those cases nothing was populated and
/// nothing is freed.
///
/// # Safety
///
/// `instance` must be a live receiver instance of `lib` for the whole call.
pub(crate) unsafe fn capture_one<K: CaptureKind>(
    lib: &dyn NativeLib,
    instance: Instance,
    timeout_ms: u32,
) -> Option<K::Frame> {
    let mut frame = K::RawFrame::default();
    let (video, audio, metadata) = K::slots(&mut frame);
    let code = lib.recv_capture(instance, video, audio, metadata, timeout_ms);

    match FrameType::from_code(code) {
        t if t == K::FRAME_TYPE => Some(RecvGuard::<K>::new(lib, instance, frame).copy_out()),
        other => {
            trace!(
                wanted = K::FRAME_TYPE.name(),
                got = other.name(),
                "capture returned no matching frame"
            );
            None
        }
    }
}

/// Captures whatever frame arrives first, with all three slots offered.
///
/// # Safety
///
/// `instance` must be a live receiver instance of `lib` for the whole call.
pub(crate) unsafe fn capture_any(
    lib: &dyn NativeLib,
    instance: Instance,
    timeout_ms: u32,
) -> CapturedFrame {
    let mut video = RawVideoFrame::default();
    let mut audio = RawAudioFrame::default();
    let mut metadata = RawMetadataFrame::default();
    let code = lib.recv_capture(
        instance,
        Some(&mut video),
        Some(&mut audio),
        Some(&mut metadata),
        timeout_ms,
    );

    match FrameType::from_code(code) {
        FrameType::Video => {
            CapturedFrame::Video(RecvGuard::<VideoKind>::new(lib, instance, video).copy_out())
        }
        FrameType::Audio => {
            CapturedFrame::Audio(RecvGuard::<AudioKind>::new(lib, instance, audio).copy_out())
        }
        FrameType::Metadata => CapturedFrame::Metadata(
            RecvGuard::<MetadataKind>::new(lib, instance, metadata).copy_out(),
        ),
        other => CapturedFrame::Empty(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_expose_only_their_own_kind() {
        let mut video = RawVideoFrame::default();
        let (v, a, m) = VideoKind::slots(&mut video);
        assert!(v.is_some() && a.is_none() && m.is_none());

        let mut audio = RawAudioFrame::default();
        let (v, a, m) = AudioKind::slots(&mut audio);
        assert!(v.is_none() && a.is_some() && m.is_none());

        let mut metadata = RawMetadataFrame::default();
        let (v, a, m) = MetadataKind::slots(&mut metadata);
        assert!(v.is_none() && a.is_none() && m.is_some());
    }

    #[test]
    fn frame_type_constants_match_kinds() {
        assert_eq!(VideoKind::FRAME_TYPE, FrameType::Video);
        assert_eq!(AudioKind::FRAME_TYPE, FrameType::Audio);
        assert_eq!(MetadataKind::FRAME_TYPE, FrameType::Metadata);
    }
}
