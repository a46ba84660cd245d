//! Binding core for the NDI® SDK (Network Device Interface).
//!
//! NDI moves real-time video, audio and metadata over IP. This crate sits
//! between an application and the native NDI library and owns the parts that
//! are easy to get wrong at that boundary:
//!
//! - **Values in, values out.** Frames, sources and tally states cross the
//!   boundary as owned Rust values. Native buffers are copied out before they
//!   are freed, and inputs are copied into buffers the crate owns for as long
//!   as the library may read them.
//! - **Blocking calls off the executor.** Every call that can block for a
//!   timeout has an `*_async` twin that runs it on Tokio's blocking pool and
//!   returns a [`BlockingTask`].
//! - **Handle lifecycle.** [`Finder`], [`Receiver`] and [`Sender`] destroy their
//!   native instance exactly once, and fail with [`Error::Destroyed`] afterwards.
//! - **Async video sends.** [`Sender::send_video_async`] keeps the queued buffer
//!   alive until the library signals it is done with it.
//!
//! # Quick Start
//!
//! ```no_run
//! use ndi_bridge::{Finder, FinderOptions, NDI};
//!
//! # fn main() -> Result<(), ndi_bridge::Error> {
//! // Initialize the NDI runtime
//! if !ndi_bridge::initialize() {
//!     return Ok(());
//! }
//! let ndi = NDI::global().expect("initialized above");
//!
//! // Find sources on the network
//! let finder = Finder::new(ndi, &FinderOptions::builder().show_local_sources(true).build())?;
//! finder.wait_for_sources(5000)?;
//!
//! for source in finder.get_sources()? {
//!     println!("Found: {}", source);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Native library
//!
//! Everything native goes through the [`NativeLib`] trait. With the `ndi-sdk`
//! feature the crate links the NDI SDK (located through `NDI_SDK_DIR`) and uses
//! it as the process-wide library. Without it, pick one with [`install`], or
//! build a private context with [`NDI::with_lib`].
//!
//! # Logging
//!
//! The crate emits [`tracing`] events for handle creation and destruction,
//! runtime transitions and async-send drains. It never installs a subscriber.

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod names;

mod capture;
mod error;
mod handle;
#[cfg(feature = "ndi-sdk")]
mod ndi_lib;

pub mod finder;
pub mod frames;
pub mod native;
pub mod offload;
pub mod receiver;
pub mod runtime;
#[cfg(feature = "ndi-sdk")]
pub mod sdk;
pub mod sender;

// Re-exports
pub use {
    error::*,
    finder::{
        Finder, FinderOptions, FinderOptionsBuilder, OwnedSource, Source, SourceUpdate,
        DEFAULT_WAIT_TIMEOUT_MS,
    },
    frames::{
        AudioFrame, AudioFrameBuilder, FrameFormat, MetadataFrame, OwnedAudioFrame,
        OwnedMetadataFrame, OwnedVideoFrame, PixelFormat, VideoFrame, VideoFrameBuilder,
    },
    native::{NativeLib, PtzCommand},
    offload::BlockingTask,
    receiver::{
        Bandwidth, CapturedFrame, ColorFormat, FrameType, Receiver, ReceiverOptions,
        ReceiverOptionsBuilder, Tally, DEFAULT_CAPTURE_TIMEOUT_MS,
    },
    runtime::{destroy, initialize, install, is_initialized, version, NDI},
    sender::{Sender, SenderOptions, SenderOptionsBuilder, DEFAULT_STATUS_TIMEOUT_MS},
};

#[cfg(feature = "ndi-sdk")]
pub use sdk::SdkLib;

/// Alias for Result with our Error type
pub type Result<T> = std::result::Result<T, crate::error::Error>;
