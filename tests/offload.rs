mod common;

use std::time::{Duration, Instant};

use common::{runtime, Scripted};
use ndi_bridge::{
    CapturedFrame, Error, Finder, FinderOptions, FrameType, MetadataFrame, Receiver,
    ReceiverOptions, Sender, SenderOptions, Source, VideoFrame,
};

#[test]
fn test_async_twins_need_a_tokio_runtime() {
    let (lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();
    let finder = Finder::new(&ndi, &FinderOptions::default()).unwrap();
    lib.clear_log();

    assert!(matches!(receiver.capture_async(10), Err(Error::NoAsyncRuntime)));
    assert!(matches!(
        receiver.capture_video_async(10),
        Err(Error::NoAsyncRuntime)
    ));
    assert!(matches!(
        finder.wait_for_sources_async(10),
        Err(Error::NoAsyncRuntime)
    ));
    assert_eq!(lib.total_calls(), 0);
}

#[tokio::test]
async fn test_async_twins_reject_destroyed_handles_synchronously() {
    let (lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();
    let finder = Finder::new(&ndi, &FinderOptions::default()).unwrap();
    let sender = Sender::new(&ndi, &SenderOptions::builder("CAM1").build().unwrap()).unwrap();
    receiver.destroy();
    finder.destroy();
    sender.destroy();
    lib.clear_log();

    assert!(matches!(
        receiver.capture_async(10),
        Err(Error::Destroyed("Receiver"))
    ));
    assert!(matches!(
        receiver.capture_audio_async(10),
        Err(Error::Destroyed("Receiver"))
    ));
    assert!(matches!(
        finder.get_sources_async(),
        Err(Error::Destroyed("Finder"))
    ));
    assert!(matches!(
        sender.get_tally_async(0),
        Err(Error::Destroyed("Sender"))
    ));
    assert!(matches!(
        sender.send_video_promise(&VideoFrame::default()),
        Err(Error::Destroyed("Sender"))
    ));
    assert_eq!(lib.total_calls(), 0);
}

#[tokio::test]
async fn test_promise_validates_the_frame_before_spawning() {
    let (lib, ndi) = runtime();
    let sender = Sender::new(&ndi, &SenderOptions::builder("CAM1").build().unwrap()).unwrap();
    lib.clear_log();

    let short = VideoFrame {
        width: 8,
        height: 8,
        data: Some(vec![0; 8]),
        ..VideoFrame::default()
    };
    assert!(matches!(
        sender.send_video_promise(&short),
        Err(Error::InvalidFrame(_))
    ));
    assert_eq!(lib.total_calls(), 0);
}

#[tokio::test]
async fn test_capture_async_resolves_with_the_frame() {
    let (lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();
    lib.script(Scripted::Metadata("<tally/>"));

    let captured = receiver.capture_async(100).unwrap().await.unwrap();
    assert_eq!(
        captured,
        CapturedFrame::Metadata(MetadataFrame::new("<tally/>").with_timecode(50.0))
    );
    assert_eq!(lib.count("recv_free_metadata"), 1);
}

#[tokio::test]
async fn test_capture_async_timeout_is_not_an_error() {
    let (_lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();

    let captured = receiver.capture_async(10).unwrap().await.unwrap();
    assert_eq!(captured.frame_type(), FrameType::None);

    let started = Instant::now();
    let video = receiver.capture_video_async(50).unwrap().await.unwrap();
    assert_eq!(video, None);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_capture_does_not_block_the_executor() {
    let (_lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();

    let capture = receiver.capture_video_async(300).unwrap();
    let ticker = tokio::spawn(async {
        let mut ticks = 0;
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ticks += 1;
        }
        ticks
    });

    assert_eq!(ticker.await.unwrap(), 5);
    assert!(!capture.is_finished());
    assert_eq!(capture.await.unwrap(), None);
}

#[tokio::test]
async fn test_destroy_racing_an_async_capture_leaks_nothing() {
    let (lib, ndi) = runtime();
    let receiver = Receiver::new(&ndi, &ReceiverOptions::default()).unwrap();
    lib.script(Scripted::Video {
        width: 2,
        height: 2,
        fourcc: u32::from_le_bytes(*b"BGRA"),
        fill: 1,
    });

    let task = receiver.capture_video_async(10).unwrap();
    receiver.destroy();

    // Either the worker captured first and freed its frame, or it found the
    // receiver destroyed and returned nothing.
    let frame = task.await.unwrap();
    assert_eq!(lib.count("recv_free_video"), usize::from(frame.is_some()));
    assert_eq!(lib.outstanding_frames(), 0);
    assert_eq!(lib.count("recv_destroy"), 1);
}

#[tokio::test]
async fn test_finder_async_twins() {
    let (lib, ndi) = runtime();
    let finder = Finder::new(&ndi, &FinderOptions::default()).unwrap();
    lib.add_source(Some("CAM1"), None);

    let update = finder.wait_for_sources_async(100).unwrap().await.unwrap();
    assert!(update.changed);
    assert_eq!(update.sources, vec![Source::new("CAM1")]);

    let sources = finder.get_sources_async().unwrap().await.unwrap();
    assert_eq!(sources, vec![Source::new("CAM1")]);
}

#[tokio::test]
async fn test_sender_async_twins() {
    let (lib, ndi) = runtime();
    let sender = Sender::new(&ndi, &SenderOptions::builder("CAM1").build().unwrap()).unwrap();
    lib.set_connections(2);

    assert_eq!(sender.get_connections_async(0).unwrap().await.unwrap(), 2);
    assert_eq!(sender.get_tally_async(0).unwrap().await.unwrap(), None);

    let frame = VideoFrame::builder()
        .resolution(2, 2)
        .data(vec![4; 16])
        .build()
        .unwrap();
    sender.send_video_promise(&frame).unwrap().await.unwrap();
    assert_eq!(lib.sent_video()[0].bytes, vec![4; 16]);

    let audio = ndi_bridge::AudioFrame::builder()
        .channels(1)
        .samples(2)
        .data(vec![0.5, 0.5])
        .build()
        .unwrap();
    sender.send_audio_promise(&audio).unwrap().await.unwrap();
    assert_eq!(lib.sent_audio(), vec![vec![0.5, 0.5]]);
}
