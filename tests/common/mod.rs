//! A counting stand-in for the native NDI library.
//!
//! Every entry point bumps a per-name counter and appends to an event log.
//! Captures are scripted; anything the fake hands out (captured buffers,
//! sources, names) stays owned by the fake and is checked on free.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    ffi::{c_void, CStr, CString},
    os::raw::c_char,
    ptr,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};

use ndi_bridge::{
    native::{
        Instance, NativeLib, RawAudioFrame, RawFindCreate, RawMetadataFrame, RawRecvCreate,
        RawSendCreate, RawSource, RawTally, RawVideoFrame,
    },
    PtzCommand, NDI,
};

/// What the next `recv_capture` produces.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// A BGRA-strided video frame filled with `fill`.
    Video {
        width: i32,
        height: i32,
        fourcc: u32,
        fill: u8,
    },
    /// Planar audio; sample `i` of channel `c` is `c * 1000 + i`.
    Audio { channels: i32, samples: i32 },
    Metadata(&'static str),
    /// A bare frame type code with no payload (none, error, status change...).
    Code(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentVideo {
    pub width: i32,
    pub height: i32,
    pub fourcc: u32,
    pub line_stride: i32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub picture_aspect_ratio: f32,
    pub frame_format: i32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecvCreated {
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub color_format: i32,
    pub bandwidth: i32,
    pub allow_video_fields: bool,
    pub name: Option<String>,
}

enum Outstanding {
    Video(Box<[u8]>),
    Audio(Box<[f32]>),
    Metadata(CString),
}

struct State {
    calls: HashMap<&'static str, usize>,
    events: Vec<String>,
    next_id: usize,
    live: HashSet<usize>,
    init_ok: bool,
    fail_create: bool,

    sources: Vec<(Option<CString>, Option<CString>)>,
    sources_changed: bool,

    captures: VecDeque<Scripted>,
    outstanding: HashMap<usize, Outstanding>,
    receivers: Vec<RecvCreated>,
    connected: Vec<Option<String>>,
    recv_tally: Vec<RawTally>,
    recv_metadata: Vec<String>,
    ptz: Vec<PtzCommand>,

    sender_names: HashMap<usize, CString>,
    sender_clocks: Vec<(bool, bool)>,
    sent_video: Vec<SentVideo>,
    sent_audio: Vec<Vec<f32>>,
    sent_metadata: Vec<String>,
    connection_metadata: Vec<String>,
    pending_async: Option<usize>,
    send_tally: Option<RawTally>,
    connections: i32,
}

impl Default for State {
    fn default() -> Self {
        Self {
            calls: HashMap::new(),
            events: Vec::new(),
            next_id: 0,
            live: HashSet::new(),
            init_ok: true,
            fail_create: false,
            sources: Vec::new(),
            sources_changed: false,
            captures: VecDeque::new(),
            outstanding: HashMap::new(),
            receivers: Vec::new(),
            connected: Vec::new(),
            recv_tally: Vec::new(),
            recv_metadata: Vec::new(),
            ptz: Vec::new(),
            sender_names: HashMap::new(),
            sender_clocks: Vec::new(),
            sent_video: Vec::new(),
            sent_audio: Vec::new(),
            sent_metadata: Vec::new(),
            connection_metadata: Vec::new(),
            pending_async: None,
            send_tally: None,
            connections: 0,
        }
    }
}

#[derive(Default)]
pub struct FakeLib {
    state: Mutex<State>,
}

/// A fake library plus an initialized runtime over it.
pub fn runtime() -> (Arc<FakeLib>, NDI) {
    let lib = Arc::new(FakeLib::default());
    let ndi = NDI::with_lib(lib.clone());
    assert!(ndi.initialize());
    (lib, ndi)
}

unsafe fn copy_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

impl FakeLib {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, name: &'static str) -> MutexGuard<'_, State> {
        let mut state = self.state();
        *state.calls.entry(name).or_default() += 1;
        state.events.push(name.to_string());
        state
    }

    fn new_instance(&self, state: &mut State) -> Option<Instance> {
        if state.fail_create {
            return None;
        }
        state.next_id += 1;
        let id = state.next_id * 16;
        state.live.insert(id);
        Instance::from_ptr(id as *mut c_void)
    }

    fn release_instance(state: &mut State, instance: Instance) {
        let id = instance.as_ptr() as usize;
        assert!(state.live.remove(&id), "instance {id:#x} destroyed twice");
    }

    pub fn count(&self, name: &str) -> usize {
        self.state().calls.get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn push_event(&self, event: String) {
        self.state().events.push(event);
    }

    pub fn clear_log(&self) {
        let mut state = self.state();
        state.calls.clear();
        state.events.clear();
    }

    /// Blocks until `event` shows up in the log.
    pub fn wait_for_event(&self, event: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.state().events.iter().any(|e| e == event) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    pub fn live_instances(&self) -> usize {
        self.state().live.len()
    }

    pub fn outstanding_frames(&self) -> usize {
        self.state().outstanding.len()
    }

    pub fn set_init_ok(&self, ok: bool) {
        self.state().init_ok = ok;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn add_source(&self, name: Option<&str>, url: Option<&str>) {
        let name = name.map(|n| CString::new(n).unwrap());
        let url = url.map(|u| CString::new(u).unwrap());
        let mut state = self.state();
        state.sources.push((name, url));
        state.sources_changed = true;
    }

    pub fn script(&self, capture: Scripted) {
        self.state().captures.push_back(capture);
    }

    pub fn receivers(&self) -> Vec<RecvCreated> {
        self.state().receivers.clone()
    }

    pub fn connected(&self) -> Vec<Option<String>> {
        self.state().connected.clone()
    }

    pub fn recv_tally(&self) -> Vec<RawTally> {
        self.state().recv_tally.clone()
    }

    pub fn recv_metadata(&self) -> Vec<String> {
        self.state().recv_metadata.clone()
    }

    pub fn ptz_commands(&self) -> Vec<PtzCommand> {
        self.state().ptz.clone()
    }

    pub fn sender_clocks(&self) -> Vec<(bool, bool)> {
        self.state().sender_clocks.clone()
    }

    pub fn sent_video(&self) -> Vec<SentVideo> {
        self.state().sent_video.clone()
    }

    pub fn sent_audio(&self) -> Vec<Vec<f32>> {
        self.state().sent_audio.clone()
    }

    pub fn sent_metadata(&self) -> Vec<String> {
        self.state().sent_metadata.clone()
    }

    pub fn connection_metadata(&self) -> Vec<String> {
        self.state().connection_metadata.clone()
    }

    pub fn set_send_tally(&self, tally: Option<RawTally>) {
        self.state().send_tally = tally;
    }

    pub fn set_connections(&self, connections: i32) {
        self.state().connections = connections;
    }
}

impl NativeLib for FakeLib {
    fn initialize(&self) -> bool {
        self.record("initialize").init_ok
    }

    fn destroy(&self) {
        drop(self.record("destroy"));
    }

    fn version(&self) -> *const c_char {
        drop(self.record("version"));
        b"6.1.0 (fake)\0".as_ptr().cast()
    }

    unsafe fn find_create(&self, _settings: &RawFindCreate) -> Option<Instance> {
        let mut state = self.record("find_create");
        self.new_instance(&mut state)
    }

    unsafe fn find_destroy(&self, instance: Instance) {
        let mut state = self.record("find_destroy");
        Self::release_instance(&mut state, instance);
    }

    unsafe fn find_wait_for_sources(&self, _instance: Instance, timeout_ms: u32) -> bool {
        let changed = {
            let mut state = self.record("find_wait_for_sources");
            std::mem::take(&mut state.sources_changed)
        };
        if !changed {
            thread::sleep(Duration::from_millis(timeout_ms.into()));
        }
        changed
    }

    unsafe fn find_get_current_sources(&self, _instance: Instance) -> Vec<RawSource> {
        let state = self.record("find_get_current_sources");
        state
            .sources
            .iter()
            .map(|(name, url)| RawSource {
                p_ndi_name: name.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
                p_url_address: url.as_ref().map_or(ptr::null(), |u| u.as_ptr()),
            })
            .collect()
    }

    unsafe fn recv_create(&self, settings: &RawRecvCreate) -> Option<Instance> {
        let mut state = self.record("recv_create");
        let created = RecvCreated {
            source_name: copy_c_str(settings.source_to_connect_to.p_ndi_name),
            source_url: copy_c_str(settings.source_to_connect_to.p_url_address),
            color_format: settings.color_format,
            bandwidth: settings.bandwidth,
            allow_video_fields: settings.allow_video_fields,
            name: copy_c_str(settings.p_ndi_recv_name),
        };
        let instance = self.new_instance(&mut state);
        if instance.is_some() {
            state.receivers.push(created);
        }
        instance
    }

    unsafe fn recv_destroy(&self, instance: Instance) {
        let mut state = self.record("recv_destroy");
        Self::release_instance(&mut state, instance);
    }

    unsafe fn recv_connect(&self, _instance: Instance, source: &RawSource) {
        let name = copy_c_str(source.p_ndi_name);
        self.record("recv_connect").connected.push(name);
    }

    unsafe fn recv_capture(
        &self,
        _instance: Instance,
        video: Option<&mut RawVideoFrame>,
        audio: Option<&mut RawAudioFrame>,
        metadata: Option<&mut RawMetadataFrame>,
        timeout_ms: u32,
    ) -> i32 {
        let next = self.record("recv_capture").captures.pop_front();
        let Some(next) = next else {
            thread::sleep(Duration::from_millis(timeout_ms.into()));
            self.push_event("recv_capture timed out".into());
            return 0;
        };

        let mut state = self.state();
        match next {
            Scripted::Video {
                width,
                height,
                fourcc,
                fill,
            } => {
                if let Some(out) = video {
                    let mut buffer = vec![fill; (width * 4 * height) as usize].into_boxed_slice();
                    *out = RawVideoFrame {
                        xres: width,
                        yres: height,
                        fourcc,
                        frame_rate_n: 60000,
                        frame_rate_d: 1001,
                        picture_aspect_ratio: width as f32 / height as f32,
                        frame_format_type: 1,
                        timecode: 10,
                        p_data: buffer.as_mut_ptr(),
                        line_stride_in_bytes: width * 4,
                        p_metadata: ptr::null(),
                        timestamp: 20,
                    };
                    state
                        .outstanding
                        .insert(out.p_data as usize, Outstanding::Video(buffer));
                }
                1
            }
            Scripted::Audio { channels, samples } => {
                if let Some(out) = audio {
                    let mut buffer: Box<[f32]> = (0..channels)
                        .flat_map(|c| (0..samples).map(move |i| (c * 1000 + i) as f32))
                        .collect();
                    *out = RawAudioFrame {
                        sample_rate: 48000,
                        no_channels: channels,
                        no_samples: samples,
                        timecode: 30,
                        p_data: buffer.as_mut_ptr(),
                        channel_stride_in_bytes: samples * 4,
                        p_metadata: ptr::null(),
                        timestamp: 40,
                    };
                    state
                        .outstanding
                        .insert(out.p_data as usize, Outstanding::Audio(buffer));
                }
                2
            }
            Scripted::Metadata(text) => {
                if let Some(out) = metadata {
                    let text = CString::new(text).unwrap();
                    *out = RawMetadataFrame {
                        length: text.as_bytes().len() as i32,
                        timecode: 50,
                        p_data: text.as_ptr() as *mut c_char,
                    };
                    state
                        .outstanding
                        .insert(out.p_data as usize, Outstanding::Metadata(text));
                }
                3
            }
            Scripted::Code(code) => code,
        }
    }

    unsafe fn recv_free_video(&self, _instance: Instance, frame: &RawVideoFrame) {
        let mut state = self.record("recv_free_video");
        let freed = state.outstanding.remove(&(frame.p_data as usize));
        assert!(matches!(freed, Some(Outstanding::Video(_))), "bad video free");
    }

    unsafe fn recv_free_audio(&self, _instance: Instance, frame: &RawAudioFrame) {
        let mut state = self.record("recv_free_audio");
        let freed = state.outstanding.remove(&(frame.p_data as usize));
        assert!(matches!(freed, Some(Outstanding::Audio(_))), "bad audio free");
    }

    unsafe fn recv_free_metadata(&self, _instance: Instance, frame: &RawMetadataFrame) {
        let mut state = self.record("recv_free_metadata");
        let freed = state.outstanding.remove(&(frame.p_data as usize));
        assert!(matches!(freed, Some(Outstanding::Metadata(_))), "bad metadata free");
    }

    unsafe fn recv_set_tally(&self, _instance: Instance, tally: &RawTally) -> bool {
        self.record("recv_set_tally").recv_tally.push(*tally);
        true
    }

    unsafe fn recv_send_metadata(&self, _instance: Instance, frame: &RawMetadataFrame) -> bool {
        let text = copy_c_str(frame.p_data).unwrap_or_default();
        self.record("recv_send_metadata").recv_metadata.push(text);
        true
    }

    unsafe fn recv_ptz_is_supported(&self, _instance: Instance) -> bool {
        drop(self.record("recv_ptz_is_supported"));
        true
    }

    unsafe fn recv_ptz(&self, _instance: Instance, command: PtzCommand) -> bool {
        self.record("recv_ptz").ptz.push(command);
        // Presets above 99 are out of range for the native library.
        !matches!(command, PtzCommand::StorePreset(p) | PtzCommand::RecallPreset { preset: p, .. } if p > 99)
    }

    unsafe fn send_create(&self, settings: &RawSendCreate) -> Option<Instance> {
        let name = CStr::from_ptr(settings.p_ndi_name).to_owned();
        let mut state = self.record("send_create");
        let instance = self.new_instance(&mut state)?;
        let prefixed = format!("FAKE-HOST ({})", name.to_string_lossy());
        state
            .sender_names
            .insert(instance.as_ptr() as usize, CString::new(prefixed).unwrap());
        state
            .sender_clocks
            .push((settings.clock_video, settings.clock_audio));
        Some(instance)
    }

    unsafe fn send_destroy(&self, instance: Instance) {
        let mut state = self.record("send_destroy");
        Self::release_instance(&mut state, instance);
    }

    unsafe fn send_video(&self, _instance: Instance, frame: &RawVideoFrame) {
        let len = (frame.line_stride_in_bytes * frame.yres) as usize;
        let bytes = if frame.p_data.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(frame.p_data, len).to_vec()
        };
        self.record("send_video").sent_video.push(SentVideo {
            width: frame.xres,
            height: frame.yres,
            fourcc: frame.fourcc,
            line_stride: frame.line_stride_in_bytes,
            frame_rate_n: frame.frame_rate_n,
            frame_rate_d: frame.frame_rate_d,
            picture_aspect_ratio: frame.picture_aspect_ratio,
            frame_format: frame.frame_format_type,
            bytes,
        });
    }

    unsafe fn send_video_async(&self, _instance: Instance, frame: Option<&RawVideoFrame>) {
        match frame {
            Some(frame) => {
                let mut state = self.record("send_video_async");
                let first = *frame.p_data;
                state.pending_async = Some(frame.p_data as usize);
                state.events.push(format!("async({first})"));
            }
            None => {
                let mut state = self.record("send_video_async_drain");
                // Reads the buffer the library still holds; it must not be freed yet.
                let held = state.pending_async.take().map(|p| *(p as *const u8));
                let event = match held {
                    Some(byte) => format!("drain(held {byte})"),
                    None => "drain(nothing held)".to_string(),
                };
                state.events.push(event);
            }
        }
    }

    unsafe fn send_audio(&self, _instance: Instance, frame: &RawAudioFrame) {
        let len = (frame.no_channels * frame.channel_stride_in_bytes / 4) as usize;
        let samples = if frame.p_data.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts(frame.p_data, len).to_vec()
        };
        self.record("send_audio").sent_audio.push(samples);
    }

    unsafe fn send_metadata(&self, _instance: Instance, frame: &RawMetadataFrame) {
        let text = copy_c_str(frame.p_data).unwrap_or_default();
        self.record("send_metadata").sent_metadata.push(text);
    }

    unsafe fn send_get_tally(
        &self,
        _instance: Instance,
        tally: &mut RawTally,
        timeout_ms: u32,
    ) -> bool {
        let current = self.record("send_get_tally").send_tally;
        match current {
            Some(current) => {
                *tally = current;
                true
            }
            None => {
                thread::sleep(Duration::from_millis(timeout_ms.into()));
                false
            }
        }
    }

    unsafe fn send_get_no_connections(&self, _instance: Instance, _timeout_ms: u32) -> i32 {
        self.record("send_get_no_connections").connections
    }

    unsafe fn send_get_source_name(&self, instance: Instance) -> Option<RawSource> {
        let state = self.record("send_get_source_name");
        state
            .sender_names
            .get(&(instance.as_ptr() as usize))
            .map(|name| RawSource {
                p_ndi_name: name.as_ptr(),
                p_url_address: ptr::null(),
            })
    }

    unsafe fn send_clear_connection_metadata(&self, _instance: Instance) {
        self.record("send_clear_connection_metadata")
            .connection_metadata
            .clear();
    }

    unsafe fn send_add_connection_metadata(&self, _instance: Instance, frame: &RawMetadataFrame) {
        let text = copy_c_str(frame.p_data).unwrap_or_default();
        self.record("send_add_connection_metadata")
            .connection_metadata
            .push(text);
    }
}
