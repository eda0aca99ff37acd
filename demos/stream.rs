//! Full session lifecycle: discover, configure the depth stream, play,
//! pause, close — with a counting sink printing delivery stats.
//!
//! Runs against a scripted engine that synthesizes depth frames on a
//! background thread, the way a real engine delivers from its event loop.

use netcam::{
    CalibrationRegistry, CompletionSlot, ControlEngine, Session, StreamEnd, StreamKind,
    StreamProfile, StreamSink, SubsessionHandle,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DESCRIPTION: &str = "\
v=0\n\
s=depth camera\n\
m=video 0 RTP/AVP 96\n\
a=width:640\n\
a=height:480\n\
a=format:1\n\
a=fps:30\n\
a=stream_index:0\n\
a=stream_type:1\n\
a=bpp:16\n\
a=cam_serial_num:832112060143\n\
a=cam_name:Depth^Camera^5\n\
a=usb_type:3.2\n\
";

/// Scripted engine: completes commands inline and, on play, delivers
/// synthetic frames to the attached sinks from a background thread.
struct ReplayEngine {
    sinks: Vec<Box<dyn StreamSink>>,
}

impl ControlEngine for ReplayEngine {
    fn send_describe(&mut self, slot: CompletionSlot) {
        slot.complete(0, Some(DESCRIPTION.to_string()));
    }

    fn send_setup(&mut self, _subsession: SubsessionHandle, slot: CompletionSlot) {
        slot.complete(0, None);
    }

    fn send_play(&mut self, slot: CompletionSlot) {
        let mut sinks = std::mem::take(&mut self.sinks);
        std::thread::spawn(move || {
            let frame = vec![0u8; 640 * 480 * 2];
            for _ in 0..90 {
                for sink in sinks.iter_mut() {
                    sink.deliver(&frame);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            for sink in sinks.iter_mut() {
                sink.finished(StreamEnd::Completed);
            }
        });
        slot.complete(0, None);
    }

    fn send_pause(&mut self, slot: CompletionSlot) {
        slot.complete(0, None);
    }

    fn send_teardown(&mut self, slot: CompletionSlot) {
        slot.complete(0, None);
    }

    fn send_set_parameter(
        &mut self,
        _name: &str,
        _value: &str,
        _in_session: bool,
        slot: CompletionSlot,
    ) {
        slot.complete(0, None);
    }

    fn send_get_parameter(&mut self, _name: &str, _in_session: bool, slot: CompletionSlot) {
        slot.complete(0, Some("150".to_string()));
    }

    fn send_capability_query(&mut self, slot: CompletionSlot) {
        slot.complete(0, Some(String::new()));
    }

    fn build_subsessions(&mut self, description: &str) -> netcam::Result<Vec<SubsessionHandle>> {
        let n = description.lines().filter(|l| l.starts_with("m=")).count() as u32;
        Ok((0..n).map(SubsessionHandle).collect())
    }

    fn attach_sink(
        &mut self,
        _subsession: SubsessionHandle,
        _profile: &StreamProfile,
        sink: Box<dyn StreamSink>,
    ) -> netcam::Result<()> {
        self.sinks.push(sink);
        Ok(())
    }

    fn shutdown(&mut self) {}
}

struct CountingSink {
    frames: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
}

impl StreamSink for CountingSink {
    fn deliver(&mut self, payload: &[u8]) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
    }

    fn finished(&mut self, end: StreamEnd) {
        println!("Stream finished: {:?}", end);
    }
}

fn main() {
    env_logger::init();

    let url = url::Url::parse("rtsp://192.168.1.10/depthcam").unwrap();
    let registry = Arc::new(CalibrationRegistry::new());
    let engine = ReplayEngine { sinks: Vec::new() };
    let mut session = Session::new(engine, url, registry);

    let profiles = match session.discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Discovery failed: {}", e);
            std::process::exit(1);
        }
    };

    let depth = match profiles.iter().find(|p| p.kind == StreamKind::Depth) {
        Some(p) => p.clone(),
        None => {
            eprintln!("No depth stream advertised");
            std::process::exit(1);
        }
    };
    println!(
        "Streaming {:?} {}x{} @ {} fps from {}",
        depth.kind, depth.width, depth.height, depth.frame_rate, session.identity().name
    );

    let frames = Arc::new(AtomicU64::new(0));
    let bytes = Arc::new(AtomicU64::new(0));
    let sink_frames = frames.clone();
    let sink_bytes = bytes.clone();

    if let Err(e) = session.add_stream(&depth, move |_| {
        Box::new(CountingSink {
            frames: sink_frames,
            bytes: sink_bytes,
        })
    }) {
        eprintln!("Stream setup failed: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = session.play() {
        eprintln!("Play failed: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    for _ in 0..3 {
        std::thread::sleep(Duration::from_millis(200));
        let n = frames.load(Ordering::Relaxed);
        let elapsed = start.elapsed().as_secs_f64();
        println!(
            "--- {} frames, {} bytes in {:.1}s ({:.1} fps) ---",
            n,
            bytes.load(Ordering::Relaxed),
            elapsed,
            n as f64 / elapsed
        );
    }

    if let Err(e) = session.pause() {
        eprintln!("Pause failed: {}", e);
    }

    match session.close() {
        Ok(()) => println!("Session closed."),
        Err(e) => {
            eprintln!("Close failed: {}", e);
            std::process::exit(1);
        }
    }
}
