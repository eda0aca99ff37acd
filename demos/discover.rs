//! Discover a depth camera's streams, identity, and controls.
//!
//! Runs against a scripted engine replaying a canned session description,
//! so it needs no camera on the network.

use netcam::{
    CalibrationRegistry, CompletionSlot, ControlEngine, Session, StreamProfile, StreamSink,
    SubsessionHandle,
};
use std::sync::Arc;

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
a=ppx:318.781\n\
a=ppy:241.137\n\
a=fx:383.613\n\
a=fy:383.613\n\
a=model:4\n\
a=extrinsics:<to_sensor_20>rotation:1,0,0,0,1,0,0,0,1translation:0.015,0,0\n\
m=video 0 RTP/AVP 97\n\
a=width:1280\n\
a=height:720\n\
a=format:5\n\
a=fps:60\n\
a=stream_index:0\n\
a=stream_type:2\n\
a=bpp:24\n\
a=cam_serial_num:832112060143\n\
a=cam_name:Depth^Camera^5\n\
a=usb_type:3.2\n\
";

const CONTROLS: &str = "[0{1,100,50,1};2{0,1,0,1};3{1,10000,156,1}][5{10,20,15,1}]";

/// Completes every command immediately from canned responses.
struct ReplayEngine;

impl ControlEngine for ReplayEngine {
    fn send_describe(&mut self, slot: CompletionSlot) {
        slot.complete(0, Some(DESCRIPTION.to_string()));
    }

    fn send_setup(&mut self, _subsession: SubsessionHandle, slot: CompletionSlot) {
        slot.complete(0, None);
    }

    fn send_play(&mut self, slot: CompletionSlot) {
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
        slot.complete(0, Some("156".to_string()));
    }

    fn send_capability_query(&mut self, slot: CompletionSlot) {
        slot.complete(0, Some(CONTROLS.to_string()));
    }

    fn build_subsessions(&mut self, description: &str) -> netcam::Result<Vec<SubsessionHandle>> {
        let n = description.lines().filter(|l| l.starts_with("m=")).count() as u32;
        Ok((0..n).map(SubsessionHandle).collect())
    }

    fn attach_sink(
        &mut self,
        _subsession: SubsessionHandle,
        _profile: &StreamProfile,
        _sink: Box<dyn StreamSink>,
    ) -> netcam::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

fn main() {
    env_logger::init();

    let url = url::Url::parse("rtsp://192.168.1.10/depthcam").unwrap();
    let registry = Arc::new(CalibrationRegistry::new());
    let mut session = Session::new(ReplayEngine, url, registry.clone());

    let profiles = match session.discover() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Discovery failed: {}", e);
            std::process::exit(1);
        }
    };

    let identity = session.identity();
    println!(
        "Camera:   {}  (S/N {}, USB {})",
        identity.name, identity.serial_number, identity.usb_type
    );
    println!("Found {} stream profile(s):", profiles.len());
    for (i, p) in profiles.iter().enumerate() {
        println!(
            "  [{}] {:?}/{}  {:?}  {}x{} @ {} fps  {} bpp  key={}",
            i,
            p.kind,
            p.sensor_index,
            p.format,
            p.width,
            p.height,
            p.frame_rate,
            p.bits_per_pixel,
            p.identity_key(),
        );
    }

    if let Some(e) = registry.extrinsics(profiles[0].sensor_key(), 20) {
        println!(
            "Extrinsics {} -> 20: rotation={:?} translation={:?}",
            profiles[0].sensor_key(),
            e.rotation,
            e.translation
        );
    }

    match session.list_controls() {
        Ok(controls) => {
            println!("Controls:");
            for c in &controls {
                println!(
                    "  sensor {}  {:?}  min={} max={} default={} step={}",
                    c.sensor_id, c.kind, c.range.min, c.range.max, c.range.default, c.range.step
                );
            }
        }
        Err(e) => eprintln!("Control query failed: {}", e),
    }

    if let Err(e) = session.close() {
        eprintln!("Close failed: {}", e);
        std::process::exit(1);
    }
}
