use crate::bridge::{CommandBridge, CompletionSlot};
use crate::engine::{ControlEngine, StreamSink, SubsessionHandle};
use crate::registry::CalibrationRegistry;
use crate::sdp;
use crate::types::{ControlDescriptor, ControlKind, DeviceIdentity, SessionState, StreamProfile};
use crate::{NetcamError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A control session with one camera, driving the transport engine `E`.
///
/// Every operation blocks until its command completes, errors, or times out;
/// `&mut self` keeps at most one command in flight per session. The engine
/// handle lives in an `Option` so teardown can release it exactly once.
pub struct Session<E: ControlEngine> {
    engine: Option<E>,
    bridge: CommandBridge,
    registry: Arc<CalibrationRegistry>,
    url: Url,
    state: SessionState,
    profiles: Vec<StreamProfile>,
    identity: DeviceIdentity,
    /// Profile identity key -> engine subsession, filled by `discover`.
    subsessions: HashMap<i64, SubsessionHandle>,
}

impl<E: ControlEngine> Session<E> {
    pub fn new(engine: E, url: Url, registry: Arc<CalibrationRegistry>) -> Self {
        log::info!("session created for {url}");
        Self {
            engine: Some(engine),
            bridge: CommandBridge::new(),
            registry,
            url,
            state: SessionState::Created,
            profiles: Vec::new(),
            identity: DeviceIdentity::default(),
            subsessions: HashMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Profiles from the last successful `discover`.
    pub fn profiles(&self) -> &[StreamProfile] {
        &self.profiles
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<CalibrationRegistry> {
        &self.registry
    }

    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.bridge.set_timeout(timeout);
    }

    /// Run one command exchange through the bridge.
    fn exchange(&mut self, send: impl FnOnce(&mut E, CompletionSlot)) -> Result<Option<String>> {
        let Session { engine, bridge, .. } = self;
        let engine = engine.as_mut().ok_or(NetcamError::SessionClosed)?;
        bridge.execute(|slot| send(engine, slot))
    }

    /// Discover the camera's stream profiles and capability metadata.
    ///
    /// If the registry already holds a description for this URL the network
    /// exchange is skipped and the cached text is decoded instead. On
    /// success the session is Described, the registry carries the device
    /// identity, extrinsics, and compression flag, and the engine has one
    /// subsession per profile.
    pub fn discover(&mut self) -> Result<Vec<StreamProfile>> {
        match self.state {
            SessionState::Created | SessionState::Described => {}
            SessionState::Closed => return Err(NetcamError::SessionClosed),
            state => return Err(NetcamError::InvalidState {
                op: "discover",
                state,
            }),
        }

        let (text, from_cache) = match self.registry.cached_description(&self.url) {
            Some(cached) => {
                log::debug!("using cached description for {}", self.url);
                (cached, true)
            }
            None => {
                let body = self
                    .exchange(|engine, slot| engine.send_describe(slot))
                    .map_err(|err| match err {
                        NetcamError::Protocol { code, message } => {
                            NetcamError::ServerUnreachable(format!("{message} ({code})"))
                        }
                        other => other,
                    })?;
                (body.ok_or(NetcamError::MalformedDescription)?, false)
            }
        };

        let decoded = sdp::decode_description(&text)?;
        if decoded.profiles.is_empty() {
            return Err(NetcamError::NoStreamsAvailable);
        }
        // Cache only descriptions that decode, so a garbled response is
        // retried over the network instead of replayed from the cache.
        if !from_cache {
            self.registry.cache_description(&self.url, &text);
        }

        let engine = self.engine.as_mut().ok_or(NetcamError::SessionClosed)?;
        let handles = engine.build_subsessions(&text)?;
        if handles.len() != decoded.profiles.len() {
            return Err(NetcamError::Engine(format!(
                "engine produced {} subsessions for {} media sections",
                handles.len(),
                decoded.profiles.len()
            )));
        }
        self.subsessions = decoded
            .profiles
            .iter()
            .map(StreamProfile::identity_key)
            .zip(handles)
            .collect();

        self.registry.set_identity(&self.url, decoded.identity.clone());
        for update in &decoded.extrinsics {
            self.registry
                .set_extrinsics(update.source_key, update.target, update.extrinsics);
        }
        self.registry
            .set_compression_enabled(decoded.compression_enabled);

        self.identity = decoded.identity;
        self.profiles = decoded.profiles;
        self.state = SessionState::Described;
        log::info!(
            "discovered {} stream profiles from {}",
            self.profiles.len(),
            self.url
        );
        Ok(self.profiles.clone())
    }

    /// Set up one discovered stream and attach a delivery sink to it.
    /// Additive: call once per profile to be streamed.
    pub fn add_stream<F>(&mut self, profile: &StreamProfile, sink_factory: F) -> Result<()>
    where
        F: FnOnce(&StreamProfile) -> Box<dyn StreamSink>,
    {
        match self.state {
            SessionState::Described
            | SessionState::StreamsConfigured
            | SessionState::Playing
            | SessionState::Paused => {}
            SessionState::Closed => return Err(NetcamError::SessionClosed),
            state => return Err(NetcamError::InvalidState {
                op: "add_stream",
                state,
            }),
        }

        let handle = *self
            .subsessions
            .get(&profile.identity_key())
            .ok_or(NetcamError::UnknownProfile)?;

        self.exchange(|engine, slot| engine.send_setup(handle, slot))?;

        let sink = sink_factory(profile);
        let engine = self.engine.as_mut().ok_or(NetcamError::SessionClosed)?;
        engine.attach_sink(handle, profile, sink)?;

        if self.state == SessionState::Described {
            self.state = SessionState::StreamsConfigured;
        }
        log::info!(
            "configured {:?} stream (sensor {})",
            profile.kind,
            profile.sensor_index
        );
        Ok(())
    }

    /// Start (or resume) delivery on all configured streams.
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            SessionState::StreamsConfigured | SessionState::Paused => {}
            SessionState::Closed => return Err(NetcamError::SessionClosed),
            state => return Err(NetcamError::InvalidState { op: "play", state }),
        }
        self.exchange(|engine, slot| engine.send_play(slot))?;
        self.state = SessionState::Playing;
        log::info!("session playing");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SessionState::Playing => {}
            SessionState::Closed => return Err(NetcamError::SessionClosed),
            state => return Err(NetcamError::InvalidState { op: "pause", state }),
        }
        self.exchange(|engine, slot| engine.send_pause(slot))?;
        self.state = SessionState::Paused;
        log::info!("session paused");
        Ok(())
    }

    /// Tear the session down and release the engine.
    ///
    /// The release happens even when the teardown exchange fails, so the
    /// engine's background event context never leaks; the teardown error is
    /// still returned. Calling again on a closed session is an error and
    /// cannot release twice.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(NetcamError::SessionClosed);
        }
        log::info!("closing session to {}", self.url);

        let teardown = self
            .exchange(|engine, slot| engine.send_teardown(slot))
            .map(|_| ());

        if let Some(mut engine) = self.engine.take() {
            engine.shutdown();
        }
        self.state = SessionState::Closed;
        teardown
    }

    /// Write one sensor option on the camera.
    pub fn set_option(&mut self, sensor_name: &str, kind: ControlKind, value: f32) -> Result<()> {
        self.check_option_state("set_option")?;
        let name = parameter_token(sensor_name, kind);
        let value = format!("{value}");
        let in_session = self.in_session();
        log::debug!("set {name} = {value} (in_session: {in_session})");
        self.exchange(|engine, slot| {
            engine.send_set_parameter(&name, &value, in_session, slot)
        })?;
        Ok(())
    }

    /// Read one sensor option back from the camera.
    pub fn get_option(&mut self, sensor_name: &str, kind: ControlKind) -> Result<f32> {
        self.check_option_state("get_option")?;
        let name = parameter_token(sensor_name, kind);
        let in_session = self.in_session();
        let body = self
            .exchange(|engine, slot| engine.send_get_parameter(&name, in_session, slot))?
            .unwrap_or_default();
        body.trim()
            .parse::<f32>()
            .map_err(|_| NetcamError::MalformedValue(body))
    }

    /// Query the camera's per-sensor control ranges. Needs no discovery.
    pub fn list_controls(&mut self) -> Result<Vec<ControlDescriptor>> {
        if self.state == SessionState::Closed {
            return Err(NetcamError::SessionClosed);
        }
        let body = self.exchange(|engine, slot| engine.send_capability_query(slot))?;
        Ok(sdp::decode_controls(&body.unwrap_or_default()))
    }

    fn check_option_state(&self, op: &'static str) -> Result<()> {
        match self.state {
            SessionState::Created => Err(NetcamError::InvalidState {
                op,
                state: self.state,
            }),
            SessionState::Closed => Err(NetcamError::SessionClosed),
            _ => Ok(()),
        }
    }

    /// Once a stream is set up the camera expects parameter commands
    /// addressed to the session rather than the server.
    fn in_session(&self) -> bool {
        matches!(
            self.state,
            SessionState::StreamsConfigured | SessionState::Playing | SessionState::Paused
        )
    }
}

/// Parameter-name token for option commands: sensor name and numeric option
/// code joined by an underscore.
fn parameter_token(sensor_name: &str, kind: ControlKind) -> String {
    format!("{}_{}", sensor_name, kind.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StreamEnd;
    use std::sync::Mutex;

    const SAMPLE_SDP: &str = "\
v=0\r
s=depth camera\r
m=video 0 RTP/AVP 96\r
a=width:640\r
a=height:480\r
a=format:1\r
a=fps:30\r
a=stream_index:0\r
a=stream_type:1\r
a=bpp:16\r
a=cam_serial_num:832112060143\r
a=cam_name:Depth^Camera^5\r
a=usb_type:3.2\r
a=extrinsics:<to_sensor_20>rotation:1,0,0,0,1,0,0,0,1translation:0.015,0,0\r
m=video 0 RTP/AVP 97\r
a=width:1280\r
a=height:720\r
a=format:5\r
a=fps:60\r
a=stream_index:0\r
a=stream_type:2\r
a=bpp:24\r
a=cam_serial_num:832112060143\r
a=cam_name:Depth^Camera^5\r
a=usb_type:3.2\r
";

    /// Shared between a test and its engine, which moves into the session.
    /// `fail_next`/`swallow_next` script the outcome of the next command.
    #[derive(Default)]
    struct EngineLog {
        commands: Vec<String>,
        in_session_flags: Vec<bool>,
        parameters: Vec<(String, String)>,
        sinks_attached: usize,
        shutdowns: usize,
        fail_next: Option<i32>,
        swallow_next: bool,
    }

    /// Completes every command inline with scripted responses.
    struct ScriptedEngine {
        log: Arc<Mutex<EngineLog>>,
        describe_body: String,
        get_body: String,
        controls_body: String,
    }

    impl ScriptedEngine {
        fn new(log: Arc<Mutex<EngineLog>>) -> Self {
            Self {
                log,
                describe_body: SAMPLE_SDP.to_string(),
                get_body: "156".to_string(),
                controls_body: "[0{1,100,50,1};2{0,1,0,1}][5{10,20,15,1}]".to_string(),
            }
        }

        fn finish(&mut self, command: &str, body: Option<String>, slot: CompletionSlot) {
            let (swallow, fail) = {
                let mut log = self.log.lock().unwrap();
                log.commands.push(command.to_string());
                (
                    std::mem::take(&mut log.swallow_next),
                    log.fail_next.take(),
                )
            };
            if swallow {
                drop(slot);
                return;
            }
            match fail {
                Some(code) => slot.complete(code, Some("scripted failure".into())),
                None => slot.complete(0, body),
            }
        }
    }

    impl ControlEngine for ScriptedEngine {
        fn send_describe(&mut self, slot: CompletionSlot) {
            let body = self.describe_body.clone();
            self.finish("describe", Some(body), slot);
        }

        fn send_setup(&mut self, _subsession: SubsessionHandle, slot: CompletionSlot) {
            self.finish("setup", None, slot);
        }

        fn send_play(&mut self, slot: CompletionSlot) {
            self.finish("play", None, slot);
        }

        fn send_pause(&mut self, slot: CompletionSlot) {
            self.finish("pause", None, slot);
        }

        fn send_teardown(&mut self, slot: CompletionSlot) {
            self.finish("teardown", None, slot);
        }

        fn send_set_parameter(
            &mut self,
            name: &str,
            value: &str,
            in_session: bool,
            slot: CompletionSlot,
        ) {
            {
                let mut log = self.log.lock().unwrap();
                log.in_session_flags.push(in_session);
                log.parameters.push((name.to_string(), value.to_string()));
            }
            self.finish("set_parameter", None, slot);
        }

        fn send_get_parameter(&mut self, name: &str, in_session: bool, slot: CompletionSlot) {
            {
                let mut log = self.log.lock().unwrap();
                log.in_session_flags.push(in_session);
                log.parameters.push((name.to_string(), String::new()));
            }
            let body = self.get_body.clone();
            self.finish("get_parameter", Some(body), slot);
        }

        fn send_capability_query(&mut self, slot: CompletionSlot) {
            let body = self.controls_body.clone();
            self.finish("capability_query", Some(body), slot);
        }

        fn build_subsessions(&mut self, description: &str) -> Result<Vec<SubsessionHandle>> {
            let n = description
                .lines()
                .filter(|line| line.starts_with("m="))
                .count() as u32;
            Ok((0..n).map(SubsessionHandle).collect())
        }

        fn attach_sink(
            &mut self,
            _subsession: SubsessionHandle,
            _profile: &StreamProfile,
            mut sink: Box<dyn StreamSink>,
        ) -> Result<()> {
            sink.deliver(&[0u8; 4]);
            sink.finished(StreamEnd::Completed);
            self.log.lock().unwrap().sinks_attached += 1;
            Ok(())
        }

        fn shutdown(&mut self) {
            self.log.lock().unwrap().shutdowns += 1;
        }
    }

    struct NullSink;

    impl StreamSink for NullSink {
        fn deliver(&mut self, _payload: &[u8]) {}
        fn finished(&mut self, _end: StreamEnd) {}
    }

    fn scripted_session() -> (Session<ScriptedEngine>, Arc<Mutex<EngineLog>>) {
        scripted_session_with(|_| {})
    }

    fn scripted_session_with(
        prepare: impl FnOnce(&mut ScriptedEngine),
    ) -> (Session<ScriptedEngine>, Arc<Mutex<EngineLog>>) {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut engine = ScriptedEngine::new(log.clone());
        prepare(&mut engine);
        let url = Url::parse("rtsp://192.168.1.10/depthcam").unwrap();
        let registry = Arc::new(CalibrationRegistry::new());
        let mut session = Session::new(engine, url, registry);
        session.set_command_timeout(Duration::from_millis(50));
        (session, log)
    }

    fn fail_next_command(log: &Arc<Mutex<EngineLog>>, code: i32) {
        log.lock().unwrap().fail_next = Some(code);
    }

    fn swallow_next_command(log: &Arc<Mutex<EngineLog>>) {
        log.lock().unwrap().swallow_next = true;
    }

    fn commands(log: &Arc<Mutex<EngineLog>>) -> Vec<String> {
        log.lock().unwrap().commands.clone()
    }

    #[test]
    fn discover_populates_profiles_identity_and_registry() {
        let (mut session, _log) = scripted_session();
        let profiles = session.discover().unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(session.state(), SessionState::Described);
        assert_eq!(session.identity().name, "Depth Camera 5");

        let registry = session.registry();
        assert_eq!(
            registry.identity(session.url()).unwrap().serial_number,
            "832112060143"
        );
        let stored = registry.extrinsics(profiles[0].sensor_key(), 20).unwrap();
        assert_eq!(stored.translation, [0.015, 0.0, 0.0]);
    }

    #[test]
    fn second_discover_uses_cached_description() {
        let (mut session, log) = scripted_session();
        session.discover().unwrap();
        session.discover().unwrap();
        let issued = commands(&log);
        assert_eq!(issued.iter().filter(|c| *c == "describe").count(), 1);
    }

    #[test]
    fn discover_protocol_error_is_server_unreachable() {
        let (mut session, log) = scripted_session();
        fail_next_command(&log, 500);
        let err = session.discover().unwrap_err();
        assert!(matches!(err, NetcamError::ServerUnreachable(_)));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn play_before_configure_fails_without_network_traffic() {
        let (mut session, log) = scripted_session();
        session.discover().unwrap();
        let err = session.play().unwrap_err();
        assert!(matches!(
            err,
            NetcamError::InvalidState {
                op: "play",
                state: SessionState::Described
            }
        ));
        assert!(!commands(&log).contains(&"play".to_string()));
    }

    #[test]
    fn full_lifecycle_reaches_playing_and_pauses() {
        let (mut session, log) = scripted_session();
        let profiles = session.discover().unwrap();

        session
            .add_stream(&profiles[0], |_| Box::new(NullSink))
            .unwrap();
        assert_eq!(session.state(), SessionState::StreamsConfigured);
        assert_eq!(log.lock().unwrap().sinks_attached, 1);

        session.play().unwrap();
        assert_eq!(session.state(), SessionState::Playing);
        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        // Resume from Paused.
        session.play().unwrap();
        assert_eq!(session.state(), SessionState::Playing);

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            commands(&log),
            ["describe", "setup", "play", "pause", "play", "teardown"]
        );
    }

    #[test]
    fn add_stream_with_unknown_profile_fails() {
        let (mut session, log) = scripted_session();
        let mut profile = session.discover().unwrap()[0].clone();
        profile.width = 848;
        let err = session.add_stream(&profile, |_| Box::new(NullSink)).unwrap_err();
        assert!(matches!(err, NetcamError::UnknownProfile));
        assert!(!commands(&log).contains(&"setup".to_string()));
    }

    #[test]
    fn close_is_terminal_and_releases_once() {
        let (mut session, log) = scripted_session();
        session.discover().unwrap();
        session.close().unwrap();
        assert!(matches!(
            session.close().unwrap_err(),
            NetcamError::SessionClosed
        ));
        assert_eq!(log.lock().unwrap().shutdowns, 1);
        assert!(matches!(
            session.discover().unwrap_err(),
            NetcamError::SessionClosed
        ));
    }

    #[test]
    fn close_releases_engine_even_when_teardown_fails() {
        let (mut session, log) = scripted_session();
        session.discover().unwrap();
        fail_next_command(&log, 454);
        let err = session.close().unwrap_err();
        assert!(matches!(err, NetcamError::Protocol { code: 454, .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log.lock().unwrap().shutdowns, 1);
    }

    #[test]
    fn option_routing_flips_to_session_bound_after_setup() {
        let (mut session, log) = scripted_session();
        let profiles = session.discover().unwrap();

        session
            .set_option("RGB Camera", ControlKind::Exposure, 156.0)
            .unwrap();
        session
            .add_stream(&profiles[0], |_| Box::new(NullSink))
            .unwrap();
        session
            .set_option("RGB Camera", ControlKind::Exposure, 78.0)
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.in_session_flags, [false, true]);
        assert_eq!(log.parameters[0].0, "RGB Camera_3");
        assert_eq!(log.parameters[0].1, "156");
        assert_eq!(log.parameters[1].1, "78");
    }

    #[test]
    fn get_option_parses_numeric_response() {
        let (mut session, _log) = scripted_session();
        session.discover().unwrap();
        let value = session
            .get_option("Stereo Module", ControlKind::LaserPower)
            .unwrap();
        assert_eq!(value, 156.0);
    }

    #[test]
    fn get_option_rejects_non_numeric_response() {
        let (mut session, _log) = scripted_session_with(|engine| {
            engine.get_body = "12abc".to_string();
        });
        session.discover().unwrap();
        let err = session
            .get_option("Stereo Module", ControlKind::LaserPower)
            .unwrap_err();
        assert!(matches!(err, NetcamError::MalformedValue(text) if text == "12abc"));
    }

    #[test]
    fn options_invalid_before_discovery() {
        let (mut session, log) = scripted_session();
        let err = session
            .set_option("RGB Camera", ControlKind::Gain, 16.0)
            .unwrap_err();
        assert!(matches!(err, NetcamError::InvalidState { op: "set_option", .. }));
        assert!(commands(&log).is_empty());
    }

    #[test]
    fn list_controls_works_before_discovery() {
        let (mut session, _log) = scripted_session();
        let controls = session.list_controls().unwrap();
        assert_eq!(controls.len(), 3);
        assert_eq!(
            controls.iter().map(|c| c.sensor_id).collect::<Vec<_>>(),
            [1, 1, 0]
        );
    }

    #[test]
    fn timed_out_command_leaves_session_usable() {
        let (mut session, log) = scripted_session();
        swallow_next_command(&log);
        assert!(matches!(
            session.discover().unwrap_err(),
            NetcamError::Timeout
        ));
        // The next command on the same session still succeeds.
        let profiles = session.discover().unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(
            commands(&log)
                .iter()
                .filter(|c| *c == "describe")
                .count(),
            2
        );
    }

    #[test]
    fn cached_description_shared_across_sessions() {
        let registry = Arc::new(CalibrationRegistry::new());
        let url = Url::parse("rtsp://192.168.1.10/depthcam").unwrap();
        let log = Arc::new(Mutex::new(EngineLog::default()));

        let mut first = Session::new(
            ScriptedEngine::new(log.clone()),
            url.clone(),
            registry.clone(),
        );
        first.discover().unwrap();

        let mut second = Session::new(ScriptedEngine::new(log.clone()), url, registry);
        second.discover().unwrap();
        assert_eq!(second.profiles().len(), 2);

        // One describe on the wire for two sessions.
        let issued = commands(&log);
        assert_eq!(issued.iter().filter(|c| *c == "describe").count(), 1);
    }
}
