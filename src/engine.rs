use crate::bridge::CompletionSlot;
use crate::types::StreamProfile;
use crate::Result;

/// Engine-side handle for one negotiated media stream within a session.
///
/// Minted by [`ControlEngine::build_subsessions`], one per media section of
/// the session description, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsessionHandle(pub u32);

/// Why a stream stopped delivering payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The stream's source ran to completion.
    Completed,
    /// The camera signalled abnormal termination, with an optional reason.
    Bye(Option<String>),
}

/// Receives the media payloads of one configured stream.
///
/// `finished` is called exactly once per stream, after the last `deliver`.
pub trait StreamSink: Send {
    fn deliver(&mut self, payload: &[u8]);
    fn finished(&mut self, end: StreamEnd);
}

/// The transport engine this crate drives.
///
/// The engine owns the connection, wire framing, authentication, and a
/// dedicated background event context that delivers completions. Each
/// `send_*` call triggers exactly one asynchronous completion by consuming
/// the slot on that context; the session controller blocks on the bridge
/// until it lands.
///
/// The parameter commands take `in_session`: once a stream has been set up
/// the camera expects them addressed to the session, before that to the
/// server itself.
pub trait ControlEngine {
    /// Request the session description (stream discovery).
    fn send_describe(&mut self, slot: CompletionSlot);

    /// Negotiate transport for one media stream.
    fn send_setup(&mut self, subsession: SubsessionHandle, slot: CompletionSlot);

    fn send_play(&mut self, slot: CompletionSlot);

    fn send_pause(&mut self, slot: CompletionSlot);

    fn send_teardown(&mut self, slot: CompletionSlot);

    fn send_set_parameter(
        &mut self,
        name: &str,
        value: &str,
        in_session: bool,
        slot: CompletionSlot,
    );

    fn send_get_parameter(&mut self, name: &str, in_session: bool, slot: CompletionSlot);

    /// Query the camera's per-sensor control ranges.
    fn send_capability_query(&mut self, slot: CompletionSlot);

    /// Create the engine's subsession objects from a session description,
    /// returning one handle per media section in document order.
    fn build_subsessions(&mut self, description: &str) -> Result<Vec<SubsessionHandle>>;

    /// Attach a delivery sink to a set-up subsession and arm end-of-stream
    /// and abnormal-termination notification ([`StreamSink::finished`]).
    fn attach_sink(
        &mut self,
        subsession: SubsessionHandle,
        profile: &StreamProfile,
        sink: Box<dyn StreamSink>,
    ) -> Result<()>;

    /// Release the connection and stop the background event context.
    /// Called exactly once, by [`crate::Session::close`].
    fn shutdown(&mut self);
}
