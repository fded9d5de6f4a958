//! Session lifecycle and live-edge polling

use std::sync::Arc;

use memscope::session::FaultCategory;
use memscope::source::{ReplayTransport, TraceEvent};
use memscope::*;
use test_case::test_case;

use test_helpers::*;

fn trace_until(max_frame: u64) -> Arc<InMemoryTrace> {
    Arc::new(InMemoryTrace::from_events(vec![
        TraceEvent::Frame { frame: 0 },
        TraceEvent::Frame { frame: max_frame },
    ]))
}

fn started(trace: Arc<InMemoryTrace>, width: f64) -> (Explorer, memscope::source::ReplayFeed) {
    let (mut explorer, feed) = live_explorer(
        trace,
        Arc::new(DeferredResolver::default()),
        ExplorerConfig::default(),
    );
    explorer.resize(width);
    explorer.start_capture(&Endpoint::localhost(9000)).unwrap();
    (explorer, feed)
}

#[test]
fn tailing_view_advances_with_live_edge() {
    let trace = trace_until(1000);
    let (mut explorer, _feed) = started(Arc::clone(&trace), 500.0);
    assert_eq!(explorer.session_state(), SessionState::Live { paused: false });

    assert_eq!(explorer.scroll(500), FrameRange { start: 500, end: 1000 });
    trace.push(TraceEvent::Frame { frame: 1100 });

    let outcome = explorer.tick();
    assert_eq!(outcome.action, PollAction::Followed(FrameRange { start: 600, end: 1100 }));
    assert_eq!(outcome.update.map(|u| u.advanced_by()), Some(100));
    assert_eq!(explorer.viewport().state().scroll_pos, 600);
    assert_eq!(explorer.visible_range().end, 1100);
    assert_eq!(explorer.region().range(), Some(FrameRange { start: 600, end: 1100 }));
}

#[test]
fn scrolled_away_view_is_left_alone() {
    let trace = trace_until(1000);
    let (mut explorer, _feed) = started(Arc::clone(&trace), 500.0);
    explorer.scroll(100);
    trace.push(TraceEvent::Frame { frame: 1100 });

    let outcome = explorer.tick();
    assert_eq!(outcome.action, PollAction::Unchanged);
    assert_eq!(explorer.viewport().state().scroll_pos, 100);
    assert_eq!(explorer.boundaries().max_frame, 1100);
}

#[test]
fn wide_view_refreshes_instead_of_scrolling() {
    let trace = trace_until(1000);
    let (mut explorer, _feed) = started(Arc::clone(&trace), 2000.0);
    trace.push(TraceEvent::Frame { frame: 1100 });

    let outcome = explorer.tick();
    assert_eq!(outcome.action, PollAction::Refreshed(FrameRange { start: 0, end: 2000 }));
    assert_eq!(explorer.viewport().state().scroll_pos, 0);
}

#[test]
fn polling_continues_while_paused() {
    let trace = trace_until(1000);
    let (mut explorer, _feed) = started(Arc::clone(&trace), 500.0);
    explorer.set_paused(true).unwrap();
    assert_eq!(explorer.session_state(), SessionState::Live { paused: true });

    explorer.scroll(500);
    trace.push(TraceEvent::Frame { frame: 1050 });
    assert!(matches!(explorer.tick().action, PollAction::Followed(_)));

    explorer.set_paused(false).unwrap();
    explorer.stop().unwrap();
    assert_eq!(explorer.session_state(), SessionState::Stopped);
    assert_eq!(explorer.tick().action, PollAction::Skipped);
    assert!(explorer.set_paused(true).is_err());
}

#[test]
fn lost_connection_stops_session() {
    let trace = trace_until(10);
    let (mut explorer, feed) = started(trace, 100.0);
    let events = explorer.subscribe();

    feed.disconnect();
    let outcome = explorer.tick();
    assert_eq!(outcome.action, PollAction::Disconnected);
    assert_eq!(explorer.session_state(), SessionState::Stopped);
    assert_eq!(explorer.session_fault(), Some(&ConnectionFault::Disconnected));
    assert!(events
        .try_iter()
        .any(|e| matches!(e, ExplorerEvent::SessionFault(ConnectionFault::Disconnected))));
}

#[test]
fn replay_feed_reports_backlog() {
    let live = Arc::new(InMemoryTrace::new());
    let events: Vec<_> = (0..30).map(|frame| TraceEvent::Frame { frame }).collect();
    let (transport, feed) = ReplayTransport::new(events, Arc::clone(&live));
    let mut explorer = Explorer::new(
        live,
        Box::new(transport),
        Arc::new(DeferredResolver::default()),
        ExplorerConfig::default(),
    )
    .unwrap();
    explorer.resize(5.0);
    explorer.start_capture(&Endpoint::localhost(9000)).unwrap();

    feed.advance(10);
    let outcome = explorer.tick();
    assert_eq!(outcome.backlog, 20);
    assert_eq!(explorer.boundaries().max_frame, 9);
    assert!(matches!(outcome.action, PollAction::Followed(r) if r.end == 9));
}

#[test]
fn open_trace_is_viewable_but_not_live() {
    let trace = trace_until(300);
    let (mut explorer, _) = live_explorer(
        trace,
        Arc::new(DeferredResolver::default()),
        ExplorerConfig::default().with_initial_zoom(2.0),
    );
    explorer.resize(100.0);
    let visible = explorer.open_trace().unwrap();
    assert_eq!(visible, FrameRange { start: 0, end: 50 });
    assert_eq!(explorer.session_state(), SessionState::Stopped);
    assert_eq!(explorer.boundaries(), Boundaries::new(0, 300));

    explorer.close();
    assert_eq!(explorer.session_state(), SessionState::Closed);
    assert_eq!(explorer.boundaries(), Boundaries::default());
}

#[test_case(ConnectionFault::HandshakeTimeout, FaultCategory::Timeout; "handshake timeout")]
#[test_case(ConnectionFault::ProtocolMismatch("http".into()), FaultCategory::Incompatible; "protocol mismatch")]
#[test_case(ConnectionFault::VersionMismatch { expected: 4, found: 3 }, FaultCategory::Incompatible; "version mismatch")]
#[test_case(ConnectionFault::DetourFailed("malloc".into()), FaultCategory::Launch; "detour failure")]
#[test_case(ConnectionFault::ConnectFailed { endpoint: "127.0.0.1:9000".into(), reason: "refused".into() }, FaultCategory::Network; "connect failure")]
fn failed_start_returns_to_closed(fault: ConnectionFault, category: FaultCategory) {
    let trace = trace_until(10);
    let (transport, _feed) = ReplayTransport::new(Vec::new(), Arc::clone(&trace));
    let mut explorer = Explorer::new(
        trace,
        Box::new(transport.failing_with(fault.clone())),
        Arc::new(DeferredResolver::default()),
        ExplorerConfig::default(),
    )
    .unwrap();

    match explorer.start_capture(&Endpoint::localhost(9000)) {
        Err(ExplorerError::Connection(returned)) => {
            assert_eq!(returned, fault);
            assert_eq!(returned.category(), category);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(explorer.session_state(), SessionState::Closed);
    assert_eq!(explorer.session_fault(), Some(&fault));
    assert_eq!(explorer.boundaries(), Boundaries::default());

    // A fresh attempt may follow; the scripted fault is consumed.
    assert!(explorer.start_capture(&Endpoint::localhost(9000)).is_ok());
}

#[test]
fn launch_failure_is_categorized() {
    let trace = trace_until(10);
    let (mut explorer, _) = live_explorer(
        trace,
        Arc::new(DeferredResolver::default()),
        ExplorerConfig::default(),
    );
    let spec = LaunchSpec::new("/opt/app/server", 9100).with_args(["--port", "80"]);
    let err = explorer.launch(&spec).unwrap_err();
    assert!(matches!(
        err,
        ExplorerError::Connection(ConnectionFault::LaunchFailed { ref program, .. }) if program == "/opt/app/server"
    ));
    assert_eq!(explorer.session_state(), SessionState::Closed);
}
