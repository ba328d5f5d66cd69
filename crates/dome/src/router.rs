//! Dispatch of inbound collaborator events and outbound web commands.
//!
//! Inbound streams are independent:
//! - interaction events go to the single interaction callback, ordered by
//!   timestamp per source kind,
//! - web-app events go to the single React-event callback,
//! - engine events are forwarded to the web host as commands.
//!
//! Events without a registered callback are journaled and counted.

use std::collections::BTreeMap;

use foundation::error::{DomeError, DomeResult};
use navigation::machine::NavigationMachine;
use navigation::state::NavigationState;
use projection::layout::blend_region_hit;
use projection::settings::ProjectionSettings;
use runtime::frame::FrameTick;
use runtime::journal::Journal;

use crate::collaborators::ContentHost;
use crate::events::{EngineEvent, HostEvent, InteractionEvent, InteractionKind};

pub type InteractionCallback = Box<dyn FnMut(&InteractionEvent) + Send>;
pub type ReactCallback = Box<dyn FnMut(&str, &str) + Send>;

/// Command posted to the web host after navigation state changes.
pub const NAVIGATION_CHANGED: &str = "navigationChanged";

/// What one routing pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteReport {
    pub dispatched: u64,
    pub rejected: u64,
    pub unhandled: u64,
    pub navigation_changed: bool,
    pub errors: Vec<DomeError>,
}

impl RouteReport {
    pub fn merge(&mut self, other: RouteReport) {
        self.dispatched += other.dispatched;
        self.rejected += other.rejected;
        self.unhandled += other.unhandled;
        self.navigation_changed |= other.navigation_changed;
        self.errors.extend(other.errors);
    }
}

#[derive(Default)]
pub struct EventRouter {
    interaction_callback: Option<InteractionCallback>,
    react_callback: Option<ReactCallback>,
    last_timestamps: BTreeMap<InteractionKind, u64>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("interaction_callback", &self.interaction_callback.is_some())
            .field("react_callback", &self.react_callback.is_some())
            .field("last_timestamps", &self.last_timestamps)
            .finish()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous interaction callback. Returns true if one was
    /// replaced.
    pub fn register_interaction_callback(
        &mut self,
        callback: impl FnMut(&InteractionEvent) + Send + 'static,
    ) -> bool {
        self.interaction_callback
            .replace(Box::new(callback))
            .is_some()
    }

    /// Replaces any previous React-event callback. Returns true if one was
    /// replaced.
    pub fn register_react_callback(
        &mut self,
        callback: impl FnMut(&str, &str) + Send + 'static,
    ) -> bool {
        self.react_callback.replace(Box::new(callback)).is_some()
    }

    /// Latest dispatched timestamp of a source.
    pub fn last_timestamp(&self, kind: InteractionKind) -> Option<u64> {
        self.last_timestamps.get(&kind).copied()
    }

    /// Forgets per-source ordering, e.g. after the input subsystem restarts.
    pub fn reset_ordering(&mut self) {
        self.last_timestamps.clear();
    }

    pub fn route_interactions(
        &mut self,
        tick: FrameTick,
        mut events: Vec<InteractionEvent>,
        nav: &mut NavigationMachine,
        settings: Option<&ProjectionSettings>,
        journal: &mut Journal,
    ) -> RouteReport {
        let mut report = RouteReport::default();
        events.sort_by_key(|e| e.timestamp);

        for event in events {
            if let Some(&last) = self.last_timestamps.get(&event.kind) {
                if event.timestamp < last {
                    let err = DomeError::Interaction(format!(
                        "{} event at {} arrived after {}",
                        event.kind.as_str(),
                        event.timestamp,
                        last
                    ));
                    tracing::warn!(kind = event.kind.as_str(), "{err}");
                    journal.record(tick, "rejected", err.to_string());
                    report.rejected += 1;
                    report.errors.push(err);
                    continue;
                }
            }
            if let Err(e) = event.position.validate() {
                journal.record(tick, "rejected", e.to_string());
                report.rejected += 1;
                report.errors.push(e);
                continue;
            }
            self.last_timestamps.insert(event.kind, event.timestamp);

            if event.kind.is_pointing() {
                if let Some(settings) = settings {
                    report.navigation_changed |= select_pointed_region(&event, settings, nav);
                }
            }

            match self.interaction_callback.as_mut() {
                Some(callback) => {
                    callback(&event);
                    journal.record(
                        tick,
                        "interaction",
                        format!("{} at {}", event.kind.as_str(), event.timestamp),
                    );
                    report.dispatched += 1;
                }
                None => {
                    journal.record(
                        tick,
                        "unhandled",
                        format!("{} event without callback", event.kind.as_str()),
                    );
                    report.unhandled += 1;
                }
            }
        }
        report
    }

    pub fn route_host_events(
        &mut self,
        tick: FrameTick,
        events: Vec<HostEvent>,
        journal: &mut Journal,
    ) -> RouteReport {
        let mut report = RouteReport::default();
        for event in events {
            match self.react_callback.as_mut() {
                Some(callback) => {
                    callback(&event.event_type, &event.data);
                    journal.record(tick, "host_event", event.event_type);
                    report.dispatched += 1;
                }
                None => {
                    journal.record(
                        tick,
                        "unhandled",
                        format!("web event '{}' without callback", event.event_type),
                    );
                    report.unhandled += 1;
                }
            }
        }
        report
    }

    /// Engine events have no local consumer; the web application gets them
    /// as commands of the same name.
    pub fn forward_engine_events(
        &mut self,
        tick: FrameTick,
        events: Vec<EngineEvent>,
        host: &mut dyn ContentHost,
        journal: &mut Journal,
    ) -> RouteReport {
        let mut report = RouteReport::default();
        for event in events {
            journal.record(tick, "engine_event", event.event_type.clone());
            match Self::send_command_to_react(host, &event.event_type, &event.data) {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    report.rejected += 1;
                    report.errors.push(e);
                }
            }
        }
        report
    }

    /// Fire-and-forget; a failed delivery is reported, never retried.
    pub fn send_command_to_react(
        host: &mut dyn ContentHost,
        command: &str,
        data: &str,
    ) -> DomeResult<()> {
        host.post_command(command, data).map_err(|e| {
            tracing::warn!(command, error = %e, "web command not delivered");
            match e {
                DomeError::WebView(_) => e,
                other => DomeError::WebView(format!("command '{command}': {other}")),
            }
        })
    }

    pub fn announce_navigation(
        host: &mut dyn ContentHost,
        state: &NavigationState,
    ) -> DomeResult<()> {
        let json = formats::navigation_to_json(state)?;
        Self::send_command_to_react(host, NAVIGATION_CHANGED, &json)
    }
}

fn select_pointed_region(
    event: &InteractionEvent,
    settings: &ProjectionSettings,
    nav: &mut NavigationMachine,
) -> bool {
    let Some(channel) = blend_region_hit(settings, &event.position) else {
        return false;
    };
    if nav.state().selected_region.as_deref() == Some(channel.id.as_str()) {
        return false;
    }
    nav.select_region(Some(channel.id.clone())).is_ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{EventRouter, NAVIGATION_CHANGED};
    use crate::events::{EngineEvent, HostEvent, InteractionEvent, InteractionKind};
    use crate::sim::{SimHost, SimProbe};
    use foundation::error::ErrorKind;
    use foundation::math::DomeCoordinate;
    use navigation::machine::NavigationMachine;
    use projection::settings::{ProjectionSettings, Resolution};
    use runtime::frame::FrameTick;
    use runtime::journal::Journal;

    fn gaze(az: f64, ts: u64) -> InteractionEvent {
        InteractionEvent::new(
            InteractionKind::Gaze,
            DomeCoordinate::on_surface(az, 0.0),
            "",
            ts,
        )
    }

    fn quad() -> ProjectionSettings {
        ProjectionSettings::ring(4, Resolution::new(1920, 1080), 0.05)
    }

    #[test]
    fn dispatches_in_timestamp_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = EventRouter::new();
        let sink = Arc::clone(&seen);
        router.register_interaction_callback(move |e| sink.lock().push(e.timestamp));

        let mut nav = NavigationMachine::new();
        let mut journal = Journal::new();
        let events = vec![
            InteractionEvent::new(InteractionKind::Gesture, DomeCoordinate::default(), "swipe", 7),
            gaze(10.0, 3),
            InteractionEvent::new(InteractionKind::Voice, DomeCoordinate::default(), "zoom in", 5),
        ];
        let report =
            router.route_interactions(FrameTick::first(), events, &mut nav, None, &mut journal);

        assert_eq!(report.dispatched, 3);
        assert_eq!(*seen.lock(), vec![3, 5, 7]);
        assert_eq!(router.last_timestamp(InteractionKind::Voice), Some(5));
    }

    #[test]
    fn stale_events_are_rejected_per_source() {
        let mut router = EventRouter::new();
        router.register_interaction_callback(|_| {});
        let mut nav = NavigationMachine::new();
        let mut journal = Journal::new();
        let tick = FrameTick::first();

        router.route_interactions(tick, vec![gaze(0.0, 10)], &mut nav, None, &mut journal);
        let report = router.route_interactions(
            tick.next(),
            vec![
                gaze(0.0, 5),
                InteractionEvent::new(InteractionKind::Gesture, DomeCoordinate::default(), "", 3),
                gaze(0.0, 10),
            ],
            &mut nav,
            None,
            &mut journal,
        );

        assert_eq!(report.rejected, 1);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.errors[0].kind(), ErrorKind::Interaction);
        assert_eq!(journal.of_kind("rejected").count(), 1);
    }

    #[test]
    fn registering_replaces_previous_callback() {
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let mut router = EventRouter::new();

        let c = Arc::clone(&first);
        assert!(!router.register_interaction_callback(move |_| *c.lock() += 1));
        let c = Arc::clone(&second);
        assert!(router.register_interaction_callback(move |_| *c.lock() += 1));

        let mut nav = NavigationMachine::new();
        let mut journal = Journal::new();
        router.route_interactions(FrameTick::first(), vec![gaze(0.0, 1)], &mut nav, None, &mut journal);
        assert_eq!((*first.lock(), *second.lock()), (0, 1));
    }

    #[test]
    fn gaze_selects_channel_region() {
        let settings = quad();
        let mut router = EventRouter::new();
        let mut nav = NavigationMachine::new();
        let mut journal = Journal::new();

        let report = router.route_interactions(
            FrameTick::first(),
            vec![gaze(100.0, 1)],
            &mut nav,
            Some(&settings),
            &mut journal,
        );
        assert!(report.navigation_changed);
        assert_eq!(nav.state().selected_region.as_deref(), Some("ch1"));
        // No callback registered: counted, not lost.
        assert_eq!(report.unhandled, 1);
        assert_eq!(journal.of_kind("unhandled").count(), 1);

        let voice = InteractionEvent::new(
            InteractionKind::Voice,
            DomeCoordinate::on_surface(200.0, 0.0),
            "",
            2,
        );
        let report = router.route_interactions(
            FrameTick::first(),
            vec![voice, gaze(120.0, 2)],
            &mut nav,
            Some(&settings),
            &mut journal,
        );
        assert!(!report.navigation_changed);
        assert_eq!(nav.state().selected_region.as_deref(), Some("ch1"));
    }

    #[test]
    fn host_events_reach_react_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = EventRouter::new();
        let mut journal = Journal::new();

        let report = router.route_host_events(
            FrameTick::first(),
            vec![HostEvent::new("early", "")],
            &mut journal,
        );
        assert_eq!(report.unhandled, 1);

        let sink = Arc::clone(&seen);
        router.register_react_callback(move |t, d| sink.lock().push(format!("{t}:{d}")));
        let report = router.route_host_events(
            FrameTick::first(),
            vec![HostEvent::new("projectSelected", "expo-42")],
            &mut journal,
        );
        assert_eq!(report.dispatched, 1);
        assert_eq!(*seen.lock(), vec!["projectSelected:expo-42".to_string()]);
    }

    #[test]
    fn engine_events_are_forwarded_to_host() {
        let probe = SimProbe::new();
        let mut host = SimHost::new(probe.clone());
        let mut router = EventRouter::new();
        let mut journal = Journal::new();

        let report = router.forward_engine_events(
            FrameTick::first(),
            vec![EngineEvent::new("tilesLoaded", "{\"count\":12}")],
            &mut host,
            &mut journal,
        );
        assert_eq!(report.dispatched, 1);
        assert_eq!(
            probe.commands(),
            vec![("tilesLoaded".to_string(), "{\"count\":12}".to_string())]
        );
    }

    #[test]
    fn failed_commands_are_web_view_errors() {
        let probe = SimProbe::new();
        let mut host = SimHost::new(probe.clone()).rejecting_commands();
        let err = EventRouter::send_command_to_react(&mut host, "ping", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WebView);

        let nav = NavigationMachine::new();
        let err = EventRouter::announce_navigation(&mut host, nav.state()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WebView);
        assert!(probe.commands().is_empty());
    }

    #[test]
    fn navigation_is_announced_as_json() {
        let probe = SimProbe::new();
        let mut host = SimHost::new(probe.clone());
        let mut nav = NavigationMachine::new();
        nav.navigate_to_project("expo-42").unwrap();

        EventRouter::announce_navigation(&mut host, nav.state()).unwrap();
        let (command, data) = probe.commands().remove(0);
        assert_eq!(command, NAVIGATION_CHANGED);
        assert!(data.contains("\"currentProject\":\"expo-42\""), "{data}");
    }
}
