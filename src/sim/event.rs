use super::runner::Sample;

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

/// Kinds of simulation events.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The set of active controllers changed.
    Activity { from: String, to: String },
    Connected,
    Released,
    /// A completion token reached the dispatcher.
    Dispatched(String),
}

/// A discrete event that occurred during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimEvent {
    pub time: f64,
    pub kind: EventKind,
}

/// Passive detectors that compare consecutive samples.
pub trait EventDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind>;
}

/// Connector lock and release.
pub struct ConnectionDetector;

impl EventDetector for ConnectionDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind> {
        match (prev.connected, current.connected) {
            (false, true) => Some(EventKind::Connected),
            (true, false) => Some(EventKind::Released),
            _ => None,
        }
    }
}

/// Changes in which controllers hold a target, including phase changes
/// reported through their status.
pub struct ActivityDetector;

impl EventDetector for ActivityDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind> {
        if prev.activity != current.activity {
            Some(EventKind::Activity { from: prev.activity.clone(), to: current.activity.clone() })
        } else {
            None
        }
    }
}

/// Default detector set for a run.
pub fn default_detectors() -> Vec<Box<dyn EventDetector>> {
    vec![Box::new(ConnectionDetector), Box::new(ActivityDetector)]
}
