//! Reusable event handlers: a bounded event recorder and a throttling
//! decorator for noisy observers such as operator alerts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use common::InstanceId;

use crate::bus::{EventBus, EventHandler, HandlerError, SubscriptionId};
use crate::events::{SagaEvent, SagaEventType};

/// Keeps the most recent events in memory.
///
/// Once `capacity` events are held, the oldest one is dropped for each new
/// event.
#[derive(Debug)]
pub struct EventRecorder {
    capacity: usize,
    events: Mutex<VecDeque<SagaEvent>>,
}

impl EventRecorder {
    /// Creates a recorder holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Subscribes the recorder to every event type on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        bus.subscribe_all_handler(Arc::clone(self) as Arc<dyn EventHandler>)
    }

    /// Returns all recorded events, oldest first.
    pub fn events(&self) -> Vec<SagaEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Returns the recorded events of one saga execution, oldest first.
    pub fn events_for(&self, instance_id: InstanceId) -> Vec<SagaEvent> {
        self.lock()
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect()
    }

    /// Returns the event types of one saga execution, oldest first.
    pub fn event_types_for(&self, instance_id: InstanceId) -> Vec<SagaEventType> {
        self.lock()
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .map(|e| e.event_type)
            .collect()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SagaEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventHandler for EventRecorder {
    fn handle(&self, event: &SagaEvent) -> Result<(), HandlerError> {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}

/// Forwards events to an inner handler at most once per `window`.
///
/// Events arriving while the window is open are dropped for this handler
/// only; other subscribers still receive them.
pub struct ThrottledHandler<H> {
    inner: H,
    window: Duration,
    last_delivered: Mutex<Option<Instant>>,
    suppressed: AtomicU64,
}

impl<H: EventHandler> ThrottledHandler<H> {
    /// Wraps `inner` so it runs at most once per `window`.
    pub fn new(window: Duration, inner: H) -> Self {
        Self {
            inner,
            window,
            last_delivered: Mutex::new(None),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Returns the throttle window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns how many events were dropped so far.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    fn admit(&self) -> bool {
        let mut last = self
            .last_delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl<H: EventHandler> EventHandler for ThrottledHandler<H> {
    fn handle(&self, event: &SagaEvent) -> Result<(), HandlerError> {
        if !self.admit() {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                event_type = %event.event_type,
                instance_id = %event.instance_id,
                window_ms = self.window.as_millis() as u64,
                "event throttled"
            );
            return Ok(());
        }
        self.inner.handle(event)
    }
}

impl<H> std::fmt::Debug for ThrottledHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledHandler")
            .field("window", &self.window)
            .field("suppressed", &self.suppressed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counting(Arc<AtomicUsize>);

    impl EventHandler for Counting {
        fn handle(&self, _event: &SagaEvent) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_recorder_filters_by_instance() {
        let recorder = EventRecorder::new(16);
        let a = InstanceId::new();
        let b = InstanceId::new();

        recorder.handle(&SagaEvent::step_started("s", a, "x")).unwrap();
        recorder.handle(&SagaEvent::step_started("s", b, "x")).unwrap();
        recorder.handle(&SagaEvent::saga_completed("s", a)).unwrap();

        assert_eq!(recorder.len(), 3);
        assert_eq!(
            recorder.event_types_for(a),
            vec![SagaEventType::StepStarted, SagaEventType::SagaCompleted]
        );
        assert_eq!(recorder.events_for(b).len(), 1);
    }

    #[test]
    fn test_recorder_drops_oldest_when_full() {
        let recorder = EventRecorder::new(2);
        let id = InstanceId::new();

        recorder.handle(&SagaEvent::step_started("s", id, "a")).unwrap();
        recorder.handle(&SagaEvent::step_started("s", id, "b")).unwrap();
        recorder.handle(&SagaEvent::step_started("s", id, "c")).unwrap();

        let names: Vec<String> = recorder
            .events()
            .into_iter()
            .filter_map(|e| e.step_name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_recorder_attach_receives_published_events() {
        let bus = EventBus::new();
        let recorder = Arc::new(EventRecorder::new(8));
        recorder.attach(&bus);

        bus.publish(&SagaEvent::saga_completed("s", InstanceId::new()));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_throttle_suppresses_within_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let throttled = ThrottledHandler::new(Duration::from_secs(3600), Counting(count.clone()));
        let event = SagaEvent::saga_completed("s", InstanceId::new());

        throttled.handle(&event).unwrap();
        throttled.handle(&event).unwrap();
        throttled.handle(&event).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(throttled.suppressed_count(), 2);
    }

    #[test]
    fn test_zero_window_never_throttles() {
        let count = Arc::new(AtomicUsize::new(0));
        let throttled = ThrottledHandler::new(Duration::ZERO, Counting(count.clone()));
        let event = SagaEvent::saga_completed("s", InstanceId::new());

        throttled.handle(&event).unwrap();
        throttled.handle(&event).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(throttled.suppressed_count(), 0);
    }

    #[test]
    fn test_throttle_reopens_after_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let throttled =
            ThrottledHandler::new(Duration::from_millis(20), Counting(count.clone()));
        let event = SagaEvent::saga_completed("s", InstanceId::new());

        throttled.handle(&event).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        throttled.handle(&event).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
