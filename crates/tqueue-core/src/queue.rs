//! The queue engine
//!
//! [`TQueue`] owns, per [`QueueId`], an ordered map of retained events and
//! the tail id that the next implicit push will receive. Every mutation is
//! mirrored to the attached [`TQueueCallback`], if any, before the calling
//! operation returns.
//!
//! ## Id window
//!
//! Ids are plain integers ordered by value. A queue whose tail would have
//! to move past [`EventId::MAX`] is recycled instead: its retained events
//! are forgotten and numbering restarts at [`EventId::MIN`]. Live events
//! therefore never straddle the wrap point, and integer comparison stays
//! valid for everything the engine retains.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::TQueueConfig;
use crate::error::{TQueueError, TQueueResult};
use crate::event::{Event, Fetched, QueueId};
use crate::event_id::EventId;
use crate::traits::TQueueCallback;

/// State of a single queue
#[derive(Debug, Clone)]
struct Queue {
    /// Id following the newest appended event
    tail: EventId,
    /// Retained events keyed by id
    events: BTreeMap<EventId, Event>,
}

impl Queue {
    fn new(tail: EventId) -> Self {
        Self {
            tail,
            events: BTreeMap::new(),
        }
    }

    fn head(&self) -> EventId {
        self.events
            .first_key_value()
            .map(|(id, _)| *id)
            .unwrap_or(self.tail)
    }

    fn last_id(&self) -> Option<EventId> {
        self.events.last_key_value().map(|(id, _)| *id)
    }

    /// Remove every retained event with id `<= up_to`
    fn remove_through(&mut self, up_to: EventId) -> usize {
        let mut removed = 0;
        while let Some(entry) = self.events.first_entry() {
            if *entry.key() > up_to {
                break;
            }
            entry.remove();
            removed += 1;
        }
        removed
    }
}

/// Per-key, append-only event queue engine
///
/// The engine is synchronous and takes `&mut self` for every mutation.
/// Callers that need concurrent access must wrap it in their own lock.
pub struct TQueue {
    config: TQueueConfig,
    queues: BTreeMap<QueueId, Queue>,
    callback: Option<Box<dyn TQueueCallback>>,
}

impl fmt::Debug for TQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TQueue")
            .field("config", &self.config)
            .field("queues", &self.queues.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl Default for TQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TQueue {
    /// Create an empty engine with the default configuration
    pub fn new() -> Self {
        Self {
            config: TQueueConfig::default(),
            queues: BTreeMap::new(),
            callback: None,
        }
    }

    /// Create an empty engine with no queues and no callback
    pub fn create() -> Self {
        Self::new()
    }

    /// Create an empty engine with a custom configuration
    pub fn with_config(config: TQueueConfig) -> TQueueResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queues: BTreeMap::new(),
            callback: None,
        })
    }

    /// Get the engine configuration
    pub fn config(&self) -> &TQueueConfig {
        &self.config
    }

    /// Append an event to a queue
    ///
    /// With `explicit_id` the event receives that id, which must not be
    /// before the queue's tail. Otherwise it receives the tail, or the
    /// configured first id if the queue has never been pushed to.
    ///
    /// The callback is notified before the event is committed; if it fails,
    /// the queue is left unchanged apart from a recycle that was already
    /// reported to it.
    pub fn push(
        &mut self,
        queue_id: QueueId,
        data: impl Into<Bytes>,
        expires_at: f64,
        explicit_id: Option<EventId>,
    ) -> TQueueResult<EventId> {
        let data = data.into();
        if data.is_empty() {
            return Err(TQueueError::EmptyPayload);
        }
        if data.len() > self.config.max_event_len {
            return Err(TQueueError::PayloadTooLarge {
                len: data.len(),
                max: self.config.max_event_len,
            });
        }

        let existing = self.queues.get(&queue_id);
        if existing.is_some_and(|q| q.events.len() >= self.config.max_queue_events) {
            return Err(TQueueError::QueueFull {
                queue_id,
                max: self.config.max_queue_events,
            });
        }
        let tail = existing.map(|q| q.tail);

        let (id, recycle) = match explicit_id {
            Some(id) => {
                if let Some(tail) = tail
                    && id < tail
                {
                    return Err(TQueueError::OutOfOrderPush {
                        queue_id,
                        requested: id,
                        tail,
                    });
                }
                (id, false)
            }
            None => {
                let candidate = tail.unwrap_or_else(|| self.config.pick_first_id());
                if candidate.next().is_ok() {
                    (candidate, false)
                } else {
                    (candidate.successor(), true)
                }
            }
        };
        let new_tail = id.next()?;

        if recycle {
            if let Some(queue) = self.queues.get_mut(&queue_id)
                && let Some(last) = queue.last_id()
            {
                if let Some(callback) = self.callback.as_mut() {
                    callback.on_forget(queue_id, last)?;
                }
                queue.events.clear();
            }
            debug!(queue_id, restart_at = %id, "Recycled queue at end of id window");
        }

        let event = Event {
            id,
            data,
            expires_at,
        };
        if let Some(callback) = self.callback.as_mut() {
            callback.on_push(queue_id, &event)?;
        }

        trace!(queue_id, event_id = %id, expires_at, "Pushed event");
        let queue = self
            .queues
            .entry(queue_id)
            .or_insert_with(|| Queue::new(new_tail));
        queue.events.insert(id, event);
        queue.tail = new_tail;
        Ok(id)
    }

    /// Id of the oldest retained event, or the tail if nothing is retained
    ///
    /// `None` for a queue that has never been pushed to.
    pub fn get_head(&self, queue_id: QueueId) -> Option<EventId> {
        self.queues.get(&queue_id).map(Queue::head)
    }

    /// Id following the newest appended event
    ///
    /// `None` for a queue that has never been pushed to.
    pub fn get_tail(&self, queue_id: QueueId) -> Option<EventId> {
        self.queues.get(&queue_id).map(|q| q.tail)
    }

    /// Read events starting at `from`
    ///
    /// Copies readable (not expired at `now`) events with id `>= from` into
    /// `out` in ascending id order. With `forget_previous`, retained events
    /// before `from` are released first; the release never reaches past the
    /// tail.
    ///
    /// # Errors
    ///
    /// [`TQueueError::BufferTooSmall`] if `out` is empty while readable events
    /// exist, or a storage error from the callback while forgetting.
    pub fn get(
        &mut self,
        queue_id: QueueId,
        from: EventId,
        forget_previous: bool,
        now: f64,
        out: &mut [Event],
    ) -> TQueueResult<Fetched> {
        let Some(queue) = self.queues.get_mut(&queue_id) else {
            return Ok(Fetched::default());
        };

        if forget_previous {
            let boundary = from.min(queue.tail);
            let up_to = queue.events.range(..boundary).next_back().map(|(id, _)| *id);
            if let Some(up_to) = up_to {
                if let Some(callback) = self.callback.as_mut() {
                    callback.on_forget(queue_id, up_to)?;
                }
                let removed = queue.remove_through(up_to);
                debug!(queue_id, up_to = %up_to, removed, "Forgot events before cursor");
            }
        }

        let mut readable = queue
            .events
            .range(from..)
            .map(|(_, event)| event)
            .filter(|event| !event.is_expired(now));

        if out.is_empty() {
            let available = readable.count();
            if available > 0 {
                return Err(TQueueError::BufferTooSmall { available });
            }
            return Ok(Fetched::default());
        }

        let mut written = 0;
        while written < out.len() {
            let Some(event) = readable.next() else {
                break;
            };
            out[written] = event.clone();
            written += 1;
        }
        let has_more = written == out.len() && readable.next().is_some();

        Ok(Fetched { written, has_more })
    }

    /// Allocating variant of [`get`](Self::get) returning at most `limit` events
    pub fn get_events(
        &mut self,
        queue_id: QueueId,
        from: EventId,
        forget_previous: bool,
        now: f64,
        limit: usize,
    ) -> TQueueResult<Vec<Event>> {
        let mut out = vec![Event::default(); limit];
        let fetched = self.get(queue_id, from, forget_previous, now, &mut out)?;
        out.truncate(fetched.written);
        Ok(out)
    }

    /// Remove every retained event expired at `now`
    ///
    /// Returns the number of events removed. Running it again with the same
    /// `now` removes nothing.
    pub fn run_gc(&mut self, now: f64) -> TQueueResult<usize> {
        let mut removed = 0;
        for (queue_id, queue) in self.queues.iter_mut() {
            let expired: Vec<EventId> = queue
                .events
                .values()
                .filter(|event| event.is_expired(now))
                .map(|event| event.id)
                .collect();
            for id in expired {
                if let Some(callback) = self.callback.as_mut() {
                    callback.on_pop(*queue_id, id)?;
                }
                queue.events.remove(&id);
                trace!(queue_id = *queue_id, event_id = %id, "Collected expired event");
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(now, removed, "Garbage collection finished");
        }
        Ok(removed)
    }

    /// Attach a persistence callback, returning the previously attached one
    pub fn set_callback(
        &mut self,
        callback: Box<dyn TQueueCallback>,
    ) -> Option<Box<dyn TQueueCallback>> {
        self.callback.replace(callback)
    }

    /// Detach and return the current callback
    pub fn extract_callback(&mut self) -> Option<Box<dyn TQueueCallback>> {
        self.callback.take()
    }

    /// Detach the current callback if it is a `T`
    ///
    /// A callback of another type stays attached and `None` is returned.
    pub fn extract_callback_as<T: TQueueCallback>(&mut self) -> Option<Box<T>> {
        if !self.callback.as_ref().is_some_and(|cb| (**cb).as_any().is::<T>()) {
            return None;
        }
        self.callback.take()?.into_any().downcast::<T>().ok()
    }

    /// Whether a callback is attached
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Simulate a crash
    ///
    /// With a callback attached, every queue is discarded: whatever should
    /// survive must be replayed from the callback's storage into a fresh
    /// engine. Without one there is no storage to reload from, so nothing is
    /// lost and the engine keeps serving as a baseline.
    pub fn emulate_restart(&mut self) {
        if self.callback.is_none() {
            trace!("Restart without callback keeps in-memory state");
            return;
        }
        let queues = self.queues.len();
        self.queues.clear();
        debug!(queues, "Discarded in-memory queues on emulated restart");
    }

    /// Re-insert a stored event without notifying the callback
    ///
    /// Accepted when the queue retains nothing or the id is after the newest
    /// retained id. The tail becomes the event's successor.
    pub fn replay_push(&mut self, queue_id: QueueId, event: Event) -> TQueueResult<()> {
        let new_tail = event.id.next()?;
        let queue = self
            .queues
            .entry(queue_id)
            .or_insert_with(|| Queue::new(new_tail));
        if let Some(last) = queue.last_id()
            && last >= event.id
        {
            return Err(TQueueError::OutOfOrderPush {
                queue_id,
                requested: event.id,
                tail: queue.tail,
            });
        }
        queue.events.insert(event.id, event);
        queue.tail = new_tail;
        Ok(())
    }

    /// Remove a single stored event without notifying the callback
    pub fn replay_pop(&mut self, queue_id: QueueId, event_id: EventId) -> usize {
        self.queues
            .get_mut(&queue_id)
            .and_then(|q| q.events.remove(&event_id))
            .map_or(0, |_| 1)
    }

    /// Remove stored events up to and including `up_to` without notifying
    pub fn replay_forget(&mut self, queue_id: QueueId, up_to: EventId) -> usize {
        self.queues
            .get_mut(&queue_id)
            .map_or(0, |q| q.remove_through(up_to))
    }

    /// Number of retained events in a queue, expired ones included
    pub fn get_size(&self, queue_id: QueueId) -> usize {
        self.queues.get(&queue_id).map_or(0, |q| q.events.len())
    }

    /// Number of known queues
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Ids of all known queues in ascending order
    pub fn queue_ids(&self) -> impl Iterator<Item = QueueId> + '_ {
        self.queues.keys().copied()
    }

    /// Retained events of a queue in id order, expired ones included
    pub fn retained(&self, queue_id: QueueId) -> impl Iterator<Item = &Event> + '_ {
        self.queues
            .get(&queue_id)
            .into_iter()
            .flat_map(|q| q.events.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FirstEventId;
    use crate::error::StorageError;

    #[derive(Debug, Clone, PartialEq)]
    enum Note {
        Push(QueueId, EventId),
        Forget(QueueId, EventId),
        Pop(QueueId, EventId),
    }

    #[derive(Default)]
    struct Recorder {
        notes: Vec<Note>,
        fail: bool,
    }

    impl TQueueCallback for Recorder {
        fn on_push(&mut self, queue_id: QueueId, event: &Event) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::io("injected"));
            }
            self.notes.push(Note::Push(queue_id, event.id));
            Ok(())
        }

        fn on_forget(&mut self, queue_id: QueueId, up_to: EventId) -> Result<(), StorageError> {
            self.notes.push(Note::Forget(queue_id, up_to));
            Ok(())
        }

        fn on_pop(&mut self, queue_id: QueueId, event_id: EventId) -> Result<(), StorageError> {
            self.notes.push(Note::Pop(queue_id, event_id));
            Ok(())
        }
    }

    fn id(raw: i64) -> EventId {
        EventId::from_raw(raw).unwrap()
    }

    #[test]
    fn test_hands() {
        let mut events = vec![Event::default(); 100];
        let mut queue = TQueue::create();
        let qid = 12;
        assert!(queue.get_head(qid).is_none());
        assert!(queue.get_tail(qid).is_none());

        let pushed = queue.push(qid, "hello", 0.0, None).unwrap();
        let head = queue.get_head(qid).unwrap();
        assert_eq!(head, pushed);
        assert_eq!(head.next().unwrap(), queue.get_tail(qid).unwrap());

        let fetched = queue.get(qid, head, true, 0.0, &mut events).unwrap();
        assert_eq!(fetched.written, 1);
        assert!(!fetched.has_more);
        assert_eq!(events[0].id, pushed);
        assert_eq!(&events[0].data[..], b"hello");
    }

    #[test]
    fn test_implicit_ids_increase() {
        let mut queue = TQueue::new();
        let mut last = None;
        for i in 0..50 {
            let assigned = queue.push(1, format!("event {}", i), 100.0, None).unwrap();
            if let Some(prev) = last {
                assert!(assigned > prev);
            }
            last = Some(assigned);
        }
        assert_eq!(queue.get_size(1), 50);
        assert_eq!(queue.get_tail(1).unwrap().value(), 50);
    }

    #[test]
    fn test_explicit_id_rules() {
        let mut queue = TQueue::new();
        assert_eq!(queue.push(3, "a", 10.0, Some(id(100))).unwrap(), id(100));
        assert_eq!(queue.get_tail(3), Some(id(101)));

        // Before tail, including an already retained id
        let err = queue.push(3, "b", 10.0, Some(id(100))).unwrap_err();
        assert!(matches!(err, TQueueError::OutOfOrderPush { .. }));
        let err = queue.push(3, "b", 10.0, Some(id(50))).unwrap_err();
        assert!(matches!(err, TQueueError::OutOfOrderPush { .. }));

        // Equal to tail and beyond it
        assert_eq!(queue.push(3, "c", 10.0, Some(id(101))).unwrap(), id(101));
        assert_eq!(queue.push(3, "d", 10.0, Some(id(200))).unwrap(), id(200));
        assert_eq!(queue.push(3, "e", 10.0, None).unwrap(), id(201));

        // No room for a tail after MAX
        let err = queue.push(4, "f", 10.0, Some(EventId::MAX)).unwrap_err();
        assert!(matches!(err, TQueueError::InvalidEventId(_)));
        assert!(queue.get_tail(4).is_none());
    }

    #[test]
    fn test_payload_validation() {
        let config = TQueueConfig::default()
            .with_max_event_len(4)
            .with_max_queue_events(2);
        let mut queue = TQueue::with_config(config).unwrap();

        assert!(matches!(
            queue.push(1, "", 1.0, None),
            Err(TQueueError::EmptyPayload)
        ));
        assert!(matches!(
            queue.push(1, "too long", 1.0, None),
            Err(TQueueError::PayloadTooLarge { len: 8, max: 4 })
        ));
        queue.push(1, "a", 1.0, None).unwrap();
        queue.push(1, "b", 1.0, None).unwrap();
        assert!(matches!(
            queue.push(1, "c", 1.0, None),
            Err(TQueueError::QueueFull { queue_id: 1, max: 2 })
        ));
    }

    #[test]
    fn test_get_skips_expired_without_removing() {
        let mut queue = TQueue::new();
        queue.push(1, "live", 100.0, None).unwrap();
        queue.push(1, "dead", 5.0, None).unwrap();
        queue.push(1, "live2", 100.0, None).unwrap();

        let events = queue.get_events(1, EventId::MIN, false, 10.0, 10).unwrap();
        let payloads: Vec<_> = events.iter().map(|e| e.data.clone()).collect();
        assert_eq!(payloads, vec![Bytes::from("live"), Bytes::from("live2")]);
        assert_eq!(queue.get_size(1), 3);
    }

    #[test]
    fn test_get_buffer_full_reports_more() {
        let mut queue = TQueue::new();
        for i in 0..5 {
            queue.push(1, format!("{}", i), 100.0, None).unwrap();
        }
        let mut out = vec![Event::default(); 2];
        let fetched = queue.get(1, EventId::MIN, false, 0.0, &mut out).unwrap();
        assert_eq!(fetched, Fetched { written: 2, has_more: true });

        let fetched = queue.get(1, id(3), false, 0.0, &mut out).unwrap();
        assert_eq!(fetched, Fetched { written: 2, has_more: false });
        assert_eq!(out[1].id, id(4));
    }

    #[test]
    fn test_get_empty_buffer() {
        let mut queue = TQueue::new();
        let mut out: Vec<Event> = Vec::new();
        assert_eq!(
            queue.get(1, EventId::MIN, false, 0.0, &mut out).unwrap(),
            Fetched::default()
        );
        queue.push(1, "x", 100.0, None).unwrap();
        queue.push(1, "y", 100.0, None).unwrap();
        assert!(matches!(
            queue.get(1, EventId::MIN, false, 0.0, &mut out),
            Err(TQueueError::BufferTooSmall { available: 2 })
        ));
    }

    #[test]
    fn test_get_unknown_queue_and_past_tail() {
        let mut queue = TQueue::new();
        let mut out = vec![Event::default(); 4];
        assert_eq!(
            queue.get(99, EventId::MIN, true, 0.0, &mut out).unwrap().written,
            0
        );

        queue.push(1, "x", 100.0, None).unwrap();
        let past = queue.get_tail(1).unwrap().advance(10).unwrap();
        let fetched = queue.get(1, past, false, 0.0, &mut out).unwrap();
        assert_eq!(fetched.written, 0);
        assert_eq!(queue.get_size(1), 1);
    }

    #[test]
    fn test_forget_previous_advances_head() {
        let mut queue = TQueue::new();
        for i in 0..6 {
            queue.push(7, format!("{}", i), 100.0, None).unwrap();
        }
        let fetched = queue
            .get(7, id(4), true, 0.0, &mut vec![Event::default(); 10])
            .unwrap();
        assert_eq!(fetched.written, 2);
        assert_eq!(queue.get_head(7), Some(id(4)));
        assert_eq!(queue.get_size(7), 2);

        // Cursor past tail forgets everything but the tail stays put
        let past = id(50);
        queue
            .get(7, past, true, 0.0, &mut vec![Event::default(); 10])
            .unwrap();
        assert_eq!(queue.get_size(7), 0);
        assert_eq!(queue.get_head(7), Some(id(6)));
        assert_eq!(queue.get_tail(7), Some(id(6)));
    }

    #[test]
    fn test_run_gc_removes_expired_and_is_idempotent() {
        let mut queue = TQueue::new();
        let old = queue.push(1, "old", 5.0, None).unwrap();
        queue.push(1, "new", 50.0, None).unwrap();
        queue.push(2, "other", 1.0, None).unwrap();

        assert_eq!(queue.run_gc(10.0).unwrap(), 2);
        assert!(queue.get_head(1).unwrap() > old);
        assert_eq!(queue.get_size(2), 0);
        assert_eq!(queue.run_gc(10.0).unwrap(), 0);

        let events = queue.get_events(1, EventId::MIN, false, 10.0, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(&events[0].data[..], b"new");
    }

    #[test]
    fn test_gc_keeps_events_expiring_exactly_now() {
        let mut queue = TQueue::new();
        queue.push(1, "edge", 10.0, None).unwrap();
        assert_eq!(queue.run_gc(10.0).unwrap(), 0);
        assert_eq!(queue.run_gc(10.5).unwrap(), 1);
    }

    #[test]
    fn test_callback_notifications() {
        let mut queue = TQueue::new();
        queue.set_callback(Box::new(Recorder::default()));

        queue.push(1, "a", 5.0, None).unwrap();
        queue.push(1, "b", 50.0, None).unwrap();
        queue.push(1, "c", 50.0, None).unwrap();
        queue.run_gc(10.0).unwrap();
        queue
            .get(1, id(2), true, 10.0, &mut vec![Event::default(); 4])
            .unwrap();

        let recorder = queue.extract_callback_as::<Recorder>().unwrap();
        assert_eq!(
            recorder.notes,
            vec![
                Note::Push(1, id(0)),
                Note::Push(1, id(1)),
                Note::Push(1, id(2)),
                Note::Pop(1, id(0)),
                Note::Forget(1, id(1)),
            ]
        );
        assert!(!queue.has_callback());
    }

    #[test]
    fn test_failed_callback_does_not_commit() {
        let mut queue = TQueue::new();
        queue.set_callback(Box::new(Recorder {
            fail: true,
            ..Default::default()
        }));
        let err = queue.push(1, "a", 5.0, None).unwrap_err();
        assert!(matches!(err, TQueueError::Storage(StorageError::Io(_))));
        assert_eq!(queue.get_size(1), 0);
    }

    #[test]
    fn test_extract_callback_as_wrong_type_keeps_it() {
        struct Other;
        impl TQueueCallback for Other {
            fn on_push(&mut self, _: QueueId, _: &Event) -> Result<(), StorageError> {
                Ok(())
            }
            fn on_forget(&mut self, _: QueueId, _: EventId) -> Result<(), StorageError> {
                Ok(())
            }
            fn on_pop(&mut self, _: QueueId, _: EventId) -> Result<(), StorageError> {
                Ok(())
            }
        }

        let mut queue = TQueue::new();
        assert!(queue.extract_callback().is_none());
        queue.set_callback(Box::new(Other));
        assert!(queue.extract_callback_as::<Recorder>().is_none());
        assert!(queue.has_callback());
        assert!(queue.extract_callback_as::<Other>().is_some());
    }

    #[test]
    fn test_emulate_restart() {
        let mut baseline = TQueue::new();
        baseline.push(1, "a", 5.0, None).unwrap();
        baseline.emulate_restart();
        assert_eq!(baseline.get_size(1), 1);

        let mut mirrored = TQueue::new();
        mirrored.set_callback(Box::new(Recorder::default()));
        mirrored.push(1, "a", 5.0, None).unwrap();
        mirrored.emulate_restart();
        assert!(mirrored.get_tail(1).is_none());
        assert_eq!(mirrored.queue_count(), 0);
    }

    #[test]
    fn test_recycle_at_end_of_window() {
        let start = EventId::MAX.advance(-3).unwrap();
        let config = TQueueConfig::default().with_first_event_id(FirstEventId::Fixed(start));
        let mut queue = TQueue::with_config(config).unwrap();
        queue.set_callback(Box::new(Recorder::default()));

        let ids: Vec<_> = (0..5)
            .map(|i| queue.push(1, format!("{}", i), 100.0, None).unwrap())
            .collect();
        assert_eq!(ids[0], start);
        assert_eq!(ids[2], EventId::MAX.advance(-1).unwrap());
        assert_eq!(ids[3], EventId::MIN);
        assert_eq!(ids[4], id(1));
        assert_eq!(queue.get_head(1), Some(EventId::MIN));
        assert_eq!(queue.get_tail(1), Some(id(2)));
        assert_eq!(queue.get_size(1), 2);

        let recorder = queue.extract_callback_as::<Recorder>().unwrap();
        assert!(recorder.notes.contains(&Note::Forget(1, ids[2])));
    }

    #[test]
    fn test_replay_primitives() {
        let mut queue = TQueue::new();
        queue.set_callback(Box::new(Recorder::default()));
        queue.replay_push(5, Event::new(id(10), "a", 1.0)).unwrap();
        queue.replay_push(5, Event::new(id(12), "b", 1.0)).unwrap();
        assert!(queue.replay_push(5, Event::new(id(11), "c", 1.0)).is_err());
        assert_eq!(queue.get_head(5), Some(id(10)));
        assert_eq!(queue.get_tail(5), Some(id(13)));

        assert_eq!(queue.replay_pop(5, id(12)), 1);
        assert_eq!(queue.replay_pop(5, id(12)), 0);
        assert_eq!(queue.get_tail(5), Some(id(13)));
        assert_eq!(queue.replay_forget(5, id(10)), 1);
        assert_eq!(queue.get_head(5), Some(id(13)));

        // Empty queue accepts a lower id, as after a recycle
        queue.replay_push(5, Event::new(id(0), "d", 1.0)).unwrap();
        assert_eq!(queue.get_tail(5), Some(id(1)));

        let recorder = queue.extract_callback_as::<Recorder>().unwrap();
        assert!(recorder.notes.is_empty());
    }
}
