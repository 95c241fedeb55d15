// Communication channels lock-free
// Bridges bus events to a consumer living on another thread

use crate::messaging::event_bus::{EventBus, ListenerId};
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

pub type EventProducer<E> = ringbuf::HeapProd<E>;
pub type EventConsumer<E> = ringbuf::HeapCons<E>;

pub fn create_event_channel<E>(capacity: usize) -> (EventProducer<E>, EventConsumer<E>) {
    let rb = HeapRb::<E>::new(capacity);
    rb.split()
}

impl<E: Clone + 'static> EventBus<E> {
    /// Forward every event into a ring buffer
    ///
    /// Events are dropped when the consumer falls behind and the buffer is
    /// full; the publisher never waits.
    pub fn forward_to(&mut self, mut producer: EventProducer<E>) -> ListenerId {
        self.subscribe(move |event| {
            if producer.try_push(event.clone()).is_err() {
                tracing::trace!("event channel full, dropping event");
            }
        })
    }
}
