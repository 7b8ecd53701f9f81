//! In-process frame source used for replay and tests

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{FrameHandler, FrameSource, SubscriptionHandle};
use crate::frame::CapturedFrame;
use crate::{CaptureError, MAX_FRAME_SIZE};

/// Fan-out frame source: every delivered frame goes to every subscriber in
/// subscription order.
#[derive(Default)]
pub struct FrameHub {
    handlers: RwLock<Vec<(u64, Arc<dyn FrameHandler>)>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
    oversized: AtomicU64,
}

impl FrameHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one frame to all subscribers; oversized captures are refused
    pub fn deliver(&self, frame: &CapturedFrame) {
        if frame.data.len() > MAX_FRAME_SIZE {
            self.oversized.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for (_, handler) in handlers.iter() {
            handler.deliver(frame);
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Frames handed to subscribers so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Frames refused for exceeding the capture ceiling
    pub fn oversized(&self) -> u64 {
        self.oversized.load(Ordering::Relaxed)
    }
}

impl FrameSource for FrameHub {
    fn subscribe(&self, handler: Arc<dyn FrameHandler>) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        debug!("Registered frame handler {}", id);
        SubscriptionHandle::new(id)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> crate::Result<()> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != handle.id());
        if handlers.len() == before {
            return Err(CaptureError::UnknownSubscription(handle.id()));
        }
        debug!("Unregistered frame handler {}", handle.id());
        Ok(())
    }
}

impl std::fmt::Debug for FrameHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHub")
            .field("handlers", &format!("[{} handlers]", self.subscriber_count()))
            .field("delivered", &self.delivered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::RxMetadata;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl FrameHandler for Counter {
        fn deliver(&self, _frame: &CapturedFrame) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame(len: usize) -> CapturedFrame {
        CapturedFrame::new(Bytes::from(vec![0u8; len]), RxMetadata::default())
    }

    #[test]
    fn test_subscribe_deliver_unsubscribe() {
        let hub = FrameHub::new();
        let counter = Arc::new(Counter::default());

        let handle = hub.subscribe(counter.clone());
        assert_eq!(hub.subscriber_count(), 1);

        hub.deliver(&frame(30));
        hub.deliver(&frame(30));
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        hub.unsubscribe(handle).unwrap();
        hub.deliver(&frame(30));
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(hub.delivered(), 3);
    }

    #[test]
    fn test_unsubscribe_unknown_handle() {
        let hub = FrameHub::new();
        let other = FrameHub::new();
        let handle = other.subscribe(Arc::new(Counter::default()));

        // ids start at 0 in both hubs, so burn one in `hub` first
        let own = hub.subscribe(Arc::new(Counter::default()));
        hub.unsubscribe(own).unwrap();

        assert!(matches!(
            hub.unsubscribe(handle),
            Err(CaptureError::UnknownSubscription(0))
        ));
    }

    #[test]
    fn test_oversized_frame_refused() {
        let hub = FrameHub::new();
        let counter = Arc::new(Counter::default());
        let _handle = hub.subscribe(counter.clone());

        hub.deliver(&frame(MAX_FRAME_SIZE + 1));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert_eq!(hub.oversized(), 1);
    }
}
