use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::tb_obj::TbObj;

/// One-shot notification shared between tasks.
///
/// `wait()` suspends until `set()` has been called (and completes
/// immediately if it already has). `clear()` re-arms the event for the next
/// monitoring session.
pub struct Event<T: Clone>(TbObj<EventInner<T>>);

struct EventInner<T> {
    fired: bool,
    data: Option<T>,
    wakers: Vec<Waker>,
}

impl<T: Clone> Event<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(TbObj::new(EventInner {
            fired: false,
            data: None,
            wakers: Vec::new(),
        }))
    }

    /// Fires the event, stores its data and wakes all waiters. A second
    /// `set()` on an already fired event is a usage error.
    pub fn set(&self, data: T) {
        let wakers = self.0.with_mut(|e| {
            if e.fired {
                panic!("Event was set twice without being cleared.");
            }
            e.fired = true;
            e.data = Some(data);
            std::mem::take(&mut e.wakers)
        });
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn fired(&self) -> bool {
        self.0.get().fired
    }

    pub fn data(&self) -> Option<T> {
        self.0.get().data.clone()
    }

    /// Re-arms the event so it can capture a subsequent notification.
    pub fn clear(&self) {
        self.0.with_mut(|e| {
            e.fired = false;
            e.data = None;
        });
    }

    pub fn wait(&self) -> EventWait<T> {
        EventWait { event: self.clone() }
    }
}

impl<T: Clone> Clone for Event<T> {
    fn clone(&self) -> Self {
        Event(self.0.clone())
    }
}

pub struct EventWait<T: Clone> {
    event: Event<T>,
}

impl<T: Clone> Future for EventWait<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.event.0.with_mut(|e| {
            if e.fired {
                Poll::Ready(e.data.clone().expect("Event fired without data."))
            } else {
                e.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::task::{RawWaker, RawWakerVTable};

    fn noop_waker() -> Waker {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    fn poll_once<F: Future>(fut: &mut F) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        // fut is never moved while pinned here
        unsafe { Pin::new_unchecked(fut) }.poll(&mut cx)
    }

    #[test]
    fn set_before_wait_completes_immediately() {
        let event: Event<u128> = Event::new();
        event.set(42);
        let mut wait = event.wait();
        assert_eq!(poll_once(&mut wait), Poll::Ready(42));
    }

    #[test]
    fn wait_pends_until_set() {
        let event: Event<u32> = Event::new();
        let mut wait = event.wait();
        assert_eq!(poll_once(&mut wait), Poll::Pending);
        event.set(7);
        assert_eq!(poll_once(&mut wait), Poll::Ready(7));
    }

    #[test]
    fn clear_rearms() {
        let event: Event<u32> = Event::new();
        event.set(1);
        assert!(event.fired());
        event.clear();
        assert!(!event.fired());
        assert_eq!(event.data(), None);
        event.set(2);
        assert_eq!(event.data(), Some(2));
    }

    #[test]
    #[should_panic]
    fn double_set_panics() {
        let event: Event<u32> = Event::new();
        event.set(1);
        event.set(2);
    }

    #[test]
    fn waiters_are_woken() {
        static WAKES: AtomicU32 = AtomicU32::new(0);

        struct CountingWake;
        impl futures::task::ArcWake for CountingWake {
            fn wake_by_ref(_: &Arc<Self>) {
                WAKES.fetch_add(1, Ordering::SeqCst);
            }
        }

        let event: Event<u32> = Event::new();
        let waker = futures::task::waker(Arc::new(CountingWake));
        let mut cx = Context::from_waker(&waker);

        let mut w1 = event.wait();
        let mut w2 = event.wait();
        assert!(unsafe { Pin::new_unchecked(&mut w1) }.poll(&mut cx).is_pending());
        assert!(unsafe { Pin::new_unchecked(&mut w2) }.poll(&mut cx).is_pending());

        event.set(9);
        assert_eq!(WAKES.load(Ordering::SeqCst), 2);
        assert_eq!(poll_once(&mut w1), Poll::Ready(9));
        assert_eq!(poll_once(&mut w2), Poll::Ready(9));
    }
}
