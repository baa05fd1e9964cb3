//! Time and animation-frame seams. Browser implementations sit next to the
//! manual ones used by headless hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Monotonic milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// `performance.now()`, or `Date.now()` where the Performance API is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceClock;

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

/// Clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self { now: Cell::new(start_ms) }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}

pub type FrameId = u32;

/// One-shot "before next paint" callbacks.
pub trait FrameScheduler {
    fn request(&self, callback: Box<dyn FnOnce()>) -> FrameId;
    fn cancel(&self, id: FrameId);
}

struct ScheduledFrame {
    _frame: gloo::render::AnimationFrame,
    fired: Rc<Cell<bool>>,
}

/// `requestAnimationFrame` through `gloo::render`.
#[derive(Default)]
pub struct AnimationFrameScheduler {
    next_id: Cell<FrameId>,
    frames: RefCell<HashMap<FrameId, ScheduledFrame>>,
}

impl AnimationFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request(&self, callback: Box<dyn FnOnce()>) -> FrameId {
        // handles are dropped lazily; dropping one inside its own callback is not allowed
        self.frames.borrow_mut().retain(|_, frame| !frame.fired.get());

        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let frame = gloo::render::request_animation_frame(move |_timestamp| {
            // marked after the callback so a request made inside it keeps this handle alive
            callback();
            flag.set(true);
        });
        self.frames.borrow_mut().insert(id, ScheduledFrame { _frame: frame, fired });
        id
    }

    fn cancel(&self, id: FrameId) {
        let removed = {
            let mut frames = self.frames.borrow_mut();
            match frames.get(&id) {
                Some(frame) if !frame.fired.get() => frames.remove(&id),
                _ => None,
            }
        };
        // dropping the handle cancels the browser callback
        drop(removed);
    }
}

/// Queue of callbacks run on demand.
#[derive(Default)]
pub struct ManualFrameScheduler {
    next_id: Cell<FrameId>,
    queue: RefCell<Vec<(FrameId, Box<dyn FnOnce()>)>>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run every callback queued so far. Callbacks may schedule new frames;
    /// those wait for the next call.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut *self.queue.borrow_mut());
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request(&self, callback: Box<dyn FnOnce()>) -> FrameId {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        self.queue.borrow_mut().push((id, callback));
        id
    }

    fn cancel(&self, id: FrameId) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != id);
    }
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for Rc<S> {
    fn request(&self, callback: Box<dyn FnOnce()>) -> FrameId {
        (**self).request(callback)
    }

    fn cancel(&self, id: FrameId) {
        (**self).cancel(id);
    }
}
