//! Pointer, wheel and keyboard state machine for the chart canvas.
//!
//! DOM listeners forward raw coordinates here; hover and wheel payloads are
//! coalesced into latest-wins slots and flushed once per animation frame.

use super::scheduler::{FrameId, FrameScheduler};
use crate::domain::chart::RegionGestureEnd;
use crate::domain::logging::LogComponent;
use crate::log_debug;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Movement below this many pixels between press and release is a click.
pub const CLICK_SLOP_PX: f64 = 3.0;

/// Receiver of interpreted canvas gestures. Coordinates are CSS pixels
/// relative to the canvas.
pub trait InputTarget {
    /// Shift was held on press. Return true to start a region gesture.
    fn accept_region(&mut self, x: f64, y: f64) -> bool;
    fn region_update(&mut self, x: f64, y: f64);
    fn region_end(&mut self, gesture: RegionGestureEnd);
    fn pan(&mut self, dx: f64);
    fn zoom(&mut self, pixel_x: f64, dy: f64);
    fn hover(&mut self, x: f64, y: f64, is_dragging: bool);
    fn leave(&mut self);
    fn click(&mut self, x: f64, y: f64);
    fn escape(&mut self);
    fn undo(&mut self);
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    Dragging { last_x: f64, origin: (f64, f64), moved: bool },
    Region { start: (f64, f64), current: (f64, f64) },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HoverPayload {
    x: f64,
    y: f64,
    is_dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WheelPayload {
    x: f64,
    dy: f64,
}

#[derive(Debug)]
struct InputState {
    gesture: Gesture,
    hover: Option<HoverPayload>,
    hover_frame: Option<FrameId>,
    wheel: Option<WheelPayload>,
    wheel_frame: Option<FrameId>,
    torn_down: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self { gesture: Gesture::Idle, hover: None, hover_frame: None, wheel: None, wheel_frame: None, torn_down: false }
    }
}

pub struct CanvasInput<T: InputTarget + 'static> {
    state: Rc<RefCell<InputState>>,
    target: Rc<RefCell<T>>,
    scheduler: Rc<dyn FrameScheduler>,
}

impl<T: InputTarget + 'static> CanvasInput<T> {
    pub fn new(target: Rc<RefCell<T>>, scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self { state: Rc::new(RefCell::new(InputState::default())), target, scheduler }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state.borrow().gesture, Gesture::Dragging { .. })
    }

    pub fn is_selecting_region(&self) -> bool {
        matches!(self.state.borrow().gesture, Gesture::Region { .. })
    }

    fn live(&self) -> bool {
        !self.state.borrow().torn_down
    }

    pub fn mouse_down(&self, x: f64, y: f64, shift: bool) {
        if !self.live() {
            return;
        }
        let region = shift && self.target.borrow_mut().accept_region(x, y);
        self.state.borrow_mut().gesture = if region {
            Gesture::Region { start: (x, y), current: (x, y) }
        } else {
            Gesture::Dragging { last_x: x, origin: (x, y), moved: false }
        };
    }

    pub fn mouse_move(&self, x: f64, y: f64) {
        if !self.live() {
            return;
        }
        let gesture = self.state.borrow().gesture;
        match gesture {
            Gesture::Region { start, .. } => {
                self.state.borrow_mut().gesture = Gesture::Region { start, current: (x, y) };
                self.target.borrow_mut().region_update(x, y);
            }
            Gesture::Dragging { last_x, origin, moved } => {
                let moved = moved || (x - origin.0).hypot(y - origin.1) >= CLICK_SLOP_PX;
                self.state.borrow_mut().gesture = Gesture::Dragging { last_x: x, origin, moved };
                let dx = x - last_x;
                if dx != 0.0 {
                    self.target.borrow_mut().pan(dx);
                }
                self.queue_hover(HoverPayload { x, y, is_dragging: true });
            }
            Gesture::Idle => self.queue_hover(HoverPayload { x, y, is_dragging: false }),
        }
    }

    pub fn mouse_up(&self, x: f64, y: f64) {
        if !self.live() {
            return;
        }
        let gesture = std::mem::replace(&mut self.state.borrow_mut().gesture, Gesture::Idle);
        match gesture {
            Gesture::Region { start, .. } => {
                self.target.borrow_mut().region_end(RegionGestureEnd {
                    start_x: start.0,
                    start_y: start.1,
                    end_x: x,
                    end_y: y,
                    cancelled: false,
                });
            }
            Gesture::Dragging { moved: false, .. } => self.target.borrow_mut().click(x, y),
            Gesture::Dragging { .. } | Gesture::Idle => {}
        }
    }

    /// Pointer left the canvas: cancel a region, end a drag, drop a queued hover.
    pub fn mouse_leave(&self) {
        if !self.live() {
            return;
        }
        let (gesture, frame) = {
            let mut state = self.state.borrow_mut();
            state.hover = None;
            (std::mem::replace(&mut state.gesture, Gesture::Idle), state.hover_frame.take())
        };
        if let Some(id) = frame {
            self.scheduler.cancel(id);
        }
        let mut target = self.target.borrow_mut();
        if let Gesture::Region { start, current } = gesture {
            target.region_end(RegionGestureEnd {
                start_x: start.0,
                start_y: start.1,
                end_x: current.0,
                end_y: current.1,
                cancelled: true,
            });
        }
        target.leave();
    }

    pub fn wheel(&self, x: f64, dy: f64) {
        if !self.live() || dy == 0.0 || !dy.is_finite() {
            return;
        }
        let needs_frame = {
            let mut state = self.state.borrow_mut();
            state.wheel = Some(WheelPayload { x, dy });
            state.wheel_frame.is_none()
        };
        if needs_frame {
            let state = Rc::downgrade(&self.state);
            let target = Rc::downgrade(&self.target);
            let id = self.scheduler.request(Box::new(move || flush_wheel(&state, &target)));
            self.state.borrow_mut().wheel_frame = Some(id);
        }
    }

    /// Global key handling. Returns true when the key was consumed.
    pub fn key_down(&self, key: &str, ctrl_or_meta: bool) -> bool {
        if !self.live() {
            return false;
        }
        let mut target = self.target.borrow_mut();
        match key {
            "Escape" => target.escape(),
            "z" | "Z" if ctrl_or_meta => target.undo(),
            "0" if ctrl_or_meta => target.reset(),
            _ => return false,
        }
        true
    }

    fn queue_hover(&self, payload: HoverPayload) {
        let needs_frame = {
            let mut state = self.state.borrow_mut();
            state.hover = Some(payload);
            state.hover_frame.is_none()
        };
        if needs_frame {
            let state = Rc::downgrade(&self.state);
            let target = Rc::downgrade(&self.target);
            let id = self.scheduler.request(Box::new(move || flush_hover(&state, &target)));
            self.state.borrow_mut().hover_frame = Some(id);
        }
    }

    /// Cancel queued frames and drop pending payloads. Later events are ignored.
    pub fn teardown(&self) {
        let frames = {
            let mut state = self.state.borrow_mut();
            state.torn_down = true;
            state.hover = None;
            state.wheel = None;
            state.gesture = Gesture::Idle;
            [state.hover_frame.take(), state.wheel_frame.take()]
        };
        for id in frames.into_iter().flatten() {
            self.scheduler.cancel(id);
        }
    }
}

impl<T: InputTarget + 'static> Drop for CanvasInput<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn flush_hover<T: InputTarget>(state: &Weak<RefCell<InputState>>, target: &Weak<RefCell<T>>) {
    let (Some(state), Some(target)) = (state.upgrade(), target.upgrade()) else {
        return;
    };
    let payload = {
        let mut state = state.borrow_mut();
        state.hover_frame = None;
        state.hover.take()
    };
    let Some(payload) = payload else {
        return;
    };
    match target.try_borrow_mut() {
        Ok(mut target) => target.hover(payload.x, payload.y, payload.is_dragging),
        Err(_) => log_debug!(LogComponent::Application("CanvasInput"), "hover dropped, target busy"),
    }
}

fn flush_wheel<T: InputTarget>(state: &Weak<RefCell<InputState>>, target: &Weak<RefCell<T>>) {
    let (Some(state), Some(target)) = (state.upgrade(), target.upgrade()) else {
        return;
    };
    let payload = {
        let mut state = state.borrow_mut();
        state.wheel_frame = None;
        state.wheel.take()
    };
    let Some(payload) = payload else {
        return;
    };
    match target.try_borrow_mut() {
        Ok(mut target) => target.zoom(payload.x, payload.dy),
        Err(_) => log_debug!(LogComponent::Application("CanvasInput"), "wheel dropped, target busy"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::ManualFrameScheduler;

    #[derive(Default)]
    struct Recorder {
        accept: bool,
        calls: Vec<String>,
    }

    impl InputTarget for Recorder {
        fn accept_region(&mut self, _x: f64, _y: f64) -> bool {
            self.accept
        }
        fn region_update(&mut self, x: f64, y: f64) {
            self.calls.push(format!("region_update {x} {y}"));
        }
        fn region_end(&mut self, gesture: RegionGestureEnd) {
            self.calls.push(format!("region_end cancelled={}", gesture.cancelled));
        }
        fn pan(&mut self, dx: f64) {
            self.calls.push(format!("pan {dx}"));
        }
        fn zoom(&mut self, pixel_x: f64, dy: f64) {
            self.calls.push(format!("zoom {pixel_x} {dy}"));
        }
        fn hover(&mut self, x: f64, y: f64, is_dragging: bool) {
            self.calls.push(format!("hover {x} {y} {is_dragging}"));
        }
        fn leave(&mut self) {
            self.calls.push("leave".into());
        }
        fn click(&mut self, x: f64, y: f64) {
            self.calls.push(format!("click {x} {y}"));
        }
        fn escape(&mut self) {
            self.calls.push("escape".into());
        }
        fn undo(&mut self) {
            self.calls.push("undo".into());
        }
        fn reset(&mut self) {
            self.calls.push("reset".into());
        }
    }

    fn input(accept: bool) -> (CanvasInput<Recorder>, Rc<RefCell<Recorder>>, Rc<ManualFrameScheduler>) {
        let target = Rc::new(RefCell::new(Recorder { accept, calls: Vec::new() }));
        let scheduler = Rc::new(ManualFrameScheduler::new());
        (CanvasInput::new(target.clone(), scheduler.clone()), target, scheduler)
    }

    #[test]
    fn hover_is_flushed_once_per_frame() {
        let (input, target, scheduler) = input(false);
        input.mouse_move(1.0, 1.0);
        input.mouse_move(2.0, 2.0);
        input.mouse_move(3.0, 3.0);
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_frame();
        assert_eq!(target.borrow().calls, vec!["hover 3 3 false"]);
    }

    #[test]
    fn drag_pans_and_suppresses_click() {
        let (input, target, _) = input(false);
        input.mouse_down(10.0, 10.0, false);
        input.mouse_move(30.0, 10.0);
        input.mouse_up(30.0, 10.0);
        assert_eq!(target.borrow().calls, vec!["pan 20"]);
    }

    #[test]
    fn still_press_is_a_click() {
        let (input, target, _) = input(false);
        input.mouse_down(10.0, 10.0, false);
        input.mouse_move(11.0, 10.0);
        input.mouse_up(11.0, 10.0);
        assert_eq!(target.borrow().calls, vec!["pan 1", "click 11 10"]);
    }

    #[test]
    fn leave_cancels_region() {
        let (input, target, _) = input(true);
        input.mouse_down(0.0, 0.0, true);
        input.mouse_move(40.0, 40.0);
        input.mouse_leave();
        assert_eq!(target.borrow().calls, vec!["region_update 40 40", "region_end cancelled=true", "leave"]);
        assert!(!input.is_selecting_region());
    }

    #[test]
    fn refused_region_falls_back_to_drag() {
        let (input, _, _) = input(false);
        input.mouse_down(0.0, 0.0, true);
        assert!(input.is_dragging());
    }

    #[test]
    fn shortcuts() {
        let (input, target, _) = input(false);
        assert!(input.key_down("z", true));
        assert!(input.key_down("0", true));
        assert!(input.key_down("Escape", false));
        assert!(!input.key_down("z", false));
        assert_eq!(target.borrow().calls, vec!["undo", "reset", "escape"]);
    }

    #[test]
    fn teardown_cancels_frames() {
        let (input, target, scheduler) = input(false);
        input.mouse_move(1.0, 1.0);
        input.wheel(1.0, -10.0);
        input.teardown();
        assert_eq!(scheduler.pending(), 0);
        input.wheel(1.0, -10.0);
        assert_eq!(scheduler.run_frame(), 0);
        assert!(target.borrow().calls.is_empty());
    }
}
