//! DOM binding for [`CanvasInput`]: canvas mouse/wheel listeners and the
//! window keyboard shortcuts, all removed again on [`CanvasSurface::detach`].

use crate::application::input::{CanvasInput, InputTarget};
use crate::domain::logging::{LogComponent, get_logger};
use crate::log_warn;
use gloo::events::{EventListener, EventListenerOptions};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent};

/// Canvas-local CSS pixel position of a mouse event.
fn local_position(canvas: &HtmlCanvasElement, event: &MouseEvent) -> (f64, f64) {
    let rect = canvas.get_bounding_client_rect();
    (event.client_x() as f64 - rect.left(), event.client_y() as f64 - rect.top())
}

pub struct CanvasSurface<T: InputTarget + 'static> {
    input: Rc<CanvasInput<T>>,
    listeners: Vec<EventListener>,
}

impl<T: InputTarget + 'static> CanvasSurface<T> {
    pub fn attach(canvas: &HtmlCanvasElement, input: Rc<CanvasInput<T>>) -> Self {
        let mut listeners = Vec::with_capacity(6);

        listeners.push(Self::mouse_listener(canvas, &input, "mousedown", |input, (x, y), event| {
            input.mouse_down(x, y, event.shift_key());
        }));
        listeners.push(Self::mouse_listener(canvas, &input, "mousemove", |input, (x, y), _| {
            input.mouse_move(x, y);
        }));
        listeners.push(Self::mouse_listener(canvas, &input, "mouseup", |input, (x, y), _| {
            input.mouse_up(x, y);
        }));

        let leave_input = Rc::clone(&input);
        listeners.push(EventListener::new(canvas, "mouseleave", move |_| leave_input.mouse_leave()));

        let wheel_input = Rc::clone(&input);
        let wheel_canvas = canvas.clone();
        listeners.push(EventListener::new_with_options(
            canvas,
            "wheel",
            EventListenerOptions::enable_prevent_default(),
            move |event: &Event| {
                let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                event.prevent_default();
                let (x, _) = local_position(&wheel_canvas, wheel);
                wheel_input.wheel(x, wheel.delta_y());
            },
        ));

        // shortcuts are global so they work without canvas focus
        match web_sys::window() {
            Some(window) => {
                let key_input = Rc::clone(&input);
                listeners.push(EventListener::new_with_options(
                    &window,
                    "keydown",
                    EventListenerOptions::enable_prevent_default(),
                    move |event: &Event| {
                        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
                            return;
                        };
                        if key_input.key_down(&key.key(), key.ctrl_key() || key.meta_key()) {
                            event.prevent_default();
                        }
                    },
                ));
            }
            None => log_warn!(LogComponent::Presentation("CanvasSurface"), "no window, keyboard shortcuts disabled"),
        }

        get_logger().debug(LogComponent::Presentation("CanvasSurface"), "listeners attached");
        Self { input, listeners }
    }

    fn mouse_listener(
        canvas: &HtmlCanvasElement,
        input: &Rc<CanvasInput<T>>,
        name: &'static str,
        handler: impl Fn(&CanvasInput<T>, (f64, f64), &MouseEvent) + 'static,
    ) -> EventListener {
        let input = Rc::clone(input);
        let target = canvas.clone();
        EventListener::new(canvas, name, move |event: &Event| {
            if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
                handler(&input, local_position(&target, mouse), mouse);
            }
        })
    }

    pub fn input(&self) -> &Rc<CanvasInput<T>> {
        &self.input
    }

    /// Remove every listener and cancel queued input frames.
    pub fn detach(&mut self) {
        self.listeners.clear();
        self.input.teardown();
    }
}

impl<T: InputTarget + 'static> Drop for CanvasSurface<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
