use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// A `setTimeout` that owns its callback, so restarting or cancelling it never
/// leaks a closure.
pub struct Timeout {
    window: Window,
    callback: Closure<dyn FnMut()>,
    handle: Rc<Cell<Option<i32>>>,
}

impl Timeout {
    pub fn new(window: Window, mut on_fire: impl FnMut() + 'static) -> Self {
        let handle: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let handle_cb = Rc::clone(&handle);
        let callback = Closure::wrap(Box::new(move || {
            handle_cb.set(None);
            on_fire();
        }) as Box<dyn FnMut()>);
        Self {
            window,
            callback,
            handle,
        }
    }

    /// Cancels any pending run and schedules a new one `delay_ms` from now.
    pub fn restart(&self, delay_ms: i32) -> Result<(), JsValue> {
        self.cancel();
        let id = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                self.callback.as_ref().unchecked_ref(),
                delay_ms,
            )?;
        self.handle.set(Some(id));
        Ok(())
    }

    pub fn cancel(&self) {
        if let Some(id) = self.handle.take() {
            self.window.clear_timeout_with_handle(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        self.cancel();
    }
}
