//! Thin timer plumbing over `window.setTimeout`: owned handles that cancel
//! on drop, and a debouncer for bursty events (search keystrokes, resize).

use wasm_bindgen::prelude::*;

/// An armed one-shot timer. Dropping the handle cancels the timeout, so a
/// `Vec<TimerHandle>` is a cancellable schedule.
pub struct TimerHandle {
	id: i32,
	// Keeps the callback alive until it fires or the handle drops.
	_closure: Closure<dyn FnMut()>,
}

impl TimerHandle {
	/// Arm a one-shot timer. Returns `None` outside a browser context.
	pub fn once(delay_ms: u32, callback: impl FnOnce() + 'static) -> Option<Self> {
		let window = web_sys::window()?;
		let closure = Closure::once(callback);
		let id = window
			.set_timeout_with_callback_and_timeout_and_arguments_0(
				closure.as_ref().unchecked_ref(),
				delay_ms as i32,
			)
			.ok()?;
		Some(Self {
			id,
			_closure: closure,
		})
	}
}

impl Drop for TimerHandle {
	fn drop(&mut self) {
		if let Some(window) = web_sys::window() {
			window.clear_timeout_with_handle(self.id);
		}
	}
}

/// Collapses a burst of calls into one, after a quiet period.
pub struct Debouncer {
	delay_ms: u32,
	pending: Option<TimerHandle>,
}

impl Debouncer {
	pub fn new(delay_ms: u32) -> Self {
		Self {
			delay_ms,
			pending: None,
		}
	}

	/// Schedule `callback`, replacing (and thereby cancelling) any pending
	/// call from an earlier burst.
	pub fn call(&mut self, callback: impl FnOnce() + 'static) {
		self.pending = TimerHandle::once(self.delay_ms, callback);
	}
}
