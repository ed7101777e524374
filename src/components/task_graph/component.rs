use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent, TouchEvent,
	WheelEvent, Window,
};

use super::interaction::Event as GraphEvent;
use super::render;
use super::state::{GraphState, UiEffect};
use super::store::TemplateStore;
use super::timers::{Debouncer, TimerHandle};
use super::tour::{ScheduledCommand, TourStep};
use super::types::{GraphSetupError, Template};

const SEARCH_DEBOUNCE_MS: u32 = 250;
const RESIZE_DEBOUNCE_MS: u32 = 200;

type SharedState = Rc<RefCell<Option<GraphState>>>;
type TourTimers = Rc<RefCell<Vec<TimerHandle>>>;

#[derive(Clone, PartialEq)]
struct TooltipView {
	label: String,
	layer: u32,
	x: f64,
	y: f64,
}

#[derive(Clone, PartialEq)]
struct DetailView {
	title: String,
	body: String,
	layer: u32,
	cycle_member: bool,
}

/// The DOM-facing signals one `UiEffect` batch can touch.
#[derive(Clone, Copy)]
struct UiSignals {
	tooltip: RwSignal<Option<TooltipView>>,
	details: RwSignal<Option<DetailView>>,
	caption: RwSignal<Option<String>>,
	search_text: RwSignal<String>,
	tour_active: RwSignal<bool>,
}

fn apply_ui_effects(state: &GraphState, effects: Vec<UiEffect>, ui: UiSignals) {
	for effect in effects {
		match effect {
			UiEffect::ShowTooltip(idx) => {
				let node = &state.graph.nodes[idx];
				let body = state.sim.body(idx);
				ui.tooltip.set(Some(TooltipView {
					label: node.label.clone(),
					layer: node.layer,
					x: body.x * state.camera.k + state.camera.x,
					y: body.y * state.camera.k + state.camera.y,
				}));
			}
			UiEffect::HideTooltip => ui.tooltip.set(None),
			UiEffect::OpenDetails(idx) => {
				let node = &state.graph.nodes[idx];
				ui.details.set(Some(DetailView {
					title: node.label.clone(),
					body: node.detail.clone(),
					layer: node.layer,
					cycle_member: node.cycle_member,
				}));
			}
			UiEffect::CloseDetails => ui.details.set(None),
			UiEffect::ShowCaption(text) => ui.caption.set(Some(text)),
			UiEffect::HideCaption => ui.caption.set(None),
			UiEffect::SetSearchText(text) => ui.search_text.set(text),
		}
	}
}

/// Run a state mutation and apply whatever UI effects fall out, without
/// holding the state borrow across the signal writes.
fn dispatch(
	state_rc: &SharedState,
	ui: UiSignals,
	f: impl FnOnce(&mut GraphState) -> Vec<UiEffect>,
) {
	let effects = {
		let mut guard = state_rc.borrow_mut();
		let Some(state) = guard.as_mut() else { return };
		f(state)
	};
	if effects.is_empty() {
		return;
	}
	if let Some(state) = state_rc.borrow().as_ref() {
		apply_ui_effects(state, effects, ui);
	}
}

fn execute_tour_command_now(
	command: &super::tour::TourCommand,
	state_rc: &SharedState,
	ui: UiSignals,
	generation: u64,
) {
	let effects = {
		let mut guard = state_rc.borrow_mut();
		let Some(state) = guard.as_mut() else { return };
		// A timer from a superseded step must not touch shared state.
		if state.tour.generation() != generation {
			return;
		}
		state.execute_tour_command(command)
	};
	if let Some(state) = state_rc.borrow().as_ref() {
		apply_ui_effects(state, effects, ui);
	}
}

/// Cancel whatever the previous step scheduled and arm the new schedule.
fn arm_tour_commands(
	commands: Vec<ScheduledCommand>,
	state_rc: &SharedState,
	timers: &TourTimers,
	ui: UiSignals,
) {
	timers.borrow_mut().clear();
	let generation = match state_rc.borrow().as_ref() {
		Some(state) => state.tour.generation(),
		None => return,
	};
	for scheduled in commands {
		if scheduled.delay_ms == 0 {
			execute_tour_command_now(&scheduled.command, state_rc, ui, generation);
			continue;
		}
		let (state_rc, command) = (state_rc.clone(), scheduled.command);
		let handle = TimerHandle::once(scheduled.delay_ms, move || {
			execute_tour_command_now(&command, &state_rc, ui, generation);
		});
		if let Some(handle) = handle {
			timers.borrow_mut().push(handle);
		}
	}
}

/// Run a tour transition (start/next/end) and arm its schedule.
fn run_tour_transition(
	state_rc: &SharedState,
	timers: &TourTimers,
	ui: UiSignals,
	f: impl FnOnce(&mut GraphState) -> Vec<ScheduledCommand>,
) {
	let commands = {
		let mut guard = state_rc.borrow_mut();
		let Some(state) = guard.as_mut() else { return };
		let commands = f(state);
		ui.tour_active.set(state.tour.is_active());
		commands
	};
	arm_tour_commands(commands, state_rc, timers, ui);
}

fn pointer_position(canvas_ref: NodeRef<leptos::html::Canvas>, cx: f64, cy: f64) -> (f64, f64) {
	let Some(canvas) = canvas_ref.get_untracked() else {
		return (cx, cy);
	};
	let canvas: HtmlCanvasElement = canvas.into();
	let rect = canvas.get_bounding_client_rect();
	(cx - rect.left(), cy - rect.top())
}

/// Interactive canvas for a layered node/edge template: physics layout with
/// band constraints, hover/pin/drag/search interaction, and a scripted tour.
#[component]
pub fn TaskGraphCanvas(
	#[prop(into)] data: Signal<Template>,
	/// Externally supplied tour steps; inline template steps take precedence.
	#[prop(default = None)] tour_steps: Option<Vec<TourStep>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let store: Rc<RefCell<TemplateStore>> = Rc::new(RefCell::new(TemplateStore::default()));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_debounce = Rc::new(RefCell::new(Debouncer::new(RESIZE_DEBOUNCE_MS)));
	let search_debounce = Rc::new(RefCell::new(Debouncer::new(SEARCH_DEBOUNCE_MS)));
	let tour_timers: TourTimers = Rc::new(RefCell::new(Vec::new()));
	let loop_started = Rc::new(Cell::new(false));
	let external_steps = Rc::new(tour_steps);

	let error: RwSignal<Option<String>> = RwSignal::new(None);
	let ui = UiSignals {
		tooltip: RwSignal::new(None),
		details: RwSignal::new(None),
		caption: RwSignal::new(None),
		search_text: RwSignal::new(String::new()),
		tour_active: RwSignal::new(false),
	};

	let (state_init, store_init, animate_init, resize_cb_init) = (
		state.clone(),
		store.clone(),
		animate.clone(),
		resize_cb.clone(),
	);
	let (resize_debounce_init, loop_started_init, external_steps_init, timers_init) = (
		resize_debounce.clone(),
		loop_started.clone(),
		external_steps.clone(),
		tour_timers.clone(),
	);

	Effect::new(move |_| {
		let template = data.get();
		let Some(canvas) = canvas_ref.get() else {
			error.set(Some(GraphSetupError::MissingContainer.to_string()));
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let window: Window = match web_sys::window() {
			Some(w) => w,
			None => return,
		};

		let (w, h) = if fullscreen {
			(
				window
					.inner_width()
					.ok()
					.and_then(|v| v.as_f64())
					.unwrap_or(800.0),
				window
					.inner_height()
					.ok()
					.and_then(|v| v.as_f64())
					.unwrap_or(600.0),
			)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = match canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		{
			Some(ctx) => ctx,
			None => {
				error.set(Some(GraphSetupError::MissingContainer.to_string()));
				return;
			}
		};

		// Load through the store so the layer assignment is computed once
		// and cached with the template.
		let mut store_guard = store_init.borrow_mut();
		let loaded = store_guard.load(template);
		match GraphState::new(
			&loaded.template,
			&loaded.layers,
			external_steps_init.as_deref(),
			w,
			h,
		) {
			Ok(graph_state) => {
				*state_init.borrow_mut() = Some(graph_state);
				error.set(None);
			}
			Err(e) => {
				*state_init.borrow_mut() = None;
				error.set(Some(e.to_string()));
				return;
			}
		}
		drop(store_guard);

		if fullscreen && resize_cb_init.borrow().is_none() {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			let debounce = resize_debounce_init.clone();
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let (state_resize, canvas_resize) = (state_resize.clone(), canvas_resize.clone());
				debounce.borrow_mut().call(move || {
					let Some(win) = web_sys::window() else { return };
					let (nw, nh) = (
						win.inner_width()
							.ok()
							.and_then(|v| v.as_f64())
							.unwrap_or(800.0),
						win.inner_height()
							.ok()
							.and_then(|v| v.as_f64())
							.unwrap_or(600.0),
					);
					canvas_resize.set_width(nw as u32);
					canvas_resize.set_height(nh as u32);
					if let Some(ref mut s) = *state_resize.borrow_mut() {
						s.resize(nw, nh);
					}
				});
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		// One render loop no matter how many times the template reloads.
		if !loop_started_init.get() {
			loop_started_init.set(true);
			let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
			let timers_anim = timers_init.clone();
			*animate_init.borrow_mut() = Some(Closure::new(move || {
				// A tour start deferred on stability leaves its schedule
				// behind; arm it only after the borrow is released.
				let pending = {
					let mut guard = state_anim.borrow_mut();
					match guard.as_mut() {
						Some(s) => {
							s.tick(0.016);
							render::render(s, &ctx);
							s.take_pending_tour_commands()
						}
						None => None,
					}
				};
				if let Some(commands) = pending {
					arm_tour_commands(commands, &state_anim, &timers_anim, ui);
					let active = state_anim
						.borrow()
						.as_ref()
						.is_some_and(|s| s.tour.is_active());
					ui.tour_active.set(active);
				}
				if let Some(ref cb) = *animate_inner.borrow() {
					if let Some(win) = web_sys::window() {
						let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
					}
				}
			}));
			if let Some(ref cb) = *animate_init.borrow() {
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let (x, y) = pointer_position(canvas_ref, ev.client_x() as f64, ev.client_y() as f64);
		let now = js_sys::Date::now();
		dispatch(&state_md, ui, |s| {
			if let Some(idx) = s.node_at_position(x, y) {
				s.begin_drag(idx, x, y, now)
			} else {
				s.pan.active = true;
				s.pan.start_x = x;
				s.pan.start_y = y;
				s.pan.camera_start_x = s.camera.x;
				s.pan.camera_start_y = s.camera.y;
				Vec::new()
			}
		});
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let (x, y) = pointer_position(canvas_ref, ev.client_x() as f64, ev.client_y() as f64);
		dispatch(&state_mm, ui, |s| {
			if s.drag.is_some() {
				s.drag_to(x, y);
				return Vec::new();
			}
			if s.pan.active {
				s.camera.x = s.pan.camera_start_x + (x - s.pan.start_x);
				s.camera.y = s.pan.camera_start_y + (y - s.pan.start_y);
				return Vec::new();
			}
			let hovered = s.node_at_position(x, y);
			if hovered == s.interaction.hovered() {
				return Vec::new();
			}
			let mut effects = Vec::new();
			if let Some(old) = s.interaction.hovered() {
				effects.extend(s.apply_event(GraphEvent::HoverOut(old)));
			}
			if let Some(new) = hovered {
				effects.extend(s.apply_event(GraphEvent::HoverIn(new)));
			}
			effects
		});
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		let now = js_sys::Date::now();
		dispatch(&state_mu, ui, |s| {
			s.pan.active = false;
			s.end_drag(now)
		});
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		let now = js_sys::Date::now();
		dispatch(&state_ml, ui, |s| {
			s.pan.active = false;
			let mut effects = s.end_drag(now);
			if let Some(old) = s.interaction.hovered() {
				effects.extend(s.apply_event(GraphEvent::HoverOut(old)));
			}
			effects
		});
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let (x, y) = pointer_position(canvas_ref, ev.client_x() as f64, ev.client_y() as f64);
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			let new_k = (s.camera.k * factor).clamp(0.1, 10.0);
			let ratio = new_k / s.camera.k;
			s.camera.x = x - (x - s.camera.x) * ratio;
			s.camera.y = y - (y - s.camera.y) * ratio;
			s.camera.k = new_k;
		}
	};

	let state_ts = state.clone();
	let on_touchstart = move |ev: TouchEvent| {
		let Some(touch) = ev.touches().item(0) else {
			return;
		};
		let (x, y) = pointer_position(canvas_ref, touch.client_x() as f64, touch.client_y() as f64);
		let now = js_sys::Date::now();
		dispatch(&state_ts, ui, |s| {
			match s.node_at_position(x, y) {
				Some(idx) => s.begin_drag(idx, x, y, now),
				None => Vec::new(),
			}
		});
	};

	let state_tm = state.clone();
	let on_touchmove = move |ev: TouchEvent| {
		let Some(touch) = ev.touches().item(0) else {
			return;
		};
		let (x, y) = pointer_position(canvas_ref, touch.client_x() as f64, touch.client_y() as f64);
		let mut guard = state_tm.borrow_mut();
		if let Some(ref mut s) = *guard {
			if s.drag.is_some() {
				ev.prevent_default();
				s.drag_to(x, y);
			}
		}
	};

	// Tap-end either activates (short, still press) or just releases.
	let state_te = state.clone();
	let on_touchend = move |_: TouchEvent| {
		let now = js_sys::Date::now();
		dispatch(&state_te, ui, |s| s.end_drag(now));
	};

	let (state_kd, timers_kd) = (state.clone(), tour_timers.clone());
	let on_keydown = move |ev: KeyboardEvent| {
		match ev.key().as_str() {
			"Escape" => {
				let active = state_kd
					.borrow()
					.as_ref()
					.is_some_and(|s| s.tour.is_active());
				if active {
					run_tour_transition(&state_kd, &timers_kd, ui, |s| s.end_tour());
				} else {
					dispatch(&state_kd, ui, |s| s.apply_event(GraphEvent::Reset));
				}
			}
			"Enter" | " " => {
				ev.prevent_default();
				dispatch(&state_kd, ui, |s| {
					match s.interaction.hovered() {
						Some(idx) => s.apply_event(GraphEvent::Activate(idx)),
						None => Vec::new(),
					}
				});
			}
			"Tab" => {
				// Roam keyboard focus through the nodes as a temporary
				// interaction, same as hover.
				ev.prevent_default();
				dispatch(&state_kd, ui, |s| {
					let count = s.graph.nodes.len();
					if count == 0 {
						return Vec::new();
					}
					let next = match s.interaction.hovered() {
						Some(idx) if ev.shift_key() => (idx + count - 1) % count,
						Some(idx) => (idx + 1) % count,
						None => 0,
					};
					let mut effects = Vec::new();
					if let Some(old) = s.interaction.hovered() {
						effects.extend(s.apply_event(GraphEvent::HoverOut(old)));
					}
					effects.extend(s.apply_event(GraphEvent::HoverIn(next)));
					effects
				});
			}
			_ => {}
		}
	};

	let (state_si, search_debounce_si) = (state.clone(), search_debounce.clone());
	let on_search_input = move |ev: web_sys::Event| {
		let query = event_target_value(&ev);
		ui.search_text.set(query.clone());
		let state_si = state_si.clone();
		search_debounce_si.borrow_mut().call(move || {
			dispatch(&state_si, ui, |s| {
				if query.trim().is_empty() {
					s.apply_event(GraphEvent::ClearSearch)
				} else {
					s.apply_event(GraphEvent::Search(query.clone()))
				}
			});
		});
	};

	let (state_tour, timers_tour) = (state.clone(), tour_timers.clone());
	let on_tour_start = move |_: MouseEvent| {
		run_tour_transition(&state_tour, &timers_tour, ui, |s| s.start_tour());
	};
	let (state_next, timers_next) = (state.clone(), tour_timers.clone());
	let on_tour_next = move |_: MouseEvent| {
		run_tour_transition(&state_next, &timers_next, ui, |s| s.next_tour());
	};
	let (state_end, timers_end) = (state.clone(), tour_timers.clone());
	let on_tour_end = move |_: MouseEvent| {
		run_tour_transition(&state_end, &timers_end, ui, |s| s.end_tour());
	};

	let state_reset = state.clone();
	let on_reset = move |_: MouseEvent| {
		ui.search_text.set(String::new());
		dispatch(&state_reset, ui, |s| s.apply_event(GraphEvent::Reset));
	};

	let state_close = state.clone();
	let on_close_details = move |_: MouseEvent| {
		dispatch(&state_close, ui, |s| s.hide_node_details());
	};

	view! {
		<div class="task-graph" style="position: relative;">
			{move || {
				error
					.get()
					.map(|e| view! { <div class="graph-error">"Could not render graph: " {e}</div> })
			}}
			<canvas
				node_ref=canvas_ref
				class="task-graph-canvas"
				tabindex="0"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				on:touchstart=on_touchstart
				on:touchmove=on_touchmove
				on:touchend=on_touchend
				on:keydown=on_keydown
				style="display: block; cursor: grab;"
			/>
			<div class="graph-toolbar">
				<input
					class="graph-search"
					type="search"
					placeholder="Search nodes"
					prop:value=move || ui.search_text.get()
					on:input=on_search_input
				/>
				<button class="graph-reset" on:click=on_reset>
					"Reset view"
				</button>
				// The tour buttons stay mounted with reactive visibility: their
				// handlers capture Rc state, which cannot move into a reactive
				// render closure (those must be Send).
				<button
					class="tour-start"
					style:display=move || if ui.tour_active.get() { "none" } else { "inline-block" }
					on:click=on_tour_start
				>
					"Tour"
				</button>
				<button
					class="tour-next"
					style:display=move || if ui.tour_active.get() { "inline-block" } else { "none" }
					on:click=on_tour_next
				>
					"Next"
				</button>
				<button
					class="tour-skip"
					style:display=move || if ui.tour_active.get() { "inline-block" } else { "none" }
					on:click=on_tour_end
				>
					"Skip tour"
				</button>
			</div>
			{move || {
				ui.tooltip
					.get()
					.map(|t| {
						view! {
							<div
								class="graph-tooltip"
								style=format!(
									"position: absolute; left: {}px; top: {}px; pointer-events: none;",
									t.x + 12.0,
									t.y - 12.0,
								)
							>
								<strong>{t.label}</strong>
								<span class="tooltip-layer">{format!(" · layer {}", t.layer)}</span>
							</div>
						}
					})
			}}
			<aside
				class="graph-details"
				style:display=move || if ui.details.get().is_some() { "block" } else { "none" }
			>
				<header>
					<h2>{move || ui.details.get().map(|d| d.title)}</h2>
					<button class="details-close" on:click=on_close_details>
						"×"
					</button>
				</header>
				{move || {
					ui.details
						.get()
						.map(|d| {
							view! {
								<div class="details-content">
									<p class="details-layer">{format!("Layer {}", d.layer)}</p>
									{d
										.cycle_member
										.then(|| {
											view! {
												<p class="details-cycle-warning">
													"Part of a dependency cycle"
												</p>
											}
										})}
									<p class="details-body">{d.body}</p>
								</div>
							}
						})
				}}
			</aside>
			{move || {
				ui.caption
					.get()
					.map(|text| view! { <div class="tour-caption">{text}</div> })
			}}
		</div>
	}
}
