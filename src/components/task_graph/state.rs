//! `GraphState` owns the prepared graph and the per-phase owners around it:
//! simulator (positions), interaction machine (visual flags), tour engine,
//! and the camera. The component layer is DOM glue over this struct.

use super::interaction::{Effect, Event, InteractionState, NodeVisual};
use super::layers::LayerAssignment;
use super::prepare::{PreparedGraph, prepare_graph};
use super::sim::Simulation;
use super::tour::{ScheduledCommand, TourCommand, TourEngine, TourStep, resolve_steps};
use super::types::{GraphSetupError, Template};

const FOCUS_ZOOM: f64 = 1.6;
const CAMERA_ANIM_S: f64 = 0.6;
const FOCUS_HIGHLIGHT_S: f64 = 1.5;
const HIT_SLOP: f64 = 4.0;

/// View transform: screen = graph * k + (x, y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for Camera {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

struct CameraAnimation {
	from: Camera,
	to: Camera,
	t: f64,
}

fn smoothstep(t: f64) -> f64 {
	t * t * (3.0 - 2.0 * t)
}

/// Pointer-drag bookkeeping for one node, used for tap classification.
#[derive(Clone, Copy, Debug)]
pub struct DragTracking {
	pub idx: usize,
	pub start_sx: f64,
	pub start_sy: f64,
	pub start_ms: f64,
	node_start_x: f64,
	node_start_y: f64,
	moved_px: f64,
}

/// Background-pan bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub camera_start_x: f64,
	pub camera_start_y: f64,
}

/// Effects left over for the DOM layer after `GraphState` has handled the
/// camera- and simulation-facing ones itself.
#[derive(Clone, Debug, PartialEq)]
pub enum UiEffect {
	ShowTooltip(usize),
	HideTooltip,
	OpenDetails(usize),
	CloseDetails,
	ShowCaption(String),
	HideCaption,
	SetSearchText(String),
}

type StableCallback = Box<dyn FnOnce(&mut GraphState)>;

/// The whole interactive graph, one owner per phase.
pub struct GraphState {
	pub graph: PreparedGraph,
	pub sim: Simulation,
	pub interaction: InteractionState,
	pub tour: TourEngine,
	pub camera: Camera,
	camera_anim: Option<CameraAnimation>,
	pub drag: Option<DragTracking>,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	on_stable: Vec<StableCallback>,
	/// Transient post-focus highlight: node index and decaying intensity.
	pub focus_highlight: Option<(usize, f64)>,
	/// Node the tour's simulated cursor sits on.
	pub tour_cursor: Option<usize>,
	/// A requested tour start waiting for the layout to settle.
	tour_start_pending: bool,
	/// Schedule produced by a deferred tour start, for the host to arm.
	pending_tour_commands: Option<Vec<ScheduledCommand>>,
}

impl GraphState {
	/// Build the full pipeline for a loaded template. `external_steps` is
	/// the optional externally supplied tour; inline config steps win.
	pub fn new(
		template: &Template,
		layers: &LayerAssignment,
		external_steps: Option<&[TourStep]>,
		width: f64,
		height: f64,
	) -> Result<Self, GraphSetupError> {
		let graph = prepare_graph(template, layers)?;
		let sim = Simulation::new(&graph, width, height);
		let mut tour = TourEngine::default();
		tour.set_steps(resolve_steps(
			template.config.tour.as_deref(),
			external_steps,
			&graph,
			&template.tasks,
			layers,
		));
		Ok(Self {
			graph,
			sim,
			interaction: InteractionState::default(),
			tour,
			camera: Camera::default(),
			camera_anim: None,
			drag: None,
			pan: PanState::default(),
			width,
			height,
			on_stable: Vec::new(),
			focus_highlight: None,
			tour_cursor: None,
			tour_start_pending: false,
			pending_tour_commands: None,
		})
	}

	/// One frame: advance the simulation, drain stability callbacks, and
	/// step camera/highlight animations. `dt` is in seconds.
	pub fn tick(&mut self, dt: f64) {
		self.sim.tick();
		if self.sim.is_stable() && !self.on_stable.is_empty() {
			let callbacks = std::mem::take(&mut self.on_stable);
			for callback in callbacks {
				callback(self);
			}
		}

		if let Some(anim) = &mut self.camera_anim {
			anim.t = (anim.t + dt / CAMERA_ANIM_S).min(1.0);
			let e = smoothstep(anim.t);
			self.camera = Camera {
				x: anim.from.x + (anim.to.x - anim.from.x) * e,
				y: anim.from.y + (anim.to.y - anim.from.y) * e,
				k: anim.from.k + (anim.to.k - anim.from.k) * e,
			};
			if anim.t >= 1.0 {
				self.camera_anim = None;
			}
		}

		if let Some((_, intensity)) = &mut self.focus_highlight {
			*intensity -= dt / FOCUS_HIGHLIGHT_S;
			if *intensity <= 0.0 {
				self.focus_highlight = None;
			}
		}
	}

	/// One-shot stability hook; runs immediately if the layout is already
	/// settled, otherwise once alpha decays below threshold.
	pub fn on_stable(&mut self, callback: impl FnOnce(&mut GraphState) + 'static) {
		if self.sim.is_stable() {
			callback(self);
		} else {
			self.on_stable.push(Box::new(callback));
		}
	}

	/// Animate the camera to center and zoom on a node, once the layout has
	/// settled, and apply a transient highlight.
	pub fn focus_on_node(&mut self, id: &str) {
		if let Some(idx) = self.graph.index_of(id) {
			self.focus_on_index(idx);
		} else {
			log::warn!("focus requested for unknown node {id:?}");
		}
	}

	pub fn focus_on_index(&mut self, idx: usize) {
		self.on_stable(move |state| state.begin_focus(idx));
	}

	fn begin_focus(&mut self, idx: usize) {
		let body = self.sim.body(idx);
		let to = Camera {
			x: self.width / 2.0 - body.x * FOCUS_ZOOM,
			y: self.height / 2.0 - body.y * FOCUS_ZOOM,
			k: FOCUS_ZOOM,
		};
		self.animate_camera(to);
		self.focus_highlight = Some((idx, 1.0));
	}

	pub fn reset_camera(&mut self) {
		self.animate_camera(Camera::default());
	}

	fn animate_camera(&mut self, to: Camera) {
		self.camera_anim = Some(CameraAnimation {
			from: self.camera,
			to,
			t: 0.0,
		});
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.camera.x) / self.camera.k,
			(sy - self.camera.y) / self.camera.k,
		)
	}

	/// Paint order for nodes: faded first, then neutral, highlighted on top.
	/// Hit testing walks the same order so the visibly topmost node wins.
	pub fn draw_order(&self) -> Vec<usize> {
		let mut order: Vec<usize> = (0..self.graph.nodes.len()).collect();
		order.sort_by_key(|&i| {
			(
				!self.interaction.is_faded(i),
				self.interaction.visual(i) != NodeVisual::Neutral
					|| self.interaction.is_search_match(i),
			)
		});
		order
	}

	/// Topmost node under a screen position, using the rendered radius plus
	/// a small slop so small nodes stay hittable.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		self.draw_order().into_iter().rev().find(|&i| {
			let body = self.sim.body(i);
			let (dx, dy) = (body.x - gx, body.y - gy);
			let hit = self.graph.nodes[i].radius + HIT_SLOP;
			dx * dx + dy * dy <= hit * hit
		})
	}

	/// Run an interaction event, carrying out simulation- and camera-facing
	/// effects here and handing the DOM-facing remainder to the caller.
	pub fn apply_event(&mut self, event: Event) -> Vec<UiEffect> {
		let effects = self.interaction.apply(event, &self.graph);
		let mut ui = Vec::new();
		for effect in effects {
			match effect {
				Effect::FixPosition(idx) => {
					let body = self.sim.body(idx);
					self.sim.fix(idx, body.x, body.y);
				}
				Effect::ReleasePosition(idx) => {
					self.sim.release(idx);
					self.sim.reheat();
				}
				Effect::FocusNode(idx) => self.focus_on_index(idx),
				Effect::ResetCamera => self.reset_camera(),
				Effect::ShowTooltip(idx) => ui.push(UiEffect::ShowTooltip(idx)),
				Effect::HideTooltip => ui.push(UiEffect::HideTooltip),
				Effect::OpenDetails(idx) => ui.push(UiEffect::OpenDetails(idx)),
				Effect::CloseDetails => ui.push(UiEffect::CloseDetails),
			}
		}
		ui
	}

	/// Pin a node and open its detail view.
	pub fn show_node_details(&mut self, id: &str) -> Vec<UiEffect> {
		match self.graph.index_of(id) {
			Some(idx) => self.apply_event(Event::Activate(idx)),
			None => Vec::new(),
		}
	}

	/// Release the pin and close the detail view.
	pub fn hide_node_details(&mut self) -> Vec<UiEffect> {
		self.apply_event(Event::Dismiss)
	}

	pub fn begin_drag(&mut self, idx: usize, sx: f64, sy: f64, now_ms: f64) -> Vec<UiEffect> {
		let body = self.sim.body(idx);
		self.drag = Some(DragTracking {
			idx,
			start_sx: sx,
			start_sy: sy,
			start_ms: now_ms,
			node_start_x: body.x,
			node_start_y: body.y,
			moved_px: 0.0,
		});
		self.apply_event(Event::DragStart(idx))
	}

	pub fn drag_to(&mut self, sx: f64, sy: f64) {
		let Some(drag) = &mut self.drag else { return };
		let dx = (sx - drag.start_sx) / self.camera.k;
		let dy = (sy - drag.start_sy) / self.camera.k;
		// Track the peak displacement: a drag that swings out and returns
		// near its origin is still a drag, not a tap.
		drag.moved_px = drag
			.moved_px
			.max((sx - drag.start_sx).hypot(sy - drag.start_sy));
		let (nx, ny) = (drag.node_start_x + dx, drag.node_start_y + dy);
		let idx = drag.idx;
		self.sim.fix(idx, nx, ny);
	}

	/// Finish a drag. Movement under the tap thresholds reclassifies the
	/// gesture as a tap, so the pending click fires as an activation.
	pub fn end_drag(&mut self, now_ms: f64) -> Vec<UiEffect> {
		let Some(drag) = self.drag.take() else {
			return Vec::new();
		};
		let mut ui = self.apply_event(Event::DragEnd(drag.idx));
		if InteractionState::is_tap(drag.moved_px, now_ms - drag.start_ms) {
			ui.extend(self.apply_event(Event::Activate(drag.idx)));
		}
		ui
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.sim.resize(width, height);
	}

	/// Start the tour. On a hot layout the start is deferred through the
	/// stability queue so step demos never run while positions (and thus the
	/// camera's focus targets) are still moving; the resulting schedule is
	/// stashed for the host to collect via `take_pending_tour_commands`.
	pub fn start_tour(&mut self) -> Vec<ScheduledCommand> {
		if self.sim.is_stable() {
			return self.tour.start();
		}
		if !self.tour_start_pending {
			self.tour_start_pending = true;
			self.on_stable(|state| {
				if state.tour_start_pending {
					state.tour_start_pending = false;
					state.pending_tour_commands = Some(state.tour.start());
				}
			});
		}
		Vec::new()
	}

	/// Schedule left behind by a deferred tour start, if one fired since the
	/// last call. Drained by the render loop once the borrow is released.
	pub fn take_pending_tour_commands(&mut self) -> Option<Vec<ScheduledCommand>> {
		self.pending_tour_commands.take()
	}

	pub fn next_tour(&mut self) -> Vec<ScheduledCommand> {
		self.tour.next()
	}

	pub fn end_tour(&mut self) -> Vec<ScheduledCommand> {
		self.tour_start_pending = false;
		self.tour.end()
	}

	/// Carry out one tour command against the interaction machine and the
	/// camera. Caption and search-box updates go back to the DOM layer.
	pub fn execute_tour_command(&mut self, command: &TourCommand) -> Vec<UiEffect> {
		match command {
			TourCommand::FocusNode(id) => {
				self.focus_on_node(id);
				Vec::new()
			}
			TourCommand::ResetCamera => {
				self.reset_camera();
				Vec::new()
			}
			TourCommand::SimulateHover(id) => {
				let Some(idx) = self.graph.index_of(id) else {
					return Vec::new();
				};
				self.tour_cursor = Some(idx);
				self.apply_event(Event::HoverIn(idx))
			}
			TourCommand::SimulateClick(id) => {
				let Some(idx) = self.graph.index_of(id) else {
					return Vec::new();
				};
				self.tour_cursor = Some(idx);
				self.apply_event(Event::Activate(idx))
			}
			TourCommand::TypeSearch(query) => {
				let mut ui = vec![UiEffect::SetSearchText(query.clone())];
				ui.extend(self.apply_event(Event::Search(query.clone())));
				ui
			}
			TourCommand::ClearArtifacts => {
				self.tour_cursor = None;
				let mut ui = Vec::new();
				if let Some(hovered) = self.interaction.hovered() {
					ui.extend(self.apply_event(Event::HoverOut(hovered)));
				}
				ui.extend(self.apply_event(Event::Dismiss));
				if self.interaction.search_active() {
					ui.extend(self.apply_event(Event::ClearSearch));
					ui.push(UiEffect::SetSearchText(String::new()));
				}
				ui
			}
			TourCommand::ShowCaption(text) => vec![UiEffect::ShowCaption(text.clone())],
			TourCommand::HideCaption => vec![UiEffect::HideCaption],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::task_graph::layers::resolve_layers;
	use crate::components::task_graph::types::{
		LinkRecord, NodeKind, NodeRecord, PredecessorRef, TaskRecord,
	};

	fn template() -> Template {
		let node = |id: &str, layer: u32| NodeRecord {
			id: id.to_string(),
			label: format!("Task {id}"),
			kind: NodeKind::Parent,
			layer,
			parent_id: None,
			radius: None,
		};
		Template {
			nodes: vec![node("1", 0), node("2", 1)],
			links: vec![LinkRecord {
				source: "1".to_string(),
				target: "2".to_string(),
				kind_tag: "layering".to_string(),
			}],
			tasks: vec![
				TaskRecord {
					task_id: 1,
					predecessors: Vec::new(),
					priority: Default::default(),
					estimated_hours: 2.0,
				},
				TaskRecord {
					task_id: 2,
					predecessors: vec![PredecessorRef::Id(1)],
					priority: Default::default(),
					estimated_hours: 2.0,
				},
			],
			..Default::default()
		}
	}

	fn state() -> GraphState {
		let template = template();
		let layers = resolve_layers(&template.tasks);
		GraphState::new(&template, &layers, None, 800.0, 600.0).unwrap()
	}

	fn settle(state: &mut GraphState) {
		for _ in 0..2000 {
			if state.sim.is_stable() {
				return;
			}
			state.tick(0.016);
		}
		panic!("never stabilized");
	}

	#[test]
	fn empty_template_fails_setup() {
		let err = GraphState::new(
			&Template::default(),
			&LayerAssignment::default(),
			None,
			800.0,
			600.0,
		);
		assert!(err.is_err());
	}

	#[test]
	fn on_stable_defers_until_settled_then_fires_immediately() {
		let mut state = state();
		let fired = std::rc::Rc::new(std::cell::Cell::new(0));

		let f = fired.clone();
		state.on_stable(move |_| f.set(f.get() + 1));
		assert_eq!(fired.get(), 0, "layout is still hot");

		settle(&mut state);
		assert_eq!(fired.get(), 1);

		let f = fired.clone();
		state.on_stable(move |_| f.set(f.get() + 1));
		assert_eq!(fired.get(), 2, "already stable: invoked immediately");
	}

	#[test]
	fn focus_waits_for_stability_then_zooms_and_highlights() {
		let mut state = state();
		state.focus_on_node("2");
		assert_eq!(state.camera, Camera::default());

		settle(&mut state);
		for _ in 0..100 {
			state.tick(0.016);
		}
		assert!((state.camera.k - FOCUS_ZOOM).abs() < 1e-9);
		let body = state.sim.body(1);
		assert!((state.camera.x - (400.0 - body.x * FOCUS_ZOOM)).abs() < 1e-6);
		// The transient highlight decays away on its own.
		for _ in 0..200 {
			state.tick(0.016);
		}
		assert!(state.focus_highlight.is_none());
	}

	#[test]
	fn tap_drag_activates_and_long_drag_does_not() {
		let mut state = state();
		settle(&mut state);

		let ui = state.begin_drag(0, 100.0, 100.0, 1000.0);
		assert!(ui.contains(&UiEffect::ShowTooltip(0)));
		assert!(state.sim.body(0).fixed.is_some());

		state.drag_to(101.0, 101.0);
		let ui = state.end_drag(1100.0);
		assert!(ui.contains(&UiEffect::OpenDetails(0)), "tap opens details");
		assert!(state.sim.body(0).fixed.is_none());

		let _ = state.apply_event(Event::Dismiss);
		state.begin_drag(0, 100.0, 100.0, 2000.0);
		state.drag_to(180.0, 160.0);
		let ui = state.end_drag(2600.0);
		assert!(
			!ui.contains(&UiEffect::OpenDetails(0)),
			"real drags suppress the click"
		);
	}

	#[test]
	fn unique_search_match_triggers_focus() {
		let mut state = state();
		settle(&mut state);
		let _ = state.apply_event(Event::Search("task 2".to_string()));
		// The focus went through on_stable and started the camera move.
		for _ in 0..100 {
			state.tick(0.016);
		}
		assert!((state.camera.k - FOCUS_ZOOM).abs() < 1e-9);
		assert!(state.interaction.is_search_match(1));
		assert!(state.interaction.is_faded(0));
	}

	#[test]
	fn tour_commands_drive_interaction_and_cleanup_strips_artifacts() {
		let mut state = state();
		settle(&mut state);

		let ui = state.execute_tour_command(&TourCommand::SimulateHover("1".to_string()));
		assert!(ui.contains(&UiEffect::ShowTooltip(0)));
		assert_eq!(state.tour_cursor, Some(0));

		let ui = state.execute_tour_command(&TourCommand::SimulateClick("2".to_string()));
		assert!(ui.contains(&UiEffect::OpenDetails(1)));

		let ui = state.execute_tour_command(&TourCommand::TypeSearch("task".to_string()));
		assert!(ui.contains(&UiEffect::SetSearchText("task".to_string())));
		assert!(state.interaction.search_active());

		let ui = state.execute_tour_command(&TourCommand::ClearArtifacts);
		assert!(state.tour_cursor.is_none());
		assert!(!state.interaction.search_active());
		assert_eq!(state.interaction.pinned(), None);
		assert!(ui.contains(&UiEffect::CloseDetails));
		assert!(ui.contains(&UiEffect::SetSearchText(String::new())));
	}

	#[test]
	fn returning_drag_still_suppresses_the_click() {
		let mut state = state();
		settle(&mut state);
		state.begin_drag(0, 100.0, 100.0, 1000.0);
		// Swing 100px out, then come back next to the press origin.
		state.drag_to(200.0, 100.0);
		state.drag_to(101.0, 100.0);
		let ui = state.end_drag(1100.0);
		assert!(
			!ui.contains(&UiEffect::OpenDetails(0)),
			"peak displacement classifies this as a drag"
		);
	}

	#[test]
	fn hit_testing_matches_paint_order() {
		let node = |id: &str| NodeRecord {
			id: id.to_string(),
			label: format!("Task {id}"),
			kind: NodeKind::Parent,
			layer: 0,
			parent_id: None,
			radius: None,
		};
		let template = Template {
			nodes: vec![node("1"), node("2"), node("3")],
			..Default::default()
		};
		let mut state =
			GraphState::new(&template, &LayerAssignment::default(), None, 800.0, 600.0).unwrap();
		state.sim.fix(0, 200.0, 200.0);
		state.sim.fix(2, 200.0, 200.0);

		// In a neutral stack the last-painted node wins the hit.
		assert_eq!(state.node_at_position(200.0, 200.0), Some(2));

		// Hovering paints node 0 on top, so it must also win the hit.
		let _ = state.apply_event(Event::HoverIn(0));
		assert_eq!(state.node_at_position(200.0, 200.0), Some(0));
	}

	#[test]
	fn tour_start_waits_for_layout_stability() {
		let mut state = state();
		assert!(!state.sim.is_stable());

		let commands = state.start_tour();
		assert!(commands.is_empty(), "nothing to arm while the layout is hot");
		assert!(!state.tour.is_active());
		assert!(state.take_pending_tour_commands().is_none());

		settle(&mut state);
		let commands = state.take_pending_tour_commands().unwrap();
		assert!(state.tour.is_active());
		assert!(!commands.is_empty());
		// Once drained, the stash is empty until another deferred start.
		assert!(state.take_pending_tour_commands().is_none());
	}

	#[test]
	fn ending_before_stability_cancels_deferred_start() {
		let mut state = state();
		state.start_tour();
		state.end_tour();
		settle(&mut state);
		assert!(state.take_pending_tour_commands().is_none());
		assert!(!state.tour.is_active());
	}

	#[test]
	fn resize_reheats_the_layout() {
		let mut state = state();
		settle(&mut state);
		state.resize(400.0, 300.0);
		assert!(!state.sim.is_stable());
		assert_eq!((state.width, state.height), (400.0, 300.0));
	}
}
