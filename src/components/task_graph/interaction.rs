//! Interaction state machine: hover, pin, drag, and search states for nodes
//! and links, expressed as one transition function from events to effects so
//! every rule is testable off-DOM.

use std::collections::HashSet;

use super::prepare::PreparedGraph;

/// Movement under this many pixels can still count as a tap.
pub const TAP_SLOP_PX: f64 = 5.0;
/// Presses longer than this are drags, never taps.
pub const TAP_MAX_MS: f64 = 300.0;

/// Resolved visual state of one node. Exactly one node may be `Pinned`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeVisual {
	Neutral,
	Interacted,
	Neighbor,
	Pinned,
}

/// An input to the machine. Tap classification happens in the component:
/// a drag that ends within the tap thresholds is re-sent as `Activate`.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
	HoverIn(usize),
	HoverOut(usize),
	/// Click, tap, Enter, or Space on a node.
	Activate(usize),
	DragStart(usize),
	DragEnd(usize),
	/// Close the detail view and release the pin, keeping camera and search.
	Dismiss,
	Search(String),
	ClearSearch,
	/// Clear every flag and restore the default camera.
	Reset,
}

/// Side effects the caller must carry out; the machine only mutates flags.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
	ShowTooltip(usize),
	HideTooltip,
	OpenDetails(usize),
	CloseDetails,
	FixPosition(usize),
	ReleasePosition(usize),
	FocusNode(usize),
	ResetCamera,
}

/// All per-node interaction flags, owned in one place.
#[derive(Clone, Debug, Default)]
pub struct InteractionState {
	hovered: Option<usize>,
	hover_neighbors: HashSet<usize>,
	pinned: Option<usize>,
	pinned_neighbors: HashSet<usize>,
	dragging: Option<usize>,
	search_matches: Option<HashSet<usize>>,
}

impl InteractionState {
	/// Apply one event. Transitions are idempotent: re-entering the current
	/// state produces no effects and no flag churn.
	pub fn apply(&mut self, event: Event, graph: &PreparedGraph) -> Vec<Effect> {
		match event {
			Event::HoverIn(idx) => self.hover_in(idx, graph),
			Event::HoverOut(idx) => self.hover_out(idx),
			Event::Activate(idx) => self.activate(idx, graph),
			Event::DragStart(idx) => self.drag_start(idx, graph),
			Event::DragEnd(idx) => self.drag_end(idx),
			Event::Dismiss => self.dismiss(),
			Event::Search(query) => self.search(&query, graph),
			Event::ClearSearch => {
				self.search_matches = None;
				Vec::new()
			}
			Event::Reset => self.reset(),
		}
	}

	fn hover_in(&mut self, idx: usize, graph: &PreparedGraph) -> Vec<Effect> {
		// Hover is suppressed entirely while any node is pinned.
		if self.pinned.is_some() || self.hovered == Some(idx) {
			return Vec::new();
		}
		self.hovered = Some(idx);
		self.hover_neighbors = graph.adjacency.neighbors_of(idx).iter().copied().collect();
		vec![Effect::ShowTooltip(idx)]
	}

	fn hover_out(&mut self, idx: usize) -> Vec<Effect> {
		// Keep the highlight alive through a drag of the same node.
		if self.hovered != Some(idx) || self.dragging == Some(idx) {
			return Vec::new();
		}
		self.hovered = None;
		self.hover_neighbors.clear();
		vec![Effect::HideTooltip]
	}

	fn activate(&mut self, idx: usize, graph: &PreparedGraph) -> Vec<Effect> {
		// Clicking clears all temporary and persistent state everywhere,
		// then claims the single pin for the target.
		self.hovered = None;
		self.hover_neighbors.clear();
		self.dragging = None;
		self.search_matches = None;
		self.pinned = Some(idx);
		self.pinned_neighbors = graph.adjacency.neighbors_of(idx).iter().copied().collect();
		vec![Effect::HideTooltip, Effect::OpenDetails(idx)]
	}

	fn drag_start(&mut self, idx: usize, graph: &PreparedGraph) -> Vec<Effect> {
		let mut effects = Vec::new();
		if self.pinned.take().is_some() {
			self.pinned_neighbors.clear();
			effects.push(Effect::CloseDetails);
		}
		self.hovered = Some(idx);
		self.hover_neighbors = graph.adjacency.neighbors_of(idx).iter().copied().collect();
		self.dragging = Some(idx);
		effects.push(Effect::FixPosition(idx));
		effects.push(Effect::ShowTooltip(idx));
		effects
	}

	fn drag_end(&mut self, idx: usize) -> Vec<Effect> {
		if self.dragging.take().is_none() {
			return Vec::new();
		}
		vec![Effect::ReleasePosition(idx)]
	}

	fn dismiss(&mut self) -> Vec<Effect> {
		if self.pinned.take().is_none() {
			return Vec::new();
		}
		self.pinned_neighbors.clear();
		vec![Effect::CloseDetails]
	}

	fn search(&mut self, query: &str, graph: &PreparedGraph) -> Vec<Effect> {
		let query = query.trim().to_lowercase();
		if query.is_empty() {
			self.search_matches = None;
			return Vec::new();
		}
		let matches: HashSet<usize> = graph
			.nodes
			.iter()
			.enumerate()
			.filter(|(_, n)| {
				n.label.to_lowercase().contains(&query)
					|| n.detail.to_lowercase().contains(&query)
			})
			.map(|(i, _)| i)
			.collect();
		let effects = if matches.len() == 1 {
			vec![Effect::FocusNode(*matches.iter().next().unwrap())]
		} else {
			Vec::new()
		};
		self.search_matches = Some(matches);
		effects
	}

	fn reset(&mut self) -> Vec<Effect> {
		*self = Self::default();
		vec![
			Effect::HideTooltip,
			Effect::CloseDetails,
			Effect::ResetCamera,
		]
	}

	/// Tap heuristic shared by mouse and touch handling.
	pub fn is_tap(moved_px: f64, duration_ms: f64) -> bool {
		moved_px < TAP_SLOP_PX && duration_ms < TAP_MAX_MS
	}

	/// The composable flags collapsed into one visual state per node.
	pub fn visual(&self, idx: usize) -> NodeVisual {
		if self.pinned == Some(idx) {
			NodeVisual::Pinned
		} else if self.hovered == Some(idx) || self.dragging == Some(idx) {
			NodeVisual::Interacted
		} else if self.hover_neighbors.contains(&idx) || self.pinned_neighbors.contains(&idx) {
			NodeVisual::Neighbor
		} else {
			NodeVisual::Neutral
		}
	}

	/// True while any highlight, temporary or persistent, is active.
	pub fn highlight_active(&self) -> bool {
		self.hovered.is_some() || self.pinned.is_some()
	}

	/// Whether a node renders faded. Search fading wins over highlight
	/// fading; fade clears automatically when nothing is highlighted.
	pub fn is_faded(&self, idx: usize) -> bool {
		if let Some(matches) = &self.search_matches {
			return !matches.contains(&idx);
		}
		self.highlight_active() && self.visual(idx) == NodeVisual::Neutral
	}

	/// A link fades unless both endpoints stay relevant.
	pub fn link_faded(&self, a: usize, b: usize) -> bool {
		self.is_faded(a) || self.is_faded(b)
	}

	pub fn is_search_match(&self, idx: usize) -> bool {
		self.search_matches
			.as_ref()
			.is_some_and(|m| m.contains(&idx))
	}

	pub fn search_active(&self) -> bool {
		self.search_matches.is_some()
	}

	pub fn pinned(&self) -> Option<usize> {
		self.pinned
	}

	pub fn hovered(&self) -> Option<usize> {
		self.hovered
	}

	pub fn dragging(&self) -> Option<usize> {
		self.dragging
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::task_graph::layers::LayerAssignment;
	use crate::components::task_graph::prepare::prepare_graph;
	use crate::components::task_graph::types::{LinkRecord, NodeKind, NodeRecord, Template};

	fn graph() -> PreparedGraph {
		let node = |id: &str| NodeRecord {
			id: id.to_string(),
			label: format!("Task {id}"),
			kind: NodeKind::Parent,
			layer: 0,
			parent_id: None,
			radius: None,
		};
		let link = |s: &str, t: &str| LinkRecord {
			source: s.to_string(),
			target: t.to_string(),
			kind_tag: String::new(),
		};
		let template = Template {
			nodes: vec![node("a"), node("b"), node("c"), node("d")],
			links: vec![link("a", "b"), link("b", "c")],
			..Default::default()
		};
		prepare_graph(&template, &LayerAssignment::default()).unwrap()
	}

	#[test]
	fn hover_marks_node_and_neighbors_and_fades_rest() {
		let g = graph();
		let mut st = InteractionState::default();
		let effects = st.apply(Event::HoverIn(1), &g);
		assert_eq!(effects, vec![Effect::ShowTooltip(1)]);
		assert_eq!(st.visual(1), NodeVisual::Interacted);
		assert_eq!(st.visual(0), NodeVisual::Neighbor);
		assert_eq!(st.visual(2), NodeVisual::Neighbor);
		assert!(st.is_faded(3));
		assert!(!st.is_faded(0));
		assert!(st.link_faded(2, 3));
		assert!(!st.link_faded(0, 1));

		// Re-entering the same state is a no-op.
		assert!(st.apply(Event::HoverIn(1), &g).is_empty());

		let effects = st.apply(Event::HoverOut(1), &g);
		assert_eq!(effects, vec![Effect::HideTooltip]);
		assert_eq!(st.visual(1), NodeVisual::Neutral);
		assert!(!st.is_faded(3));
	}

	#[test]
	fn pin_is_exclusive_and_suppresses_hover() {
		let g = graph();
		let mut st = InteractionState::default();
		let effects = st.apply(Event::Activate(0), &g);
		assert_eq!(effects, vec![Effect::HideTooltip, Effect::OpenDetails(0)]);
		assert_eq!(st.visual(0), NodeVisual::Pinned);

		// Hovering another node while pinned leaves all state unchanged.
		assert!(st.apply(Event::HoverIn(3), &g).is_empty());
		assert_eq!(st.visual(3), NodeVisual::Neutral);
		assert_eq!(st.visual(0), NodeVisual::Pinned);
		assert!(st.is_faded(3));

		// Pinning a second node always unpins the first.
		st.apply(Event::Activate(2), &g);
		assert_eq!(st.visual(2), NodeVisual::Pinned);
		assert_eq!(st.visual(0), NodeVisual::Neutral);
		assert_eq!(st.pinned(), Some(2));
	}

	#[test]
	fn hover_out_keeps_pinned_highlight() {
		let g = graph();
		let mut st = InteractionState::default();
		st.apply(Event::Activate(1), &g);
		st.apply(Event::HoverOut(1), &g);
		assert_eq!(st.visual(1), NodeVisual::Pinned);
		assert_eq!(st.visual(0), NodeVisual::Neighbor);
		assert!(st.is_faded(3));
	}

	#[test]
	fn drag_fixes_position_and_closes_details() {
		let g = graph();
		let mut st = InteractionState::default();
		st.apply(Event::Activate(0), &g);
		let effects = st.apply(Event::DragStart(1), &g);
		assert_eq!(
			effects,
			vec![
				Effect::CloseDetails,
				Effect::FixPosition(1),
				Effect::ShowTooltip(1)
			]
		);
		assert_eq!(st.pinned(), None);
		assert_eq!(st.visual(1), NodeVisual::Interacted);

		// Hover-out mid-drag does not drop the highlight.
		assert!(st.apply(Event::HoverOut(1), &g).is_empty());
		assert_eq!(st.visual(1), NodeVisual::Interacted);

		let effects = st.apply(Event::DragEnd(1), &g);
		assert_eq!(effects, vec![Effect::ReleasePosition(1)]);
		assert_eq!(st.dragging(), None);
	}

	#[test]
	fn tap_classification_thresholds() {
		assert!(InteractionState::is_tap(2.0, 100.0));
		assert!(!InteractionState::is_tap(8.0, 100.0));
		assert!(!InteractionState::is_tap(2.0, 500.0));
	}

	#[test]
	fn search_fades_non_matches_and_focuses_unique_match() {
		let g = graph();
		let mut st = InteractionState::default();

		// Case-insensitive substring over label and detail text.
		let effects = st.apply(Event::Search("TASK".into()), &g);
		assert!(effects.is_empty());
		assert!((0..4).all(|i| st.is_search_match(i)));

		let effects = st.apply(Event::Search("task d".into()), &g);
		assert_eq!(effects, vec![Effect::FocusNode(3)]);
		assert!(st.is_search_match(3));
		assert!(st.is_faded(0) && st.is_faded(1) && st.is_faded(2));

		st.apply(Event::ClearSearch, &g);
		assert!(!st.search_active());
		assert!(!st.is_faded(0));
	}

	#[test]
	fn reset_clears_everything() {
		let g = graph();
		let mut st = InteractionState::default();
		st.apply(Event::Activate(1), &g);
		st.apply(Event::Search("task".into()), &g);
		let effects = st.apply(Event::Reset, &g);
		assert_eq!(
			effects,
			vec![
				Effect::HideTooltip,
				Effect::CloseDetails,
				Effect::ResetCamera
			]
		);
		assert_eq!(st.pinned(), None);
		assert!(!st.search_active());
		assert!((0..4).all(|i| st.visual(i) == NodeVisual::Neutral && !st.is_faded(i)));
	}

	#[test]
	fn dismiss_unpins_without_touching_search() {
		let g = graph();
		let mut st = InteractionState::default();
		st.apply(Event::Search("task".into()), &g);
		st.apply(Event::Activate(1), &g);
		// Activate cleared the search; re-apply to check dismiss keeps it.
		st.apply(Event::Search("task".into()), &g);
		let effects = st.apply(Event::Dismiss, &g);
		assert_eq!(effects, vec![Effect::CloseDetails]);
		assert_eq!(st.pinned(), None);
		assert!(st.search_active());
		assert!(st.apply(Event::Dismiss, &g).is_empty());
	}
}
