//! Graph preprocessing: validates raw template records, builds the adjacency
//! index, and assigns colors, radii, and text classes under the configured
//! color policy.

use std::collections::{HashMap, HashSet};

use log::warn;

use super::color::{self, TextClass};
use super::layers::LayerAssignment;
use super::types::{
	ColorPolicy, GraphConfig, GraphSetupError, LinkKind, NodeKind, Priority, TaskRecord, Template,
};

/// A validated, enriched node. Position and velocity live in the simulator;
/// visual-state flags live in the interaction machine.
#[derive(Clone, Debug)]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	pub kind: NodeKind,
	pub layer: u32,
	/// Arena index of the resolved parent, not an object back-reference.
	pub parent_idx: Option<usize>,
	pub color_variant_index: usize,
	pub hex: String,
	pub text_class: TextClass,
	pub radius: f64,
	pub cycle_member: bool,
	pub detail: String,
}

/// A link with endpoints resolved to arena indices.
#[derive(Clone, Copy, Debug)]
pub struct GraphLink {
	pub source: usize,
	pub target: usize,
	pub kind: LinkKind,
}

/// Symmetric adjacency index: both `(a, b)` and `(b, a)` are present for
/// every link, giving O(1) connectivity checks for the interaction layer.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyIndex {
	pairs: HashSet<(String, String)>,
	neighbors: Vec<Vec<usize>>,
}

impl AdjacencyIndex {
	fn new(node_count: usize) -> Self {
		Self {
			pairs: HashSet::new(),
			neighbors: vec![Vec::new(); node_count],
		}
	}

	fn insert(&mut self, a_id: &str, b_id: &str, a: usize, b: usize) {
		let fresh = self.pairs.insert((a_id.to_string(), b_id.to_string()));
		self.pairs.insert((b_id.to_string(), a_id.to_string()));
		if fresh && a != b {
			self.neighbors[a].push(b);
			self.neighbors[b].push(a);
		}
	}

	pub fn connected(&self, a: &str, b: &str) -> bool {
		self.pairs.contains(&(a.to_string(), b.to_string()))
	}

	pub fn neighbors_of(&self, idx: usize) -> &[usize] {
		self.neighbors.get(idx).map(Vec::as_slice).unwrap_or(&[])
	}
}

/// The preprocessor's output: everything downstream phases consume.
#[derive(Clone, Debug)]
pub struct PreparedGraph {
	pub nodes: Vec<GraphNode>,
	pub links: Vec<GraphLink>,
	pub adjacency: AdjacencyIndex,
	pub max_layer: u32,
	pub index_of: HashMap<String, usize>,
}

impl PreparedGraph {
	pub fn index_of(&self, id: &str) -> Option<usize> {
		self.index_of.get(id).copied()
	}
}

/// Validate and enrich a template into a drawable graph.
///
/// Malformed records are dropped with a warning, never fatal; the only error
/// is an empty surviving node set. For task-graph templates the resolved
/// layer assignment overrides each node's authored layer.
pub fn prepare_graph(
	template: &Template,
	layers: &LayerAssignment,
) -> Result<PreparedGraph, GraphSetupError> {
	let task_by_id: HashMap<i64, &TaskRecord> =
		template.tasks.iter().map(|t| (t.task_id, t)).collect();

	let mut nodes = Vec::new();
	let mut parent_ids: Vec<Option<String>> = Vec::new();
	let mut index_of = HashMap::new();
	for record in &template.nodes {
		if record.id.is_empty() {
			warn!("dropping node without an id (label {:?})", record.label);
			continue;
		}
		if index_of.contains_key(&record.id) {
			warn!("dropping duplicate node id {:?}", record.id);
			continue;
		}
		let task_id = record.id.parse::<i64>().ok();
		// Resolver layers start at 1; node layers start at 0.
		let layer = task_id
			.filter(|id| layers.layer_by_id.contains_key(id))
			.map(|id| layers.layer_of(id) - 1)
			.unwrap_or(record.layer);
		let label = if record.label.is_empty() {
			record.id.clone()
		} else {
			record.label.clone()
		};
		let detail = template
			.details
			.get(&record.id)
			.cloned()
			.unwrap_or_else(|| format!("No details recorded for {label} yet."));
		index_of.insert(record.id.clone(), nodes.len());
		parent_ids.push(record.parent_id.clone());
		nodes.push(GraphNode {
			id: record.id.clone(),
			label,
			kind: record.kind,
			layer,
			parent_idx: None,
			color_variant_index: 0,
			hex: String::new(),
			text_class: TextClass::default(),
			radius: record.radius.unwrap_or(match record.kind {
				NodeKind::Parent => template.config.parent_radius,
				NodeKind::Child => template.config.child_radius,
			}),
			cycle_member: task_id.is_some_and(|id| layers.cycle_ids.contains(&id)),
			detail,
		});
	}
	if nodes.is_empty() {
		return Err(GraphSetupError::EmptyGraph);
	}

	// Parent references resolve through the arena so rebuilds cannot dangle.
	for (i, parent_id) in parent_ids.iter().enumerate() {
		let Some(parent_id) = parent_id else { continue };
		match index_of.get(parent_id) {
			Some(&p) if p != i => nodes[i].parent_idx = Some(p),
			Some(_) => warn!("node {:?} is its own parent", nodes[i].id),
			None => warn!(
				"node {:?} references missing parent {:?}",
				nodes[i].id, parent_id
			),
		}
	}

	let mut links = Vec::new();
	let mut adjacency = AdjacencyIndex::new(nodes.len());
	for record in &template.links {
		let (Some(&source), Some(&target)) =
			(index_of.get(&record.source), index_of.get(&record.target))
		else {
			warn!(
				"dropping link with missing endpoint {:?} -> {:?}",
				record.source, record.target
			);
			continue;
		};
		adjacency.insert(&record.source, &record.target, source, target);
		links.push(GraphLink {
			source,
			target,
			kind: record.kind(),
		});
	}

	let max_layer = nodes.iter().map(|n| n.layer).max().unwrap_or(0);
	let mut graph = PreparedGraph {
		nodes,
		links,
		adjacency,
		max_layer,
		index_of,
	};
	assign_colors(&mut graph, &template.config, &task_by_id);
	Ok(graph)
}

fn assign_colors(
	graph: &mut PreparedGraph,
	config: &GraphConfig,
	task_by_id: &HashMap<i64, &TaskRecord>,
) {
	match &config.color_policy {
		ColorPolicy::Layer { palette } => {
			// Parents per layer, sorted by id for deterministic ramps.
			let mut parents_by_layer: HashMap<u32, Vec<usize>> = HashMap::new();
			for (i, node) in graph.nodes.iter().enumerate() {
				if node.kind == NodeKind::Parent {
					parents_by_layer.entry(node.layer).or_default().push(i);
				}
			}
			for (layer, mut parents) in parents_by_layer {
				parents.sort_by(|&a, &b| graph.nodes[a].id.cmp(&graph.nodes[b].id));
				let base = palette
					.get(layer as usize % palette.len().max(1))
					.map(String::as_str)
					.unwrap_or("#7f7f7f");
				let ramp = color::tone_ramp(base, parents.len().max(1));
				for (pos, &idx) in parents.iter().enumerate() {
					let variant = pos % ramp.len();
					graph.nodes[idx].color_variant_index = variant;
					graph.nodes[idx].hex = ramp[variant].clone();
				}
			}
		}
		ColorPolicy::Priority { palette } => {
			for node in &mut graph.nodes {
				let task = node.id.parse::<i64>().ok().and_then(|id| task_by_id.get(&id));
				let priority: Priority = task.map(|t| t.priority).unwrap_or_default();
				let hours = task.map(|t| t.estimated_hours).unwrap_or(config.min_hours);
				node.hex = palette
					.get(&priority)
					.cloned()
					.unwrap_or_else(|| "#7f7f7f".to_string());
				node.radius = radius_for_hours(hours, config);
			}
		}
	}
	for node in &mut graph.nodes {
		if node.hex.is_empty() {
			node.hex = "#7f7f7f".to_string();
		}
		node.text_class = color::text_class_for(&node.hex);
	}
	repropagate_from_parents(graph);
}

/// Square-root ease from clamped estimated hours into the radius range.
/// Monotonic, saturating gracefully outside `[min_hours, max_hours]`.
pub fn radius_for_hours(hours: f64, config: &GraphConfig) -> f64 {
	let span = (config.max_hours - config.min_hours).max(f64::EPSILON);
	let t = ((hours.clamp(config.min_hours, config.max_hours) - config.min_hours) / span).sqrt();
	config.min_radius + t * (config.max_radius - config.min_radius)
}

/// Re-copy color, radius, and text class from resolved parents to children.
/// Inheritance is by value, so any parent recolor must call this again.
pub fn repropagate_from_parents(graph: &mut PreparedGraph) {
	for i in 0..graph.nodes.len() {
		if let Some(p) = graph.nodes[i].parent_idx {
			let (hex, radius, text_class, variant) = {
				let parent = &graph.nodes[p];
				(
					parent.hex.clone(),
					parent.radius,
					parent.text_class,
					parent.color_variant_index,
				)
			};
			let child = &mut graph.nodes[i];
			if child.kind == NodeKind::Child {
				child.hex = hex;
				child.text_class = text_class;
				child.color_variant_index = variant;
				// Children stay visually subordinate to their parent.
				child.radius = child.radius.min(radius);
			}
		}
	}
}
