//! Velocity-integrated force simulation under layered positional
//! constraints. Forces combine additively per tick; the decaying `alpha`
//! parameter is the stability ("kinetic energy") gauge.

use super::prepare::PreparedGraph;
use super::types::{LinkKind, NodeKind};

/// Margin kept between node edges and the canvas boundary.
pub const BOUNDS_PADDING: f64 = 10.0;

const ALPHA_INIT: f64 = 1.0;
const ALPHA_MIN: f64 = 0.02;
const ALPHA_DECAY: f64 = 0.02;
const REHEAT_ALPHA: f64 = 0.45;
const VELOCITY_DECAY: f64 = 0.6;

const LINK_DISTANCE_SUBCATEGORY: f64 = 45.0;
const LINK_DISTANCE_LAYERING: f64 = 160.0;
const LINK_DISTANCE_DEFAULT: f64 = 90.0;
const LINK_STRENGTH_STRUCTURAL: f64 = 0.10;
const LINK_STRENGTH_DEFAULT: f64 = 0.04;

const CHARGE_PARENT: f64 = 520.0;
const CHARGE_CHILD: f64 = 180.0;
const NARROW_VIEWPORT_PX: f64 = 700.0;
const NARROW_CHARGE_SCALE: f64 = 1.6;

const BAND_STRENGTH: f64 = 0.18;
const BAND_OFFSET_FRACTION: f64 = 0.12;
const CLUSTER_STRENGTH: f64 = 0.03;
const COLLISION_PADDING: f64 = 4.0;

/// Simulation-owned position and velocity of one node.
#[derive(Clone, Copy, Debug, Default)]
pub struct Body {
	pub x: f64,
	pub y: f64,
	pub vx: f64,
	pub vy: f64,
	/// Pinned position while the node is dragged.
	pub fixed: Option<(f64, f64)>,
}

#[derive(Clone, Copy, Debug)]
struct BodyMeta {
	kind: NodeKind,
	layer: u32,
	radius: f64,
	parent_idx: Option<usize>,
}

/// The layout simulator. Owns positions and velocities; everything else
/// about a node belongs to other phases.
pub struct Simulation {
	bodies: Vec<Body>,
	meta: Vec<BodyMeta>,
	links: Vec<(usize, usize, LinkKind)>,
	/// Parent indices per layer, id-sorted, spacing order for cluster X.
	parents_by_layer: Vec<Vec<usize>>,
	band_target_y: Vec<f64>,
	cluster_target_x: Vec<f64>,
	width: f64,
	height: f64,
	max_layer: u32,
	alpha: f64,
}

fn link_params(kind: LinkKind) -> (f64, f64) {
	match kind {
		LinkKind::Subcategory => (LINK_DISTANCE_SUBCATEGORY, LINK_STRENGTH_STRUCTURAL),
		LinkKind::Layering => (LINK_DISTANCE_LAYERING, LINK_STRENGTH_STRUCTURAL),
		LinkKind::Other => (LINK_DISTANCE_DEFAULT, LINK_STRENGTH_DEFAULT),
	}
}

/// Deterministic jitter in [-0.5, 0.5) so seeded positions never coincide.
fn jitter(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0 - 0.5
}

impl Simulation {
	pub fn new(graph: &PreparedGraph, width: f64, height: f64) -> Self {
		let meta: Vec<BodyMeta> = graph
			.nodes
			.iter()
			.map(|n| BodyMeta {
				kind: n.kind,
				layer: n.layer,
				radius: n.radius,
				parent_idx: n.parent_idx,
			})
			.collect();

		let mut parents_by_layer = vec![Vec::new(); graph.max_layer as usize + 1];
		let mut order: Vec<usize> = (0..graph.nodes.len()).collect();
		order.sort_by(|&a, &b| graph.nodes[a].id.cmp(&graph.nodes[b].id));
		for i in order {
			let node = &graph.nodes[i];
			if node.kind == NodeKind::Parent {
				parents_by_layer[node.layer.min(graph.max_layer) as usize].push(i);
			}
		}

		let mut sim = Self {
			bodies: vec![Body::default(); graph.nodes.len()],
			meta,
			links: graph
				.links
				.iter()
				.map(|l| (l.source, l.target, l.kind))
				.collect(),
			parents_by_layer,
			band_target_y: Vec::new(),
			cluster_target_x: Vec::new(),
			width,
			height,
			max_layer: graph.max_layer,
			alpha: ALPHA_INIT,
		};
		sim.compute_targets();
		for i in 0..sim.bodies.len() {
			sim.bodies[i].x = sim.cluster_target_x[i] + jitter(i) * 40.0;
			sim.bodies[i].y = sim.band_target_y[i] + jitter(i * 7 + 3) * 20.0;
		}
		sim
	}

	/// Band and cluster targets for the current viewport. Usable height is
	/// split into `2 * (max_layer + 1)` bands: parents slightly above their
	/// band center, children slightly below.
	fn compute_targets(&mut self) {
		let band_count = 2 * (self.max_layer as usize + 1);
		let band_h = self.height / band_count as f64;

		self.band_target_y = self
			.meta
			.iter()
			.map(|m| {
				let band = 2 * m.layer.min(self.max_layer) as usize
					+ usize::from(m.kind == NodeKind::Child);
				let center = (band as f64 + 0.5) * band_h;
				let offset = band_h * BAND_OFFSET_FRACTION;
				let y = match m.kind {
					NodeKind::Parent => center - offset,
					NodeKind::Child => center + offset,
				};
				y.clamp(BOUNDS_PADDING, (self.height - BOUNDS_PADDING).max(BOUNDS_PADDING))
			})
			.collect();

		// Parents evenly spaced across the width; a lone parent lands at
		// the center. Children share their parent's target.
		self.cluster_target_x = vec![self.width / 2.0; self.meta.len()];
		for parents in &self.parents_by_layer {
			let n = parents.len();
			for (pos, &idx) in parents.iter().enumerate() {
				self.cluster_target_x[idx] = self.width * (pos as f64 + 1.0) / (n as f64 + 1.0);
			}
		}
		for i in 0..self.meta.len() {
			if self.meta[i].kind == NodeKind::Child {
				if let Some(p) = self.meta[i].parent_idx {
					self.cluster_target_x[i] = self.cluster_target_x[p];
				}
			}
		}
	}

	/// One simulation step. No-op once stable; `reheat` restarts motion.
	pub fn tick(&mut self) {
		if self.is_stable() {
			return;
		}
		self.alpha *= 1.0 - ALPHA_DECAY;
		let alpha = self.alpha;
		let n = self.bodies.len();

		// Link force: spring toward the link-type target distance.
		for &(a, b, kind) in &self.links {
			if a == b {
				continue;
			}
			let (target, strength) = link_params(kind);
			let dx = self.bodies[b].x - self.bodies[a].x;
			let dy = self.bodies[b].y - self.bodies[a].y;
			let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
			let f = strength * (dist - target) * alpha;
			let (ux, uy) = (dx / dist, dy / dist);
			self.bodies[a].vx += ux * f;
			self.bodies[a].vy += uy * f;
			self.bodies[b].vx -= ux * f;
			self.bodies[b].vy -= uy * f;
		}

		// Charge force: pairwise repulsion, heavier for parents, scaled up
		// on narrow viewports where bands leave less lateral room.
		let narrow = if self.width < NARROW_VIEWPORT_PX {
			NARROW_CHARGE_SCALE
		} else {
			1.0
		};
		for i in 0..n {
			for j in (i + 1)..n {
				let dx = self.bodies[j].x - self.bodies[i].x;
				let dy = self.bodies[j].y - self.bodies[i].y;
				let dist2 = (dx * dx + dy * dy).max(25.0);
				let dist = dist2.sqrt();
				let strength =
					(self.charge_of(i) + self.charge_of(j)) * 0.5 * narrow;
				let f = strength * alpha / dist2;
				let (ux, uy) = (dx / dist, dy / dist);
				self.bodies[i].vx -= ux * f;
				self.bodies[i].vy -= uy * f;
				self.bodies[j].vx += ux * f;
				self.bodies[j].vy += uy * f;
			}
		}

		// Vertical band force (strong) and horizontal cluster force (weak).
		for i in 0..n {
			self.bodies[i].vy += (self.band_target_y[i] - self.bodies[i].y) * BAND_STRENGTH * alpha;
			self.bodies[i].vx +=
				(self.cluster_target_x[i] - self.bodies[i].x) * CLUSTER_STRENGTH * alpha;
		}

		// Collision: positional separation on rendered radius plus padding.
		for i in 0..n {
			for j in (i + 1)..n {
				let min_dist = self.meta[i].radius + self.meta[j].radius + COLLISION_PADDING;
				let dx = self.bodies[j].x - self.bodies[i].x;
				let dy = self.bodies[j].y - self.bodies[i].y;
				let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
				if dist >= min_dist {
					continue;
				}
				let overlap = min_dist - dist;
				let (ux, uy) = (dx / dist, dy / dist);
				match (self.bodies[i].fixed.is_some(), self.bodies[j].fixed.is_some()) {
					(false, false) => {
						self.bodies[i].x -= ux * overlap * 0.5;
						self.bodies[i].y -= uy * overlap * 0.5;
						self.bodies[j].x += ux * overlap * 0.5;
						self.bodies[j].y += uy * overlap * 0.5;
					}
					(true, false) => {
						self.bodies[j].x += ux * overlap;
						self.bodies[j].y += uy * overlap;
					}
					(false, true) => {
						self.bodies[i].x -= ux * overlap;
						self.bodies[i].y -= uy * overlap;
					}
					(true, true) => {}
				}
			}
		}

		// Integrate, honor fixed positions, clamp into canvas bounds.
		for i in 0..n {
			let body = &mut self.bodies[i];
			if let Some((fx, fy)) = body.fixed {
				body.x = fx;
				body.y = fy;
				body.vx = 0.0;
				body.vy = 0.0;
			} else {
				body.vx *= VELOCITY_DECAY;
				body.vy *= VELOCITY_DECAY;
				body.x += body.vx;
				body.y += body.vy;
			}
			let r = self.meta[i].radius + BOUNDS_PADDING;
			let (hi_x, hi_y) = ((self.width - r).max(r), (self.height - r).max(r));
			body.x = body.x.clamp(r, hi_x);
			body.y = body.y.clamp(r, hi_y);
		}
	}

	fn charge_of(&self, idx: usize) -> f64 {
		match self.meta[idx].kind {
			NodeKind::Parent => CHARGE_PARENT,
			NodeKind::Child => CHARGE_CHILD,
		}
	}

	/// Stable once alpha has decayed below the threshold.
	pub fn is_stable(&self) -> bool {
		self.alpha < ALPHA_MIN
	}

	/// Re-heat without restarting: positions survive, motion resumes.
	pub fn reheat(&mut self) {
		self.alpha = self.alpha.max(REHEAT_ALPHA);
	}

	/// Recompute band/cluster targets for a new viewport and re-heat.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.compute_targets();
		self.reheat();
	}

	pub fn body(&self, idx: usize) -> Body {
		self.bodies[idx]
	}

	pub fn bodies(&self) -> &[Body] {
		&self.bodies
	}

	/// Fix a node at a position (drag); it stops responding to forces.
	pub fn fix(&mut self, idx: usize, x: f64, y: f64) {
		self.bodies[idx].fixed = Some((x, y));
		self.bodies[idx].x = x;
		self.bodies[idx].y = y;
		self.reheat();
	}

	pub fn release(&mut self, idx: usize) {
		self.bodies[idx].fixed = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::task_graph::layers::LayerAssignment;
	use crate::components::task_graph::prepare::prepare_graph;
	use crate::components::task_graph::types::{LinkRecord, NodeRecord, Template};

	fn node(id: &str, kind: NodeKind, layer: u32, parent: Option<&str>) -> NodeRecord {
		NodeRecord {
			id: id.to_string(),
			label: id.to_string(),
			kind,
			layer,
			parent_id: parent.map(str::to_string),
			radius: None,
		}
	}

	fn sample_sim(width: f64, height: f64) -> Simulation {
		let template = Template {
			nodes: vec![
				node("a", NodeKind::Parent, 0, None),
				node("b", NodeKind::Parent, 1, None),
				node("c", NodeKind::Parent, 1, None),
				node("a1", NodeKind::Child, 0, Some("a")),
			],
			links: vec![
				LinkRecord {
					source: "a".into(),
					target: "b".into(),
					kind_tag: "layering".into(),
				},
				LinkRecord {
					source: "a".into(),
					target: "a1".into(),
					kind_tag: "subcategory".into(),
				},
			],
			..Default::default()
		};
		let graph = prepare_graph(&template, &LayerAssignment::default()).unwrap();
		Simulation::new(&graph, width, height)
	}

	fn settle(sim: &mut Simulation) -> usize {
		for i in 0..2000 {
			if sim.is_stable() {
				return i;
			}
			sim.tick();
		}
		panic!("simulation never stabilized");
	}

	#[test]
	fn decays_to_stability_and_stays_in_bounds() {
		let mut sim = sample_sim(800.0, 600.0);
		settle(&mut sim);
		for (i, body) in sim.bodies().iter().enumerate() {
			let r = sim.meta[i].radius + BOUNDS_PADDING;
			assert!(body.x >= r && body.x <= 800.0 - r, "x out of bounds");
			assert!(body.y >= r && body.y <= 600.0 - r, "y out of bounds");
		}
	}

	#[test]
	fn band_targets_order_layers_and_kinds() {
		let sim = sample_sim(800.0, 600.0);
		// a (parent, layer 0) above a1 (child, layer 0) above b (layer 1).
		assert!(sim.band_target_y[0] < sim.band_target_y[3]);
		assert!(sim.band_target_y[3] < sim.band_target_y[1]);
	}

	#[test]
	fn lone_layer_parent_targets_center() {
		let sim = sample_sim(800.0, 600.0);
		// "a" is the only layer-0 parent.
		assert!((sim.cluster_target_x[0] - 400.0).abs() < 1e-9);
		// Its child shares the target.
		assert!((sim.cluster_target_x[3] - 400.0).abs() < 1e-9);
		// Two layer-1 parents split the width evenly.
		assert!((sim.cluster_target_x[1] - 800.0 / 3.0).abs() < 1e-9);
		assert!((sim.cluster_target_x[2] - 1600.0 / 3.0).abs() < 1e-9);
	}

	#[test]
	fn fixed_body_ignores_forces() {
		let mut sim = sample_sim(800.0, 600.0);
		sim.fix(1, 123.0, 456.0);
		settle(&mut sim);
		let body = sim.body(1);
		assert_eq!((body.x, body.y), (123.0, 456.0));
		sim.release(1);
		assert!(sim.body(1).fixed.is_none());
	}

	#[test]
	fn resize_reheats_and_retargets() {
		let mut sim = sample_sim(800.0, 600.0);
		settle(&mut sim);
		let before = sim.band_target_y.clone();
		sim.resize(400.0, 300.0);
		assert!(!sim.is_stable());
		assert_ne!(before, sim.band_target_y);
		// Narrow viewport still settles and still respects bounds.
		settle(&mut sim);
		for (i, body) in sim.bodies().iter().enumerate() {
			let r = sim.meta[i].radius + BOUNDS_PADDING;
			assert!(body.x >= r && body.x <= 400.0 - r);
		}
	}

	#[test]
	fn collision_keeps_separation_between_free_bodies() {
		let mut sim = sample_sim(800.0, 600.0);
		settle(&mut sim);
		for i in 0..sim.bodies().len() {
			for j in (i + 1)..sim.bodies().len() {
				let dx = sim.bodies[j].x - sim.bodies[i].x;
				let dy = sim.bodies[j].y - sim.bodies[i].y;
				let dist = (dx * dx + dy * dy).sqrt();
				let min_dist = sim.meta[i].radius + sim.meta[j].radius;
				assert!(
					dist >= min_dist * 0.8,
					"bodies {i} and {j} overlap: {dist} < {min_dist}"
				);
			}
		}
	}
}
