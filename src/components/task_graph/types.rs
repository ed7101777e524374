use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use super::tour::TourStep;

/// Fatal setup-time failures. Everything else (bad records, dangling links,
/// predecessor cycles) is tolerated and logged instead.
#[derive(Debug, Error)]
pub enum GraphSetupError {
	#[error("graph container element not found")]
	MissingContainer,
	#[error("template contains no drawable nodes")]
	EmptyGraph,
}

/// Whether a node anchors a layer band or hangs off a parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
	#[default]
	Parent,
	Child,
}

/// A raw node record as supplied by the template subsystem.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeRecord {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub label: String,
	#[serde(rename = "type", default)]
	pub kind: NodeKind,
	#[serde(default)]
	pub layer: u32,
	#[serde(default, rename = "parentId")]
	pub parent_id: Option<String>,
	/// Optional per-node radius override; policy-derived otherwise.
	#[serde(default, rename = "nodeRadius")]
	pub radius: Option<f64>,
}

/// Link tag consumed by the force-parameter lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkKind {
	/// Short parent-child attachment.
	Subcategory,
	/// Long structural link between layers.
	Layering,
	#[default]
	Other,
}

impl LinkKind {
	pub fn from_tag(tag: &str) -> Self {
		match tag {
			"subcategory" => Self::Subcategory,
			"layering" => Self::Layering,
			_ => Self::Other,
		}
	}
}

/// A raw link record; endpoints are node ids until resolved by the
/// preprocessor.
#[derive(Clone, Debug, Deserialize)]
pub struct LinkRecord {
	pub source: String,
	pub target: String,
	#[serde(rename = "type", default)]
	pub kind_tag: String,
}

impl LinkRecord {
	pub fn kind(&self) -> LinkKind {
		LinkKind::from_tag(&self.kind_tag)
	}
}

/// Task priority, used by the priority color policy and default tour steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Critical,
	High,
	#[default]
	Medium,
	Low,
}

/// One predecessor reference in any of the legacy shapes: a bare integer id
/// or an object carrying the id under `predecessor_task_id`, `task_id`, or
/// `id`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(untagged)]
pub enum PredecessorRef {
	Id(i64),
	Record {
		#[serde(default)]
		predecessor_task_id: Option<i64>,
		#[serde(default)]
		task_id: Option<i64>,
		#[serde(default)]
		id: Option<i64>,
	},
}

impl PredecessorRef {
	/// Normalize to a plain task id, trying the legacy fields in order.
	pub fn id(&self) -> Option<i64> {
		match *self {
			Self::Id(v) => Some(v),
			Self::Record {
				predecessor_task_id,
				task_id,
				id,
			} => predecessor_task_id.or(task_id).or(id),
		}
	}
}

/// Dependency-layering input for task-graph templates.
#[derive(Clone, Debug, Deserialize)]
pub struct TaskRecord {
	pub task_id: i64,
	#[serde(default, alias = "dependencies")]
	pub predecessors: Vec<PredecessorRef>,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default)]
	pub estimated_hours: f64,
}

/// Which color policy the preprocessor applies, with per-variant payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ColorPolicy {
	/// Tone ramps per layer over a base palette.
	Layer {
		#[serde(default = "default_layer_palette")]
		palette: Vec<String>,
	},
	/// Fixed color per priority, radius from estimated hours.
	Priority {
		#[serde(default = "default_priority_palette")]
		palette: HashMap<Priority, String>,
	},
}

impl Default for ColorPolicy {
	fn default() -> Self {
		Self::Layer {
			palette: default_layer_palette(),
		}
	}
}

fn default_layer_palette() -> Vec<String> {
	[
		"#1f77b4", "#2ca02c", "#9467bd", "#ff7f0e", "#17becf", "#8c564b",
	]
	.iter()
	.map(|s| s.to_string())
	.collect()
}

fn default_priority_palette() -> HashMap<Priority, String> {
	HashMap::from([
		(Priority::Critical, "#d62728".to_string()),
		(Priority::High, "#ff7f0e".to_string()),
		(Priority::Medium, "#1f77b4".to_string()),
		(Priority::Low, "#7f7f7f".to_string()),
	])
}

/// Per-template tuning knobs, all optional in the wire format.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
	pub color_policy: ColorPolicy,
	pub parent_radius: f64,
	pub child_radius: f64,
	pub min_radius: f64,
	pub max_radius: f64,
	pub min_hours: f64,
	pub max_hours: f64,
	/// Inline tour steps; highest-precedence source in step resolution.
	pub tour: Option<Vec<TourStep>>,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			color_policy: ColorPolicy::default(),
			parent_radius: 16.0,
			child_radius: 9.0,
			min_radius: 6.0,
			max_radius: 22.0,
			min_hours: 1.0,
			max_hours: 40.0,
			tour: None,
		}
	}
}

/// Free-form template metadata.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TemplateMeta {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub description: String,
}

/// The template object handed over by the (out of scope) loading subsystem.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Template {
	#[serde(default)]
	pub nodes: Vec<NodeRecord>,
	#[serde(default)]
	pub links: Vec<LinkRecord>,
	#[serde(default)]
	pub tasks: Vec<TaskRecord>,
	#[serde(default)]
	pub details: HashMap<String, String>,
	#[serde(default)]
	pub meta: TemplateMeta,
	#[serde(default)]
	pub config: GraphConfig,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn predecessor_shapes_normalize() {
		let flat: PredecessorRef = serde_json::from_str("7").unwrap();
		assert_eq!(flat.id(), Some(7));

		let obj: PredecessorRef =
			serde_json::from_str(r#"{"predecessor_task_id": 3}"#).unwrap();
		assert_eq!(obj.id(), Some(3));

		let obj: PredecessorRef = serde_json::from_str(r#"{"task_id": 4}"#).unwrap();
		assert_eq!(obj.id(), Some(4));

		let obj: PredecessorRef = serde_json::from_str(r#"{"id": 5}"#).unwrap();
		assert_eq!(obj.id(), Some(5));

		let empty: PredecessorRef = serde_json::from_str("{}").unwrap();
		assert_eq!(empty.id(), None);
	}

	#[test]
	fn template_deserializes_with_defaults() {
		let t: Template = serde_json::from_str(
			r#"{
				"nodes": [{"id": "a", "label": "A", "type": "parent"}],
				"links": [{"source": "a", "target": "b", "type": "layering"}],
				"tasks": [{"task_id": 1, "dependencies": [2], "priority": "critical"}]
			}"#,
		)
		.unwrap();
		assert_eq!(t.nodes[0].kind, NodeKind::Parent);
		assert_eq!(t.links[0].kind(), LinkKind::Layering);
		assert_eq!(t.tasks[0].priority, Priority::Critical);
		assert_eq!(t.tasks[0].predecessors[0].id(), Some(2));
	}
}
