//! Scripted tour: a linear, user-gated step sequence that drives the camera
//! and simulated interactions. Steps come from inline config, an external
//! step list, or generated defaults, in that order of precedence.

use serde::Deserialize;

use super::layers::LayerAssignment;
use super::prepare::PreparedGraph;
use super::types::{Priority, TaskRecord};

/// How long the camera is given to settle before demonstrations start.
pub const CAMERA_SETTLE_MS: u32 = 750;
const DEMO_SPACING_MS: u32 = 900;
const TYPE_KEYSTROKE_MS: u32 = 120;

/// What a step points the user at.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
	/// A graph node by id.
	Node(String),
	/// A UI element by CSS selector.
	Selector(String),
}

/// Camera motion requested when a step begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCamera {
	#[default]
	None,
	Focus,
	Reset,
}

/// A demonstration played inside a step, after the camera settles.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoAction {
	Hover,
	Click,
	SearchTyping(String),
}

/// One authored or generated tour step.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TourStep {
	#[serde(default)]
	pub target: Option<StepTarget>,
	#[serde(default)]
	pub camera: StepCamera,
	#[serde(default)]
	pub demos: Vec<DemoAction>,
	#[serde(default)]
	pub text: String,
}

/// An instruction for the host, to run after `delay_ms`. The host must
/// re-check the engine generation when the timer fires; schedules from a
/// superseded step are void.
#[derive(Clone, Debug, PartialEq)]
pub enum TourCommand {
	FocusNode(String),
	ResetCamera,
	SimulateHover(String),
	SimulateClick(String),
	TypeSearch(String),
	/// Strip simulated-interaction artifacts left by a previous step.
	ClearArtifacts,
	ShowCaption(String),
	HideCaption,
}

/// A command plus when to run it, relative to step entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledCommand {
	pub delay_ms: u32,
	pub command: TourCommand,
}

fn at(delay_ms: u32, command: TourCommand) -> ScheduledCommand {
	ScheduledCommand { delay_ms, command }
}

/// The tour engine. Advancement is user-gated; only demonstrations within a
/// step run on timers, and those are invalidated by the generation counter.
#[derive(Debug, Default)]
pub struct TourEngine {
	steps: Vec<TourStep>,
	current: Option<usize>,
	generation: u64,
}

impl TourEngine {
	/// Replace the step list. Ends any running tour first.
	pub fn set_steps(&mut self, steps: Vec<TourStep>) -> Vec<ScheduledCommand> {
		let commands = if self.is_active() { self.end() } else { Vec::new() };
		self.steps = steps;
		commands
	}

	pub fn is_active(&self) -> bool {
		self.current.is_some()
	}

	/// Generation of the most recent step entry; timers bound to an older
	/// generation must not touch shared state.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn current_step(&self) -> Option<&TourStep> {
		self.current.map(|i| &self.steps[i])
	}

	pub fn step_count(&self) -> usize {
		self.steps.len()
	}

	pub fn current_index(&self) -> Option<usize> {
		self.current
	}

	/// Start from the first step. No-op schedule when there are no steps.
	pub fn start(&mut self) -> Vec<ScheduledCommand> {
		self.generation += 1;
		if self.steps.is_empty() {
			self.current = None;
			return Vec::new();
		}
		self.current = Some(0);
		self.enter_step(0)
	}

	/// Advance to the next step, ending the tour past the last one.
	pub fn next(&mut self) -> Vec<ScheduledCommand> {
		let Some(current) = self.current else {
			return Vec::new();
		};
		if current + 1 >= self.steps.len() {
			return self.end();
		}
		self.current = Some(current + 1);
		self.enter_step(current + 1)
	}

	/// End the tour (skip/escape/finish). Cancels pending demonstrations by
	/// bumping the generation and strips every simulated artifact.
	pub fn end(&mut self) -> Vec<ScheduledCommand> {
		self.generation += 1;
		if self.current.take().is_none() {
			return Vec::new();
		}
		vec![
			at(0, TourCommand::ClearArtifacts),
			at(0, TourCommand::HideCaption),
			at(0, TourCommand::ResetCamera),
		]
	}

	fn enter_step(&mut self, index: usize) -> Vec<ScheduledCommand> {
		self.generation += 1;
		let step = self.steps[index].clone();
		let mut commands = vec![
			at(0, TourCommand::ClearArtifacts),
			at(0, TourCommand::ShowCaption(step.text.clone())),
		];

		let node_id = match &step.target {
			Some(StepTarget::Node(id)) => Some(id.clone()),
			_ => None,
		};
		let mut demo_start = 0;
		match step.camera {
			StepCamera::Focus => {
				if let Some(id) = &node_id {
					commands.push(at(0, TourCommand::FocusNode(id.clone())));
					demo_start = CAMERA_SETTLE_MS;
				}
			}
			StepCamera::Reset => {
				commands.push(at(0, TourCommand::ResetCamera));
				demo_start = CAMERA_SETTLE_MS;
			}
			StepCamera::None => {}
		}

		// Demonstrations chain after the camera settles, never before.
		let mut t = demo_start;
		for demo in &step.demos {
			match demo {
				DemoAction::Hover => {
					if let Some(id) = &node_id {
						commands.push(at(t, TourCommand::SimulateHover(id.clone())));
					}
				}
				DemoAction::Click => {
					if let Some(id) = &node_id {
						commands.push(at(t, TourCommand::SimulateClick(id.clone())));
					}
				}
				DemoAction::SearchTyping(query) => {
					// Type the query one keystroke at a time.
					for (keystroke, (i, ch)) in query.char_indices().enumerate() {
						commands.push(at(
							t + keystroke as u32 * TYPE_KEYSTROKE_MS,
							TourCommand::TypeSearch(query[..i + ch.len_utf8()].to_string()),
						));
					}
					t += query.chars().count() as u32 * TYPE_KEYSTROKE_MS;
				}
			}
			t += DEMO_SPACING_MS;
		}
		commands
	}
}

/// Pick the step source: explicit inline steps win, then an externally
/// supplied list, then defaults generated from node metadata so every
/// template gets a usable tour.
pub fn resolve_steps(
	inline: Option<&[TourStep]>,
	external: Option<&[TourStep]>,
	graph: &PreparedGraph,
	tasks: &[TaskRecord],
	layers: &LayerAssignment,
) -> Vec<TourStep> {
	if let Some(steps) = inline.filter(|s| !s.is_empty()) {
		return steps.to_vec();
	}
	if let Some(steps) = external.filter(|s| !s.is_empty()) {
		return steps.to_vec();
	}
	generate_default_steps(graph, tasks, layers)
}

fn generate_default_steps(
	graph: &PreparedGraph,
	tasks: &[TaskRecord],
	layers: &LayerAssignment,
) -> Vec<TourStep> {
	let mut steps = vec![TourStep {
		target: None,
		camera: StepCamera::Reset,
		demos: Vec::new(),
		text: "This map lays every item out by dependency depth: anything on \
		       the first band has no prerequisites."
			.to_string(),
	}];

	// Open on a starting point: the first task without predecessors, or the
	// first layer-0 node when there is no task list.
	let entry_node = tasks
		.iter()
		.filter(|t| layers.layer_of(t.task_id) == 1)
		.map(|t| t.task_id.to_string())
		.find(|id| graph.index_of(id).is_some())
		.or_else(|| {
			graph
				.nodes
				.iter()
				.find(|n| n.layer == 0)
				.map(|n| n.id.clone())
		});
	if let Some(id) = entry_node {
		let label = graph
			.index_of(&id)
			.map(|i| graph.nodes[i].label.clone())
			.unwrap_or_else(|| id.clone());
		steps.push(TourStep {
			target: Some(StepTarget::Node(id)),
			camera: StepCamera::Focus,
			demos: vec![DemoAction::Hover],
			text: format!("{label} has no prerequisites, so it is a natural place to start."),
		});
	}

	// Walk the critical-priority items next.
	for task in tasks
		.iter()
		.filter(|t| t.priority == Priority::Critical)
		.take(3)
	{
		let id = task.task_id.to_string();
		if graph.index_of(&id).is_none() {
			continue;
		}
		let label = graph
			.index_of(&id)
			.map(|i| graph.nodes[i].label.clone())
			.unwrap_or_else(|| id.clone());
		steps.push(TourStep {
			target: Some(StepTarget::Node(id)),
			camera: StepCamera::Focus,
			demos: vec![DemoAction::Click],
			text: format!("{label} is marked critical; click any node to pin its details."),
		});
	}

	// Close on the search box.
	if let Some(node) = graph.nodes.first() {
		let prefix: String = node.label.chars().take(4).collect();
		steps.push(TourStep {
			target: Some(StepTarget::Selector(".graph-search".to_string())),
			camera: StepCamera::Reset,
			demos: vec![DemoAction::SearchTyping(prefix)],
			text: "Search matches labels and details; a unique match zooms straight to it."
				.to_string(),
		});
	}
	steps
}
