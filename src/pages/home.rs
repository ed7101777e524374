use leptos::prelude::*;
use log::error;

use crate::components::task_graph::{TaskGraphCanvas, Template};

/// Built-in demo template so the app runs without any external data source.
/// Uses the same wire format templates are authored in, including the legacy
/// mixed predecessor shapes.
const DEMO_TEMPLATE: &str = r#"{
	"meta": {
		"name": "Engineering career map",
		"description": "A small layered career map with one dependency chain."
	},
	"nodes": [
		{ "id": "1", "label": "Foundations", "type": "parent", "layer": 0 },
		{ "id": "2", "label": "Core Engineering", "type": "parent", "layer": 0 },
		{ "id": "3", "label": "Specialization", "type": "parent", "layer": 0 },
		{ "id": "4", "label": "Technical Leadership", "type": "parent", "layer": 0 },
		{ "id": "1a", "label": "Version control", "type": "child", "layer": 0, "parentId": "1" },
		{ "id": "1b", "label": "Editor fluency", "type": "child", "layer": 0, "parentId": "1" },
		{ "id": "2a", "label": "Code review", "type": "child", "layer": 1, "parentId": "2" },
		{ "id": "3a", "label": "Systems design", "type": "child", "layer": 2, "parentId": "3" }
	],
	"links": [
		{ "source": "1", "target": "2", "type": "layering" },
		{ "source": "2", "target": "3", "type": "layering" },
		{ "source": "2", "target": "4", "type": "layering" },
		{ "source": "3", "target": "4", "type": "layering" },
		{ "source": "1", "target": "1a", "type": "subcategory" },
		{ "source": "1", "target": "1b", "type": "subcategory" },
		{ "source": "2", "target": "2a", "type": "subcategory" },
		{ "source": "3", "target": "3a", "type": "subcategory" }
	],
	"tasks": [
		{ "task_id": 1, "predecessors": [], "priority": "critical", "estimated_hours": 6 },
		{ "task_id": 2, "predecessors": [1], "priority": "high", "estimated_hours": 12 },
		{ "task_id": 3, "predecessors": [{ "predecessor_task_id": 2 }], "priority": "medium", "estimated_hours": 20 },
		{ "task_id": 4, "predecessors": [2, { "id": 3 }], "priority": "low", "estimated_hours": 8 }
	],
	"details": {
		"1": "Everything else builds on these habits: version control, shell basics, and an editor you can think in.",
		"2": "Day-to-day engineering craft: reviews, testing discipline, and shipping under constraints.",
		"3": "Pick a depth area and go deep enough to be the person others ask.",
		"4": "Multiply the team: architecture calls, mentoring, and owning outcomes."
	}
}"#;

fn demo_template() -> Template {
	match serde_json::from_str(DEMO_TEMPLATE) {
		Ok(template) => template,
		Err(e) => {
			error!("demo template failed to parse: {e}");
			Template::default()
		}
	}
}

/// Default Home Page: the demo career map, fullscreen.
#[component]
pub fn Home() -> impl IntoView {
	let template = Signal::derive(demo_template);

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<TaskGraphCanvas data=template fullscreen=true />
				<div class="graph-overlay">
					<h1>"Career Map"</h1>
					<p class="subtitle">
						"Hover to explore, click to pin details, drag to rearrange. Scroll to zoom."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
