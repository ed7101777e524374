//! Explicitly owned template store with a load/clear lifecycle. The layer
//! assignment is computed once per loaded task set and cached alongside it.

use log::info;

use super::layers::{LayerAssignment, resolve_layers};
use super::types::Template;

/// A template together with its cached dependency layering.
#[derive(Clone, Debug)]
pub struct LoadedTemplate {
	pub template: Template,
	pub layers: LayerAssignment,
}

/// Holds the currently loaded template. Passed by reference to whoever needs
/// it; there is no ambient global registry.
#[derive(Debug, Default)]
pub struct TemplateStore {
	current: Option<LoadedTemplate>,
}

impl TemplateStore {
	/// Load a template, replacing any previous one, and cache its layering.
	pub fn load(&mut self, template: Template) -> &LoadedTemplate {
		let layers = resolve_layers(&template.tasks);
		info!(
			"loaded template {:?}: {} nodes, {} links, {} tasks",
			template.meta.name,
			template.nodes.len(),
			template.links.len(),
			template.tasks.len()
		);
		self.current.insert(LoadedTemplate { template, layers })
	}

	pub fn current(&self) -> Option<&LoadedTemplate> {
		self.current.as_ref()
	}

	pub fn clear(&mut self) {
		self.current = None;
	}
}
