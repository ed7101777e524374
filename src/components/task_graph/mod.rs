//! The interactive layered graph: dependency layering, preprocessing,
//! force layout, interaction state, and the scripted tour.

mod color;
mod component;
mod interaction;
mod layers;
mod prepare;
mod render;
mod sim;
mod state;
mod store;
mod timers;
mod tour;
mod types;

pub use component::TaskGraphCanvas;
pub use store::TemplateStore;
pub use tour::TourStep;
pub use types::{LinkRecord, NodeKind, NodeRecord, Priority, TaskRecord, Template};
