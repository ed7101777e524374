//! Canvas drawing. Reads positions from the simulator and visual flags from
//! the interaction machine; owns neither.

use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::interaction::NodeVisual;
use super::state::GraphState;
use super::types::LinkKind;

const BACKGROUND: &str = "#1a1a2e";
const LINK_COLOR: &str = "100, 180, 255";
const FADED_ALPHA: f64 = 0.15;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

pub fn render(state: &GraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.camera.x, state.camera.y);
	let _ = ctx.scale(state.camera.k, state.camera.k);
	draw_links(state, ctx);
	draw_nodes(state, ctx);
	draw_focus_highlight(state, ctx);
	draw_tour_cursor(state, ctx);
	ctx.restore();
}

fn draw_links(state: &GraphState, ctx: &CanvasRenderingContext2d) {
	let k = state.camera.k;
	for link in &state.graph.links {
		let (a, b) = (state.sim.body(link.source), state.sim.body(link.target));
		let (dx, dy) = (b.x - a.x, b.y - a.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}
		let faded = state.interaction.link_faded(link.source, link.target);
		let alpha = if faded { 0.08 } else { 0.55 };
		let width = match link.kind {
			LinkKind::Layering => 2.0 / k,
			_ => 1.2 / k,
		};

		ctx.set_stroke_style_str(&format!("rgba({LINK_COLOR}, {alpha})"));
		ctx.set_line_width(width);
		let (ux, uy) = (dx / dist, dy / dist);
		let (ra, rb) = (
			state.graph.nodes[link.source].radius,
			state.graph.nodes[link.target].radius,
		);
		ctx.begin_path();
		ctx.move_to(a.x + ux * ra, a.y + uy * ra);
		ctx.line_to(b.x - ux * rb, b.y - uy * rb);
		ctx.stroke();

		// Dependency direction only matters on layering links.
		if link.kind == LinkKind::Layering {
			let arrow = 8.0 / k;
			ctx.set_fill_style_str(&format!("rgba({LINK_COLOR}, {alpha})"));
			let (tip_x, tip_y) = (b.x - ux * rb, b.y - uy * rb);
			let (back_x, back_y) = (tip_x - ux * arrow, tip_y - uy * arrow);
			let (px, py) = (-uy * arrow * 0.5, ux * arrow * 0.5);
			ctx.begin_path();
			ctx.move_to(tip_x, tip_y);
			ctx.line_to(back_x + px, back_y + py);
			ctx.line_to(back_x - px, back_y - py);
			ctx.close_path();
			ctx.fill();
		}
	}
}

fn draw_nodes(state: &GraphState, ctx: &CanvasRenderingContext2d) {
	let k = state.camera.k;

	// Faded and neutral nodes first, relevant ones on top; the same order
	// drives hit testing.
	for i in state.draw_order() {
		let node = &state.graph.nodes[i];
		let body = state.sim.body(i);
		let visual = state.interaction.visual(i);
		let faded = state.interaction.is_faded(i);

		let radius = match visual {
			NodeVisual::Interacted => node.radius * 1.25,
			NodeVisual::Neighbor => node.radius * 1.1,
			NodeVisual::Pinned => node.radius * 1.25,
			NodeVisual::Neutral => node.radius,
		};
		let alpha = if faded { FADED_ALPHA } else { 1.0 };

		ctx.set_global_alpha(alpha);
		ctx.begin_path();
		let _ = ctx.arc(body.x, body.y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&node.hex);
		ctx.fill();

		// Cycle-involved tasks get a dashed warning ring.
		if node.cycle_member {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(4.0 / k),
				&JsValue::from_f64(3.0 / k),
			));
			ctx.begin_path();
			let _ = ctx.arc(body.x, body.y, radius + 3.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("rgba(255, 159, 67, 0.9)");
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
			let _ = ctx.set_line_dash(&js_sys::Array::new());
		}

		match visual {
			NodeVisual::Pinned => {
				ctx.begin_path();
				let _ = ctx.arc(body.x, body.y, radius + 3.0 / k, 0.0, 2.0 * PI);
				ctx.set_stroke_style_str("rgba(255, 255, 255, 0.95)");
				ctx.set_line_width(2.5 / k);
				ctx.stroke();
			}
			NodeVisual::Interacted | NodeVisual::Neighbor => {
				ctx.begin_path();
				let _ = ctx.arc(body.x, body.y, radius + 2.0 / k, 0.0, 2.0 * PI);
				ctx.set_stroke_style_str("rgba(255, 255, 255, 0.7)");
				ctx.set_line_width(1.5 / k);
				ctx.stroke();
			}
			NodeVisual::Neutral => {
				if state.interaction.is_search_match(i) {
					ctx.begin_path();
					let _ = ctx.arc(body.x, body.y, radius + 2.0 / k, 0.0, 2.0 * PI);
					ctx.set_stroke_style_str("rgba(120, 220, 150, 0.9)");
					ctx.set_line_width(1.5 / k);
					ctx.stroke();
				}
			}
		}

		// Label inside the node when it fits, beside it otherwise, using the
		// contrast-picked text class against the node color.
		let font_px = 10.0 / k.max(0.5);
		ctx.set_font(&format!("{font_px}px sans-serif"));
		if radius >= font_px * 1.4 {
			ctx.set_fill_style_str(node.text_class.hex());
			ctx.set_text_align("center");
			let _ = ctx.fill_text(&node.label, body.x, body.y + font_px * 0.35);
		} else {
			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.8));
			ctx.set_text_align("left");
			let _ = ctx.fill_text(&node.label, body.x + radius + 3.0, body.y + 3.0);
		}
		ctx.set_global_alpha(1.0);
	}
	ctx.set_text_align("left");
}

/// Decaying glow on the most recently focused node.
fn draw_focus_highlight(state: &GraphState, ctx: &CanvasRenderingContext2d) {
	let Some((idx, intensity)) = state.focus_highlight else {
		return;
	};
	let t = ease_out_cubic(intensity.clamp(0.0, 1.0));
	if t < 0.01 {
		return;
	}
	let body = state.sim.body(idx);
	let radius = state.graph.nodes[idx].radius;
	let glow = radius * (1.8 + 1.2 * t);
	let Ok(gradient) = ctx.create_radial_gradient(body.x, body.y, radius * 0.3, body.x, body.y, glow)
	else {
		return;
	};
	let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", 0.35 * t));
	let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", 0.1 * t));
	let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
	ctx.begin_path();
	let _ = ctx.arc(body.x, body.y, glow, 0.0, 2.0 * PI);
	#[allow(deprecated)]
	ctx.set_fill_style(&gradient);
	ctx.fill();
}

/// Small marker showing where the tour's simulated pointer sits.
fn draw_tour_cursor(state: &GraphState, ctx: &CanvasRenderingContext2d) {
	let Some(idx) = state.tour_cursor else { return };
	let body = state.sim.body(idx);
	let r = state.graph.nodes[idx].radius;
	let k = state.camera.k;
	ctx.begin_path();
	let _ = ctx.arc(
		body.x + r * 0.8,
		body.y + r * 0.8,
		5.0 / k,
		0.0,
		2.0 * PI,
	);
	ctx.set_fill_style_str("rgba(255, 255, 255, 0.9)");
	ctx.fill();
	ctx.begin_path();
	let _ = ctx.arc(body.x + r * 0.8, body.y + r * 0.8, 8.0 / k, 0.0, 2.0 * PI);
	ctx.set_stroke_style_str("rgba(255, 255, 255, 0.5)");
	ctx.set_line_width(1.5 / k);
	ctx.stroke();
}
