//! Hex color math: tone ramps for the layer color policy and WCAG contrast
//! for text-class selection.

/// WCAG AA contrast threshold for normal text.
pub const AA_CONTRAST: f64 = 4.5;

/// Cap on tone-ramp variants per layer; assignment wraps round-robin beyond.
pub const MAX_TONE_VARIANTS: usize = 6;

const TEXT_LIGHT_HEX: &str = "#f8f9fa";
const TEXT_DARK_HEX: &str = "#212529";

/// CSS class of the label text drawn over a node color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextClass {
	#[default]
	Light,
	Dark,
}

impl TextClass {
	pub fn hex(self) -> &'static str {
		match self {
			Self::Light => TEXT_LIGHT_HEX,
			Self::Dark => TEXT_DARK_HEX,
		}
	}

	pub fn css_class(self) -> &'static str {
		match self {
			Self::Light => "text-light",
			Self::Dark => "text-dark",
		}
	}
}

/// An sRGB color with 0-255 channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
	pub r: f64,
	pub g: f64,
	pub b: f64,
}

/// Parse `#rgb` or `#rrggbb`. Returns `None` for anything else.
pub fn parse_hex(hex: &str) -> Option<Rgb> {
	let digits = hex.strip_prefix('#')?;
	let (r, g, b) = match digits.len() {
		3 => {
			let v = u32::from_str_radix(digits, 16).ok()?;
			let (r, g, b) = ((v >> 8) & 0xf, (v >> 4) & 0xf, v & 0xf);
			(r * 17, g * 17, b * 17)
		}
		6 => {
			let v = u32::from_str_radix(digits, 16).ok()?;
			((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
		}
		_ => return None,
	};
	Some(Rgb {
		r: r as f64,
		g: g as f64,
		b: b as f64,
	})
}

pub fn to_hex(c: Rgb) -> String {
	format!(
		"#{:02x}{:02x}{:02x}",
		c.r.round().clamp(0.0, 255.0) as u8,
		c.g.round().clamp(0.0, 255.0) as u8,
		c.b.round().clamp(0.0, 255.0) as u8
	)
}

/// Mix toward white by `amount` in [0, 1].
pub fn lighten(c: Rgb, amount: f64) -> Rgb {
	let t = amount.clamp(0.0, 1.0);
	Rgb {
		r: c.r + (255.0 - c.r) * t,
		g: c.g + (255.0 - c.g) * t,
		b: c.b + (255.0 - c.b) * t,
	}
}

/// Mix toward black by `amount` in [0, 1].
pub fn darken(c: Rgb, amount: f64) -> Rgb {
	let t = amount.clamp(0.0, 1.0);
	Rgb {
		r: c.r * (1.0 - t),
		g: c.g * (1.0 - t),
		b: c.b * (1.0 - t),
	}
}

/// Generate `count` variants of a base color: the base itself, then
/// alternating progressively lighter and darker tones. Unparseable bases
/// fall back to a neutral grey so assignment never fails.
pub fn tone_ramp(base_hex: &str, count: usize) -> Vec<String> {
	let base = parse_hex(base_hex).unwrap_or(Rgb {
		r: 127.0,
		g: 127.0,
		b: 127.0,
	});
	(0..count.min(MAX_TONE_VARIANTS))
		.map(|i| {
			let step = 0.12 * i.div_ceil(2) as f64;
			let toned = if i == 0 {
				base
			} else if i % 2 == 1 {
				lighten(base, step)
			} else {
				darken(base, step)
			};
			to_hex(toned)
		})
		.collect()
}

/// WCAG relative luminance of an sRGB color.
pub fn relative_luminance(c: Rgb) -> f64 {
	fn channel(v: f64) -> f64 {
		let v = v / 255.0;
		if v <= 0.03928 {
			v / 12.92
		} else {
			((v + 0.055) / 1.055).powf(2.4)
		}
	}
	0.2126 * channel(c.r) + 0.7152 * channel(c.g) + 0.0722 * channel(c.b)
}

/// WCAG contrast ratio between two colors, in [1, 21].
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
	let (la, lb) = (relative_luminance(a), relative_luminance(b));
	let (hi, lo) = if la >= lb { (la, lb) } else { (lb, la) };
	(hi + 0.05) / (lo + 0.05)
}

/// Pick the text class for a background color: whichever candidate clears
/// the 4.5:1 AA bar, preferring the higher-contrast one when both qualify
/// and falling back to the higher-contrast one when neither does.
pub fn text_class_for(background_hex: &str) -> TextClass {
	let Some(bg) = parse_hex(background_hex) else {
		return TextClass::Light;
	};
	let light = contrast_ratio(bg, parse_hex(TEXT_LIGHT_HEX).unwrap_or(bg));
	let dark = contrast_ratio(bg, parse_hex(TEXT_DARK_HEX).unwrap_or(bg));
	match (light >= AA_CONTRAST, dark >= AA_CONTRAST) {
		(true, false) => TextClass::Light,
		(false, true) => TextClass::Dark,
		_ if light >= dark => TextClass::Light,
		_ => TextClass::Dark,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_short_and_long_hex() {
		assert_eq!(parse_hex("#fff"), parse_hex("#ffffff"));
		let c = parse_hex("#1f77b4").unwrap();
		assert_eq!((c.r, c.g, c.b), (0x1f as f64, 0x77 as f64, 0xb4 as f64));
		assert!(parse_hex("1f77b4").is_none());
		assert!(parse_hex("#zzzzzz").is_none());
	}

	#[test]
	fn black_on_white_contrast_is_maximal() {
		let white = parse_hex("#ffffff").unwrap();
		let black = parse_hex("#000000").unwrap();
		let ratio = contrast_ratio(white, black);
		assert!((ratio - 21.0).abs() < 0.01);
	}

	#[test]
	fn tone_ramp_starts_at_base_and_caps() {
		let ramp = tone_ramp("#1f77b4", 10);
		assert_eq!(ramp.len(), MAX_TONE_VARIANTS);
		assert_eq!(ramp[0], "#1f77b4");
		// Odd steps lighten, even steps darken, monotonically per side.
		let lum = |hex: &str| relative_luminance(parse_hex(hex).unwrap());
		assert!(lum(&ramp[1]) > lum(&ramp[0]));
		assert!(lum(&ramp[2]) < lum(&ramp[0]));
		assert!(lum(&ramp[3]) > lum(&ramp[1]));
		assert!(lum(&ramp[4]) < lum(&ramp[2]));
	}

	#[test]
	fn chosen_text_class_clears_aa_when_possible() {
		for hex in ["#1f77b4", "#ffffff", "#000000", "#d62728", "#bcbd22"] {
			let class = text_class_for(hex);
			let bg = parse_hex(hex).unwrap();
			let chosen = contrast_ratio(bg, parse_hex(class.hex()).unwrap());
			let other = match class {
				TextClass::Light => TextClass::Dark,
				TextClass::Dark => TextClass::Light,
			};
			let rejected = contrast_ratio(bg, parse_hex(other.hex()).unwrap());
			if chosen < AA_CONTRAST {
				// Neither qualified: the higher-contrast one must have won.
				assert!(chosen >= rejected);
			}
			assert!(chosen >= AA_CONTRAST || rejected < AA_CONTRAST);
		}
	}

	#[test]
	fn dark_background_prefers_light_text() {
		assert_eq!(text_class_for("#212529"), TextClass::Light);
		assert_eq!(text_class_for("#f8f9fa"), TextClass::Dark);
	}
}
