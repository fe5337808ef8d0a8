use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Isotopologue stem colours
// ---------------------------------------------------------------------------

const ISOTOPOLOGUE_COLORS: &[(&str, [u8; 3])] = &[
    ("H2O", [0, 0, 255]),
    ("H2(18O)", [0, 128, 128]),
    ("H2(17O)", [0, 0, 128]),
    ("HD(16O)", [0, 83, 146]),
    ("HD(18O)", [0, 255, 255]),
    ("HD(17O)", [25, 25, 112]),
    ("D2(16O)", [135, 206, 235]),
    ("O3", [0, 99, 26]),
    ("O2(18O)", [0, 176, 136]),
    ("O(18O)O", [5, 170, 107]),
    ("O2(17O)", [56, 124, 98]),
    ("O(17O)O", [96, 172, 2]),
    ("HNO3", [128, 128, 128]),
    ("H(15N)O3", [128, 128, 128]),
    ("N2O", [255, 165, 0]),
    ("N(15N)O", [255, 165, 0]),
    ("(15N)NO", [255, 165, 0]),
    ("N2(18O)", [255, 165, 0]),
    ("N2(17O)", [255, 165, 0]),
    ("O2", [128, 0, 128]),
    ("O(18O)", [75, 0, 130]),
    ("O(17O)", [128, 0, 128]),
    ("CO", [0, 128, 0]),
    ("(13C)O", [0, 128, 0]),
    ("C(18O)", [0, 128, 0]),
    ("C(17O)", [0, 128, 0]),
    ("(13C)(18O)", [0, 128, 0]),
    ("(13C)(17O)", [0, 128, 0]),
    ("CO2", [234, 95, 2]),
    ("(13C)O2", [222, 68, 125]),
    ("OC(18O)", [221, 160, 221]),
    ("OC(17O)", [225, 20, 64]),
    ("O(13C)(18O)", [255, 0, 0]),
    ("O(13C)(17O)", [224, 0, 0]),
    ("C(18O)2", [174, 0, 0]),
    ("(17O)C(18O)", [134, 0, 0]),
    ("C(17O)2", [94, 0, 0]),
    ("(13C)(18O)2", [85, 0, 0]),
    ("(18O)(13C)(17O)", [76, 0, 0]),
    ("(13C)(17O)2", [65, 0, 0]),
    ("CH4", [165, 42, 42]),
    ("(13C)H4", [150, 121, 105]),
    ("CH3D", [180, 110, 13]),
    ("(13C)H3D", [142, 99, 13]),
];

/// Stem colour of an isotopologue; unknown names get a stable hue.
pub fn isotopologue_color(name: &str) -> Color32 {
    if let Some((_, [r, g, b])) = ISOTOPOLOGUE_COLORS.iter().find(|(n, _)| *n == name) {
        return Color32::from_rgb(*r, *g, *b);
    }
    let palette = generate_palette(16);
    let slot = name.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    palette[slot % palette.len()]
}

// ---------------------------------------------------------------------------
// Continuous scale for the observation map
// ---------------------------------------------------------------------------

const VIRIDIS: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

/// Viridis colour for `value` within `[min, max]`.
pub fn viridis(value: f64, min: f64, max: f64) -> Color32 {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0) as f32
    } else {
        0.5
    };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f32;

    let to_linear = |c: [u8; 3]| -> LinSrgb {
        Srgb::new(c[0], c[1], c[2]).into_format::<f32>().into_linear()
    };
    let mixed = to_linear(VIRIDIS[lower]).mix(to_linear(VIRIDIS[lower + 1]), frac);
    let rgb: Srgb<u8> = Srgb::<f32>::from_linear(mixed).into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_isotopologues_use_fixed_colours() {
        assert_eq!(isotopologue_color("CO2"), Color32::from_rgb(234, 95, 2));
        assert_eq!(isotopologue_color("x"), isotopologue_color("x"));
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0, 0.0, 10.0), Color32::from_rgb(68, 1, 84));
        assert_eq!(viridis(10.0, 0.0, 10.0), Color32::from_rgb(253, 231, 37));
        assert_eq!(viridis(99.0, 0.0, 10.0), viridis(10.0, 0.0, 10.0));
    }
}
