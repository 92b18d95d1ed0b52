//! Compiled-in layer stacks selectable by keyword.

use super::MaterialLayer;

/// Keyword used when neither the command line nor the config picks a stack
pub const DEFAULT_PRESET: &str = "custom10x10";

/// All known preset keywords
pub const PRESET_NAMES: [&str; 4] = ["custom", "custom10x10", "10x10", "ME0"];

/// Look up a preset stack by keyword (case-sensitive)
pub fn preset(name: &str) -> Option<Vec<MaterialLayer>> {
    let layers: &[(&str, f64)] = match name {
        // Copper tape on a readout board, then the drift cathode
        "custom" => &[
            ("vacuum", 1.5),
            ("copper", 35e-3),
            ("vacuum", 1.0),
            ("fr4", 3.0),
            ("copper", 35e-2),
        ],
        // Source far upstream of a copper-clad board and a 10x10 window
        "custom10x10" => &[
            ("vacuum", 500.0),
            ("copper", 35e-3),
            ("fr4", 3.0),
            ("copper", 35e-3),
            ("vacuum", 1.5),
            ("kapton", 125e-3),
            ("vacuum", 3.0),
            ("kapton", 5e-3),
            ("copper", 5e-3),
        ],
        // Standard 10x10 window and drift foil
        "10x10" => &[
            ("vacuum", 1.5),
            ("kapton", 125e-3),
            ("vacuum", 3.0),
            ("kapton", 5e-3),
            ("copper", 5e-3),
        ],
        // ME0 drift board
        "ME0" => &[
            ("vacuum", 1.5),
            ("copper", 35e-3),
            ("fr4", 3.0),
            ("copper", 35e-3),
        ],
        _ => return None,
    };
    Some(
        layers
            .iter()
            .map(|(material, thickness)| MaterialLayer::new(material, *thickness))
            .collect(),
    )
}
