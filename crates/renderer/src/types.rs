use serde::{Deserialize, Serialize};

/// The closed set of transparency-compositing algorithms a view can run.
///
/// The whole point of the engine is comparing these side by side, so the set
/// is fixed at compile time and dispatched statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Weighted-blended OIT: per-sample accumulation buffers resolved in a
    /// final full-screen pass; draw order of transparent walls is irrelevant.
    WeightedBlended,
    /// Classic order-dependent blending straight onto the target. Correct
    /// only because the registry hands walls over far-to-near.
    BackToFront,
    /// Plain additive accumulation onto the target, no alpha accounting.
    Additive,
    /// Additive accumulation into an offscreen buffer, tone-mapped with a
    /// fixed exposure in the resolve pass.
    AdditiveExposure,
}

/// Anti-aliasing policy for a rendering context.
///
/// The resolve shaders composite per multisample sample, so the engine has
/// no single-sample path; a request always negotiates to some count ≥ 2
/// supported by every target format in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antialiasing {
    /// Pick the highest sample count every render target supports.
    Auto,
    /// Request a specific sample count (clamped to what the device supports).
    Samples(u32),
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self::Auto
    }
}

/// Per-context knobs a host may keep in its configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Anti-aliasing policy, negotiated at context creation.
    #[serde(default)]
    pub antialiasing: Antialiasing,
    /// Clear color of the opaque pass, linear RGB.
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 3],
}

fn default_clear_color() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            antialiasing: Antialiasing::default(),
            clear_color: default_clear_color(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_auto_msaa_over_black() {
        let settings = RenderSettings::default();
        assert_eq!(settings.antialiasing, Antialiasing::Auto);
        assert_eq!(settings.clear_color, [0.0, 0.0, 0.0]);
    }
}
