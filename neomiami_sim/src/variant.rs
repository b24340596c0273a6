//! Dashboard variants the harness can drive.

/// Which scene runs next to the telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Themed dashboard with the animated neon city
    NeoMiami,

    /// Minimal page with a single spinning cube
    Cube,
}

impl Variant {
    /// Returns every variant.
    pub fn all() -> Vec<Variant> {
        vec![Variant::NeoMiami, Variant::Cube]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variant::NeoMiami => "neo_miami",
            Variant::Cube => "cube",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variant::NeoMiami => "55 pulsing towers, neon path and starfield beside live metrics",
            Variant::Cube => "One normal-shaded cube spinning 0.01 rad per frame",
        }
    }

    /// True when every frame is a pure function of elapsed time.
    pub fn is_time_driven(&self) -> bool {
        matches!(self, Variant::NeoMiami)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "neo_miami" | "neo-miami" | "neomiami" | "city" => Ok(Variant::NeoMiami),
            "cube" | "minimal" => Ok(Variant::Cube),
            _ => Err(format!("Unknown variant: {}", s)),
        }
    }
}
