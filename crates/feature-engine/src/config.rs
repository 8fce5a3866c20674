/// Engine-wide settings, cloned into every [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Distance below which filters treat points as coincident.
    pub linear_tolerance: f64,
    /// Angle (radians) below which filters treat directions as parallel.
    pub angular_tolerance: f64,
    /// Number of finished operations kept for undo.
    pub undo_limit: usize,
    /// Largest copy count a sketch rotation may ask for.
    pub max_rotation_count: usize,
    /// Seed a new part set with `Origin`, `OX`, `OY`, `OZ`, `YOZ`, `XOZ`, `XOY`.
    pub seed_constructions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            linear_tolerance: 1e-6,
            angular_tolerance: 1e-6,
            undo_limit: 100,
            max_rotation_count: 1000,
            seed_constructions: true,
        }
    }
}

impl EngineConfig {
    /// A part set without construction features.
    pub fn bare() -> Self {
        Self {
            seed_constructions: false,
            ..Self::default()
        }
    }

    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }
}
