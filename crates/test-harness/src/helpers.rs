//! Helper functions: error type, tracing setup, selection and region constructors.

use std::sync::Once;

use feature_engine::{EngineError, Region, RotationSpec, SelectionList};
use file_format::{LoadError, SaveError};
use geom_kernel::{Profile, ShapeType};
use shape_types::Selection;
use tracing_subscriber::EnvFilter;

// ── Error Type ──────────────────────────────────────────────────────────────

/// Unified error type for the test harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("feature not found: {name}")]
    FeatureNotFound { name: String },

    #[error("no part has been created")]
    NoPart,

    #[error("assertion failed: {detail}")]
    AssertionFailed { detail: String },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("save failed: {0}")]
    Save(#[from] SaveError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),
}

// ── Tracing ─────────────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Install a fmt subscriber writing through the test capture.
///
/// The level comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ── Selections ──────────────────────────────────────────────────────────────

pub fn face(name: &str) -> Selection {
    Selection::new(ShapeType::Face, name)
}

pub fn edge(name: &str) -> Selection {
    Selection::new(ShapeType::Edge, name)
}

pub fn solid(name: &str) -> Selection {
    Selection::new(ShapeType::Solid, name)
}

pub fn compound(name: &str) -> Selection {
    Selection::new(ShapeType::Compound, name)
}

/// A selection list of `shape_type` over `names`.
pub fn list(shape_type: ShapeType, names: &[&str]) -> SelectionList {
    SelectionList::new(
        shape_type,
        names.iter().map(|n| Selection::new(shape_type, *n)).collect(),
    )
}

// ── Sketch Regions ──────────────────────────────────────────────────────────

/// Axis-aligned rectangle with its lower-left corner at `(x, y)`.
pub fn rect(label: &str, x: f64, y: f64, w: f64, h: f64) -> Region {
    Region::new(
        label,
        Profile::Polygon {
            points: vec![[x, y], [x + w, y], [x + w, y + h], [x, y + h]],
        },
    )
}

pub fn circle(label: &str, cx: f64, cy: f64, r: f64) -> Region {
    Region::new(
        label,
        Profile::Circle {
            center: [cx, cy],
            radius: r,
        },
    )
}

/// Full-turn circular repetition of `regions` around the sketch origin,
/// `count` instances including the original.
pub fn full_turn(regions: &[&str], count: &str) -> RotationSpec {
    RotationSpec {
        regions: regions.iter().map(|r| r.to_string()).collect(),
        center: [0.0, 0.0],
        count: count.to_string(),
        full_angle: 360.0,
    }
}
