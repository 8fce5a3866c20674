use geom_kernel::{PlaneFrame, Profile};
use serde::{Deserialize, Serialize};

use crate::kernel_ext::KernelBundle;
use crate::types::{OpError, OpResult};

/// Circular repetition of some sketch regions around a centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationPattern {
    /// Labels of the regions to repeat.
    pub regions: Vec<String>,
    pub center: [f64; 2],
    /// Total number of instances, the original included.
    pub count: usize,
    /// Angle covered by the instances, in degrees.
    #[serde(default = "full_turn")]
    pub full_angle: f64,
}

fn full_turn() -> f64 {
    360.0
}

fn rotated_about(profile: &Profile, center: [f64; 2], angle: f64) -> Profile {
    let shift = |p: [f64; 2], s: f64| [p[0] + s * center[0], p[1] + s * center[1]];
    let local = match profile {
        Profile::Polygon { points } => Profile::Polygon {
            points: points.iter().map(|p| shift(*p, -1.0)).collect(),
        },
        Profile::Circle { center: c, radius } => Profile::Circle {
            center: shift(*c, -1.0),
            radius: *radius,
        },
    };
    match local.rotated(angle) {
        Profile::Polygon { points } => Profile::Polygon {
            points: points.iter().map(|p| shift(*p, 1.0)).collect(),
        },
        Profile::Circle { center: c, radius } => Profile::Circle {
            center: shift(c, 1.0),
            radius,
        },
    }
}

/// Append the rotated copies of every pattern after the original regions.
///
/// Copy `k` of region `R` is labelled `R_copy<k>`, with `k` starting at 2.
pub fn expand_rotations(
    profiles: &[(String, Profile)],
    patterns: &[RotationPattern],
) -> Result<Vec<(String, Profile)>, OpError> {
    let mut out = profiles.to_vec();
    for pattern in patterns {
        if pattern.count == 0 {
            return Err(OpError::InvalidParameter {
                reason: "rotation count must be at least 1".into(),
            });
        }
        let step = if (pattern.full_angle.abs() - 360.0).abs() < 1e-12 {
            pattern.full_angle / pattern.count as f64
        } else if pattern.count > 1 {
            pattern.full_angle / (pattern.count - 1) as f64
        } else {
            0.0
        };
        for k in 1..pattern.count {
            for region in &pattern.regions {
                let (_, profile) = profiles.iter().find(|(l, _)| l == region).ok_or_else(|| {
                    OpError::InvalidParameter {
                        reason: format!("rotation refers to unknown region {region}"),
                    }
                })?;
                let angle = (step * k as f64).to_radians();
                out.push((
                    format!("{region}_copy{}", k + 1),
                    rotated_about(profile, pattern.center, angle),
                ));
            }
        }
    }
    Ok(out)
}

/// Build the faces of a sketch: the regions plus their rotated copies.
pub fn execute_sketch(
    kb: &mut dyn KernelBundle,
    frame: &PlaneFrame,
    profiles: &[(String, Profile)],
    patterns: &[RotationPattern],
) -> Result<OpResult, OpError> {
    if profiles.is_empty() {
        return Err(OpError::NoProfiles);
    }
    let all = expand_rotations(profiles, patterns)?;
    Ok(OpResult::single(kb.make_profile_faces(frame, &all)?, false))
}
