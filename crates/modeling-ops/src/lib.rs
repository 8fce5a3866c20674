pub mod boolean;
pub mod compound;
pub mod diff;
pub mod extrude;
pub mod fillet;
pub mod kernel_ext;
pub mod primitives;
pub mod sketch;
pub mod types;

pub use boolean::{execute_fuse, execute_partition};
pub use compound::execute_compound;
pub use diff::{snapshot, DiffResult, TopoSnapshot};
pub use extrude::execute_extrude;
pub use fillet::execute_fillet;
pub use kernel_ext::KernelBundle;
pub use primitives::{execute_axis, execute_box, execute_cylinder, execute_plane, execute_point};
pub use sketch::{execute_sketch, expand_rotations, RotationPattern};
pub use types::*;
