/// Tunables of the mock kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Points closer than this are the same vertex.
    pub coincidence: f64,
    /// Half extent of the square face built for construction planes.
    pub plane_half_size: f64,
    /// Length of construction axes.
    pub axis_length: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            plane_half_size: 50.0,
            axis_length: 100.0,
        }
    }
}
