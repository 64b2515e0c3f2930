use crate::geom::bounds::DomainGeometry;

/// Read-only view of the host simulation passed to every module on each step.
pub struct SimContext<'a> {
    pub domain: &'a DomainGeometry,
    /// Current simulation timestep number.
    pub step: u64,
    /// Length of one simulation timestep.
    pub dt: f64,
}

impl<'a> SimContext<'a> {
    pub fn new(domain: &'a DomainGeometry, step: u64, dt: f64) -> Self {
        Self { domain, step, dt }
    }
}
