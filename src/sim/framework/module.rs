use anyhow::Result;

use super::{Bus, SimContext};

/// A unit of work run once per simulation step.
pub trait SimModule {
    fn name(&self) -> &'static str;

    fn init(&mut self, _ctx: &SimContext, _bus: &mut Bus) -> Result<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::{Bounds, DomainGeometry};

    struct StepCounter;

    impl SimModule for StepCounter {
        fn name(&self) -> &'static str {
            "step-counter"
        }

        fn step(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()> {
            bus.put(ctx.step);
            Ok(())
        }
    }

    #[test]
    fn test_default_init_is_ok() -> Result<()> {
        let domain = DomainGeometry::orthogonal(Bounds::from_extent(1., 1., 1.));
        let ctx = SimContext::new(&domain, 7, 0.5);
        let mut bus = Bus::new();
        let mut m = StepCounter;

        m.init(&ctx, &mut bus)?;
        m.step(&ctx, &mut bus)?;
        assert_eq!(bus.get::<u64>(), Some(&7));
        Ok(())
    }
}
