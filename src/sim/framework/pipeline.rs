use anyhow::{Context, Result};

use super::{Bus, SimContext, SimModule};

/// Runs modules in insertion order.
pub struct Pipeline {
    modules: Vec<Box<dyn SimModule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { modules: vec![] }
    }

    pub fn with_module<M: SimModule + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn init(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()> {
        for module in self.modules.iter_mut() {
            let name = module.name();
            module
                .init(ctx, bus)
                .with_context(|| format!("initializing module '{name}'"))?;
        }
        Ok(())
    }

    pub fn step(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()> {
        for module in self.modules.iter_mut() {
            let name = module.name();
            module
                .step(ctx, bus)
                .with_context(|| format!("module '{name}' failed at step {}", ctx.step))?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::{Bounds, DomainGeometry};

    struct Push(u32);

    impl SimModule for Push {
        fn name(&self) -> &'static str {
            "push"
        }

        fn step(&mut self, _ctx: &SimContext, bus: &mut Bus) -> Result<()> {
            let mut seen: Vec<u32> = bus.take().unwrap_or_default();
            seen.push(self.0);
            bus.put(seen);
            Ok(())
        }
    }

    struct Fail;

    impl SimModule for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn step(&mut self, _ctx: &SimContext, _bus: &mut Bus) -> Result<()> {
            anyhow::bail!("boom")
        }
    }

    #[test]
    fn test_modules_run_in_order() -> Result<()> {
        let domain = DomainGeometry::orthogonal(Bounds::from_extent(1., 1., 1.));
        let ctx = SimContext::new(&domain, 0, 1.0);
        let mut bus = Bus::new();
        let mut p = Pipeline::new().with_module(Push(1)).with_module(Push(2));
        assert_eq!(p.len(), 2);
        p.init(&ctx, &mut bus)?;
        p.step(&ctx, &mut bus)?;
        assert_eq!(bus.get::<Vec<u32>>(), Some(&vec![1, 2]));
        Ok(())
    }

    #[test]
    fn test_failure_names_the_module() {
        let domain = DomainGeometry::orthogonal(Bounds::from_extent(1., 1., 1.));
        let ctx = SimContext::new(&domain, 3, 1.0);
        let mut bus = Bus::new();
        let mut p = Pipeline::new().with_module(Fail);
        let err = p.step(&ctx, &mut bus).unwrap_err();
        assert!(err.to_string().contains("'fail'"));
    }
}
