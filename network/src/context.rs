use candle_core::{bail, DType, Device, Result, Tensor, Var};
use candle_nn::{linear, Init, Linear, VarBuilder, VarMap};

use crate::init::InitializerChoice;

/// Owns the variables of exactly one model construction.
///
/// Each build starts from a fresh context, so parameters and layer names of
/// one model can never leak into the next.
pub struct BuildContext {
    varmap: VarMap,
    device: Device,
}

impl BuildContext {
    pub fn new(device: &Device) -> Self {
        Self {
            varmap: VarMap::new(),
            device: device.clone(),
        }
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn var_builder(&self) -> VarBuilder<'_> {
        VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device)
    }

    /// Registers `value` as a trainable variable called `name`.
    pub fn insert(&self, name: &str, value: Tensor) -> Result<Tensor> {
        let mut vars = match self.varmap.data().lock() {
            Ok(vars) => vars,
            Err(e) => bail!("variable map poisoned: {}", e),
        };
        if vars.contains_key(name) {
            bail!("variable {} is already defined", name);
        }

        let var = Var::from_tensor(&value)?;
        let tensor = var.as_tensor().clone();
        vars.insert(name.to_string(), var);
        Ok(tensor)
    }

    /// Creates a dense layer, sampling its kernel from `init`.
    ///
    /// Explicitly initialized layers start with zero biases; the library
    /// default leaves both weights and biases to candle.
    pub fn dense(
        &self,
        name: &str,
        in_dim: usize,
        out_dim: usize,
        init: &InitializerChoice,
    ) -> Result<Linear> {
        let vb = self.var_builder().pp(name);

        match init.variance_scaling() {
            None => linear(in_dim, out_dim, vb),
            Some(vs) => {
                let kernel = vs.sample(in_dim, out_dim, &self.device)?;
                let weight = self.insert(&format!("{}.weight", name), kernel)?;
                let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
                Ok(Linear::new(weight, Some(bias)))
            }
        }
    }

    /// Total number of scalars held by the context.
    pub fn parameter_count(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    pub fn into_varmap(self) -> VarMap {
        self.varmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{Distribution, FanMode, VarianceScaling};
    use candle_nn::Module;

    #[test]
    fn test_dense_with_explicit_initializer() -> Result<()> {
        let ctx = BuildContext::new(&Device::Cpu);
        let init = InitializerChoice::VarianceScaling(VarianceScaling::new(
            2.0,
            FanMode::Average,
            Distribution::Uniform,
        ));
        let layer = ctx.dense("hidden0", 6, 4, &init)?;

        assert_eq!(layer.weight().dims(), &[4, 6]);
        let bias = layer.bias().unwrap().to_vec1::<f32>()?;
        assert!(bias.iter().all(|&b| b == 0.0));

        let x = Tensor::ones((3, 6), DType::F32, &Device::Cpu)?;
        assert_eq!(layer.forward(&x)?.dims(), &[3, 4]);

        assert_eq!(ctx.parameter_count(), 6 * 4 + 4);
        Ok(())
    }

    #[test]
    fn test_dense_with_library_default() -> Result<()> {
        let ctx = BuildContext::new(&Device::Cpu);
        ctx.dense("out", 5, 1, &InitializerChoice::LibraryDefault)?;

        let data = ctx.varmap().data().lock().unwrap();
        assert!(data.contains_key("out.weight"));
        assert!(data.contains_key("out.bias"));
        Ok(())
    }

    #[test]
    fn test_duplicate_names_rejected() -> Result<()> {
        let ctx = BuildContext::new(&Device::Cpu);
        ctx.insert("w", Tensor::zeros(3, DType::F32, &Device::Cpu)?)?;
        assert!(ctx.insert("w", Tensor::zeros(3, DType::F32, &Device::Cpu)?).is_err());
        Ok(())
    }

    #[test]
    fn test_fresh_contexts_are_independent() -> Result<()> {
        let first = BuildContext::new(&Device::Cpu);
        first.dense("hidden0", 3, 2, &InitializerChoice::LibraryDefault)?;

        let second = BuildContext::new(&Device::Cpu);
        assert_eq!(second.parameter_count(), 0);
        second.dense("hidden0", 3, 2, &InitializerChoice::LibraryDefault)?;
        assert_eq!(second.parameter_count(), 3 * 2 + 2);
        Ok(())
    }
}
