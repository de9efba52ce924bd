use candle_core::{backprop::GradStore, Result, Var};

/// Rescales every gradient whose L2 norm exceeds `max_norm` down to it.
/// Each variable's gradient is clipped on its own.
pub fn clip_by_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<()> {
    for var in vars {
        let Some(grad) = grads.remove(var) else {
            continue;
        };

        let norm = grad.sqr()?.sum_all()?.sqrt()?.to_dtype(candle_core::DType::F64)?;
        let norm = norm.to_scalar::<f64>()?;
        let grad = if norm > max_norm {
            (grad * (max_norm / norm))?
        } else {
            grad
        };
        grads.insert(var, grad);
    }
    Ok(())
}
