use candle_core::Result;
use network::QuantityModel;

use crate::data::TensorSplit;

/// Mean squared error of `model` over `split`, in inference mode.
pub fn evaluate(model: &QuantityModel, split: &TensorSplit, batch_size: usize) -> Result<f32> {
    let n = split.len()?;
    if n == 0 {
        return Ok(0.0);
    }

    let ids: Vec<u32> = (0..n as u32).collect();
    let mut squared_error = 0f64;

    for chunk in ids.chunks(batch_size.max(1)) {
        let (x, y) = split.batch(chunk)?;
        let preds = model.forward_t(&x, false)?;
        let batch_error = (preds - y)?.sqr()?.sum_all()?.to_scalar::<f32>()?;
        squared_error += batch_error as f64;
    }

    Ok((squared_error / n as f64) as f32)
}
