use std::fmt;

use crate::{Activation, InitializerName, OptimizerName};

/// One row of the hyperparameter grid.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterConfiguration {
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
    pub learning_rate: f64,
    pub batch_norm: bool,
    pub initializer: InitializerName,
    pub optimizer: OptimizerName,
    pub epochs: usize,
    pub batch_size: usize,
}

impl HyperparameterConfiguration {
    /// Flat `(name, value)` pairs, one per hyperparameter, in declaration order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("hidden_layers", format_widths(&self.hidden_layers)),
            ("activation", self.activation.to_string()),
            ("learning_rate", self.learning_rate.to_string()),
            ("batch_norm", self.batch_norm.to_string()),
            ("initializer", self.initializer.to_string()),
            ("optimizer", self.optimizer.to_string()),
            ("epochs", self.epochs.to_string()),
            ("batch_size", self.batch_size.to_string()),
        ]
    }
}

impl fmt::Display for HyperparameterConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries();
        let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

        for (i, (name, value)) in entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<width$}  {}", name, value, width = width)?;
        }
        Ok(())
    }
}

fn format_widths(widths: &[usize]) -> String {
    let widths: Vec<String> = widths.iter().map(|w| w.to_string()).collect();
    format!("[{}]", widths.join(", "))
}
