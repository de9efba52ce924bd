use crate::{Activation, HyperparameterConfiguration, InitializerName, OptimizerName};

/// The axes a grid is expanded over.
///
/// Expansion is a Cartesian product in field order, with the last axis
/// (`batch_sizes`) varying fastest.
#[derive(Debug, Clone)]
pub struct ConfigSpace {
    pub hidden_layers: Vec<Vec<usize>>,
    pub activations: Vec<Activation>,
    pub learning_rates: Vec<f64>,
    pub batch_norm: Vec<bool>,
    pub initializers: Vec<InitializerName>,
    pub optimizers: Vec<OptimizerName>,
    pub epochs: Vec<usize>,
    pub batch_sizes: Vec<usize>,
}

impl Default for ConfigSpace {
    fn default() -> Self {
        Self {
            hidden_layers: vec![
                vec![200, 100, 50],
                vec![1000, 500, 250, 125, 75, 25],
                vec![5000, 2500, 1250, 750, 250, 100, 50],
            ],
            activations: vec![
                Activation::Sigmoid,
                Activation::Tanh,
                Activation::Relu,
                Activation::Elu,
            ],
            learning_rates: vec![0.001, 0.01, 0.1],
            batch_norm: vec![true, false],
            initializers: InitializerName::ALL.to_vec(),
            optimizers: vec![
                OptimizerName::PlainSgd,
                OptimizerName::Nesterov,
                OptimizerName::RmsProp,
                OptimizerName::Adam,
            ],
            epochs: vec![2, 10],
            // 28 is the preferred batch size
            batch_sizes: vec![1, 25, 30, 28, 50],
        }
    }
}

impl ConfigSpace {
    fn axis_lengths(&self) -> [usize; 8] {
        [
            self.hidden_layers.len(),
            self.activations.len(),
            self.learning_rates.len(),
            self.batch_norm.len(),
            self.initializers.len(),
            self.optimizers.len(),
            self.epochs.len(),
            self.batch_sizes.len(),
        ]
    }

    /// Number of rows before any filtering.
    pub fn raw_len(&self) -> usize {
        self.axis_lengths().iter().product()
    }

    /// Decodes the `index`-th row of the Cartesian product.
    pub fn row_at(&self, index: usize) -> Option<HyperparameterConfiguration> {
        if index >= self.raw_len() {
            return None;
        }

        let lengths = self.axis_lengths();
        let mut digits = [0usize; 8];
        let mut rest = index;
        for axis in (0..lengths.len()).rev() {
            digits[axis] = rest % lengths[axis];
            rest /= lengths[axis];
        }

        Some(HyperparameterConfiguration {
            hidden_layers: self.hidden_layers[digits[0]].clone(),
            activation: self.activations[digits[1]],
            learning_rate: self.learning_rates[digits[2]],
            batch_norm: self.batch_norm[digits[3]],
            initializer: self.initializers[digits[4]],
            optimizer: self.optimizers[digits[5]],
            epochs: self.epochs[digits[6]],
            batch_size: self.batch_sizes[digits[7]],
        })
    }

    /// All rows in enumeration order.
    pub fn expand(&self) -> impl Iterator<Item = HyperparameterConfiguration> + '_ {
        (0..self.raw_len()).filter_map(move |i| self.row_at(i))
    }
}
