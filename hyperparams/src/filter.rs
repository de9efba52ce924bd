use std::fmt;

use crate::{Activation, HyperparameterConfiguration, InitializerName};

/// A rule that removes a row from the grid.
///
/// The first six rules keep the initializer compatible with the activation,
/// the last one rejects batch normalization over singleton batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    GlorotUniformWithoutTanh,
    GlorotNormalWithoutTanh,
    UniformWithoutSigmoid,
    UntruncatedNormalWithoutSigmoid,
    HeWithTanh,
    HeWithSigmoid,
    BatchNormOnSingletonBatch,
}

impl Exclusion {
    pub const ALL: [Exclusion; 7] = [
        Exclusion::GlorotUniformWithoutTanh,
        Exclusion::GlorotNormalWithoutTanh,
        Exclusion::UniformWithoutSigmoid,
        Exclusion::UntruncatedNormalWithoutSigmoid,
        Exclusion::HeWithTanh,
        Exclusion::HeWithSigmoid,
        Exclusion::BatchNormOnSingletonBatch,
    ];

    pub fn matches(&self, config: &HyperparameterConfiguration) -> bool {
        let activation = config.activation;
        let init = config.initializer;

        match self {
            Exclusion::GlorotUniformWithoutTanh => {
                activation != Activation::Tanh && init == InitializerName::GlorotUniform
            }
            Exclusion::GlorotNormalWithoutTanh => {
                activation != Activation::Tanh && init == InitializerName::GlorotNormal
            }
            Exclusion::UniformWithoutSigmoid => {
                activation != Activation::Sigmoid && init == InitializerName::Uniform
            }
            Exclusion::UntruncatedNormalWithoutSigmoid => {
                activation != Activation::Sigmoid && init == InitializerName::UntruncatedNormal
            }
            Exclusion::HeWithTanh => activation == Activation::Tanh && init.is_he(),
            Exclusion::HeWithSigmoid => activation == Activation::Sigmoid && init.is_he(),
            Exclusion::BatchNormOnSingletonBatch => config.batch_size == 1 && config.batch_norm,
        }
    }

    /// First rule that rejects `config`, if any.
    pub fn first_match(config: &HyperparameterConfiguration) -> Option<Exclusion> {
        Exclusion::ALL.into_iter().find(|rule| rule.matches(config))
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Exclusion::GlorotUniformWithoutTanh => "glorot-uniform without tanh",
            Exclusion::GlorotNormalWithoutTanh => "glorot-normal without tanh",
            Exclusion::UniformWithoutSigmoid => "uniform without sigmoid",
            Exclusion::UntruncatedNormalWithoutSigmoid => "untruncated-normal without sigmoid",
            Exclusion::HeWithTanh => "he initializer with tanh",
            Exclusion::HeWithSigmoid => "he initializer with sigmoid",
            Exclusion::BatchNormOnSingletonBatch => "batch norm with batch size 1",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptimizerName;

    fn config(
        activation: Activation,
        initializer: InitializerName,
        batch_norm: bool,
        batch_size: usize,
    ) -> HyperparameterConfiguration {
        HyperparameterConfiguration {
            hidden_layers: vec![8],
            activation,
            learning_rate: 0.01,
            batch_norm,
            initializer,
            optimizer: OptimizerName::PlainSgd,
            epochs: 1,
            batch_size,
        }
    }

    #[test]
    fn test_glorot_requires_tanh() {
        let tanh = config(Activation::Tanh, InitializerName::GlorotNormal, false, 25);
        assert_eq!(Exclusion::first_match(&tanh), None);

        let relu = config(Activation::Relu, InitializerName::GlorotNormal, false, 25);
        assert_eq!(
            Exclusion::first_match(&relu),
            Some(Exclusion::GlorotNormalWithoutTanh)
        );
    }

    #[test]
    fn test_he_rejected_for_saturating_activations() {
        for init in InitializerName::ALL.into_iter().filter(|i| i.is_he()) {
            let tanh = config(Activation::Tanh, init, false, 25);
            let sigmoid = config(Activation::Sigmoid, init, false, 25);
            let elu = config(Activation::Elu, init, false, 25);

            assert_eq!(Exclusion::first_match(&tanh), Some(Exclusion::HeWithTanh));
            assert_eq!(Exclusion::first_match(&sigmoid), Some(Exclusion::HeWithSigmoid));
            assert_eq!(Exclusion::first_match(&elu), None);
        }
    }

    #[test]
    fn test_singleton_batch_norm() {
        let rejected = config(Activation::Sigmoid, InitializerName::Uniform, true, 1);
        assert_eq!(
            Exclusion::first_match(&rejected),
            Some(Exclusion::BatchNormOnSingletonBatch)
        );

        let no_norm = config(Activation::Sigmoid, InitializerName::Uniform, false, 1);
        assert_eq!(Exclusion::first_match(&no_norm), None);

        let larger = config(Activation::Sigmoid, InitializerName::Uniform, true, 2);
        assert_eq!(Exclusion::first_match(&larger), None);
    }

    #[test]
    fn test_prelu_and_leaky_relu_only_pair_with_he() {
        for activation in [Activation::Prelu, Activation::LeakyRelu] {
            for init in InitializerName::ALL {
                let rejected = Exclusion::first_match(&config(activation, init, false, 25));
                assert_eq!(rejected.is_none(), init.is_he(), "{} / {}", activation, init);
            }
        }
    }
}
