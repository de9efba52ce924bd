use std::fmt;
use std::str::FromStr;

use crate::normalize_name;

/// Hidden-layer activation function named by a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    Tanh,
    Sigmoid,
    Elu,
    Relu,
    Prelu,
    LeakyRelu,
}

impl Activation {
    pub const ALL: [Activation; 6] = [
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Elu,
        Activation::Relu,
        Activation::Prelu,
        Activation::LeakyRelu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Elu => "elu",
            Activation::Relu => "relu",
            Activation::Prelu => "prelu",
            Activation::LeakyRelu => "leaky-relu",
        }
    }

    /// ReLU and its variants, which pair with the He family of initializers.
    #[inline]
    pub fn is_rectifier(&self) -> bool {
        matches!(
            self,
            Activation::Elu | Activation::Relu | Activation::Prelu | Activation::LeakyRelu
        )
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        Activation::ALL
            .into_iter()
            .find(|activation| activation.name() == name)
            .ok_or_else(|| format!("Unknown activation function: {}", s))
    }
}
