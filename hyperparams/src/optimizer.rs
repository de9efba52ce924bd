use std::fmt;
use std::str::FromStr;

use crate::normalize_name;

/// Optimizer requested by a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizerName {
    PlainSgd,
    Momentum,
    Nesterov,
    Adagrad,
    RmsProp,
    Adam,
    LearningRateScheduling,
}

impl OptimizerName {
    pub const ALL: [OptimizerName; 7] = [
        OptimizerName::PlainSgd,
        OptimizerName::Momentum,
        OptimizerName::Nesterov,
        OptimizerName::Adagrad,
        OptimizerName::RmsProp,
        OptimizerName::Adam,
        OptimizerName::LearningRateScheduling,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerName::PlainSgd => "plain-sgd",
            OptimizerName::Momentum => "momentum",
            OptimizerName::Nesterov => "nesterov",
            OptimizerName::Adagrad => "adagrad",
            OptimizerName::RmsProp => "rmsprop",
            OptimizerName::Adam => "adam",
            OptimizerName::LearningRateScheduling => "learning-rate-scheduling",
        }
    }
}

impl fmt::Display for OptimizerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        OptimizerName::ALL
            .into_iter()
            .find(|opt| opt.name() == name)
            .ok_or_else(|| format!("Unsupported optimizer: {}", s))
    }
}
