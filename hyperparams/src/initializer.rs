use std::fmt;
use std::str::FromStr;

use crate::normalize_name;

/// Weight initializer requested by a configuration.
///
/// The absence of an initializer is expressed as `Option<InitializerName>`
/// wherever it is allowed, so every variant here names a real strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitializerName {
    GlorotUniform,
    GlorotNormal,
    Uniform,
    UntruncatedNormal,
    HeNormal,
    HeUniform,
    HeAvgNormal,
    HeAvgUniform,
}

impl InitializerName {
    pub const ALL: [InitializerName; 8] = [
        InitializerName::GlorotUniform,
        InitializerName::GlorotNormal,
        InitializerName::Uniform,
        InitializerName::UntruncatedNormal,
        InitializerName::HeNormal,
        InitializerName::HeUniform,
        InitializerName::HeAvgNormal,
        InitializerName::HeAvgUniform,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InitializerName::GlorotUniform => "glorot-uniform",
            InitializerName::GlorotNormal => "glorot-normal",
            InitializerName::Uniform => "uniform",
            InitializerName::UntruncatedNormal => "untruncated-normal",
            InitializerName::HeNormal => "he-normal",
            InitializerName::HeUniform => "he-uniform",
            InitializerName::HeAvgNormal => "he-avg-normal",
            InitializerName::HeAvgUniform => "he-avg-uniform",
        }
    }

    #[inline]
    pub fn is_glorot(&self) -> bool {
        matches!(
            self,
            InitializerName::GlorotUniform | InitializerName::GlorotNormal
        )
    }

    #[inline]
    pub fn is_he(&self) -> bool {
        matches!(
            self,
            InitializerName::HeNormal
                | InitializerName::HeUniform
                | InitializerName::HeAvgNormal
                | InitializerName::HeAvgUniform
        )
    }
}

impl fmt::Display for InitializerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InitializerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        InitializerName::ALL
            .into_iter()
            .find(|init| init.name() == name)
            .ok_or_else(|| format!("Unknown weight initializer: {}", s))
    }
}
