use candle_core::{DType, Device, Result, Tensor};
use hyperparams::{Activation, InitializerName};

/// Ratio between the standard deviation of a unit normal truncated at two
/// standard deviations and the untruncated one.
const TRUNCATED_NORMAL_STDDEV: f64 = 0.879_625_661_034_239_8;

/// Rounds of resampling before out-of-range draws are clamped.
const MAX_RESAMPLE_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    In,
    Out,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Normal truncated at two standard deviations.
    TruncatedNormal,
    UntruncatedNormal,
    Uniform,
}

/// Samples weights with variance `scale / n`, where `n` is picked by `mode`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceScaling {
    pub scale: f64,
    pub mode: FanMode,
    pub distribution: Distribution,
}

impl VarianceScaling {
    pub fn new(scale: f64, mode: FanMode, distribution: Distribution) -> Self {
        Self {
            scale,
            mode,
            distribution,
        }
    }

    fn fan(&self, fan_in: usize, fan_out: usize) -> f64 {
        let n = match self.mode {
            FanMode::In => fan_in as f64,
            FanMode::Out => fan_out as f64,
            FanMode::Average => (fan_in + fan_out) as f64 / 2.0,
        };
        n.max(1.0)
    }

    /// Samples a `(fan_out, fan_in)` weight matrix.
    pub fn sample(&self, fan_in: usize, fan_out: usize, device: &Device) -> Result<Tensor> {
        let variance = self.scale / self.fan(fan_in, fan_out);
        let shape = (fan_out, fan_in);

        match self.distribution {
            Distribution::Uniform => {
                let limit = (3.0 * variance).sqrt() as f32;
                Tensor::rand(-limit, limit, shape, device)
            }
            Distribution::UntruncatedNormal => {
                Tensor::randn(0f32, variance.sqrt() as f32, shape, device)
            }
            Distribution::TruncatedNormal => {
                let stddev = variance.sqrt() / TRUNCATED_NORMAL_STDDEV;
                truncated_normal(stddev, shape, device)
            }
        }
    }
}

fn truncated_normal(stddev: f64, shape: (usize, usize), device: &Device) -> Result<Tensor> {
    let bound = 2.0 * stddev;
    let mut xs = Tensor::randn(0f32, stddev as f32, shape, device)?;

    for _ in 0..MAX_RESAMPLE_ROUNDS {
        let outside = xs.abs()?.gt(bound)?;
        let remaining = outside.to_dtype(DType::U32)?.sum_all()?.to_scalar::<u32>()?;
        if remaining == 0 {
            return Ok(xs);
        }
        let fresh = Tensor::randn(0f32, stddev as f32, shape, device)?;
        xs = outside.where_cond(&fresh, &xs)?;
    }

    xs.clamp(-bound as f32, bound as f32)
}

/// Initializers that are passed through by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedInitializer {
    GlorotUniform,
    GlorotNormal,
    HeNormal,
    HeUniform,
}

impl NamedInitializer {
    pub fn variance_scaling(&self) -> VarianceScaling {
        match self {
            NamedInitializer::GlorotUniform => {
                VarianceScaling::new(1.0, FanMode::Average, Distribution::Uniform)
            }
            NamedInitializer::GlorotNormal => {
                VarianceScaling::new(1.0, FanMode::Average, Distribution::TruncatedNormal)
            }
            NamedInitializer::HeNormal => {
                VarianceScaling::new(2.0, FanMode::In, Distribution::TruncatedNormal)
            }
            NamedInitializer::HeUniform => {
                VarianceScaling::new(2.0, FanMode::In, Distribution::Uniform)
            }
        }
    }
}

/// Weight initialization applied to every dense layer of the hidden stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitializerChoice {
    /// Leave initialization to candle's own defaults.
    LibraryDefault,
    Named(NamedInitializer),
    VarianceScaling(VarianceScaling),
}

impl InitializerChoice {
    /// The sampling strategy, or `None` for the library default.
    pub fn variance_scaling(&self) -> Option<VarianceScaling> {
        match self {
            InitializerChoice::LibraryDefault => None,
            InitializerChoice::Named(named) => Some(named.variance_scaling()),
            InitializerChoice::VarianceScaling(vs) => Some(*vs),
        }
    }
}

/// Why an initializer request fell back to the library default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// A rectifier activation with an initializer outside the He family.
    Unsupported,
    /// A combination no rule recognizes.
    InvalidCombination,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedInitializer {
    pub choice: InitializerChoice,
    pub diagnostic: Option<Diagnostic>,
}

impl ResolvedInitializer {
    fn accepted(choice: InitializerChoice) -> Self {
        Self {
            choice,
            diagnostic: None,
        }
    }

    fn fallback(diagnostic: Diagnostic) -> Self {
        Self {
            choice: InitializerChoice::LibraryDefault,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Maps an activation and a requested initializer to the initializer that
/// will actually be used.
pub fn resolve_initializer(
    activation: Activation,
    name: Option<InitializerName>,
) -> ResolvedInitializer {
    use InitializerName as N;

    let Some(name) = name else {
        return ResolvedInitializer::accepted(InitializerChoice::LibraryDefault);
    };

    match (activation, name) {
        (Activation::Tanh, N::GlorotUniform) => {
            ResolvedInitializer::accepted(InitializerChoice::Named(NamedInitializer::GlorotUniform))
        }
        (Activation::Tanh, N::GlorotNormal) => {
            ResolvedInitializer::accepted(InitializerChoice::Named(NamedInitializer::GlorotNormal))
        }
        (Activation::Sigmoid, N::Uniform) => ResolvedInitializer::accepted(
            InitializerChoice::VarianceScaling(VarianceScaling::new(
                16.0,
                FanMode::Average,
                Distribution::Uniform,
            )),
        ),
        (Activation::Sigmoid, N::UntruncatedNormal) => ResolvedInitializer::accepted(
            InitializerChoice::VarianceScaling(VarianceScaling::new(
                16.0,
                FanMode::Average,
                Distribution::UntruncatedNormal,
            )),
        ),
        (activation, name) if activation.is_rectifier() => match name {
            N::HeNormal => {
                ResolvedInitializer::accepted(InitializerChoice::Named(NamedInitializer::HeNormal))
            }
            N::HeUniform => {
                ResolvedInitializer::accepted(InitializerChoice::Named(NamedInitializer::HeUniform))
            }
            N::HeAvgNormal => ResolvedInitializer::accepted(InitializerChoice::VarianceScaling(
                VarianceScaling::new(2.0, FanMode::Average, Distribution::TruncatedNormal),
            )),
            N::HeAvgUniform => ResolvedInitializer::accepted(InitializerChoice::VarianceScaling(
                VarianceScaling::new(2.0, FanMode::Average, Distribution::Uniform),
            )),
            _ => {
                log::info!(
                    "{} is not a valid initializer for {}; no weight initializer will be used",
                    name,
                    activation
                );
                ResolvedInitializer::fallback(Diagnostic::Unsupported)
            }
        },
        (activation, name) => {
            log::warn!(
                "Invalid combination of activation {} and initializer {}; no weight initializer will be used",
                activation,
                name
            );
            ResolvedInitializer::fallback(Diagnostic::InvalidCombination)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Expect {
        Library,
        Named(NamedInitializer),
        Scaled(f64, FanMode, Distribution),
        Info,
        Warn,
    }

    fn classify(resolved: ResolvedInitializer) -> Expect {
        match (resolved.choice, resolved.diagnostic) {
            (InitializerChoice::LibraryDefault, None) => Expect::Library,
            (InitializerChoice::LibraryDefault, Some(Diagnostic::Unsupported)) => Expect::Info,
            (InitializerChoice::LibraryDefault, Some(Diagnostic::InvalidCombination)) => {
                Expect::Warn
            }
            (InitializerChoice::Named(named), None) => Expect::Named(named),
            (InitializerChoice::VarianceScaling(vs), None) => {
                Expect::Scaled(vs.scale, vs.mode, vs.distribution)
            }
            other => panic!("diagnostic attached to an accepted initializer: {:?}", other),
        }
    }

    #[test]
    fn test_resolution_table() {
        use Distribution::*;
        use Expect::*;
        use NamedInitializer as Ni;

        let names: [Option<InitializerName>; 9] = [
            None,
            Some(InitializerName::GlorotUniform),
            Some(InitializerName::GlorotNormal),
            Some(InitializerName::Uniform),
            Some(InitializerName::UntruncatedNormal),
            Some(InitializerName::HeNormal),
            Some(InitializerName::HeUniform),
            Some(InitializerName::HeAvgNormal),
            Some(InitializerName::HeAvgUniform),
        ];

        let rectifier = || {
            [
                Library,
                Info,
                Info,
                Info,
                Info,
                Named(Ni::HeNormal),
                Named(Ni::HeUniform),
                Scaled(2.0, FanMode::Average, TruncatedNormal),
                Scaled(2.0, FanMode::Average, Uniform),
            ]
        };

        let table: [(Activation, [Expect; 9]); 6] = [
            (
                Activation::Tanh,
                [
                    Library,
                    Named(Ni::GlorotUniform),
                    Named(Ni::GlorotNormal),
                    Warn,
                    Warn,
                    Warn,
                    Warn,
                    Warn,
                    Warn,
                ],
            ),
            (
                Activation::Sigmoid,
                [
                    Library,
                    Warn,
                    Warn,
                    Scaled(16.0, FanMode::Average, Uniform),
                    Scaled(16.0, FanMode::Average, UntruncatedNormal),
                    Warn,
                    Warn,
                    Warn,
                    Warn,
                ],
            ),
            (Activation::Elu, rectifier()),
            (Activation::Relu, rectifier()),
            (Activation::Prelu, rectifier()),
            (Activation::LeakyRelu, rectifier()),
        ];

        for (activation, expected) in table {
            for (name, expect) in names.iter().zip(expected) {
                let got = classify(resolve_initializer(activation, *name));
                assert_eq!(got, expect, "{} / {:?}", activation, name);
            }
        }
    }

    #[test]
    fn test_named_initializers_as_variance_scaling() {
        let glorot = NamedInitializer::GlorotUniform.variance_scaling();
        assert_eq!(glorot.scale, 1.0);
        assert_eq!(glorot.mode, FanMode::Average);

        let he = NamedInitializer::HeNormal.variance_scaling();
        assert_eq!(he.scale, 2.0);
        assert_eq!(he.mode, FanMode::In);
        assert_eq!(he.distribution, Distribution::TruncatedNormal);

        assert_eq!(InitializerChoice::LibraryDefault.variance_scaling(), None);
    }

    #[test]
    fn test_uniform_sample_within_limit() -> Result<()> {
        let vs = VarianceScaling::new(2.0, FanMode::Average, Distribution::Uniform);
        let weights = vs.sample(40, 20, &Device::Cpu)?;
        assert_eq!(weights.dims(), &[20, 40]);

        // sqrt(3 * 2 / 30)
        let limit = (0.2f32).sqrt();
        let max = weights.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(max <= limit + 1e-6, "{} > {}", max, limit);
        Ok(())
    }

    #[test]
    fn test_truncated_sample_within_two_stddev() -> Result<()> {
        let vs = VarianceScaling::new(2.0, FanMode::In, Distribution::TruncatedNormal);
        let weights = vs.sample(50, 200, &Device::Cpu)?;

        let stddev = (2.0f64 / 50.0).sqrt() / TRUNCATED_NORMAL_STDDEV;
        let max = weights.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(max as f64 <= 2.0 * stddev + 1e-6);
        Ok(())
    }

    #[test]
    fn test_untruncated_sample_spread() -> Result<()> {
        let vs = VarianceScaling::new(16.0, FanMode::Average, Distribution::UntruncatedNormal);
        let weights = vs.sample(100, 100, &Device::Cpu)?;

        // variance 16 / 100
        let variance = weights.sqr()?.mean_all()?.to_scalar::<f32>()?;
        assert!((variance - 0.16).abs() < 0.02, "variance {}", variance);
        Ok(())
    }
}
