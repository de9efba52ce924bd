mod activation;
mod config;
mod filter;
mod grid;
mod initializer;
mod optimizer;
mod space;

pub use activation::Activation;
pub use config::HyperparameterConfiguration;
pub use filter::Exclusion;
pub use grid::Grid;
pub use initializer::InitializerName;
pub use optimizer::OptimizerName;
pub use space::ConfigSpace;

/// Normalizes a user supplied identifier so that `Leaky ReLU`, `leaky_relu`
/// and `leaky-relu` all compare equal.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .collect()
}
