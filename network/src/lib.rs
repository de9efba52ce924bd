pub mod context;
pub mod hidden;
pub mod init;
pub mod model;
pub mod optim;

pub use context::BuildContext;
pub use hidden::HiddenStack;
pub use init::{resolve_initializer, Diagnostic, InitializerChoice, ResolvedInitializer};
pub use model::{create_model, Features, ModelSpec, QuantityModel, Vocabulary};
pub use optim::{resolve_optimizer, OptimizerChoice, OptimizerKind, Solver};
