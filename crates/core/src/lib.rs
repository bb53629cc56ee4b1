pub mod args;
pub mod config;
pub mod domain;
pub mod errors;
pub mod registry;

pub use domain::inputs::InputMapping;
pub use domain::plan::{DeploymentOutcome, InvocationPlan, PersonaTarget};
pub use domain::reply::ReplyTarget;
pub use errors::{RelayError, UpstreamStage};
pub use registry::{CommandDefinition, CommandId, CommandRegistry, InputRule, RegistryError};
