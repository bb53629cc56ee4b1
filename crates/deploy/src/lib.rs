//! Deployment invocation for promptrelay.
//!
//! - **Client** (`client`) - `DeploymentClient` trait and the HTTP implementation
//! - **Invoker** (`invoker`) - runs an `InvocationPlan` (single call, image chain, persona fan-out)
//!   and turns every result, empty or failed, into a `DeploymentOutcome`

pub mod client;
pub mod invoker;

pub use client::{
    DeploymentClient, DeploymentError, DeploymentRequest, DeploymentResponse, HttpDeploymentClient,
};
pub use invoker::DeploymentInvoker;
