pub mod inputs;
pub mod plan;
pub mod reply;
