pub mod gate;
pub mod policy;

pub use policy::{PolicyError, PolicyRouter, RoutePolicyRegistry};
