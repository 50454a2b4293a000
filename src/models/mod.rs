//! Entity models for the tenancy control plane.

pub mod tenant;
