pub mod health;
pub mod liveness;
pub mod material;
pub mod query;
pub mod readiness;
pub mod vectorize;
