//! src/routes/subscriptions/mod.rs

mod confirm;
mod post;

pub use confirm::*;
pub use post::*;
