//! src/routes/mod.rs

mod health_check;
mod login;
mod newsletters;
mod subscriptions;

pub use health_check::*;
pub use login::*;
pub use newsletters::*;
pub use subscriptions::*;
