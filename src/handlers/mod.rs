// handlers/mod.rs - HTTP handlers
//
// mdl_user: learner summary, profile and recent-learner reads
// health:   service info and database liveness

pub mod health;
pub mod mdl_user;

pub use health::{health, root};
pub use mdl_user::{mdl_user_get, mdl_user_list, mdl_user_profile_get};
