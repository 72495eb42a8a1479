pub mod manager;
pub mod models;
pub mod repository;
pub mod store;
pub mod tunnel;

pub use manager::{
    Connect, Connection, ConnectionManager, DatabaseError, DatabaseManager, TunneledConnector,
};
pub use repository::MySqlLearnerStore;
pub use store::LearnerStore;
pub use tunnel::{SshTunnel, TunnelError};
