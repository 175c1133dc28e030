pub mod execute;
pub mod health;
pub mod integrations;
pub mod search;

pub use execute::execute_handler;
pub use health::{health_handler, ready_handler};
pub use integrations::integrations_handler;
pub use search::search_handler;
