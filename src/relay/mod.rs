pub mod handlers;
pub mod stats;

pub use handlers::post_collect;
pub use stats::{get_health, get_stats};
