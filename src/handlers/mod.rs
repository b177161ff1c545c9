pub mod chunk;
pub mod dump;
pub mod health;
pub mod intensity;
pub mod performance;
pub mod rebuild;

pub use chunk::get_grid_chunk;
pub use dump::get_dump;
pub use health::hello;
pub use intensity::get_intensity;
pub use performance::get_performance;
pub use rebuild::{get_rebuild_status, request_rebuild};

#[cfg(test)]
pub(crate) mod test_support;
