pub mod lending_pool;
pub mod notify_once;
pub mod prometheus_handle;
