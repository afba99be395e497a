pub mod api;
pub mod app;
pub mod shutdown;

use std::sync::Arc;
use vigil_alert::AlertEngine;

pub use app::build_engine;
pub use shutdown::{ShutdownSignal, SignalHandler};

/// HTTP 处理器共享状态
pub struct AppState {
    pub engine: Arc<AlertEngine>,
}

impl AppState {
    pub fn new(engine: Arc<AlertEngine>) -> Arc<Self> {
        Arc::new(Self { engine })
    }
}
