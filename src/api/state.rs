use crate::detect::engine::PatternEngine;
use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub engine: PatternEngine,
}
