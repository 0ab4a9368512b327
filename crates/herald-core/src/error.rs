use thiserror::Error;

use crate::domain::Route;

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("handler not found for route={0}")]
    HandlerNotFound(Route),

    #[error("duplicate handler for route={0}")]
    DuplicateHandler(Route),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing handlers for routes: {0:?}")]
    MissingRoutes(Vec<Route>),

    #[error("config decode: {0}")]
    ConfigDecode(#[from] serde_json::Error),
}
