//! Best-effort caller identification for monitoring endpoints

pub mod resolver;

pub use resolver::{
    extract_bearer_token, resolve_optional_caller, CallerResolver, Claims, JwtCallerResolver,
    StaticCallerResolver,
};
