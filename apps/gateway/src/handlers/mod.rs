//! Handlers 模块

pub mod north;
pub mod south;
pub mod status;

pub use north::*;
pub use south::*;
pub use status::*;
