//! 网关引擎：南向 → 北向的内容路由与连接器注册表。

pub mod engine;
pub mod error;
pub mod factory;
pub mod router;

pub use engine::{ConnectorFailure, Engine, EngineReport};
pub use error::EngineError;
pub use factory::ConnectorFactory;
pub use router::EngineRouter;
