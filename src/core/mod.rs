//! 核心编排层：错误类型、组件装配、批量运行主循环

pub mod builder;
pub mod error;
pub mod orchestrator;

pub use builder::PilotBuilder;
pub use error::{DeviceError, RunError, SessionError, StepError};
pub use orchestrator::{Orchestrator, RunSummary};
