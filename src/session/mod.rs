//! 设备会话：连接、健康检查、一次修复
//!
//! 状态流转：Disconnected → Connecting → HealthChecking → {Healthy | Unhealthy}
//! → Repairing → {Healthy | Fatal}。连接失败按探测失败处理；修复只尝试一次，
//! 修复失败是整个流程中唯一的致命错误。

use std::ops::Deref;
use std::sync::Arc;

use crate::core::SessionError;
use crate::device::Device;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    HealthChecking,
    Healthy,
    Unhealthy,
    Repairing,
    Fatal,
}

/// 已确认健康的设备会话；解引用为 `dyn Device`
#[derive(Clone)]
pub struct Session {
    device: Arc<dyn Device>,
    device_id: String,
}

impl Session {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device(&self) -> Arc<dyn Device> {
        self.device.clone()
    }
}

impl Deref for Session {
    type Target = dyn Device;

    fn deref(&self) -> &Self::Target {
        self.device.as_ref()
    }
}

/// 会话管理器：记录经过的每个状态
pub struct SessionManager {
    device: Arc<dyn Device>,
    history: Vec<SessionState>,
}

impl SessionManager {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            history: vec![SessionState::Disconnected],
        }
    }

    /// 最近一次 open 经过的状态序列
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.history.last().copied().unwrap_or(SessionState::Disconnected)
    }

    fn enter(&mut self, state: SessionState) {
        tracing::debug!(?state, "session state");
        self.history.push(state);
    }

    /// 打开会话；健康则直接返回，不健康则修复一次
    pub async fn open(&mut self, device_id: &str) -> Result<Session, SessionError> {
        self.history.clear();
        self.enter(SessionState::Disconnected);
        self.enter(SessionState::Connecting);

        let healthy = match self.device.connect(device_id).await {
            Ok(()) => {
                self.enter(SessionState::HealthChecking);
                match self.device.probe().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(device = %device_id, error = %e, "device probe failed");
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!(device = %device_id, error = %e, "device connect failed");
                false
            }
        };

        if !healthy {
            self.enter(SessionState::Unhealthy);
            self.enter(SessionState::Repairing);
            tracing::info!(device = %device_id, "repairing device session");
            if let Err(e) = self.device.repair().await {
                self.enter(SessionState::Fatal);
                tracing::error!(device = %device_id, error = %e, "device repair failed");
                return Err(SessionError::Fatal {
                    device: device_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        self.enter(SessionState::Healthy);
        tracing::info!(device = %device_id, repaired = !healthy, "device session ready");
        Ok(Session {
            device: self.device.clone(),
            device_id: device_id.to_string(),
        })
    }
}
