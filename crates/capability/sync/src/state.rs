//! 网络部署状态机
//!
//! 部署记录描述“某个本地实体在某个网络上”的同步状态：
//!
//! ```text
//!            本地修改                 本地删除
//! CREATED ───────────► UPDATED ───────────────► REMOVED
//!    ▲                    │                        │
//!    └── 远端更新成功 ─────┘                        └── 远端删除成功后删除记录
//! ```
//!
//! 推送时根据 (status, meta) 决定对远端执行的动作；
//! `isOrigin` 的部署从不在远端创建或删除。

use domain::{DeploymentMeta, DeploymentStatus};

/// 推送时对单个部署执行的动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// 已同步，无需远端调用
    Noop,
    /// 从该网络拉取而来，保留拉取到的 remoteId，不在远端创建
    SkipOriginCreate,
    /// 在远端创建并记录返回的 remoteId
    Create,
    /// 以已记录的 remoteId 更新远端
    Update,
    /// 从远端删除后删除部署记录
    Remove,
    /// 不调用远端，直接删除部署记录
    DropRow,
}

/// 根据部署状态决定推送动作。
pub fn plan(status: DeploymentStatus, meta: &DeploymentMeta) -> SyncAction {
    let has_remote = meta.remote_id.is_some();
    match status {
        DeploymentStatus::Created if meta.is_origin => SyncAction::SkipOriginCreate,
        DeploymentStatus::Created if has_remote => SyncAction::Noop,
        DeploymentStatus::Created => SyncAction::Create,
        DeploymentStatus::Updated if has_remote => SyncAction::Update,
        DeploymentStatus::Updated if meta.is_origin => SyncAction::SkipOriginCreate,
        // 从未推送成功过的实体，更新等同于首次创建
        DeploymentStatus::Updated => SyncAction::Create,
        DeploymentStatus::Removed if meta.is_origin || !has_remote => SyncAction::DropRow,
        DeploymentStatus::Removed => SyncAction::Remove,
    }
}

/// 本地实体被修改后的部署状态。
pub fn on_local_update(status: DeploymentStatus) -> DeploymentStatus {
    match status {
        DeploymentStatus::Removed => DeploymentStatus::Removed,
        _ => DeploymentStatus::Updated,
    }
}

/// 本地实体被删除后的部署状态。
pub fn on_local_remove(_status: DeploymentStatus) -> DeploymentStatus {
    DeploymentStatus::Removed
}

/// 远端更新成功后的部署状态。
///
/// 默认回到 `CREATED`（已同步）；`reassert_updated` 时保持 `UPDATED`，每次推送都重新下发。
pub fn after_remote_update(reassert_updated: bool) -> DeploymentStatus {
    if reassert_updated {
        DeploymentStatus::Updated
    } else {
        DeploymentStatus::Created
    }
}

/// 应用数据接收开关是否需要变化：返回需要设置的新值。
///
/// 未记录过开关状态的部署按“未接通”处理。
pub fn enabled_change(link_enabled: bool, meta: &DeploymentMeta) -> Option<bool> {
    let current = meta.enabled.unwrap_or(false);
    (current != link_enabled).then_some(link_enabled)
}
