//! 验证辅助函数
//!
//! - ensure_identifier：更新 / 删除必须带有非空的定位条件
//! - ensure_page：分页参数不得为负

use crate::error::StorageError;
use crate::traits::ListQuery;
use serde::Serialize;
use serde_json::Value;

/// 验证定位条件非空
///
/// 空过滤条件会匹配任意记录，不能用于定位单条记录。
pub fn ensure_identifier<F: Serialize>(identifier: &F) -> Result<(), StorageError> {
    match serde_json::to_value(identifier)? {
        Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(StorageError::new("identifier required")),
    }
}

/// 验证分页参数
pub fn ensure_page<F>(query: &ListQuery<F>) -> Result<(), StorageError> {
    if query.limit.is_some_and(|limit| limit < 0) {
        return Err(StorageError::new("limit must not be negative"));
    }
    if query.offset.is_some_and(|offset| offset < 0) {
        return Err(StorageError::new("offset must not be negative"));
    }
    Ok(())
}
