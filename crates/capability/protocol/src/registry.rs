//! 协议处理器注册表：networkProtocolId → 处理器。

use crate::error::ProtocolError;
use crate::handler::ProtocolHandler;
use domain::Id;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    handlers: HashMap<Id, Arc<dyn ProtocolHandler>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, network_protocol_id: Id, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.insert(network_protocol_id, handler);
    }

    pub fn handler(&self, network_protocol_id: Id) -> Result<Arc<dyn ProtocolHandler>, ProtocolError> {
        self.handlers.get(&network_protocol_id).cloned().ok_or_else(|| {
            ProtocolError::NotSupported(format!(
                "no handler registered for network protocol {}",
                network_protocol_id
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
