use crate::error::{constants, ProtocolError, Result};
use crate::packager::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(Value) -> Result<Value> + Send + Sync + 'static;

/// Routes a request to the handler registered for its method name.
///
/// Names match exactly, including case.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<String, Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(&self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert(method.to_string(), Box::new(handler));
        Ok(())
    }

    pub fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;

        handlers
            .get(method)
            .ok_or_else(|| ProtocolError::UnknownMethod(method.to_string()))
            .and_then(|handler| handler(params))
    }

    pub fn methods(&self) -> Vec<String> {
        self.handlers
            .read()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default()
    }
}
