use crate::core::address::MacAddress;
use crate::core::command::GpioStatus;
use crate::error::{constants, ProtocolError, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(GpioStatus) -> BoxFuture<'static, ()> + Send + Sync + 'static;

/// Routes unsolicited relay change reports to per-device handlers.
#[derive(Clone)]
pub struct ReportDispatcher {
    handlers: Arc<RwLock<HashMap<MacAddress, Arc<HandlerFn>>>>,
}

impl Default for ReportDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register (or replace) the handler for `address`.
    pub fn register<F, Fut>(&self, address: MacAddress, handler: F) -> Result<()>
    where
        F: Fn(GpioStatus) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        let handler: Arc<HandlerFn> =
            Arc::new(move |status: GpioStatus| handler(status).boxed());
        handlers.insert(address, handler);
        Ok(())
    }

    pub fn unregister(&self, address: &MacAddress) -> Result<bool> {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;
        Ok(handlers.remove(address).is_some())
    }

    /// Start the handler for `address` on its own task.
    ///
    /// Returns as soon as the handler is spawned, so a handler may itself
    /// await device requests whose replies arrive on the same receive loop.
    /// Returns false when none is registered. Must be called from within a
    /// Tokio runtime.
    pub fn dispatch(&self, address: &MacAddress, status: GpioStatus) -> Result<bool> {
        let handler = {
            let handlers = self.handlers.read().map_err(|_| {
                ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string())
            })?;
            handlers.get(address).cloned()
        };

        match handler {
            Some(handler) => {
                tokio::spawn(handler(status));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
