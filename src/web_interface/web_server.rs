use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;

use crate::configuration::Config;
use crate::error_handling::types::WebError;
use crate::session_management::session_manager::TraceStore;
use crate::web_interface::routes::trace_api;

/// Web server for the trace HTTP API
pub struct WebServer {
    store: Arc<TraceStore>,
    config: Arc<Config>,
}

impl WebServer {
    pub fn new(store: Arc<TraceStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// Address taken from the `[server]` section.
    pub fn socket_addr(&self) -> Result<SocketAddr, WebError> {
        let server = &self.config.server;
        let ip: IpAddr = server
            .bind_address
            .parse()
            .map_err(|_| WebError::InvalidAddress(server.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, server.port))
    }

    /// Serve until the process is stopped.
    pub async fn start(&self) -> Result<(), WebError> {
        let addr = self.socket_addr()?;
        let routes = trace_api(self.store.clone(), self.config.clone());

        info!("Trace API listening on http://{}", addr);
        warp::serve(routes).run(addr).await;

        Ok(())
    }
}
