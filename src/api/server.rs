use crate::api::routes;
use crate::config::SharedConfig;
use crate::workflow::Provisioner;
use std::future::Future;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct AppState {
    pub config: SharedConfig,
    pub provisioner: Provisioner,
}

/// Serve the API on [`Config::api_bind_addr`][crate::config::Config::api_bind_addr] until
/// `shutdown` resolves, then finish in-flight requests and return.
pub fn new(
    config: SharedConfig,
    provisioner: Provisioner,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&config.api_bind_addr)
        .serve(
            routes::new(AppState {
                config,
                provisioner,
            })
            .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
}
