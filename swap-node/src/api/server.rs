//! actix-web wiring: CORS, JSON payload limits, compression, request
//! logging, and route registration. Mirrors the teacher's `ApiServer`
//! builder shape, trimmed to the collaborators this node actually has
//! (no auth/rate-limit middleware, no Swagger — out of scope here).

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{dev::Server, middleware, web, App, HttpServer};
use tracing::info;

use swap_core::identity::IdentityService;
use swap_core::SwapCore;

use crate::config::ApiSettings;
use crate::node::ServiceCatalog;

use super::routes;

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    pub max_json_payload_mb: usize,
}

impl From<&ApiSettings> for ApiServerConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_address: settings.bind_address.clone(),
            port: settings.port,
            cors_allowed_origins: settings.cors_allowed_origins.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_json_payload_mb: 5,
        }
    }
}

pub struct ApiServer {
    core: Arc<SwapCore>,
    identity: Arc<IdentityService>,
    services: ServiceCatalog,
    config: ApiServerConfig,
}

impl ApiServer {
    pub fn new(
        core: Arc<SwapCore>,
        identity: Arc<IdentityService>,
        services: ServiceCatalog,
        config: ApiServerConfig,
    ) -> Self {
        Self {
            core,
            identity,
            services,
            config,
        }
    }

    pub async fn start(self) -> std::io::Result<Server> {
        let core_data = web::Data::new(self.core);
        let identity_data = web::Data::new(self.identity);
        let services_data = web::Data::new(self.services);
        let config = self.config.clone();

        let socket_addr = SocketAddr::new(
            IpAddr::from_str(&config.bind_address).unwrap_or_else(|_| IpAddr::from_str("127.0.0.1").unwrap()),
            config.port,
        );

        info!(%socket_addr, "starting api server");

        let max_bytes = config.max_json_payload_mb * 1024 * 1024;
        let cors_origins = config.cors_allowed_origins.clone();

        let server = HttpServer::new(move || {
            let mut app = App::new()
                .app_data(core_data.clone())
                .app_data(identity_data.clone())
                .app_data(services_data.clone())
                .app_data(web::JsonConfig::default().limit(max_bytes))
                .wrap(middleware::Compress::default())
                .wrap(middleware::NormalizePath::new(middleware::TrailingSlash::Trim))
                .wrap(middleware::Logger::default());

            if !cors_origins.is_empty() {
                let cors = Cors::default()
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec!["Accept", "Content-Type"])
                    .max_age(3600);
                let cors = cors_origins.iter().fold(cors, |cors, origin| {
                    if origin == "*" {
                        cors.allow_any_origin()
                    } else {
                        cors.allowed_origin(origin)
                    }
                });
                app = app.wrap(cors);
            }

            app.configure(routes::configure)
        })
        .client_request_timeout(config.request_timeout)
        .bind(socket_addr)?
        .run();

        info!(%socket_addr, "api server started");
        Ok(server)
    }
}
