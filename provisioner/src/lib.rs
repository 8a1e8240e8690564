// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control plane that provisions and evolves database clusters on a
//! cloud infrastructure provider
//!
//! The server accepts cluster definitions over HTTP and converges cloud
//! resources to match them: encryption keys, credential secrets, storage
//! buckets, instance templates, managed instance groups, and firewall
//! rules.  Long-running work runs as background jobs that clients poll.
//!
//! Modules of note:
//!
//! - [`provider`]: the seam between orchestration logic and the cloud
//! - [`sim`]: in-memory provider implementation used by the test suite
//!   and by servers running without cloud credentials
//! - [`converge`]: per-resource-kind convergers
//! - [`app`]: the orchestration sequences and job spawning

pub mod app;
pub mod config;
pub mod converge;
mod http_entrypoints;
pub mod jobs;
pub mod provider;
pub mod scripts;
pub mod sim;

pub use config::Config;

use app::Provisioner;
use provider::CloudProvider;
use slog::{info, o, Logger};
use std::sync::Arc;

/// Packages up a running provisioner server
pub struct Server {
    /// underlying application
    pub app: Arc<Provisioner>,
    /// dropshot server for the API
    pub http_server: dropshot::HttpServer<Arc<Provisioner>>,
}

impl Server {
    /// Starts a provisioner server backed by `provider`, using the
    /// HTTP configuration in `config`.
    pub async fn start(
        config: &Config,
        provider: Arc<dyn CloudProvider>,
        log: &Logger,
    ) -> Result<Server, String> {
        info!(log, "setting up provisioner server");

        let app_log = log.new(o!("component" => "Provisioner"));
        let app = Arc::new(Provisioner::new(
            app_log,
            &config.provisioner,
            provider,
        ));

        let dropshot_log = log.new(o!("component" => "dropshot"));
        let http_server = dropshot::HttpServerStarter::new(
            &config.dropshot,
            http_entrypoints::api(),
            Arc::clone(&app),
            &dropshot_log,
        )
        .map_err(|error| format!("initializing server: {}", error))?
        .start();

        Ok(Server { app, http_server })
    }

    /// Wait for the given server to shut down
    ///
    /// Note that this doesn't initiate a graceful shutdown, so if you
    /// call this immediately after calling `start()`, the program will
    /// block indefinitely or until something else initiates a graceful
    /// shutdown.
    pub async fn wait_for_finish(self) -> Result<(), String> {
        self.http_server.await
    }
}

/// Run an instance of the provisioner server backed by the simulated
/// cloud provider.
///
/// A real cloud backend plugs in through [`Server::start`] with another
/// [`CloudProvider`] implementation.
pub async fn run_server(config: &Config) -> Result<(), String> {
    let log = config
        .log
        .to_logger("nimbus-provisioner")
        .map_err(|error| format!("initializing logger: {}", error))?;

    let provider = Arc::new(sim::SimProvider::new(
        log.new(o!("component" => "SimProvider")),
    ));
    let server = Server::start(config, provider, &log).await?;
    info!(log, "provisioner started";
        "local_addr" => %server.http_server.local_addr());
    server.wait_for_finish().await
}
