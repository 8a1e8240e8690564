// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable that runs the provisioner server

use anyhow::{anyhow, Context};
use camino::Utf8PathBuf;
use clap::Parser;
use nimbus_provisioner::{run_server, Config};

#[derive(Debug, Parser)]
#[command(name = "nimbusd", about = "Cluster provisioning control plane")]
struct Args {
    /// Path to the server configuration file
    #[arg(long)]
    config_file: Utf8PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let config = Config::from_file(&args.config_file)
        .with_context(|| format!("loading {:?}", args.config_file))?;
    run_server(&config).await.map_err(|error| anyhow!(error))
}
