use std::path::PathBuf;

use clap::Parser;
use ed2k::config::Config;
use tracing::Level;

/// CLI flags of the daemon. These values take preference over the values
/// of the config file.
#[derive(Parser, Debug)]
#[clap(name = "ed2kd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Accept peer connections on this port.
    #[clap(short, long)]
    pub listen_port: Option<u16>,

    /// The directory in which files will be downloaded.
    #[clap(short, long)]
    pub download_dir: Option<PathBuf>,

    /// Name announced to other clients.
    #[clap(long)]
    pub client_name: Option<String>,

    /// Maximum number of peers connected at the same time.
    #[clap(long)]
    pub connections_limit: Option<u32>,

    /// One of trace, debug, info, warn, error.
    #[clap(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Args {
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(name) = &self.client_name {
            config.client_name = name.clone();
        }
        if let Some(limit) = self.connections_limit {
            config.session_connections_limit = limit;
        }
    }
}
