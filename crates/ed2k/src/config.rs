use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, create_dir_all};

use crate::{
    disk::{BufferPool, BLOCK_SIZE},
    error::Error,
    hash::Hash,
};

/// Settings of the client, stored as `config.toml` in the user config dir.
///
/// Missing keys take their default value, so a partial file is valid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The user hash sent in hellos and logins.
    pub user_agent: Hash,
    pub mod_name: String,
    pub client_name: String,
    pub listen_port: u16,
    pub udp_port: u16,
    pub version: u32,
    pub mod_major: u32,
    pub mod_minor: u32,
    pub mod_build: u32,
    pub max_fail_count: u32,
    pub max_peer_list_size: u32,
    /// Seconds.
    pub min_peer_reconnect_time: u64,
    /// Seconds.
    pub peer_connection_timeout: u64,
    pub session_connections_limit: u32,
    /// Size of the shared buffer pool, in blocks.
    pub buffer_pool_size: usize,
    pub max_connections_per_second: u32,
    /// 1 to enable compression.
    pub compression_version: u32,
    /// Milliseconds between two pings to the server, 0 disables them.
    pub server_ping_timeout: u64,
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let download_dir = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            user_agent: Hash::LIBED2K,
            mod_name: "jed2k".to_owned(),
            client_name: "jed2k".to_owned(),
            listen_port: 4661,
            udp_port: 4662,
            version: 0x3c,
            mod_major: 0,
            mod_minor: 0,
            mod_build: 0,
            max_fail_count: 20,
            max_peer_list_size: 100,
            min_peer_reconnect_time: 10,
            peer_connection_timeout: 5,
            session_connections_limit: 20,
            buffer_pool_size: 250,
            max_connections_per_second: 10,
            compression_version: 0,
            server_ping_timeout: 0,
            download_dir,
        }
    }
}

impl Config {
    /// Path of the configuration file in the user config dir, the dir is
    /// created if needed.
    ///
    /// # Errors
    ///
    /// If the user has no home dir, or the config dir can't be created.
    pub async fn config_path() -> Result<PathBuf, Error> {
        let dotfile = ProjectDirs::from("", "", "ed2k").ok_or(Error::HomeInvalid)?;
        let config_dir = dotfile.config_dir().to_path_buf();

        if !config_dir.exists() {
            create_dir_all(&config_dir)
                .await
                .map_err(|_| Error::FolderOpenError(config_dir.display().to_string()))?;
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load the configuration file of the user, see [`Config::load_from`].
    pub async fn load() -> Result<Self, Error> {
        Self::load_from(Self::config_path().await?).await
    }

    /// Read the configuration at `path`. A missing, empty or invalid file
    /// is replaced with the default configuration.
    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(_) => return Err(Error::FileOpenError(path.display().to_string())),
        };

        match content.parse::<Config>() {
            Ok(config) if !content.trim().is_empty() => Ok(config),
            _ => {
                let config = Config::default();
                fs::write(path, toml::to_string(&config)?)
                    .await
                    .map_err(|_| Error::FileOpenError(path.display().to_string()))?;
                Ok(config)
            }
        }
    }

    pub fn peer_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_connection_timeout)
    }

    /// The pool of block buffers shared by the transfers of a session.
    pub fn buffer_pool(&self) -> BufferPool {
        BufferPool::new(self.buffer_pool_size, BLOCK_SIZE as usize)
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
