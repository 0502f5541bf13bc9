use std::sync::Arc;

use clap::Parser;
use ed2k::{config::Config, error::Error};
use tokio::{net::TcpListener, spawn, sync::Semaphore};
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

mod args;
mod peer;

use args::Args;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .without_time()
        .with_target(false)
        .with_file(false)
        .with_max_level(args.log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let mut config = Config::load().await?;
    args.apply(&mut config);
    let config = Arc::new(config);

    info!("config: {config:?}");

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port)).await?;
    info!("listening on {}", listener.local_addr()?);

    let slots = Arc::new(Semaphore::new(config.session_connections_limit as usize));

    loop {
        let (socket, addr) = listener.accept().await?;

        let Ok(permit) = slots.clone().try_acquire_owned() else {
            debug!("{addr} refused, connections limit reached");
            continue;
        };

        let config = config.clone();
        spawn(async move {
            if let Err(e) = peer::handle(socket, addr, &config).await {
                warn!("{addr}: {e}");
            }
            drop(permit);
        });
    }
}
