use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use log::{error, info};
use tictactoe_online::server::SessionServer;

use crate::server_config::ServerConfig;


enum ShutdownReason {
    SessionOver,
    Interrupted,
}

pub fn run(config: ServerConfig) -> anyhow::Result<()> {
    let server = SessionServer::bind(
        (config.bind_address.as_str(), config.port),
        config.server_options(),
    )
    .with_context(|| format!("Cannot listen on {}:{}", config.bind_address, config.port))?;

    let (tx, rx) = mpsc::channel();
    let tx_interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = tx_interrupt.send(ShutdownReason::Interrupted);
    })
    .context("Cannot set Ctrl-C handler")?;
    thread::spawn(move || {
        if let Err(err) = server.run() {
            error!("Server stopped: {}", err);
        }
        let _ = tx.send(ShutdownReason::SessionOver);
    });

    // Connection threads are detached from here on; returning ends the process.
    match rx.recv() {
        Ok(ShutdownReason::SessionOver) | Err(_) => info!("Session is over, shutting down"),
        Ok(ShutdownReason::Interrupted) => info!("Interrupted, shutting down"),
    }
    Ok(())
}
