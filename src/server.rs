// Transport bootstrap: accepts exactly two WebSocket peers and runs the session until both leave.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, mpsc};
use std::thread;

use log::{info, warn};
use tungstenite::WebSocket;
use tungstenite::protocol::Role;

use crate::connection::{self, ConnectionHandler};
use crate::controller::TOTAL_PLAYERS;
use crate::coordinator::{Coordinator, ServerOptions};
use crate::network;
use crate::player::Player;


pub struct SessionServer {
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
}

impl SessionServer {
    pub fn bind(addr: impl ToSocketAddrs, options: ServerOptions) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(SessionServer {
            listener,
            coordinator: Arc::new(Coordinator::new(options)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }
    pub fn coordinator(&self) -> Arc<Coordinator> { Arc::clone(&self.coordinator) }

    // Blocks until both players have connected and then left.
    pub fn run(self) -> io::Result<()> {
        let SessionServer { listener, coordinator } = self;
        info!("Listening to connections on {}...", listener.local_addr()?);
        let mut threads = Vec::new();
        let mut num_connected = 0;
        while num_connected < TOTAL_PLAYERS {
            let (stream, peer_addr) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Cannot establish connection: {}", err);
                    continue;
                }
            };
            let socket = match tungstenite::accept(stream) {
                Ok(socket) => socket,
                Err(err) => {
                    warn!("WebSocket handshake with {} failed: {}", peer_addr, err);
                    continue;
                }
            };
            match start_connection(&coordinator, socket) {
                Ok((player, handles)) => {
                    info!("Client {} joined as player {}", peer_addr, player);
                    threads.extend(handles);
                    num_connected += 1;
                }
                Err(err) => warn!("Cannot start session for {}: {}", peer_addr, err),
            }
        }
        // Both slots are taken: nobody else can join.
        drop(listener);

        coordinator.wait_until_finished();
        for handle in threads {
            if handle.join().is_err() {
                warn!("Connection thread panicked");
            }
        }
        info!("Both players left, session is over");
        Ok(())
    }
}

// Fails only before the peer is given a player slot. Once the slot is taken, a thread spawn
// failure counts as that player leaving.
fn start_connection(
    coordinator: &Arc<Coordinator>, socket: WebSocket<TcpStream>,
) -> io::Result<(Player, Vec<thread::JoinHandle<()>>)> {
    let writer_socket = network::clone_websocket(&socket, Role::Server)?;
    let (events_tx, events_rx) = mpsc::channel();
    let player = coordinator.connect(events_tx).map_err(io::Error::other)?;
    let handler = ConnectionHandler::new(player, Arc::clone(coordinator));
    let mut threads = Vec::new();
    let spawned = thread::Builder::new()
        .name(format!("writer-{player}"))
        .spawn(move || connection::run_writer(player, writer_socket, events_rx))
        .and_then(|writer| {
            threads.push(writer);
            thread::Builder::new()
                .name(format!("reader-{player}"))
                .spawn(move || handler.serve(socket))
        });
    match spawned {
        Ok(reader) => threads.push(reader),
        Err(err) => {
            warn!("Cannot start connection threads for player {}: {}", player, err);
            coordinator.depart(player);
        }
    }
    Ok((player, threads))
}
