// In-memory session harness: a real `Coordinator` and real `ConnectionHandler`s, with channels
// standing in for sockets.
//
// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use std::ops;
use std::sync::{Arc, mpsc};

use tictactoe_online::client::{self, ClientState};
use tictactoe_online::connection::{ConnectionHandler, ReadLoopStatus};
use tictactoe_online::coordinator::{Coordinator, ServerOptions};
use tictactoe_online::event::{ClientEvent, ServerEvent};
use tictactoe_online::player::Player;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TestClientId(usize);

pub struct TestClient {
    // `None` after the client left or lost connection.
    handler: Option<ConnectionHandler>,
    coordinator: Arc<Coordinator>,
    incoming_rx: mpsc::Receiver<ServerEvent>,
    outgoing_rx: mpsc::Receiver<ClientEvent>,
    pub state: ClientState,
    pub received: Vec<ServerEvent>,
}

impl TestClient {
    #[allow(dead_code)]
    pub fn player(&self) -> Player { self.state.my_player().unwrap() }

    #[allow(dead_code)]
    pub fn is_connected(&self) -> bool { self.handler.is_some() }

    // Bypasses the local checks in `ClientState`, as a misbehaving client would.
    #[allow(dead_code)]
    pub fn send_raw(&mut self, event: ClientEvent) {
        println!("{:?} >>> {:?} (raw)", self.state.my_player(), event);
        self.deliver(event);
    }

    fn deliver(&mut self, event: ClientEvent) {
        let Some(handler) = &self.handler else {
            return;
        };
        if handler.handle_event(event) == ReadLoopStatus::Stop {
            self.drop_connection();
        }
    }

    // Same as the end of `ConnectionHandler::serve`.
    fn drop_connection(&mut self) {
        if let Some(handler) = self.handler.take() {
            self.coordinator.depart(handler.player());
        }
    }

    fn process_outgoing_events(&mut self) -> bool {
        let mut something_changed = false;
        while let Ok(event) = self.outgoing_rx.try_recv() {
            something_changed = true;
            println!("{:?} >>> {:?}", self.state.my_player(), event);
            self.deliver(event);
        }
        something_changed
    }

    fn process_incoming_events(&mut self) -> (bool, Result<(), client::EventError>) {
        let mut something_changed = false;
        while let Ok(event) = self.incoming_rx.try_recv() {
            something_changed = true;
            println!("{:?} <<< {:?}", self.state.my_player(), event);
            self.received.push(event.clone());
            if let Err(err) = self.state.process_server_event(event) {
                return (something_changed, Err(err));
            }
        }
        (something_changed, Ok(()))
    }
}

pub struct World {
    pub coordinator: Arc<Coordinator>,
    clients: Vec<TestClient>,
}

impl World {
    #[allow(dead_code)]
    pub fn new() -> Self { Self::with_options(ServerOptions::default()) }

    pub fn with_options(options: ServerOptions) -> Self {
        World {
            coordinator: Arc::new(Coordinator::new(options)),
            clients: vec![],
        }
    }

    pub fn new_client(&mut self, name: &str) -> TestClientId {
        let id = TestClientId(self.clients.len());
        let (incoming_tx, incoming_rx) = mpsc::channel();
        let (outgoing_tx, outgoing_rx) = mpsc::channel();
        let player = self.coordinator.connect(incoming_tx).unwrap();
        self.clients.push(TestClient {
            handler: Some(ConnectionHandler::new(player, Arc::clone(&self.coordinator))),
            coordinator: Arc::clone(&self.coordinator),
            incoming_rx,
            outgoing_rx,
            state: ClientState::new(name.to_owned(), outgoing_tx),
            received: vec![],
        });
        id
    }

    // Connects Alice and Bob and lets them register their names.
    #[allow(dead_code)]
    pub fn default_clients(&mut self) -> (TestClientId, TestClientId) {
        let alice = self.new_client("Alice");
        self.process_all_events();
        let bob = self.new_client("Bob");
        self.process_all_events();
        (alice, bob)
    }

    // Simulates a broken connection: no `Exit` is sent.
    #[allow(dead_code)]
    pub fn disconnect_client(&mut self, id: TestClientId) { self[id].drop_connection(); }

    pub fn process_all_events(&mut self) {
        let mut something_changed = true;
        while something_changed {
            something_changed = false;
            for client in self.clients.iter_mut() {
                if client.process_outgoing_events() {
                    something_changed = true;
                }
            }
            for client in self.clients.iter_mut() {
                let (change, reaction) = client.process_incoming_events();
                reaction.unwrap();
                if change {
                    something_changed = true;
                }
            }
        }
    }

    #[allow(dead_code)]
    pub fn clear_received(&mut self) {
        for client in self.clients.iter_mut() {
            client.received.clear();
        }
    }
}

impl ops::Index<TestClientId> for World {
    type Output = TestClient;
    fn index(&self, id: TestClientId) -> &Self::Output { &self.clients[id.0] }
}

impl ops::IndexMut<TestClientId> for World {
    fn index_mut(&mut self, id: TestClientId) -> &mut Self::Output { &mut self.clients[id.0] }
}
