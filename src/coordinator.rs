// Session coordinator: binds connections to player identities and fans server events out to them.
//
// All game state lives in one `SessionController` behind one mutex. Every operation collects the
// events it wants to send and pushes them to the outlets before the lock is released, so both
// players see events in the order the controller applied them. Outlets are unbounded, so a slow
// peer still never holds up the other player.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, mpsc};

use enum_map::{EnumMap, enum_map};
use log::{info, warn};
use strum::IntoEnumIterator;

use crate::board::Board;
use crate::controller::{SessionController, SessionPhase};
use crate::coord::Coord;
use crate::event::{ServerEvent, SessionRejection, WAITING_FOR_OPPONENT_MESSAGE};
use crate::player::Player;
use crate::scores::Scores;


// Outbound channel of one connection. Dropping it lets the connection writer finish.
pub type Outlet = mpsc::Sender<ServerEvent>;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ServerOptions {
    // Reply to refused events with `ServerEvent::Rejection` instead of dropping them silently.
    pub report_rejections: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionFull;

impl fmt::Display for SessionFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "both player slots are taken")
    }
}

impl std::error::Error for SessionFull {}


struct Delivery {
    outlet: Outlet,
    event: ServerEvent,
}

#[derive(Default)]
struct Deliveries(Vec<Delivery>);

impl Deliveries {
    fn send_to(&mut self, outlet: Option<&Outlet>, event: ServerEvent) {
        if let Some(outlet) = outlet {
            self.0.push(Delivery { outlet: outlet.clone(), event });
        }
    }

    fn broadcast(&mut self, outlets: &EnumMap<Player, Option<Outlet>>, event: &ServerEvent) {
        info!("Server broadcast: {:?}", event);
        for outlet in outlets.values() {
            self.send_to(outlet.as_ref(), event.clone());
        }
    }

    // Must be called while holding the state lock.
    fn dispatch(self) {
        for Delivery { outlet, event } in self.0 {
            // An error means the connection writer is gone; the reader will report the departure.
            let _ = outlet.send(event);
        }
    }
}


struct CoordinatorState {
    controller: SessionController,
    outlets: EnumMap<Player, Option<Outlet>>,
    num_assigned: usize,
    finished: bool,
}

pub struct Coordinator {
    options: ServerOptions,
    state: Mutex<CoordinatorState>,
    finished_cv: Condvar,
}

impl Coordinator {
    pub fn new(options: ServerOptions) -> Self {
        Coordinator {
            options,
            state: Mutex::new(CoordinatorState {
                controller: SessionController::new(),
                outlets: enum_map! { _ => None },
                num_assigned: 0,
                finished: false,
            }),
            finished_cv: Condvar::new(),
        }
    }

    // Binds the next free identity to a new connection: the first arrival becomes A, the second
    // becomes B. Once B arrives the first round starts.
    pub fn connect(&self, outlet: Outlet) -> Result<Player, SessionFull> {
        let mut deliveries = Deliveries::default();
        let mut state = self.lock();
        let player = Player::iter().nth(state.num_assigned).ok_or(SessionFull)?;
        state.num_assigned += 1;
        state.outlets[player] = Some(outlet);
        let own_outlet = state.outlets[player].as_ref();
        deliveries.send_to(own_outlet, ServerEvent::PlayerAssigned { player });
        match player {
            Player::A => {
                deliveries.send_to(own_outlet, ServerEvent::Wait {
                    message: WAITING_FOR_OPPONENT_MESSAGE.to_owned(),
                });
            }
            Player::B => {
                let scores = state.controller.scores();
                deliveries.broadcast(&state.outlets, &ServerEvent::GameStart { scores });
                let opponent = player.opponent();
                if state.controller.has_departed(opponent) {
                    deliveries.send_to(own_outlet, ServerEvent::Exit { player: opponent });
                }
            }
        }
        info!("Player {} connected", player);
        deliveries.dispatch();
        Ok(player)
    }

    // `name` must be non-empty. The echo goes to the sender only.
    pub fn register_name(&self, player: Player, name: String) {
        let mut deliveries = Deliveries::default();
        let mut state = self.lock();
        state.controller.register_name(player);
        info!("Player {} is {}", player, name);
        deliveries.send_to(state.outlets[player].as_ref(), ServerEvent::SetName { player, name });
        deliveries.dispatch();
    }

    // Returns false if the controller refused the move. A refused move produces no events.
    pub fn make_move(&self, player: Player, pos: Coord) -> bool {
        let mut deliveries = Deliveries::default();
        let mut state = self.lock();
        if !state.controller.attempt_move(pos, player) {
            return false;
        }
        deliveries.broadcast(&state.outlets, &ServerEvent::Move {
            player,
            row: pos.row(),
            col: pos.col(),
        });
        if let Some(outcome) = state.controller.evaluate_outcome() {
            deliveries.broadcast(&state.outlets, &ServerEvent::GameOver { outcome });
        }
        deliveries.dispatch();
        true
    }

    // Returns true if this vote started a new round.
    pub fn vote_restart(&self, player: Player) -> bool {
        let mut deliveries = Deliveries::default();
        let mut state = self.lock();
        if !state.controller.attempt_restart(player) {
            info!("Player {} wants a new round", player);
            return false;
        }
        let scores = state.controller.scores();
        deliveries.broadcast(&state.outlets, &ServerEvent::GameStart { scores });
        deliveries.dispatch();
        true
    }

    // Handles both an explicit exit and a lost connection. Safe to call more than once per
    // player. Returns the number of players still present.
    pub fn depart(&self, player: Player) -> u32 {
        let mut deliveries = Deliveries::default();
        let mut state = self.lock();
        if state.controller.has_departed(player) {
            return state.controller.participants_remaining();
        }
        let remaining = state.controller.participant_departed(player);
        state.outlets[player] = None;
        info!("Player {} left, {} remaining", player, remaining);
        if remaining == 0 {
            state.finished = true;
            self.finished_cv.notify_all();
        } else {
            deliveries.broadcast(&state.outlets, &ServerEvent::Exit { player });
        }
        deliveries.dispatch();
        remaining
    }

    pub fn reject(&self, player: Player, rejection: SessionRejection) {
        if self.options.report_rejections {
            self.send_to(player, ServerEvent::Rejection(rejection));
        }
    }

    pub fn send_to(&self, player: Player, event: ServerEvent) {
        let mut deliveries = Deliveries::default();
        let state = self.lock();
        deliveries.send_to(state.outlets[player].as_ref(), event);
        deliveries.dispatch();
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let mut deliveries = Deliveries::default();
        let state = self.lock();
        deliveries.broadcast(&state.outlets, &event);
        deliveries.dispatch();
    }

    pub fn scores(&self) -> Scores { self.lock().controller.scores() }
    pub fn phase(&self) -> SessionPhase { self.lock().controller.phase() }
    pub fn board(&self) -> Board { self.lock().controller.board().clone() }
    pub fn has_name(&self, player: Player) -> bool { self.lock().controller.has_name(player) }

    pub fn is_finished(&self) -> bool { self.lock().finished }

    // Blocks until every player has left.
    pub fn wait_until_finished(&self) {
        let mut state = self.lock();
        while !state.finished {
            state = self.finished_cv.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        // The state is left consistent at every early return, so a panic on another thread
        // doesn't invalidate it.
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Coordinator state lock was poisoned");
            poisoned.into_inner()
        })
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::controller::Outcome;

    fn drain(rx: &mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> { rx.try_iter().collect() }

    fn connected_pair(
        options: ServerOptions,
    ) -> (Coordinator, mpsc::Receiver<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        let coordinator = Coordinator::new(options);
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        assert_eq!(coordinator.connect(a_tx), Ok(Player::A));
        assert_eq!(coordinator.connect(b_tx), Ok(Player::B));
        (coordinator, a_rx, b_rx)
    }

    #[test]
    fn greeting_sequence() {
        let (_coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        let scores = Scores::new();
        assert_eq!(drain(&a_rx), vec![
            ServerEvent::PlayerAssigned { player: Player::A },
            ServerEvent::Wait { message: WAITING_FOR_OPPONENT_MESSAGE.to_owned() },
            ServerEvent::GameStart { scores },
        ]);
        assert_eq!(drain(&b_rx), vec![
            ServerEvent::PlayerAssigned { player: Player::B },
            ServerEvent::GameStart { scores },
        ]);
    }

    #[test]
    fn third_connection_is_refused() {
        let (coordinator, _a_rx, _b_rx) = connected_pair(ServerOptions::default());
        let (c_tx, c_rx) = mpsc::channel();
        assert_eq!(coordinator.connect(c_tx), Err(SessionFull));
        assert!(drain(&c_rx).is_empty());
    }

    #[test]
    fn name_echo_goes_to_sender_only() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        drain(&b_rx);
        coordinator.register_name(Player::B, "Bob".to_owned());
        assert!(drain(&a_rx).is_empty());
        assert_eq!(drain(&b_rx), vec![ServerEvent::SetName {
            player: Player::B,
            name: "Bob".to_owned()
        }]);
        assert!(coordinator.has_name(Player::B));
        assert!(!coordinator.has_name(Player::A));
    }

    #[test]
    fn refused_move_sends_nothing() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        drain(&b_rx);
        // Names are not registered yet.
        assert!(!coordinator.make_move(Player::A, Coord::new(0, 0)));
        assert!(drain(&a_rx).is_empty());
        assert!(drain(&b_rx).is_empty());
    }

    #[test]
    fn winning_move_is_followed_by_game_over() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        coordinator.register_name(Player::A, "Alice".to_owned());
        coordinator.register_name(Player::B, "Bob".to_owned());
        for (player, row, col) in
            [(Player::A, 0, 0), (Player::B, 1, 0), (Player::A, 0, 1), (Player::B, 1, 1)]
        {
            assert!(coordinator.make_move(player, Coord::new(row, col)));
        }
        drain(&a_rx);
        drain(&b_rx);
        assert!(coordinator.make_move(Player::A, Coord::new(0, 2)));
        let expected = vec![
            ServerEvent::Move { player: Player::A, row: 0, col: 2 },
            ServerEvent::GameOver { outcome: Outcome::Victory(Player::A) },
        ];
        assert_eq!(drain(&a_rx), expected);
        assert_eq!(drain(&b_rx), expected);
        assert_eq!(coordinator.scores().wins(Player::A), 1);
    }

    #[test]
    fn restart_broadcasts_game_start_once_both_voted() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        drain(&b_rx);
        assert!(!coordinator.vote_restart(Player::B));
        assert!(drain(&a_rx).is_empty());
        assert!(coordinator.vote_restart(Player::A));
        let scores = coordinator.scores();
        assert_eq!(drain(&a_rx), vec![ServerEvent::GameStart { scores }]);
        assert_eq!(drain(&b_rx), vec![ServerEvent::GameStart { scores }]);
    }

    #[test]
    fn departures() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        drain(&b_rx);
        assert_eq!(coordinator.depart(Player::A), 1);
        assert_eq!(drain(&b_rx), vec![ServerEvent::Exit { player: Player::A }]);
        // Socket closing after an explicit exit must not count twice.
        assert_eq!(coordinator.depart(Player::A), 1);
        assert!(drain(&b_rx).is_empty());
        assert!(!coordinator.is_finished());
        assert_eq!(coordinator.depart(Player::B), 0);
        assert!(coordinator.is_finished());
        coordinator.wait_until_finished();
    }

    #[test]
    fn late_opponent_learns_about_departure() {
        let coordinator = Coordinator::new(ServerOptions::default());
        let (a_tx, _a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        coordinator.connect(a_tx).unwrap();
        coordinator.depart(Player::A);
        coordinator.connect(b_tx).unwrap();
        assert_eq!(drain(&b_rx), vec![
            ServerEvent::PlayerAssigned { player: Player::B },
            ServerEvent::GameStart { scores: Scores::new() },
            ServerEvent::Exit { player: Player::A },
        ]);
        assert_eq!(coordinator.phase(), SessionPhase::Abandoned);
    }

    #[test]
    fn rejections_are_opt_in() {
        let (silent, a_rx, _b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        silent.reject(Player::A, SessionRejection::EmptyName);
        assert!(drain(&a_rx).is_empty());

        let (verbose, a_rx, _b_rx) = connected_pair(ServerOptions { report_rejections: true });
        drain(&a_rx);
        verbose.reject(Player::A, SessionRejection::EmptyName);
        assert_eq!(drain(&a_rx), vec![ServerEvent::Rejection(SessionRejection::EmptyName)]);
    }

    #[test]
    fn send_to_and_broadcast() {
        let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
        drain(&a_rx);
        drain(&b_rx);
        let wait = ServerEvent::Wait { message: "Hold on".to_owned() };
        coordinator.send_to(Player::B, wait.clone());
        assert!(drain(&a_rx).is_empty());
        assert_eq!(drain(&b_rx), vec![wait]);

        coordinator.depart(Player::B);
        drain(&a_rx);
        let exit = ServerEvent::Exit { player: Player::B };
        coordinator.broadcast(exit.clone());
        assert_eq!(drain(&a_rx), vec![exit]);
    }

    // A move racing the restart vote that completes the pair: whatever order the controller
    // applied them in, the clients must see the same order.
    #[test]
    fn concurrent_events_arrive_in_applied_order() {
        const ROUNDS: usize = 2000;
        let pos = Coord::new(0, 0);
        for _ in 0..ROUNDS {
            let (coordinator, a_rx, b_rx) = connected_pair(ServerOptions::default());
            coordinator.register_name(Player::A, "Alice".to_owned());
            coordinator.register_name(Player::B, "Bob".to_owned());
            assert!(!coordinator.vote_restart(Player::A));
            drain(&a_rx);
            drain(&b_rx);

            let coordinator = Arc::new(coordinator);
            let barrier = Arc::new(Barrier::new(2));
            let mover = {
                let coordinator = Arc::clone(&coordinator);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.make_move(Player::A, pos);
                })
            };
            barrier.wait();
            assert!(coordinator.vote_restart(Player::B));
            mover.join().unwrap();

            for rx in [&a_rx, &b_rx] {
                let mut board = Board::new();
                for event in drain(rx) {
                    match event {
                        ServerEvent::Move { player, row, col } => {
                            board.set_cell(Coord::new(row, col), Some(player))
                        }
                        ServerEvent::GameStart { .. } => board.reset(),
                        event => panic!("Unexpected event: {event:?}"),
                    }
                }
                assert_eq!(board.get(pos), coordinator.board().get(pos));
            }
        }
    }
}
