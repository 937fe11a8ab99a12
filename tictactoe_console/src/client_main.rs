use std::io::{self, BufRead};
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, anyhow};
use crossterm::style::{StyledContent, Stylize};
use log::warn;
use tictactoe_online::board::Board;
use tictactoe_online::client::{ClientPhase, ClientState, NotableEvent};
use tictactoe_online::controller::Outcome;
use tictactoe_online::coord::{BOARD_SIZE, Coord};
use tictactoe_online::event::{ClientEvent, ServerEvent};
use tictactoe_online::network::{self, CommunicationError};
use tictactoe_online::player::{Player, mark_char};
use tungstenite::protocol::Role;


pub struct ClientConfig {
    pub server_address: String,
    pub player_name: String,
}

enum IncomingEvent {
    Network(ServerEvent),
    Disconnected,
    Terminal(String),
    TerminalClosed,
}

enum Command {
    Move(Coord),
    Restart,
    Quit,
    Help,
}

const HELP: &str = "Commands: 'move <row> <col>' (0-based), 'restart', 'quit'";

pub fn run(config: ClientConfig) -> anyhow::Result<()> {
    let my_name = config.player_name.trim().to_owned();
    if my_name.is_empty() {
        return Err(anyhow!("Player name must not be empty"));
    }
    let server_address = if config.server_address.contains(':') {
        config.server_address
    } else {
        format!("{}:{}", config.server_address, network::PORT)
    };
    println!("Connecting to {server_address}...");
    let stream = TcpStream::connect(&server_address)
        .with_context(|| format!("Cannot connect to {server_address}"))?;
    let (mut read_socket, _) = tungstenite::client(format!("ws://{server_address}/"), stream)
        .map_err(|err| anyhow!("WebSocket handshake failed: {err}"))?;
    let mut write_socket = network::clone_websocket(&read_socket, Role::Client)?;

    let (tx, rx) = mpsc::channel();
    let tx_net = tx.clone();
    let tx_local = tx;
    thread::spawn(move || {
        loop {
            match network::read_obj::<ServerEvent, _>(&mut read_socket) {
                Ok(ev) => {
                    if tx_net.send(IncomingEvent::Network(ev)).is_err() {
                        return;
                    }
                }
                Err(err) if err.is_recoverable() => warn!("Ignoring server message: {}", err),
                Err(err) => {
                    if !matches!(err, CommunicationError::ConnectionClosed) {
                        warn!("Lost connection to server: {}", err);
                    }
                    let _ = tx_net.send(IncomingEvent::Disconnected);
                    return;
                }
            }
        }
    });
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx_local.send(IncomingEvent::Terminal(line)).is_err() {
                return;
            }
        }
        let _ = tx_local.send(IncomingEvent::TerminalClosed);
    });

    let (events_tx, events_rx) = mpsc::channel::<ClientEvent>();
    let writer = thread::spawn(move || {
        for ev in events_rx {
            if let Err(err) = network::write_obj(&mut write_socket, &ev) {
                warn!("Cannot send {:?}: {}", ev, err);
                return;
            }
        }
        let _ = write_socket.close(None);
    });

    let mut client_state = ClientState::new(my_name, events_tx);
    println!("{HELP}");
    for event in rx {
        match event {
            IncomingEvent::Network(ev) => match client_state.process_server_event(ev) {
                Ok(notable) => report(&client_state, notable),
                Err(err) => warn!("Cannot apply server event: {:?}", err),
            },
            IncomingEvent::Disconnected => {
                println!("Disconnected from server");
                break;
            }
            IncomingEvent::Terminal(line) => match parse_command(&line) {
                Ok(Command::Move(pos)) => {
                    if let Err(err) = client_state.make_move(pos) {
                        println!("Cannot move to {pos}: {err:?}");
                    }
                }
                Ok(Command::Restart) => {
                    if client_state.request_restart() {
                        println!("Waiting for the opponent to agree to a new round...");
                    } else {
                        println!("Nobody to play with");
                    }
                }
                Ok(Command::Quit) => {
                    client_state.leave();
                    break;
                }
                Ok(Command::Help) => println!("{HELP}"),
                Err(message) => println!("{message}. {HELP}"),
            },
            IncomingEvent::TerminalClosed => {
                client_state.leave();
                break;
            }
        }
    }

    // Dropping the state closes the outgoing channel, which lets the writer finish.
    drop(client_state);
    if writer.join().is_err() {
        warn!("Network writer panicked");
    }
    Ok(())
}

fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["move" | "m", row, col] => {
            let row = row.parse::<u8>().map_err(|_| format!("Bad row: '{row}'"))?;
            let col = col.parse::<u8>().map_err(|_| format!("Bad column: '{col}'"))?;
            Coord::try_new(row, col)
                .map(Command::Move)
                .ok_or_else(|| format!("Cell ({row}, {col}) is off the board"))
        }
        ["restart" | "r"] => Ok(Command::Restart),
        ["quit" | "q" | "exit"] => Ok(Command::Quit),
        ["help" | "h"] | [] => Ok(Command::Help),
        _ => Err(format!("Unknown command '{}'", line.trim())),
    }
}

fn report(client_state: &ClientState, notable: NotableEvent) {
    match notable {
        NotableEvent::None => render(client_state),
        NotableEvent::PlayerAssigned(player) => {
            println!(
                "{}, you are player {} ({})",
                client_state.my_name(),
                player,
                styled_mark(Some(player))
            );
        }
        NotableEvent::Waiting(message) => println!("{message}"),
        NotableEvent::NameConfirmed(name) => println!("Registered as {name}"),
        NotableEvent::GameStarted | NotableEvent::OpponentMoved(_) => render(client_state),
        NotableEvent::GameOver(outcome) => {
            render(client_state);
            match outcome {
                Outcome::Victory(winner) if Some(winner) == client_state.my_player() => {
                    println!("{}", "You win!".green().bold())
                }
                Outcome::Victory(_) => println!("{}", "You lose!".red().bold()),
                Outcome::Draw => println!("{}", "Draw!".bold()),
            }
            println!("Type 'restart' for another round or 'quit' to leave");
        }
        NotableEvent::OpponentLeft => {
            println!("{}", "Your opponent left the game. Type 'quit' to exit.".yellow())
        }
        NotableEvent::Rejected(rejection) => println!("Server refused: {rejection:?}"),
    }
}

fn render(client_state: &ClientState) {
    let scores = client_state.scores();
    println!();
    print_board(client_state.board());
    println!(
        "Score: {} {} : {} {}, draws {}",
        styled_mark(Some(Player::A)),
        scores.wins(Player::A),
        scores.wins(Player::B),
        styled_mark(Some(Player::B)),
        scores.draws
    );
    if client_state.phase() == ClientPhase::Playing {
        if client_state.is_my_turn() {
            println!("Your turn");
        } else {
            println!("Opponent's turn");
        }
    }
}

fn print_board(board: &Board) {
    let header: String = (0..BOARD_SIZE).map(|col| format!(" {col}")).collect();
    println!(" {header}");
    for row in 0..BOARD_SIZE {
        let cells: String = (0..BOARD_SIZE)
            .map(|col| format!(" {}", styled_mark(board.get(Coord::new(row, col)))))
            .collect();
        println!("{row}{cells}");
    }
}

fn styled_mark(mark: Option<Player>) -> StyledContent<char> {
    let ch = mark_char(mark);
    match mark {
        Some(Player::A) => ch.red().bold(),
        Some(Player::B) => ch.blue().bold(),
        None => ch.dark_grey(),
    }
}
