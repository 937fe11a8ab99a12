#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod board;
pub mod client;
pub mod connection;
pub mod controller;
pub mod coord;
pub mod coordinator;
pub mod event;
pub mod network;
pub mod player;
pub mod scores;
pub mod server;
