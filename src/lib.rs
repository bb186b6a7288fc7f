use state::QuizState;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod commands;
pub mod config;
pub mod constructor;
pub mod database;
pub mod error;
pub mod keyboard;
pub mod leaderboard;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod session;
pub mod state;
pub mod transport;

pub use error::HandlerResult;

type UserDialogue = Dialogue<QuizState, InMemStorage<QuizState>>;
