pub mod account;
pub mod comment;
pub mod game;
pub mod search;
