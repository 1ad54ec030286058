pub mod account;
pub mod auth;
pub mod comments;
pub mod games;
pub mod search;
