pub mod comment;
pub mod game;
pub mod game_tag;
pub mod screenshot;
pub mod tag;
pub mod task;
pub mod upload;
pub mod user;
