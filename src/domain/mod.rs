pub mod merchant;
pub mod ports;
pub mod transaction;
