pub mod feed;
pub mod health;
pub mod me;
pub mod provider;
