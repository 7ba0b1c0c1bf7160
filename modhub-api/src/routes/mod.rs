pub mod admin;
pub mod catalog;
pub mod collections;
pub mod forums;
pub mod health;
pub mod mods;
pub mod notifications;
pub mod reviews;
pub mod users;
