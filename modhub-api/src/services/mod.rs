pub mod analytics;
pub mod catalog;
pub mod collections;
pub mod compatibility;
pub mod forums;
pub mod moderation;
pub mod mods;
pub mod notifications;
pub mod rating;
pub mod reviews;
pub mod slug;
pub mod users;
