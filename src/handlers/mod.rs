// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod conversation;
pub mod interview;
pub mod profile;
