// src/models/mod.rs

pub mod conversation;
pub mod interview;
pub mod user;
