// src/handlers/mod.rs

pub mod attempt;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod history;
pub mod image;
pub mod quiz;
