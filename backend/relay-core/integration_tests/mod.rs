mod api;
mod bridge;
mod config;
mod helpers;
mod launcher;
