//! torrent-bridge - one interface over the JSON-RPC APIs of torrent daemons
//!
//! The [`client`] module talks to Deluge and Transmission and normalizes what
//! they return into the [`model`] types. [`api`] exposes the same operations
//! over HTTP for every backend listed in the [`config`].

pub mod api;
pub mod client;
pub mod config;
pub mod model;
