//! IPTV catalog ingestion
//!
//! Turns M3U playlists, Xtream Codes panels and XMLTV guides into one shared
//! catalog model, with on-disk caching and background loading.

pub mod api;
pub mod config;
pub mod epg;
pub mod error;
pub mod http;
pub mod ingest;
pub mod logos;
pub mod m3u_parser;
pub mod manager;
pub mod models;
pub mod provider_cache;
pub mod tasks;


pub use error::{Error, Result};
pub use manager::Manager;
pub use models::{Catalog, Channel, EpgEvent, Group, GroupType, Provider, ProviderKind, Season, Serie};
