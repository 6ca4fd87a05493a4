//! Data models for the IPTV catalog

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between fields of a persisted provider entry
pub const FIELD_SEPARATOR: &str = ":::";

/// Lowercase alphanumeric form of a name, used for cache file names
pub fn slugify(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Where a provider's catalog comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Remote M3U playlist
    Url,
    /// M3U playlist on disk
    Local,
    /// Xtream Codes panel
    Xtream,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Url => "url",
            ProviderKind::Local => "local",
            ProviderKind::Xtream => "xtream",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "url" => Some(ProviderKind::Url),
            "local" => Some(ProviderKind::Local),
            "xtream" => Some(ProviderKind::Xtream),
            _ => None,
        }
    }
}

/// Group classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    Tv,
    Movies,
    Series,
}

impl GroupType {
    /// Classify a group title by its whitespace-separated tokens
    pub fn from_title(title: &str) -> Self {
        let has_token = |token: &str| title.split_whitespace().any(|t| t == token);
        if has_token("VOD") {
            GroupType::Movies
        } else if has_token("SERIES") {
            GroupType::Series
        } else {
            GroupType::Tv
        }
    }
}

/// A playable entry: live channel, movie or episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    /// External id (`tvg-id`, Xtream stream id or episode id)
    pub id: Option<String>,
    pub name: String,
    pub logo: Option<String>,
    /// Local file the logo is cached to
    pub logo_path: Option<PathBuf>,
    pub group_title: Option<String>,
    /// Raw title as it appeared in the source
    pub title: Option<String>,
    pub url: String,
    /// XMLTV channel id advertised by an Xtream panel
    pub epg_channel_id: Option<String>,
}

impl Channel {
    /// Key used to look the channel up in a guide: id first, name second
    pub fn epg_key(&self) -> &str {
        self.epg_channel_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.id.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub group_type: GroupType,
    /// Xtream category id
    pub group_id: Option<i64>,
    pub channels: Vec<Arc<Channel>>,
    /// Indices into [`Catalog::series`]
    pub series: Vec<usize>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Self::with_type(name, GroupType::from_title(name))
    }

    pub fn with_type(name: &str, group_type: GroupType) -> Self {
        Self {
            name: name.to_string(),
            group_type,
            group_id: None,
            channels: Vec::new(),
            series: Vec::new(),
        }
    }

    /// Link a series into this group once
    pub fn add_serie(&mut self, index: usize) {
        if !self.series.contains(&index) {
            self.series.push(index);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Season {
    pub name: String,
    pub episodes: BTreeMap<String, Arc<Channel>>,
}

impl Season {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            episodes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Serie {
    pub name: String,
    pub logo: Option<String>,
    pub logo_path: Option<PathBuf>,
    pub seasons: BTreeMap<String, Season>,
    /// Every episode in discovery order
    pub episodes: Vec<Arc<Channel>>,
    // Xtream metadata
    pub series_id: Option<i64>,
    pub plot: Option<String>,
    pub genre: Option<String>,
    pub youtube_trailer: Option<String>,
}

impl Serie {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Everything a provider offers. Built off-thread and published as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub groups: Vec<Group>,
    pub channels: Vec<Arc<Channel>>,
    pub movies: Vec<Arc<Channel>>,
    pub series: Vec<Serie>,
    /// Guide advertised by the source itself (`x-tvg-url`, Xtream `xmltv.php`)
    pub epg_url: Option<String>,
}

impl Catalog {
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn serie(&self, name: &str) -> Option<&Serie> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} channels, {} groups, {} series, {} movies",
            self.channels.len(),
            self.groups.len(),
            self.series.len(),
            self.movies.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub name: String,
    pub kind: ProviderKind,
    pub url: String,
    pub username: String,
    pub password: String,
    pub epg: String,
    /// Local playlist file
    pub path: PathBuf,
    catalog: Arc<Catalog>,
}

impl Provider {
    pub fn new(name: &str, kind: ProviderKind, url: &str, providers_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            kind,
            url: url.to_string(),
            username: String::new(),
            password: String::new(),
            epg: String::new(),
            path: providers_dir.join(slugify(name)),
            catalog: Arc::new(Catalog::default()),
        }
    }

    /// Parse a persisted entry: `name:::type:::url:::username:::password:::epg`
    pub fn from_info(info: &str, providers_dir: &Path) -> Result<Self> {
        let fields: Vec<&str> = info.split(FIELD_SEPARATOR).collect();
        let [name, type_id, url, username, password, epg] = fields.as_slice() else {
            return Err(Error::Format(format!(
                "expected 6 provider fields, got {}",
                fields.len()
            )));
        };
        let kind = ProviderKind::from_id(type_id)
            .ok_or_else(|| Error::Format(format!("unknown provider type `{}`", type_id)))?;

        let mut provider = Self::new(name, kind, url, providers_dir);
        provider.username = username.to_string();
        provider.password = password.to_string();
        provider.epg = epg.to_string();
        Ok(provider)
    }

    pub fn to_info(&self) -> String {
        [
            self.name.as_str(),
            self.kind.as_str(),
            &self.url,
            &self.username,
            &self.password,
            &self.epg,
        ]
        .join(FIELD_SEPARATOR)
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Replace the whole catalog in one assignment
    pub fn publish(&mut self, catalog: Catalog) {
        self.catalog = Arc::new(catalog);
    }

    /// Configured guide, or the one the source advertised
    pub fn epg_source(&self) -> Option<String> {
        let configured = self.epg.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        self.catalog.epg_url.clone().filter(|u| !u.is_empty())
    }
}

/// A guide entry corrected to local wall-clock time
#[derive(Debug, Clone, PartialEq)]
pub struct EpgEvent {
    pub channel: String,
    pub title: String,
    pub desc: String,
    pub start: i64,
    pub end: i64,
    pub length: i64,
}

impl Default for EpgEvent {
    /// The "N/A" placeholder shown when nothing is airing
    fn default() -> Self {
        Self {
            channel: "N/A".to_string(),
            title: "N/A".to_string(),
            desc: "N/A".to_string(),
            start: 0,
            end: 0,
            length: 0,
        }
    }
}
