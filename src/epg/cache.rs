//! Guide cache for one EPG source
//!
//! Keeps the downloaded feed under `{sha1(url)}_epg.gz`, re-downloads it once
//! a day and turns it into per-channel current events.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, error, info, warn};
use sha1::{Digest, Sha1};

use super::download::EpgDownloader;
use super::parser::XmlTvReader;
use crate::models::{Channel, EpgEvent};

/// A cached feed older than this is downloaded again
pub const EPG_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Progress of a guide load
#[derive(Debug, Clone, PartialEq)]
pub enum EpgNotice {
    Loading,
    Updated,
    Error(String),
}

pub type EpgNotifier = Box<dyn Fn(EpgNotice) + Send>;

/// Current events for a set of channels, computed once and shared
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgSnapshot {
    events: HashMap<String, Vec<EpgEvent>>,
}

impl EpgSnapshot {
    pub fn new(events: HashMap<String, Vec<EpgEvent>>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of keys with events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events for a channel: guide id first, then its name
    pub fn get_current_events(&self, channel: &Channel) -> &[EpgEvent] {
        channel_keys(channel)
            .into_iter()
            .find_map(|key| self.events.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// What is on now, or the "N/A" placeholder
    pub fn get_current_event(&self, channel: &Channel) -> EpgEvent {
        self.get_current_events(channel).first().cloned().unwrap_or_default()
    }
}

/// Lookup keys in priority order
fn channel_keys(channel: &Channel) -> Vec<&str> {
    [channel.epg_channel_id.as_deref(), channel.id.as_deref(), Some(channel.name.as_str())]
        .into_iter()
        .flatten()
        .filter(|k| !k.is_empty())
        .collect()
}

pub struct EpgCache {
    url: String,
    path: PathBuf,
    downloader: EpgDownloader,
    reader: XmlTvReader,
    loaded: bool,
    last_load: Option<Instant>,
    notifier: Option<EpgNotifier>,
}

impl EpgCache {
    pub fn new(downloader: EpgDownloader, epg_dir: &Path, url: &str) -> Self {
        Self {
            url: url.to_string(),
            path: Self::cache_path(epg_dir, url),
            downloader,
            reader: XmlTvReader::new(),
            loaded: false,
            last_load: None,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: EpgNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// `{epg_dir}/{sha1(url)}_epg.gz`
    pub fn cache_path(epg_dir: &Path, url: &str) -> PathBuf {
        let digest = Sha1::digest(url.as_bytes());
        epg_dir.join(format!("{}_epg.gz", hex::encode(digest)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn reader(&self) -> &XmlTvReader {
        &self.reader
    }

    /// The cache file is missing or at least a day old
    pub fn is_stale(&self) -> bool {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified());
        match modified {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age >= EPG_MAX_AGE)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    fn notify(&self, notice: EpgNotice) {
        if let Some(ref notifier) = self.notifier {
            notifier(notice);
        }
    }

    /// Download the feed when nothing usable is cached, then parse it.
    ///
    /// A failed refresh of a stale file falls back to the stale copy.
    pub fn load_data(&mut self) -> bool {
        self.notify(EpgNotice::Loading);
        self.last_load = Some(Instant::now());

        let exists = self.path.exists();
        if !exists || self.is_stale() {
            info!("Downloading EPG from {}", self.url);
            if let Err(e) = self.downloader.download(&self.url, &self.path) {
                if exists {
                    warn!("EPG refresh from {} failed, using cached copy: {}", self.url, e);
                } else {
                    error!("EPG download from {} failed: {}", self.url, e);
                    self.notify(EpgNotice::Error(e.to_string()));
                    return false;
                }
            }
        } else {
            debug!("Using cached EPG {}", self.path.display());
        }

        self.parse()
    }

    /// Download again regardless of age
    pub fn refresh(&mut self) -> bool {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
        self.load_data()
    }

    fn parse(&mut self) -> bool {
        let mut reader = XmlTvReader::new();
        match reader.parse_file(&self.path) {
            Ok(()) => {
                self.reader = reader;
                self.loaded = true;
                self.notify(EpgNotice::Updated);
                true
            }
            Err(e) => {
                error!("Could not parse EPG {}: {}", self.path.display(), e);
                self.notify(EpgNotice::Error(e.to_string()));
                false
            }
        }
    }

    /// Upcoming events for every requested id or display name
    pub fn get_current_events(&self, ids: &HashSet<String>) -> HashMap<String, Vec<EpgEvent>> {
        self.reader.get_current_events(ids)
    }

    /// What is on now for one channel, or the "N/A" placeholder
    pub fn get_current_event(&self, channel: &Channel) -> EpgEvent {
        let keys = channel_keys(channel);
        let ids: HashSet<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut events = self.get_current_events(&ids);
        keys.into_iter()
            .find_map(|key| events.remove(key).and_then(|list| list.into_iter().next()))
            .unwrap_or_default()
    }

    /// Current events for a whole channel list
    pub fn update_epg_data(&self, channels: &[Arc<Channel>]) -> Arc<EpgSnapshot> {
        let ids: HashSet<String> = channels
            .iter()
            .flat_map(|c| channel_keys(c).into_iter().map(str::to_string))
            .collect();
        Arc::new(EpgSnapshot::new(self.get_current_events(&ids)))
    }

    /// One scheduler tick: reload once a day, then recompute current events
    pub fn poll(&mut self, channels: &[Arc<Channel>]) -> Option<Arc<EpgSnapshot>> {
        let due = self.last_load.is_none_or(|t| t.elapsed() >= EPG_MAX_AGE);
        if due {
            self.load_data();
        }
        self.loaded.then(|| self.update_epg_data(channels))
    }

    pub fn reset(&mut self) {
        self.reader.clear();
        self.loaded = false;
        self.last_load = None;
    }
}
