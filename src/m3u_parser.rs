//! M3U playlist parser
//!
//! One forward pass over the playlist: an `#EXTINF` line opens a pending
//! channel, the next URL-bearing line completes it. Completed channels are
//! sorted into groups, and titles shaped like `Show S01E02` are collected
//! into series and seasons.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use log::{debug, info};
use regex::Regex;

use crate::error::Result;
use crate::models::{slugify, Catalog, Channel, Group, GroupType, Provider, Season, Serie};

static EXT_INF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#EXTINF:(?P<duration>-?\d+(?:\.\d+)?)\s*(?P<params>.*),(?P<title>.*)$")
        .expect("EXTINF pattern")
});

static PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).expect("attribute pattern"));

static SERIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<series>.*?) S(?P<season>.\d{1,2}).*E(?P<episode>.\d{1,2}.*)$")
        .expect("series pattern")
});

const LOGO_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".gif", ".jpeg"];

/// Names carrying this marker are placeholders, never channels
const EXCLUSION_MARKER: &str = "***";

/// Fields of one `#EXTINF` line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtInf {
    pub duration: Option<f64>,
    pub attrs: HashMap<String, String>,
    pub title: Option<String>,
}

/// Split an `#EXTINF:<duration> key="value"...,<title>` line
pub fn parse_extinf(line: &str) -> ExtInf {
    let Some(caps) = EXT_INF.captures(line) else {
        return ExtInf::default();
    };

    let attrs = caps
        .name("params")
        .map(|p| {
            PARAMS
                .captures_iter(p.as_str())
                .map(|c| (c[1].to_lowercase(), c[2].to_string()))
                .collect()
        })
        .unwrap_or_default();

    ExtInf {
        duration: caps.name("duration").and_then(|d| d.as_str().parse().ok()),
        attrs,
        title: caps.name("title").map(|t| t.as_str().to_string()),
    }
}

/// `x-tvg-url` (or `url-tvg`) advertised on the `#EXTM3U` header
pub fn header_tvg_url(line: &str) -> Option<String> {
    if !line.starts_with("#EXTM3U") {
        return None;
    }
    let attrs: HashMap<String, String> = PARAMS
        .captures_iter(line)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect();
    attrs
        .get("x-tvg-url")
        .or_else(|| attrs.get("url-tvg"))
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
}

/// `x-tvg-url` from the first line of a playlist file
pub fn m3u_tvg_url(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut first = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut first).ok()?;
    header_tvg_url(String::from_utf8_lossy(&first).trim())
}

fn attr<'a>(attrs: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    attrs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// `News;Sport  HD` -> `News Sport HD`
fn normalize_group_title(title: &str) -> String {
    title
        .replace(';', " ")
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where a channel logo is cached locally, if it can be
pub fn logo_path(logo: &str, provider: &str, channel: &str, cache_dir: &Path) -> Option<PathBuf> {
    if let Some(local) = logo.strip_prefix("file://") {
        return Some(PathBuf::from(local));
    }

    let lower = logo.to_lowercase();
    let ext = LOGO_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext))?;
    let ext = if *ext == ".jpeg" { ".jpg" } else { *ext };
    Some(cache_dir.join(format!("{}-{}{}", slugify(provider), slugify(channel), ext)))
}

pub struct PlaylistParser {
    cache_dir: PathBuf,
}

impl PlaylistParser {
    /// `cache_dir` is where channel logos are stored
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Build a pending channel from its `#EXTINF` line
    pub fn channel_from_extinf(&self, line: &str, provider: &str) -> Channel {
        let info = parse_extinf(line);

        let mut channel = Channel {
            id: attr(&info.attrs, "tvg-id").map(str::to_string),
            name: attr(&info.attrs, "tvg-name").unwrap_or_default().to_string(),
            logo: attr(&info.attrs, "tvg-logo").map(str::to_string),
            group_title: attr(&info.attrs, "group-title").map(normalize_group_title),
            title: info.title,
            ..Default::default()
        };

        if channel.name.is_empty() {
            if let Some((_, tail)) = line.rsplit_once(',') {
                channel.name = tail.trim().to_string();
            }
        }

        if let Some(logo) = &channel.logo {
            channel.logo_path = logo_path(logo, provider, &channel.name, &self.cache_dir);
        }

        channel
    }

    /// Parse the provider's local playlist into a fresh catalog
    pub fn load_channels(&self, provider: &Provider) -> Result<Catalog> {
        let file = File::open(&provider.path)?;
        let mut catalog = Catalog::default();
        self.parse_reader(&provider.name, BufReader::new(file), &mut catalog)?;
        info!("{}: {}", provider.name, catalog.summary());
        Ok(catalog)
    }

    /// Append the channels found in `content` to `catalog`
    pub fn parse_into(&self, provider: &str, content: &str, catalog: &mut Catalog) {
        if let Err(e) = self.parse_reader(provider, content.as_bytes(), catalog) {
            debug!("{}: playlist parse stopped early: {}", provider, e);
        }
    }

    /// Append channels read line by line. Invalid UTF-8 is replaced, not fatal.
    pub fn parse_reader<R: BufRead>(&self, provider: &str, mut reader: R, catalog: &mut Catalog) -> Result<()> {
        let mut state = ParseState::default();
        let mut raw = Vec::with_capacity(1024);

        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.trim();

            if line.starts_with("#EXTM3U") {
                if catalog.epg_url.is_none() {
                    catalog.epg_url = header_tvg_url(line);
                }
            } else if line.starts_with("#EXTINF") {
                state.pending = Some(self.channel_from_extinf(line, provider));
            } else if line.contains("://") && !line.starts_with('#') {
                state.complete(line, catalog);
            }
        }

        Ok(())
    }
}

/// Lookup tables for one parse run
#[derive(Default)]
struct ParseState {
    /// Channel waiting for its URL
    pending: Option<Channel>,
    groups: HashMap<String, usize>,
    series: HashMap<String, usize>,
}

impl ParseState {
    fn complete(&mut self, url: &str, catalog: &mut Catalog) {
        let Some(mut channel) = self.pending.take() else {
            debug!("    --> no pending channel for {}", url);
            return;
        };
        if channel.name.is_empty() || channel.name.contains(EXCLUSION_MARKER) {
            debug!("    --> skipping unnamed entry {}", url);
            return;
        }
        channel.url = url.to_string();

        let serie = SERIES.captures(&channel.name).map(|caps| {
            (
                caps["series"].to_string(),
                caps["season"].to_string(),
                caps["episode"].to_string(),
            )
        });
        let group_title = channel.group_title.clone().filter(|t| !t.trim().is_empty());
        let channel = Arc::new(channel);

        let serie_index = serie.map(|(series_name, season_name, episode_name)| {
            let index = *self.series.entry(series_name.clone()).or_insert_with(|| {
                let mut serie = Serie::new(&series_name);
                serie.logo = channel.logo.clone();
                serie.logo_path = channel.logo_path.clone();
                catalog.series.push(serie);
                catalog.series.len() - 1
            });

            let serie = &mut catalog.series[index];
            serie
                .seasons
                .entry(season_name.clone())
                .or_insert_with(|| Season::new(&season_name))
                .episodes
                .insert(episode_name, Arc::clone(&channel));
            serie.episodes.push(Arc::clone(&channel));
            index
        });

        let Some(title) = group_title else {
            catalog.channels.push(channel);
            return;
        };

        let index = *self.groups.entry(title.clone()).or_insert_with(|| {
            catalog.groups.push(Group::new(&title));
            catalog.groups.len() - 1
        });
        let group = &mut catalog.groups[index];
        if let Some(serie_index) = serie_index {
            group.add_serie(serie_index);
        }
        group.channels.push(Arc::clone(&channel));

        match group.group_type {
            GroupType::Tv => catalog.channels.push(channel),
            GroupType::Movies => catalog.movies.push(channel),
            GroupType::Series => {}
        }
    }
}
