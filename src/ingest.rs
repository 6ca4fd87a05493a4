//! The two ways a provider's catalog gets built: an M3U playlist or an
//! Xtream Codes panel. Both fill the same [`Catalog`] shape.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::api::XtreamClient;
use crate::http::HttpClient;
use crate::m3u_parser::PlaylistParser;
use crate::models::{Catalog, Provider};
use crate::provider_cache::ProviderCache;

/// A built catalog plus the client that can fetch more detail later
pub struct Ingested {
    pub catalog: Catalog,
    pub client: Option<Arc<XtreamClient>>,
}

pub trait Ingestor: Send + Sync {
    /// Build a fresh catalog for `provider`, reporting progress through
    /// `status`. Failures are logged and yield `None`.
    fn ingest(&self, provider: &mut Provider, refresh: bool, status: &dyn Fn(&str)) -> Option<Ingested>;
}

/// Remote or local M3U playlist
pub struct PlaylistIngestor {
    cache: ProviderCache,
    parser: PlaylistParser,
}

impl PlaylistIngestor {
    pub fn new(http: Arc<dyn HttpClient>, user_agent: &str, referer: &str, cache_dir: &Path) -> Self {
        Self {
            cache: ProviderCache::new(http, user_agent, referer),
            parser: PlaylistParser::new(cache_dir),
        }
    }
}

impl Ingestor for PlaylistIngestor {
    fn ingest(&self, provider: &mut Provider, refresh: bool, status: &dyn Fn(&str)) -> Option<Ingested> {
        status(if refresh { "Downloading playlist..." } else { "Getting playlist..." });

        if !self.cache.get_playlist(provider, refresh) {
            status(&format!("Failed to Download playlist from {}", provider.name));
            return None;
        }

        status("Checking playlist...");
        if !ProviderCache::check_playlist(provider) {
            warn!("{}: {} is not an M3U playlist", provider.name, provider.path.display());
            return None;
        }

        status("Loading channels...");
        match self.parser.load_channels(provider) {
            Ok(catalog) => Some(Ingested { catalog, client: None }),
            Err(e) => {
                warn!("{}: could not read playlist {}: {}", provider.name, provider.path.display(), e);
                None
            }
        }
    }
}

/// Xtream Codes panel
pub struct XtreamIngestor {
    http: Arc<dyn HttpClient>,
    user_agent: String,
    hide_adult_content: bool,
    cache_dir: PathBuf,
}

impl XtreamIngestor {
    pub fn new(http: Arc<dyn HttpClient>, user_agent: &str, hide_adult_content: bool, cache_dir: &Path) -> Self {
        Self {
            http,
            user_agent: user_agent.to_string(),
            hide_adult_content,
            cache_dir: cache_dir.to_path_buf(),
        }
    }
}

impl Ingestor for XtreamIngestor {
    fn ingest(&self, provider: &mut Provider, _refresh: bool, status: &dyn Fn(&str)) -> Option<Ingested> {
        let mut client = XtreamClient::new(Arc::clone(&self.http), provider, &self.cache_dir)
            .with_user_agent(&self.user_agent)
            .with_hide_adult_content(self.hide_adult_content);

        if !client.authenticate() {
            warn!("XTREAM Authentication Failed for {}", provider.name);
            return None;
        }

        info!("XTREAM `{}` Loading Channels", provider.name);
        status("Loading channels...");
        let mut catalog = Catalog::default();
        if !client.load_iptv(&mut catalog) {
            return None;
        }
        info!("{}: {}", provider.name, catalog.summary());

        Some(Ingested {
            catalog,
            client: Some(Arc::new(client)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedResponse, FakeHttp};
    use crate::models::ProviderKind;
    use std::cell::RefCell;

    const PLAYLIST: &str = "#EXTM3U\n#EXTINF:-1 group-title=\"News\",BBC\nhttp://x/bbc\n";

    #[test]
    fn test_playlist_ingestion_reports_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new().route("http://x/list.m3u", CannedResponse::ok(PLAYLIST)));
        let ingestor = PlaylistIngestor::new(http, "ua", "", dir.path());
        let mut provider = Provider::new("Test TV", ProviderKind::Url, "http://x/list.m3u", dir.path());

        let log = RefCell::new(Vec::new());
        let status = |s: &str| log.borrow_mut().push(s.to_string());
        let ingested = ingestor.ingest(&mut provider, true, &status).unwrap();

        assert_eq!(ingested.catalog.channels.len(), 1);
        assert!(ingested.client.is_none());
        assert_eq!(
            log.into_inner(),
            vec!["Downloading playlist...", "Checking playlist...", "Loading channels..."]
        );
    }

    #[test]
    fn test_playlist_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = PlaylistIngestor::new(Arc::new(FakeHttp::new()), "ua", "", dir.path());
        let mut provider = Provider::new("Gone TV", ProviderKind::Url, "http://x/gone.m3u", dir.path());

        let log = RefCell::new(Vec::new());
        let status = |s: &str| log.borrow_mut().push(s.to_string());
        assert!(ingestor.ingest(&mut provider, false, &status).is_none());
        assert_eq!(
            log.into_inner(),
            vec!["Getting playlist...", "Failed to Download playlist from Gone TV"]
        );
    }

    #[test]
    fn test_local_file_that_is_not_a_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let ingestor = PlaylistIngestor::new(Arc::new(FakeHttp::new()), "ua", "", dir.path());
        let mut provider = Provider::new("Local", ProviderKind::Local, &path.to_string_lossy(), dir.path());

        assert!(ingestor.ingest(&mut provider, false, &|_| {}).is_none());
        assert_eq!(provider.path, path);
    }

    #[test]
    fn test_xtream_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let base = "http://panel.example.com/player_api.php?username=john&password=secret";
        let mut http = FakeHttp::new().route(
            base,
            CannedResponse::ok(r#"{"user_info":{"username":"john","password":"secret","auth":1}}"#),
        );
        for action in ["get_live_categories", "get_vod_categories", "get_series_categories"] {
            http = http.route(
                &format!("{}&action={}", base, action),
                CannedResponse::ok(r#"[{"category_id":"1","category_name":"General"}]"#),
            );
        }
        http = http
            .route(
                &format!("{}&action=get_live_streams", base),
                CannedResponse::ok(r#"[{"name":"CNN","stream_type":"live","stream_id":7,"category_id":"1"}]"#),
            )
            .route(&format!("{}&action=get_vod_streams", base), CannedResponse::ok("[]"))
            .route(&format!("{}&action=get_series", base), CannedResponse::ok("[]"));

        let ingestor = XtreamIngestor::new(Arc::new(http), "ua", false, dir.path());
        let mut provider = Provider::new("Panel", ProviderKind::Xtream, "http://panel.example.com", dir.path());
        provider.username = "john".to_string();
        provider.password = "secret".to_string();

        let ingested = ingestor.ingest(&mut provider, false, &|_| {}).unwrap();
        assert_eq!(ingested.catalog.channels.len(), 1);
        assert_eq!(
            ingested.catalog.channels[0].url,
            "http://panel.example.com/live/john/secret/7.ts"
        );
        assert!(ingested.client.unwrap().authorization().is_some());
    }

    #[test]
    fn test_xtream_rejected_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new().route(
            "http://panel.example.com/player_api.php?username=a&password=b",
            CannedResponse::ok(r#"{"user_info":{"auth":0}}"#),
        );
        let ingestor = XtreamIngestor::new(Arc::new(http), "ua", false, dir.path());
        let mut provider = Provider::new("Panel", ProviderKind::Xtream, "http://panel.example.com", dir.path());
        provider.username = "a".to_string();
        provider.password = "b".to_string();

        assert!(ingestor.ingest(&mut provider, false, &|_| {}).is_none());
    }
}
