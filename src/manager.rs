//! Orchestration for a host loop
//!
//! Ingestion, series detail, logo downloads and the EPG schedule all run in
//! the background and report through one result queue. The host calls
//! [`Manager::process_results`] (or [`Manager::wait`]) from its own loop; only
//! that call mutates provider state.

use std::collections::HashMap;
use std::fs;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::api::{search_streams, SearchHit, XtreamClient};
use crate::config::Settings;
use crate::epg::{EpgCache, EpgDownloader, EpgNotice, EpgSnapshot};
use crate::error::Result;
use crate::http::HttpClient;
use crate::ingest::{Ingestor, PlaylistIngestor, XtreamIngestor};
use crate::logos;
use crate::models::{Catalog, Provider, ProviderKind};
use crate::tasks::{result_queue, TaskResult, Timer, WorkerPool};

/// Default provider reload period
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Reload period once an Xtream panel has loaded
pub const XTREAM_RELOAD_INTERVAL: Duration = Duration::from_secs(2 * 3600);
/// How often current EPG events are recomputed
pub const EPG_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

const POOL_SIZE: usize = 4;

/// Guide refresh for the active provider
struct EpgSchedule {
    id: u64,
    provider: String,
    url: String,
    /// Latest catalog of the provider, swapped on every publish
    catalog: Arc<Mutex<Arc<Catalog>>>,
    _timer: Timer,
}

pub struct Manager {
    settings: Settings,
    http: Arc<dyn HttpClient>,
    playlist: Arc<dyn Ingestor>,
    xtream: Arc<dyn Ingestor>,
    pool: WorkerPool,
    sender: Sender<TaskResult>,
    receiver: Receiver<TaskResult>,
    providers: Vec<Provider>,
    clients: HashMap<String, Arc<XtreamClient>>,
    active: Option<String>,
    /// Bumped on every reload; older results are dropped
    generation: u64,
    pending: usize,
    reload_timer: Option<Timer>,
    epg_interval: Duration,
    epg: Option<EpgSchedule>,
    schedules: u64,
    epg_snapshot: Arc<EpgSnapshot>,
    epg_notice: Option<EpgNotice>,
    status: Option<String>,
}

impl Manager {
    pub fn new(settings: Settings, http: Arc<dyn HttpClient>) -> Self {
        let providers_dir = settings.providers_dir();
        if let Err(e) = fs::create_dir_all(&providers_dir) {
            warn!("Could not create {}: {}", providers_dir.display(), e);
        }

        let playlist = Arc::new(PlaylistIngestor::new(
            Arc::clone(&http),
            &settings.user_agent,
            &settings.http_referer,
            &providers_dir,
        ));
        let xtream = Arc::new(XtreamIngestor::new(
            Arc::clone(&http),
            &settings.user_agent,
            settings.hide_adult_content,
            &providers_dir,
        ));
        let (sender, receiver) = result_queue();

        Self {
            settings,
            http,
            playlist,
            xtream,
            pool: WorkerPool::new(POOL_SIZE),
            sender,
            receiver,
            providers: Vec::new(),
            clients: HashMap::new(),
            active: None,
            generation: 0,
            pending: 0,
            reload_timer: None,
            epg_interval: EPG_UPDATE_INTERVAL,
            epg: None,
            schedules: 0,
            epg_snapshot: Arc::new(EpgSnapshot::default()),
            epg_notice: None,
            status: None,
        }
    }

    pub fn with_epg_interval(mut self, interval: Duration) -> Self {
        self.epg_interval = interval;
        self
    }

    /// First load plus the periodic reload timer
    pub fn start(&mut self) {
        self.reload(false);
        self.arm_reload_timer(RELOAD_INTERVAL);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn active_provider(&self) -> Option<&Provider> {
        self.active.as_deref().and_then(|name| self.provider(name))
    }

    /// Latest status line, `None` when idle
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload_timer.as_ref().map(Timer::interval)
    }

    pub fn epg_snapshot(&self) -> Arc<EpgSnapshot> {
        Arc::clone(&self.epg_snapshot)
    }

    pub fn epg_notice(&self) -> Option<&EpgNotice> {
        self.epg_notice.as_ref()
    }

    /// Guide currently scheduled for the active provider
    pub fn epg_url(&self) -> Option<&str> {
        self.epg.as_ref().map(|s| s.url.as_str())
    }

    fn set_status(&mut self, message: Option<&str>) {
        if let Some(message) = message {
            info!("{}", message);
        }
        self.status = message.map(str::to_string);
    }

    /// Sync the provider list with settings and load every provider in the
    /// background. Providers whose entry is unchanged keep serving their
    /// current catalog until a new one is published.
    pub fn reload(&mut self, refresh: bool) {
        self.generation += 1;
        self.set_status(Some("Loading providers..."));

        let providers_dir = self.settings.providers_dir();
        let mut previous = std::mem::take(&mut self.providers);
        let providers: Vec<Provider> = self
            .settings
            .providers()
            .iter()
            .filter_map(|info| {
                let parsed = Provider::from_info(info, &providers_dir)
                    .map_err(|e| warn!("Couldn't parse provider info `{}`: {}", info, e))
                    .ok()?;
                match previous.iter().position(|p| p.to_info() == parsed.to_info()) {
                    Some(i) => Some(previous.swap_remove(i)),
                    None => Some(parsed),
                }
            })
            .collect();

        for dropped in previous {
            debug!("Provider `{}` entry changed or removed", dropped.name);
            if !providers.iter().any(|p| p.name == dropped.name) {
                self.clients.remove(&dropped.name);
            }
        }

        self.pending = providers.len();
        for provider in &providers {
            self.dispatch_ingest(provider.clone(), refresh);
        }
        self.providers = providers;

        if self.pending == 0 {
            self.finish_reload();
        }
    }

    fn dispatch_ingest(&self, mut provider: Provider, refresh: bool) {
        let ingestor = match provider.kind {
            ProviderKind::Xtream => Arc::clone(&self.xtream),
            ProviderKind::Url | ProviderKind::Local => Arc::clone(&self.playlist),
        };
        let sender = self.sender.clone();
        let generation = self.generation;

        self.pool.execute(move || {
            let name = provider.name.clone();
            let status = |message: &str| {
                let _ = sender.send(TaskResult::Status {
                    provider: Some(name.clone()),
                    message: Some(message.to_string()),
                });
            };

            let result = match ingestor.ingest(&mut provider, refresh, &status) {
                Some(ingested) => TaskResult::ProviderLoaded {
                    generation,
                    provider: provider.name.clone(),
                    path: provider.path.clone(),
                    catalog: ingested.catalog,
                    client: ingested.client,
                },
                None => TaskResult::ProviderFailed {
                    generation,
                    provider: provider.name.clone(),
                },
            };
            let _ = sender.send(result);
        });
    }

    /// Keep the current timer when the period is unchanged
    fn arm_reload_timer(&mut self, interval: Duration) {
        if let Some(ref timer) = self.reload_timer {
            if timer.is_active() && timer.interval() == interval {
                return;
            }
        }
        let sender = self.sender.clone();
        self.reload_timer = Some(Timer::start(interval, move || sender.send(TaskResult::ReloadDue).is_ok()));
    }

    /// Apply every queued result without blocking. Returns how many were applied.
    pub fn process_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.receiver.try_recv() {
            self.apply(result);
            applied += 1;
        }
        applied
    }

    /// Block up to `timeout` for one result, then apply whatever else is queued
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => {
                self.apply(result);
                self.process_results();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn apply(&mut self, result: TaskResult) {
        match result {
            TaskResult::Status { provider, message } => {
                if let (Some(provider), Some(message)) = (&provider, &message) {
                    info!("{}: {}", provider, message);
                }
                self.status = message;
            }
            TaskResult::ProviderLoaded {
                generation,
                provider,
                path,
                catalog,
                client,
            } => {
                if generation != self.generation {
                    debug!("Dropping stale catalog for {}", provider);
                    return;
                }
                if let Some(p) = self.providers.iter_mut().find(|p| p.name == provider) {
                    p.path = path;
                    p.publish(catalog);
                }
                if let Some(client) = client {
                    self.clients.insert(provider.clone(), client);
                    self.arm_reload_timer(XTREAM_RELOAD_INTERVAL);
                }

                if provider == self.settings.active_provider || self.active.as_deref() == Some(provider.as_str()) {
                    self.activate(&provider);
                }
                self.finish_one();
            }
            TaskResult::ProviderFailed { generation, provider } => {
                if generation != self.generation {
                    return;
                }
                warn!("Provider `{}` could not be loaded, keeping its last catalog", provider);
                self.finish_one();
            }
            TaskResult::SeriesLoaded { provider, index, serie } => {
                let Some(p) = self.providers.iter_mut().find(|p| p.name == provider) else {
                    return;
                };
                let mut catalog = (*p.catalog()).clone();
                match catalog.series.get_mut(index) {
                    Some(slot) if slot.name == serie.name => {
                        *slot = serie;
                        p.publish(catalog);
                        self.sync_epg_catalog();
                    }
                    _ => debug!("{}: series {} moved, dropping its detail", provider, serie.name),
                }
            }
            TaskResult::LogosCached { provider, count } => {
                debug!("{}: {} logos cached", provider, count);
            }
            TaskResult::Epg { schedule, notice } => {
                if self.epg.as_ref().is_some_and(|s| s.id == schedule) {
                    if let EpgNotice::Error(ref e) = notice {
                        warn!("EPG error: {}", e);
                    }
                    self.epg_notice = Some(notice);
                }
            }
            TaskResult::EpgUpdated { schedule, snapshot } => {
                if self.epg.as_ref().is_some_and(|s| s.id == schedule) {
                    self.epg_snapshot = snapshot;
                }
            }
            TaskResult::ReloadDue => self.reload(true),
        }
    }

    fn finish_one(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.finish_reload();
        }
    }

    fn finish_reload(&mut self) {
        let active_known = self
            .active
            .as_deref()
            .is_some_and(|name| self.providers.iter().any(|p| p.name == name));
        if !active_known {
            if let Some(first) = self.providers.first().map(|p| p.name.clone()) {
                self.activate(&first);
            }
        }
        self.status = None;
    }

    /// Make `name` the active provider and remember the choice
    pub fn set_active_provider(&mut self, name: &str) -> bool {
        if self.provider(name).is_none() {
            return false;
        }
        self.settings.active_provider = name.to_string();
        self.activate(name);
        true
    }

    fn activate(&mut self, name: &str) {
        self.active = Some(name.to_string());
        self.refresh_epg();
    }

    fn sync_epg_catalog(&self) {
        if let (Some(schedule), Some(provider)) = (&self.epg, self.active_provider()) {
            if schedule.provider == provider.name {
                if let Ok(mut slot) = schedule.catalog.lock() {
                    *slot = provider.catalog();
                }
            }
        }
    }

    /// Restart the guide schedule when the active provider or its source changed
    fn refresh_epg(&mut self) {
        let Some((name, source, catalog)) = self
            .active_provider()
            .map(|p| (p.name.clone(), p.epg_source(), p.catalog()))
        else {
            self.stop_epg();
            return;
        };

        let Some(url) = source else {
            self.stop_epg();
            return;
        };

        if self.epg.as_ref().is_some_and(|s| s.provider == name && s.url == url) {
            self.sync_epg_catalog();
            return;
        }
        self.start_epg(name, url, catalog);
    }

    fn stop_epg(&mut self) {
        if self.epg.take().is_some() {
            debug!("EPG schedule stopped");
        }
        self.epg_snapshot = Arc::new(EpgSnapshot::default());
        self.epg_notice = None;
    }

    fn start_epg(&mut self, provider: String, url: String, catalog: Arc<Catalog>) {
        self.stop_epg();
        self.schedules += 1;
        let id = self.schedules;
        info!("{}: scheduling EPG from {}", provider, url);

        let notices = self.sender.clone();
        let downloader = EpgDownloader::new(Arc::clone(&self.http), &self.settings.user_agent);
        let mut cache = EpgCache::new(downloader, &self.settings.epg_dir(), &url).with_notifier(Box::new(
            move |notice| {
                let _ = notices.send(TaskResult::Epg { schedule: id, notice });
            },
        ));

        let slot = Arc::new(Mutex::new(catalog));
        let current = Arc::clone(&slot);
        let sender = self.sender.clone();
        let timer = Timer::start_now(self.epg_interval, move || {
            let catalog = match current.lock() {
                Ok(catalog) => Arc::clone(&catalog),
                Err(_) => return false,
            };
            match cache.poll(&catalog.channels) {
                Some(snapshot) => sender.send(TaskResult::EpgUpdated { schedule: id, snapshot }).is_ok(),
                None => true,
            }
        });

        self.epg = Some(EpgSchedule {
            id,
            provider,
            url,
            catalog: slot,
            _timer: timer,
        });
    }

    /// Fetch seasons and episodes of one Xtream series in the background
    pub fn load_series_info(&self, provider: &str, index: usize) -> bool {
        let Some(client) = self.clients.get(provider).cloned() else {
            warn!("{}: no Xtream session to load series from", provider);
            return false;
        };
        let Some(serie) = self.provider(provider).and_then(|p| p.catalog().series.get(index).cloned()) else {
            return false;
        };

        let sender = self.sender.clone();
        let provider = provider.to_string();
        self.pool.execute(move || {
            let mut serie = serie;
            let result = if client.get_series_info_by_id(&mut serie) {
                TaskResult::SeriesLoaded { provider, index, serie }
            } else {
                TaskResult::Status {
                    provider: Some(provider),
                    message: Some(format!("Could not load {}", serie.name)),
                }
            };
            let _ = sender.send(result);
        })
    }

    /// Cache the logos of a provider's channels and movies in the background
    pub fn download_logos(&self, provider: &str) -> bool {
        let Some(catalog) = self.provider(provider).map(Provider::catalog) else {
            return false;
        };
        let http = Arc::clone(&self.http);
        let user_agent = self.settings.user_agent.clone();
        let referer = self.settings.http_referer.clone();
        let sender = self.sender.clone();
        let provider = provider.to_string();

        self.pool.execute(move || {
            let mut channels = catalog.channels.clone();
            channels.extend(catalog.movies.iter().cloned());
            let count = logos::download_logos(http.as_ref(), &user_agent, &referer, &channels);
            let _ = sender.send(TaskResult::LogosCached { provider, count });
        })
    }

    /// Names in the active provider starting with `keyword`
    pub fn search(&self, keyword: &str) -> Result<Vec<SearchHit>> {
        match self.active_provider() {
            Some(provider) => search_streams(&provider.catalog(), keyword),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedResponse, FakeHttp};
    use crate::models::{Channel, Serie};
    use std::path::Path;

    const GUIDE: &str = r#"<tv>
  <channel id="news.uk"><display-name>News</display-name></channel>
  <programme start="20990101080000 +0000" stop="20990101090000 +0000" channel="news.uk"><title>Future</title></programme>
</tv>"#;

    fn settings(dir: &Path, providers: &[&str], active: &str) -> Settings {
        Settings {
            cache_dir: Some(dir.to_path_buf()),
            providers: providers.iter().map(|p| p.to_string()).collect(),
            active_provider: active.to_string(),
            ..Default::default()
        }
    }

    fn playlist(epg: &str, name: &str) -> String {
        format!(
            "#EXTM3U x-tvg-url=\"{}\"\n#EXTINF:-1 tvg-id=\"news.uk\" group-title=\"News\",{}\nhttp://x/{}\n",
            epg, name, name
        )
    }

    /// Apply results until every provider reported back
    fn settle(manager: &mut Manager) {
        while manager.is_loading() {
            assert!(manager.wait(Duration::from_secs(5)), "provider load timed out");
        }
    }

    #[test]
    fn test_reload_publishes_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new().route("http://x/a.m3u", CannedResponse::ok(playlist("", "News")));
        let mut manager = Manager::new(
            settings(dir.path(), &["Test TV:::url:::http://x/a.m3u:::::::::"], "Test TV"),
            Arc::new(http),
        );

        manager.reload(false);
        assert!(manager.is_loading());
        settle(&mut manager);

        let provider = manager.active_provider().unwrap();
        assert_eq!(provider.name, "Test TV");
        assert_eq!(provider.catalog().channels.len(), 1);
        assert_eq!(provider.path, dir.path().join("providers").join("testtv"));
        assert_eq!(manager.status(), None);
        assert_eq!(manager.epg_url(), None);
    }

    #[test]
    fn test_failed_and_unparseable_providers() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new().route("http://x/b.m3u", CannedResponse::ok(playlist("", "Sport")));
        let mut manager = Manager::new(
            settings(
                dir.path(),
                &[
                    "Broken:::url:::http://x/missing.m3u:::::::::",
                    "not a provider",
                    "Works:::url:::http://x/b.m3u:::::::::",
                ],
                "Elsewhere",
            ),
            Arc::new(http),
        );

        manager.reload(true);
        settle(&mut manager);

        assert_eq!(manager.providers().len(), 2);
        assert!(manager.provider("Broken").unwrap().catalog().channels.is_empty());
        assert_eq!(manager.provider("Works").unwrap().catalog().channels.len(), 1);
        // No provider matched the setting, the first one is picked
        assert_eq!(manager.active_provider().unwrap().name, "Broken");
    }

    #[test]
    fn test_reload_keeps_last_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.m3u");
        fs::write(&path, playlist("", "News")).unwrap();
        let info = format!("Local:::local:::{}:::::::::", path.display());
        let mut manager = Manager::new(
            settings(dir.path(), &[info.as_str()], "Local"),
            Arc::new(FakeHttp::new()),
        );
        manager.reload(false);
        settle(&mut manager);
        assert_eq!(manager.provider("Local").unwrap().catalog().channels.len(), 1);

        // Still served while the new load is in flight
        manager.reload(true);
        assert!(manager.is_loading());
        assert_eq!(manager.provider("Local").unwrap().catalog().channels.len(), 1);
        settle(&mut manager);

        // A failed load leaves the previous catalog in place
        fs::remove_file(&path).unwrap();
        manager.reload(true);
        settle(&mut manager);
        assert_eq!(manager.provider("Local").unwrap().catalog().channels.len(), 1);
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::new(
            settings(dir.path(), &["Local:::local:::/nonexistent.m3u:::::::::"], "Local"),
            Arc::new(FakeHttp::new()),
        );
        manager.reload(false);
        settle(&mut manager);

        let mut catalog = Catalog::default();
        catalog.channels.push(Arc::new(Channel::default()));
        manager.apply(TaskResult::ProviderLoaded {
            generation: 0,
            provider: "Local".to_string(),
            path: "/elsewhere".into(),
            catalog,
            client: None,
        });
        assert!(manager.provider("Local").unwrap().catalog().channels.is_empty());
    }

    #[test]
    fn test_epg_schedule_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new()
            .route("http://x/a.m3u", CannedResponse::ok(playlist("http://x/epg.xml", "News")))
            .route("http://x/epg.xml", CannedResponse::ok(GUIDE));
        let mut manager = Manager::new(
            settings(dir.path(), &["Test TV:::url:::http://x/a.m3u:::::::::"], "Test TV"),
            Arc::new(http),
        )
        .with_epg_interval(Duration::from_millis(20));

        manager.reload(false);
        settle(&mut manager);
        assert_eq!(manager.epg_url(), Some("http://x/epg.xml"));

        while manager.epg_snapshot().is_empty() {
            assert!(manager.wait(Duration::from_secs(5)), "no EPG snapshot");
        }
        let channel = manager.active_provider().unwrap().catalog().channels[0].clone();
        assert_eq!(manager.epg_snapshot().get_current_event(&channel).title, "Future");
        assert_eq!(manager.epg_notice(), Some(&EpgNotice::Updated));
        assert!(EpgCache::cache_path(&dir.path().join("epg"), "http://x/epg.xml").exists());
    }

    #[test]
    fn test_switching_provider_restarts_epg() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new()
            .route("http://x/a.m3u", CannedResponse::ok(playlist("http://x/a.xml", "A")))
            .route("http://x/b.m3u", CannedResponse::ok(playlist("", "B")));
        let mut manager = Manager::new(
            settings(
                dir.path(),
                &[
                    "A:::url:::http://x/a.m3u:::::::::",
                    "B:::url:::http://x/b.m3u:::::::::http://x/b.xml",
                ],
                "A",
            ),
            Arc::new(http),
        )
        .with_epg_interval(Duration::from_secs(3600));

        manager.reload(false);
        settle(&mut manager);
        assert_eq!(manager.epg_url(), Some("http://x/a.xml"));

        assert!(manager.set_active_provider("B"));
        assert_eq!(manager.settings().active_provider, "B");
        assert_eq!(manager.epg_url(), Some("http://x/b.xml"));
        assert!(!manager.set_active_provider("Nope"));
        assert_eq!(manager.active_provider().unwrap().name, "B");
    }

    #[test]
    fn test_series_detail_is_republished() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::new(
            settings(dir.path(), &["Local:::local:::/nonexistent.m3u:::::::::"], "Local"),
            Arc::new(FakeHttp::new()),
        );
        manager.reload(false);
        settle(&mut manager);

        let mut catalog = Catalog::default();
        catalog.series.push(Serie::new("Show"));
        manager.providers[0].publish(catalog);
        assert!(!manager.load_series_info("Local", 0));

        let mut detailed = Serie::new("Show");
        detailed.plot = Some("Plot".to_string());
        manager.apply(TaskResult::SeriesLoaded {
            provider: "Local".to_string(),
            index: 0,
            serie: detailed,
        });
        let catalog = manager.provider("Local").unwrap().catalog();
        assert_eq!(catalog.series[0].plot.as_deref(), Some("Plot"));

        // A serie that no longer sits at that index is ignored
        manager.apply(TaskResult::SeriesLoaded {
            provider: "Local".to_string(),
            index: 0,
            serie: Serie::new("Other"),
        });
        assert_eq!(manager.provider("Local").unwrap().catalog().series[0].name, "Show");
    }

    #[test]
    fn test_reload_due_starts_a_new_generation() {
        let dir = tempfile::tempdir().unwrap();
        let http = FakeHttp::new().route("http://x/a.m3u", CannedResponse::ok(playlist("", "News")));
        let mut manager = Manager::new(
            settings(dir.path(), &["Test TV:::url:::http://x/a.m3u:::::::::"], "Test TV"),
            Arc::new(http),
        );
        manager.reload(false);
        settle(&mut manager);

        manager.apply(TaskResult::ReloadDue);
        assert!(manager.is_loading());
        settle(&mut manager);
        assert_eq!(manager.active_provider().unwrap().catalog().channels.len(), 1);
        assert_eq!(manager.search("ne").unwrap().len(), 1);
    }

    #[test]
    fn test_start_arms_reload_timer() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::new(settings(dir.path(), &[], ""), Arc::new(FakeHttp::new()));
        manager.start();
        assert_eq!(manager.reload_interval(), Some(RELOAD_INTERVAL));
        assert!(!manager.is_loading());
        assert!(manager.active_provider().is_none());
        assert!(manager.search("x").unwrap().is_empty());
    }
}
