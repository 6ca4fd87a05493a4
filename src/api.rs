//! Xtream Codes API client

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestOptions};
use crate::models::{slugify, Catalog, Channel, Group, GroupType, Provider, Season, Serie};

/// Cached JSON younger than this is used instead of asking the panel
const CACHE_THRESHOLD: Duration = Duration::from_secs(8 * 60 * 60);

const AUTH_TIMEOUT: Duration = Duration::from_secs(4);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(15);
/// Full stream lists run to tens of megabytes on big panels
const LIST_READ_TIMEOUT: Duration = Duration::from_secs(120);

pub const CATCH_ALL_GROUP: &str = "xEverythingElse";
pub const CATCH_ALL_ID: i64 = 9999;

static VALID_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
        r"localhost|",
        r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$"
    ))
    .expect("URL pattern")
});

pub fn is_valid_url(url: &str) -> bool {
    VALID_URL.is_match(url)
}

fn deserialize_optional_number_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(D::Error::custom("Expected string, number, or null")),
    }
}

/// Panels send `episodes` as a map keyed by season number, or as a bare
/// array of per-season arrays when numbering is implicit.
fn deserialize_episode_map<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, Vec<ApiEpisode>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(HashMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, list)| {
                let episodes: Vec<ApiEpisode> = serde_json::from_value(list).map_err(D::Error::custom)?;
                Ok::<_, D::Error>((key, episodes))
            })
            .collect(),
        Value::Array(seasons) => seasons
            .into_iter()
            .enumerate()
            .map(|(i, list)| {
                let episodes: Vec<ApiEpisode> = serde_json::from_value(list).map_err(D::Error::custom)?;
                Ok::<_, D::Error>(((i + 1).to_string(), episodes))
            })
            .collect(),
        _ => Err(D::Error::custom("Expected episode map or array")),
    }
}

fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// The three stream classes a panel serves, loaded in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClass {
    Live,
    Vod,
    Series,
}

impl StreamClass {
    pub const ALL: [StreamClass; 3] = [StreamClass::Live, StreamClass::Vod, StreamClass::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamClass::Live => "Live",
            StreamClass::Vod => "VOD",
            StreamClass::Series => "Series",
        }
    }

    fn group_type(&self) -> GroupType {
        match self {
            StreamClass::Live => GroupType::Tv,
            StreamClass::Vod => GroupType::Movies,
            StreamClass::Series => GroupType::Series,
        }
    }

    fn categories_action(&self) -> &'static str {
        match self {
            StreamClass::Live => "get_live_categories",
            StreamClass::Vod => "get_vod_categories",
            StreamClass::Series => "get_series_categories",
        }
    }

    fn streams_action(&self) -> &'static str {
        match self {
            StreamClass::Live => "get_live_streams",
            StreamClass::Vod => "get_vod_streams",
            StreamClass::Series => "get_series",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    pub category_name: String,
}

/// One entry of a live, VOD or series listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stream_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub is_adult: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub youtube_trailer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesInfoResponse {
    #[serde(default)]
    pub seasons: Vec<ApiSeason>,
    #[serde(default, deserialize_with = "deserialize_episode_map")]
    pub episodes: HashMap<String, Vec<ApiEpisode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSeason {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub season_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEpisode {
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub episode_num: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

/// Credentials as confirmed by the panel; stream URLs are built from these
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub username: String,
    pub password: String,
}

fn parse_authorization(data: &Value) -> Result<Authorization> {
    let user_info = data
        .get("user_info")
        .ok_or_else(|| Error::Auth("response has no user_info".to_string()))?;

    if value_as_string(user_info.get("auth")).as_deref() == Some("0") {
        return Err(Error::Auth("credentials rejected".to_string()));
    }

    match (
        value_as_string(user_info.get("username")),
        value_as_string(user_info.get("password")),
    ) {
        (Some(username), Some(password)) => Ok(Authorization { username, password }),
        _ => Err(Error::Auth("user_info lacks credentials".to_string())),
    }
}

/// A name matched by [`search_streams`]
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    Movie(Arc<Channel>),
    Channel(Arc<Channel>),
    /// Index into [`Catalog::series`]
    Serie(usize),
}

/// Case-insensitive regex search anchored at the start of each name,
/// over movies, then channels, then series
pub fn search_streams(catalog: &Catalog, keyword: &str) -> Result<Vec<SearchHit>> {
    let regex = RegexBuilder::new(&format!("^(?:{})", keyword))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Format(format!("bad search pattern: {}", e)))?;

    let mut hits: Vec<SearchHit> = catalog
        .movies
        .iter()
        .filter(|m| regex.is_match(&m.name))
        .map(|m| SearchHit::Movie(Arc::clone(m)))
        .collect();
    hits.extend(
        catalog
            .channels
            .iter()
            .filter(|c| regex.is_match(&c.name))
            .map(|c| SearchHit::Channel(Arc::clone(c))),
    );
    hits.extend(
        catalog
            .series
            .iter()
            .enumerate()
            .filter(|(_, s)| regex.is_match(&s.name))
            .map(|(i, _)| SearchHit::Serie(i)),
    );

    debug!("Found {} results for `{}`", hits.len(), keyword);
    Ok(hits)
}

pub struct XtreamClient {
    http: Arc<dyn HttpClient>,
    name: String,
    server: String,
    username: String,
    password: String,
    cache_dir: PathBuf,
    user_agent: String,
    hide_adult_content: bool,
    auth_data: Value,
    authorization: Option<Authorization>,
    loaded: bool,
}

impl XtreamClient {
    /// Client for `provider`, caching panel JSON under `cache_dir`.
    /// Nothing is requested until [`XtreamClient::authenticate`].
    pub fn new(http: Arc<dyn HttpClient>, provider: &Provider, cache_dir: &Path) -> Self {
        Self {
            http,
            name: provider.name.clone(),
            server: provider.url.trim_end_matches('/').to_string(),
            username: provider.username.clone(),
            password: provider.password.clone(),
            cache_dir: cache_dir.to_path_buf(),
            user_agent: "Mozilla/5.0".to_string(),
            hide_adult_content: false,
            auth_data: Value::Null,
            authorization: None,
            loaded: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_hide_adult_content(mut self, hide: bool) -> Self {
        self.hide_adult_content = hide;
        self
    }

    fn options(&self, connect: Duration, read: Duration) -> RequestOptions {
        RequestOptions::new(&self.user_agent).with_timeouts(connect, read)
    }

    pub fn authenticate_url(&self) -> String {
        format!(
            "{}/player_api.php?username={}&password={}",
            self.server, self.username, self.password
        )
    }

    fn api_url(&self, action: &str) -> String {
        format!("{}&action={}", self.authenticate_url(), action)
    }

    fn api_url_with_param(&self, action: &str, param_name: &str, param_value: &str) -> String {
        format!("{}&{}={}", self.api_url(action), param_name, param_value)
    }

    /// Full XMLTV guide served by the panel
    pub fn xmltv_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.server, self.username, self.password
        )
    }

    fn get_json(&self, url: &str, options: &RequestOptions) -> Result<Value> {
        let response = self.http.get(url, options)?;
        if !response.is_ok() {
            return Err(Error::Status(response.status));
        }
        Ok(serde_json::from_reader(response.body)?)
    }

    fn request(&self, url: &str) -> Result<Value> {
        self.get_json(url, &self.options(CONNECT_TIMEOUT, READ_TIMEOUT))
    }

    fn fetch_list(&self, url: &str) -> Result<Vec<Value>> {
        match self.get_json(url, &self.options(CONNECT_TIMEOUT, LIST_READ_TIMEOUT))? {
            Value::Array(list) => Ok(list),
            other => Err(Error::Format(format!(
                "expected a JSON array, got {}",
                match other {
                    Value::Object(_) => "an object",
                    Value::Null => "null",
                    _ => "a scalar",
                }
            ))),
        }
    }

    /// Log in. On failure the authorization context stays empty.
    pub fn authenticate(&mut self) -> bool {
        if self.authorization.is_some() {
            return true;
        }

        self.auth_data = Value::Null;
        let options = self.options(AUTH_TIMEOUT, AUTH_TIMEOUT);
        let result = self
            .get_json(&self.authenticate_url(), &options)
            .and_then(|data| parse_authorization(&data).map(|auth| (data, auth)));

        match result {
            Ok((data, authorization)) => {
                debug!("{}: authenticated as {}", self.name, authorization.username);
                self.auth_data = data;
                self.authorization = Some(authorization);
                true
            }
            Err(e) => {
                warn!("Provider `{}` could not be loaded. Reason: {}", self.name, e);
                false
            }
        }
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Raw login response: `user_info` and `server_info`
    pub fn account_info(&self) -> &Value {
        &self.auth_data
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(format!("{}-{}", slugify(&self.name), filename))
    }

    /// Cached list if it is fresh and non-empty
    fn load_from_file(&self, filename: &str) -> Option<Vec<Value>> {
        let path = self.cache_file(filename);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= CACHE_THRESHOLD {
            debug!("{} is stale ({}s old)", path.display(), age.as_secs());
            return None;
        }

        let list: Vec<Value> = match fs::read(&path)
            .map_err(Error::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
        {
            Ok(list) => list,
            Err(e) => {
                warn!(" - Could not load from file `{}`: {}", path.display(), e);
                return None;
            }
        };
        Some(list).filter(|l| !l.is_empty())
    }

    fn save_to_file(&self, list: &[Value], filename: &str) -> bool {
        if list.is_empty() {
            return false;
        }
        let path = self.cache_file(filename);
        let result = fs::create_dir_all(&self.cache_dir)
            .map_err(Error::from)
            .and_then(|_| serde_json::to_vec(list).map_err(Error::from))
            .and_then(|bytes| fs::write(&path, bytes).map_err(Error::from));
        if let Err(e) = &result {
            warn!(" - Could not save to file `{}`: {}", path.display(), e);
        }
        result.is_ok()
    }

    /// Cached copy when fresh, else the panel's answer (which refreshes the cache)
    fn cached_list(&self, filename: &str, url: &str) -> Result<(Vec<Value>, Duration)> {
        if let Some(list) = self.load_from_file(filename) {
            return Ok((list, Duration::ZERO));
        }
        let start = Instant::now();
        let list = self.fetch_list(url)?;
        self.save_to_file(&list, filename);
        Ok((list, start.elapsed()))
    }

    /// Local file a logo would be cached to
    pub fn logo_local_path(&self, logo_url: &str) -> Option<PathBuf> {
        if logo_url.is_empty() || !is_valid_url(logo_url) {
            return None;
        }
        let file = logo_url.rsplit('/').next().unwrap_or(logo_url);
        let file = file.split(['?', '#']).next().unwrap_or(file);
        let name = match file.rsplit_once('.') {
            Some((stem, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                format!("{}.{}", slugify(stem), ext.to_ascii_lowercase())
            }
            _ => slugify(file),
        };
        Some(self.cache_dir.join(format!("{}-{}", slugify(&self.name), name)))
    }

    /// Load groups, channels, movies and series into `catalog`.
    ///
    /// A class that fails to load is logged and skipped; whatever it added
    /// before failing stays in the catalog.
    pub fn load_iptv(&mut self, catalog: &mut Catalog) -> bool {
        let Some(authorization) = self.authorization.clone() else {
            warn!("{}: cannot load streams since authorization failed", self.name);
            return false;
        };
        if self.loaded {
            warn!("{}: data has already been loaded", self.name);
            return false;
        }

        for class in StreamClass::ALL {
            if let Err(e) = self.load_class(class, &authorization, catalog) {
                warn!(" - Could not load {} streams for {}: {}", class.as_str(), self.name, e);
            }
        }

        if catalog.epg_url.is_none() {
            catalog.epg_url = Some(self.xmltv_url());
        }
        self.loaded = true;
        info!("{}: {}", self.name, catalog.summary());
        true
    }

    fn load_class(&self, class: StreamClass, authorization: &Authorization, catalog: &mut Catalog) -> Result<()> {
        let (categories, elapsed) = self.cached_list(
            &format!("all_groups_{}.json", class.as_str()),
            &self.api_url(class.categories_action()),
        )?;
        if categories.is_empty() {
            return Err(Error::Format(format!("no {} groups", class.as_str())));
        }
        info!(
            "Loaded {} {} Groups in {:.3} seconds",
            categories.len(),
            class.as_str(),
            elapsed.as_secs_f64()
        );

        let group_type = class.group_type();
        let mut catch_all = Group::with_type(CATCH_ALL_GROUP, group_type);
        catch_all.group_id = Some(CATCH_ALL_ID);
        catalog.groups.push(catch_all);

        for value in categories {
            match serde_json::from_value::<Category>(value) {
                Ok(category) => {
                    let mut group = Group::with_type(&category.category_name, group_type);
                    group.group_id = category.category_id.and_then(|id| id.trim().parse().ok());
                    catalog.groups.push(group);
                }
                Err(e) => debug!(" - Skipping malformed {} category: {}", class.as_str(), e),
            }
        }
        catalog.groups.sort_by(|a, b| a.name.cmp(&b.name));

        // Category ids are only unique within one class
        let mut by_id: HashMap<i64, usize> = HashMap::new();
        let mut catch_all_index = 0;
        for (i, group) in catalog.groups.iter().enumerate() {
            if group.group_type != group_type {
                continue;
            }
            if group.name == CATCH_ALL_GROUP && group.group_id == Some(CATCH_ALL_ID) {
                catch_all_index = i;
            } else if let Some(id) = group.group_id {
                by_id.entry(id).or_insert(i);
            }
        }

        let (streams, elapsed) = self.cached_list(
            &format!("all_stream_{}.json", class.as_str()),
            &self.api_url(class.streams_action()),
        )?;
        if streams.is_empty() {
            return Err(Error::Format(format!("no {} streams", class.as_str())));
        }
        info!(
            "Loaded {} {} Streams in {:.3} seconds",
            streams.len(),
            class.as_str(),
            elapsed.as_secs_f64()
        );

        let mut skipped_adult = 0;
        let mut skipped_no_name = 0;
        let mut malformed = 0;

        for value in streams {
            let record: StreamRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(" - Malformed {} stream: {}", class.as_str(), e);
                    malformed += 1;
                    continue;
                }
            };

            let Some(name) = non_empty(record.name.clone()) else {
                skipped_no_name += 1;
                continue;
            };

            if self.hide_adult_content
                && class == StreamClass::Live
                && record.is_adult.as_deref().map(str::trim) == Some("1")
            {
                skipped_adult += 1;
                continue;
            }

            let group_index = record
                .category_id
                .as_deref()
                .and_then(|id| id.trim().parse::<i64>().ok())
                .and_then(|id| by_id.get(&id).copied())
                .unwrap_or(catch_all_index);
            if group_index == catch_all_index {
                debug!(" - {} Channel -> {}", CATCH_ALL_GROUP, name);
            }

            if class == StreamClass::Series {
                catalog.series.push(self.serie_from_record(&name, &record));
                let index = catalog.series.len() - 1;
                catalog.groups[group_index].add_serie(index);
                continue;
            }

            let group_title = catalog.groups[group_index].name.clone();
            let Some(channel) = self.channel_from_record(&name, &group_title, &record, authorization) else {
                continue;
            };
            let channel = Arc::new(channel);
            catalog.groups[group_index].channels.push(Arc::clone(&channel));
            if class == StreamClass::Live {
                catalog.channels.push(channel);
            } else {
                catalog.movies.push(channel);
            }
        }

        if self.hide_adult_content && class == StreamClass::Live {
            info!(" - Skipped {} adult {} streams", skipped_adult, class.as_str());
        }
        if skipped_no_name > 0 {
            info!(" - Skipped {} unnamed {} streams", skipped_no_name, class.as_str());
        }
        if malformed > 0 {
            warn!(" - Skipped {} malformed {} streams", malformed, class.as_str());
        }
        Ok(())
    }

    fn channel_from_record(
        &self,
        name: &str,
        group_title: &str,
        record: &StreamRecord,
        authorization: &Authorization,
    ) -> Option<Channel> {
        let raw_type = record.stream_type.as_deref().unwrap_or_default();
        let stream_type = match raw_type {
            "created_live" | "radio_streams" => "live",
            other => other,
        };

        let extension = match stream_type {
            "live" => "ts".to_string(),
            "movie" => non_empty(record.container_extension.clone()).unwrap_or_else(|| "mp4".to_string()),
            other => {
                warn!("Error the channel has unknown stream type `{}` ({})", other, name);
                return None;
            }
        };

        let Some(stream_id) = non_empty(record.stream_id.clone()) else {
            warn!("{} has no stream id", name);
            return None;
        };

        let url = format!(
            "{}/{}/{}/{}/{}.{}",
            self.server, raw_type, authorization.username, authorization.password, stream_id, extension
        );
        if !is_valid_url(&url) {
            warn!("{} - Bad URL? `{}`", name, url);
        }

        let logo = non_empty(record.stream_icon.clone());
        Some(Channel {
            id: Some(stream_id),
            name: name.to_string(),
            logo_path: logo.as_deref().and_then(|l| self.logo_local_path(l)),
            logo,
            group_title: Some(group_title.to_string()),
            title: Some(name.to_string()),
            url,
            epg_channel_id: non_empty(record.epg_channel_id.clone()),
        })
    }

    fn serie_from_record(&self, name: &str, record: &StreamRecord) -> Serie {
        let logo = non_empty(record.cover.clone());
        Serie {
            logo_path: logo.as_deref().and_then(|l| self.logo_local_path(l)),
            logo,
            series_id: record.series_id.as_deref().and_then(|id| id.trim().parse().ok()),
            plot: non_empty(record.plot.clone()),
            genre: non_empty(record.genre.clone()),
            youtube_trailer: non_empty(record.youtube_trailer.clone()),
            ..Serie::new(name)
        }
    }

    /// Fetch seasons and episodes for one series. Not done during
    /// [`XtreamClient::load_iptv`]; panels carry thousands of series.
    pub fn get_series_info_by_id(&self, serie: &mut Serie) -> bool {
        let Some(authorization) = self.authorization.as_ref() else {
            warn!("{}: not authenticated, cannot load {}", self.name, serie.name);
            return false;
        };
        let Some(series_id) = serie.series_id else {
            warn!("{} has no series id", serie.name);
            return false;
        };

        let url = self.api_url_with_param("get_series_info", "series_id", &series_id.to_string());
        let info = match self
            .request(&url)
            .and_then(|value| serde_json::from_value::<SeriesInfoResponse>(value).map_err(Error::from))
        {
            Ok(info) => info,
            Err(e) => {
                warn!("{}: could not load series info for {}: {}", self.name, serie.name, e);
                return false;
            }
        };

        // Rebuilt on every call; the serie may already carry earlier detail
        serie.seasons.clear();
        serie.episodes.clear();

        // season_number -> season name
        let mut season_names: HashMap<String, String> = HashMap::new();
        for season in &info.seasons {
            let number = season.season_number.clone().unwrap_or_default();
            let name = non_empty(season.name.clone()).unwrap_or_else(|| format!("Season {}", number));
            serie.seasons.entry(name.clone()).or_insert_with(|| Season::new(&name));
            season_names.insert(number, name);
        }

        let mut keys: Vec<&String> = info.episodes.keys().collect();
        keys.sort_by(|a, b| {
            let number = |k: &str| k.parse::<u32>().unwrap_or(u32::MAX);
            number(a).cmp(&number(b)).then_with(|| a.cmp(b))
        });

        for key in keys {
            let season_name = season_names
                .get(key)
                .cloned()
                .unwrap_or_else(|| format!("Season {}", key));
            for episode in &info.episodes[key] {
                let Some(id) = non_empty(episode.id.clone()) else {
                    continue;
                };
                let title = non_empty(episode.title.clone())
                    .unwrap_or_else(|| format!("Episode {}", episode.episode_num.as_deref().unwrap_or(&id)));
                let extension = non_empty(episode.container_extension.clone()).unwrap_or_else(|| "mp4".to_string());
                let url = format!(
                    "{}/series/{}/{}/{}.{}",
                    self.server, authorization.username, authorization.password, id, extension
                );
                if !is_valid_url(&url) {
                    warn!("{} - Bad URL? `{}`", title, url);
                }

                let channel = Arc::new(Channel {
                    id: Some(id),
                    name: title.clone(),
                    logo: serie.logo.clone(),
                    logo_path: serie.logo_path.clone(),
                    group_title: Some(serie.name.clone()),
                    title: Some(title.clone()),
                    url,
                    epg_channel_id: None,
                });
                serie
                    .seasons
                    .entry(season_name.clone())
                    .or_insert_with(|| Season::new(&season_name))
                    .episodes
                    .insert(title, Arc::clone(&channel));
                serie.episodes.push(channel);
            }
        }

        debug!(
            "{}: {} seasons, {} episodes",
            serie.name,
            serie.seasons.len(),
            serie.episodes.len()
        );
        true
    }

    /// Streams of one category, straight from the panel
    pub fn get_streams_by_category(&self, class: StreamClass, category_id: &str) -> Result<Vec<Value>> {
        self.fetch_list(&self.api_url_with_param(class.streams_action(), "category_id", category_id))
    }

    pub fn get_vod_info(&self, vod_id: &str) -> Result<Value> {
        self.request(&self.api_url_with_param("get_vod_info", "vod_id", vod_id))
    }

    /// Next programmes of a live stream, optionally capped at `limit`
    pub fn get_short_epg(&self, stream_id: &str, limit: Option<u32>) -> Result<Value> {
        let mut url = self.api_url_with_param("get_short_epg", "stream_id", stream_id);
        if let Some(limit) = limit {
            url.push_str(&format!("&limit={}", limit));
        }
        self.request(&url)
    }

    /// Every listing of a live stream regardless of day
    pub fn get_simple_data_table(&self, stream_id: &str) -> Result<Value> {
        self.request(&self.api_url_with_param("get_simple_data_table", "stream_id", stream_id))
    }
}
