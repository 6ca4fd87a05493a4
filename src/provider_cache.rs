//! Resolves a provider's playlist source to a local file

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestOptions};
use crate::models::Provider;

/// Assumed size when the server does not declare one
const DEFAULT_CONTENT_LENGTH: u64 = 15;
const CHUNK_SIZE: usize = 64 * 1024;

pub struct ProviderCache {
    http: Arc<dyn HttpClient>,
    options: RequestOptions,
}

impl ProviderCache {
    pub fn new(http: Arc<dyn HttpClient>, user_agent: &str, referer: &str) -> Self {
        let options = RequestOptions::new(user_agent)
            .with_referer(referer)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(120));
        Self { http, options }
    }

    /// Make sure `provider.path` points at a local copy of the playlist.
    ///
    /// `file://` sources and bare paths are used in place. Remote sources are
    /// downloaded when `refresh` is set or nothing is cached yet.
    pub fn get_playlist(&self, provider: &mut Provider, refresh: bool) -> bool {
        if let Some(local) = provider.url.strip_prefix("file://") {
            provider.path = local.into();
            return true;
        }

        if !provider.url.contains("://") {
            provider.path = provider.url.clone().into();
            return true;
        }

        if !refresh && provider.path.exists() {
            debug!("{}: using cached playlist {}", provider.name, provider.path.display());
            return true;
        }

        match self.download(&provider.url, &provider.path) {
            Ok(written) => {
                info!("{}: downloaded {} bytes", provider.name, written);
                true
            }
            Err(e) => {
                warn!("{}: playlist download from {} failed: {}", provider.name, provider.url, e);
                false
            }
        }
    }

    fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self.http.get(url, &self.options)?;
        if !response.is_ok() {
            return Err(Error::Status(response.status));
        }

        let expected = response.content_length.unwrap_or(DEFAULT_CONTENT_LENGTH);
        let encoding = response.charset.as_deref().and_then(|label| {
            let found = Encoding::for_label(label.as_bytes());
            if found.is_none() {
                debug!("Unknown charset `{}`, keeping the body as is", label);
            }
            found.filter(|e| *e != UTF_8)
        });

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let written = match write_body(response.body, path, encoding) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(path);
                return Err(e);
            }
        };

        if written < expected {
            warn!("The file size is incorrect, deleting {}", path.display());
            fs::remove_file(path)?;
            return Err(Error::Integrity { written, expected });
        }

        Ok(written)
    }

    /// A usable playlist exists and carries M3U markers
    pub fn check_playlist(provider: &Provider) -> bool {
        match fs::read(&provider.path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                let legit = content.contains("#EXTM3U") && content.contains("#EXTINF");
                if legit {
                    debug!("Content looks legit: {}", provider.name);
                } else {
                    debug!("Not a playlist: {}", provider.path.display());
                }
                legit
            }
            Err(_) => false,
        }
    }
}

/// Copy the body to disk, transcoding to UTF-8 when the server declared
/// another charset. Returns the number of bytes received.
fn write_body(mut body: Box<dyn Read>, path: &Path, encoding: Option<&'static Encoding>) -> Result<u64> {
    let mut file = BufWriter::new(File::create(path)?);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut decoder = encoding.map(Encoding::new_decoder_without_bom_handling);
    let mut text = String::new();
    let mut received: u64 = 0;

    loop {
        let n = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Transport(format!("Read failed: {}", e))),
        };
        received += n as u64;

        match decoder.as_mut() {
            Some(decoder) => {
                decode_chunk(decoder, &buffer[..n], &mut text, false);
                file.write_all(text.as_bytes())?;
            }
            None => file.write_all(&buffer[..n])?,
        }
    }

    if let Some(decoder) = decoder.as_mut() {
        decode_chunk(decoder, &[], &mut text, true);
        file.write_all(text.as_bytes())?;
    }

    file.flush()?;
    Ok(received)
}

/// Decode one chunk into `out`. Sequences split across chunks are held by
/// the decoder until the next call.
fn decode_chunk(decoder: &mut Decoder, chunk: &[u8], out: &mut String, last: bool) {
    out.clear();
    let needed = decoder
        .max_utf8_buffer_length(chunk.len())
        .unwrap_or(chunk.len() * 3 + 16);
    out.reserve(needed);
    let (result, _, _) = decoder.decode_to_string(chunk, out, last);
    if matches!(result, CoderResult::OutputFull) {
        warn!("Charset decoder ran out of room, output truncated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedResponse, FakeHttp};
    use crate::models::ProviderKind;

    const PLAYLIST: &str = "#EXTM3U\n#EXTINF:-1,News\nhttp://x/1\n";

    fn provider(dir: &Path, url: &str) -> Provider {
        Provider::new("Test TV", ProviderKind::Url, url, dir)
    }

    #[test]
    fn test_file_scheme_is_used_in_place() {
        let cache = ProviderCache::new(Arc::new(FakeHttp::new()), "ua", "");
        let mut p = provider(Path::new("/cache"), "file:///home/me/list.m3u");
        assert!(cache.get_playlist(&mut p, true));
        assert_eq!(p.path, Path::new("/home/me/list.m3u"));
    }

    #[test]
    fn test_bare_path_is_local() {
        let cache = ProviderCache::new(Arc::new(FakeHttp::new()), "ua", "");
        let mut p = provider(Path::new("/cache"), "/srv/list.m3u");
        assert!(cache.get_playlist(&mut p, false));
        assert_eq!(p.path, Path::new("/srv/list.m3u"));
    }

    #[test]
    fn test_download_writes_playlist_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new().route("http://x/list.m3u", CannedResponse::ok(PLAYLIST)));
        let cache = ProviderCache::new(http.clone(), "VLC/3.0", "http://ref");
        let mut p = provider(&dir.path().join("providers"), "http://x/list.m3u");

        assert!(cache.get_playlist(&mut p, false));
        assert_eq!(fs::read_to_string(&p.path).unwrap(), PLAYLIST);
        assert!(ProviderCache::check_playlist(&p));

        let options = http.last_options().unwrap();
        assert_eq!(options.user_agent, "VLC/3.0");
        assert_eq!(options.referer.as_deref(), Some("http://ref"));
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_cached_copy_skips_download_unless_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new().route("http://x/list.m3u", CannedResponse::ok(PLAYLIST)));
        let cache = ProviderCache::new(http.clone(), "ua", "");
        let mut p = provider(dir.path(), "http://x/list.m3u");
        fs::write(&p.path, "old").unwrap();

        assert!(cache.get_playlist(&mut p, false));
        assert!(http.requested().is_empty());
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "old");

        assert!(cache.get_playlist(&mut p, true));
        assert_eq!(http.requested().len(), 1);
        assert_eq!(fs::read_to_string(&p.path).unwrap(), PLAYLIST);
    }

    #[test]
    fn test_short_body_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let canned = CannedResponse::ok(PLAYLIST).with_content_length(Some(10_000));
        let http = Arc::new(FakeHttp::new().route("http://x/list.m3u", canned));
        let cache = ProviderCache::new(http, "ua", "");
        let mut p = provider(dir.path(), "http://x/list.m3u");

        assert!(!cache.get_playlist(&mut p, true));
        assert!(!p.path.exists());
    }

    #[test]
    fn test_missing_length_defaults_to_fifteen_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(
            FakeHttp::new()
                .route("http://x/tiny", CannedResponse::ok("#EXTM3U").with_content_length(None))
                .route("http://x/ok", CannedResponse::ok(PLAYLIST).with_content_length(None)),
        );
        let cache = ProviderCache::new(http, "ua", "");

        let mut tiny = provider(dir.path(), "http://x/tiny");
        assert!(!cache.get_playlist(&mut tiny, true));
        assert!(!tiny.path.exists());

        let mut ok = provider(dir.path(), "http://x/ok");
        ok.path = dir.path().join("ok");
        assert!(cache.get_playlist(&mut ok, true));
    }

    #[test]
    fn test_http_error_and_refused_connection_fail() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::new().route("http://x/gone", CannedResponse::status(404)));
        let cache = ProviderCache::new(http, "ua", "");

        let mut gone = provider(dir.path(), "http://x/gone");
        assert!(!cache.get_playlist(&mut gone, true));

        let mut refused = provider(dir.path(), "http://nowhere/list");
        assert!(!cache.get_playlist(&mut refused, true));
        assert!(!refused.path.exists());
    }

    #[test]
    fn test_latin1_body_is_transcoded() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = b"#EXTM3U\n#EXTINF:-1,Caf\xe9 TV\nhttp://x/1\n".to_vec();
        let http = Arc::new(
            FakeHttp::new().route("http://x/l1", CannedResponse::ok(body).with_charset("iso-8859-1")),
        );
        let cache = ProviderCache::new(http, "ua", "");
        let mut p = provider(dir.path(), "http://x/l1");

        assert!(cache.get_playlist(&mut p, true));
        assert!(fs::read_to_string(&p.path).unwrap().contains("Café TV"));
    }

    #[test]
    fn test_declared_charset_is_transcoded() {
        let dir = tempfile::tempdir().unwrap();
        // "Новости" in windows-1251
        let mut body: Vec<u8> = b"#EXTM3U\n#EXTINF:-1,".to_vec();
        body.extend_from_slice(&[0xcd, 0xee, 0xe2, 0xee, 0xf1, 0xf2, 0xe8]);
        body.extend_from_slice(b"\nhttp://x/1\n");
        let http = Arc::new(
            FakeHttp::new().route("http://x/ru", CannedResponse::ok(body).with_charset("windows-1251")),
        );
        let cache = ProviderCache::new(http, "ua", "");
        let mut p = provider(dir.path(), "http://x/ru");

        assert!(cache.get_playlist(&mut p, true));
        assert!(fs::read_to_string(&p.path).unwrap().contains("Новости"));
    }

    #[test]
    fn test_unknown_charset_keeps_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(
            FakeHttp::new().route("http://x/odd", CannedResponse::ok(PLAYLIST).with_charset("x-made-up")),
        );
        let cache = ProviderCache::new(http, "ua", "");
        let mut p = provider(dir.path(), "http://x/odd");

        assert!(cache.get_playlist(&mut p, true));
        assert_eq!(fs::read_to_string(&p.path).unwrap(), PLAYLIST);
    }

    #[test]
    fn test_check_playlist_requires_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = provider(dir.path(), "http://x");
        assert!(!ProviderCache::check_playlist(&p));

        p.path = dir.path().join("bad.m3u");
        fs::write(&p.path, "#EXTM3U\nhttp://x/1\n").unwrap();
        assert!(!ProviderCache::check_playlist(&p));

        fs::write(&p.path, PLAYLIST).unwrap();
        assert!(ProviderCache::check_playlist(&p));
    }
}
