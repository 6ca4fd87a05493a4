//! Guide download
//! Feeds are normalized to a gzip cache file whatever compression the source uses

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use tempfile::NamedTempFile;
use url::Url;
use xz2::read::XzDecoder;
use xz2::stream::Stream;

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestOptions};

/// Download progress callback: (downloaded_bytes, total_bytes)
pub type ProgressCallback = Box<dyn Fn(u64, Option<u64>) + Send>;

/// Compression of a feed, judged by the suffix of its URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEncoding {
    Gzip,
    Xz,
    Lzma,
    Plain,
}

impl FeedEncoding {
    pub fn from_url(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".gz") {
            FeedEncoding::Gzip
        } else if path.ends_with(".xz") {
            FeedEncoding::Xz
        } else if path.ends_with(".lzma") {
            FeedEncoding::Lzma
        } else {
            FeedEncoding::Plain
        }
    }
}

/// Counts the compressed bytes pulled off the wire
struct CountingReader<R> {
    inner: R,
    count: u64,
    total: Option<u64>,
    progress: Option<ProgressCallback>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        if let Some(ref cb) = self.progress {
            cb(self.count, self.total);
        }
        Ok(n)
    }
}

/// EPG downloader over the injected HTTP client
pub struct EpgDownloader {
    http: Arc<dyn HttpClient>,
    options: RequestOptions,
    progress: Option<ProgressCallback>,
}

impl EpgDownloader {
    pub fn new(http: Arc<dyn HttpClient>, user_agent: &str) -> Self {
        let options = RequestOptions::new(user_agent)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(120));
        Self {
            http,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fetch `url` into the gzip file at `path`.
    ///
    /// The file is only replaced once the whole body has arrived; a body
    /// shorter than its declared length leaves `path` untouched.
    /// Returns the number of bytes received.
    pub fn download(&mut self, url: &str, path: &Path) -> Result<u64> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Format(format!("unsupported EPG scheme `{}`", parsed.scheme())));
        }
        let encoding = FeedEncoding::from_url(&parsed);
        debug!("Downloading EPG {} as {:?}", url, encoding);

        let response = self.http.get(url, &self.options)?;
        if !response.is_ok() {
            return Err(Error::Status(response.status));
        }
        let expected = response.content_length;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;

        let mut source = CountingReader {
            inner: response.body,
            count: 0,
            total: expected,
            progress: self.progress.take(),
        };

        let copied = match encoding {
            FeedEncoding::Gzip => io::copy(&mut source, tmp.as_file_mut()).map(|_| ()),
            FeedEncoding::Xz => gzip_into(XzDecoder::new(&mut source), tmp.as_file_mut()),
            FeedEncoding::Lzma => {
                let stream = Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|e| Error::Format(format!("lzma decoder: {}", e)))?;
                gzip_into(XzDecoder::new_stream(&mut source, stream), tmp.as_file_mut())
            }
            FeedEncoding::Plain => gzip_into(&mut source, tmp.as_file_mut()),
        };
        let received = source.count;
        self.progress = source.progress.take();
        copied?;

        if let Some(expected) = expected {
            if received < expected {
                warn!("The file size is incorrect, discarding EPG from {}", url);
                return Err(Error::Integrity {
                    written: received,
                    expected,
                });
            }
        }

        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        info!("Downloaded EPG {} ({} bytes)", url, received);
        Ok(received)
    }
}

fn gzip_into<R: Read>(mut reader: R, file: &mut fs::File) -> io::Result<()> {
    let mut encoder = GzEncoder::new(file, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}
