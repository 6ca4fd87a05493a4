//! Channel logo cache

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestOptions};
use crate::models::Channel;

const LOGO_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch every logo that has a cache path but no file yet.
/// Returns how many logos were written.
pub fn download_logos(http: &dyn HttpClient, user_agent: &str, referer: &str, channels: &[Arc<Channel>]) -> usize {
    let options = RequestOptions::new(user_agent)
        .with_referer(referer)
        .with_timeouts(LOGO_TIMEOUT, LOGO_TIMEOUT);

    let mut seen = HashSet::new();
    let mut written = 0;

    for channel in channels {
        let (Some(logo), Some(path)) = (channel.logo.as_deref(), channel.logo_path.as_deref()) else {
            continue;
        };
        if path.exists() || !seen.insert(path.to_path_buf()) {
            continue;
        }
        match fetch_logo(http, logo, path, &options) {
            Ok(()) => written += 1,
            Err(e) => debug!("Logo {} for {} not cached: {}", logo, channel.name, e),
        }
    }

    if written > 0 {
        info!("Cached {} channel logos", written);
    }
    written
}

fn fetch_logo(http: &dyn HttpClient, url: &str, path: &Path, options: &RequestOptions) -> Result<()> {
    let mut response = http.get(url, options)?;
    if !response.is_ok() {
        return Err(Error::Status(response.status));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = File::create(path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        io::copy(&mut response.body, &mut writer)?;
        writer.flush()
    });
    if let Err(e) = result {
        warn!("Could not write logo {}: {}", path.display(), e);
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}
