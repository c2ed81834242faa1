use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::rules::{apply_transformations, apply_validation_rules, validate_schema};
use super::types::{DataConfig, DataFormat, FileChange};
use super::DataError;

const WATCH_CHANNEL: usize = 16;

/// `*` matches any run of characters, `?` exactly one.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut n, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            n += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((sp, sn)) = star {
            p = sp + 1;
            n = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn parse_records(text: &str, format: DataFormat) -> Result<Vec<Value>, DataError> {
    let value = match format {
        DataFormat::Json => serde_json::from_str::<Value>(text)?,
        DataFormat::Yaml => serde_yaml::from_str::<Value>(text)?,
        DataFormat::JsonLines => {
            return text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str::<Value>(l).map_err(DataError::from))
                .collect();
        }
    };
    match value {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        _ => Err(DataError::NotRecords),
    }
}

fn render_records(records: &[Value], format: DataFormat) -> Result<String, DataError> {
    Ok(match format {
        DataFormat::Json => serde_json::to_string_pretty(records)?,
        DataFormat::Yaml => serde_yaml::to_string(records)?,
        DataFormat::JsonLines => {
            let mut out = String::new();
            for r in records {
                out.push_str(&serde_json::to_string(r)?);
                out.push('\n');
            }
            out
        }
    })
}

fn resolve_format(source: &str, config: &DataConfig) -> Result<DataFormat, DataError> {
    if let Some(format) = config.format {
        return Ok(format);
    }
    let path = source.split(['?', '#']).next().unwrap_or(source);
    DataFormat::from_path(path).ok_or_else(|| DataError::UnknownFormat(source.to_string()))
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

struct CachedRead {
    stored: Instant,
    records: Vec<Value>,
}

pub struct DataManager {
    http: reqwest::Client,
    cache: Mutex<HashMap<String, CachedRead>>,
    watchers: Mutex<HashMap<PathBuf, CancellationToken>>,
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DataManager {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, source: &str, ttl: Duration) -> Option<Vec<Value>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(source)
            .filter(|c| c.stored.elapsed() < ttl)
            .map(|c| c.records.clone())
    }

    fn store(&self, source: &str, records: &[Value]) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).insert(
            source.to_string(),
            CachedRead {
                stored: Instant::now(),
                records: records.to_vec(),
            },
        );
    }

    /// Read records from a file path or an http(s) URL, then apply the
    /// schema check, cleaning rules and transformations of `config`.
    pub async fn read_data(&self, source: &str, config: &DataConfig) -> Result<Vec<Value>, DataError> {
        let ttl = config.cache_ttl_secs.map(Duration::from_secs);
        if let Some(records) = ttl.and_then(|ttl| self.cached(source, ttl)) {
            debug!("Cache hit for {}", source);
            return Ok(records);
        }

        let format = resolve_format(source, config)?;
        let text = if is_url(source) {
            self.fetch_text(source).await?
        } else {
            tokio::fs::read_to_string(source).await?
        };

        let records = parse_records(&text, format)?;
        let records = self.validate_data(records, config)?;
        let records = apply_transformations(records, &config.transformations);

        if ttl.is_some() {
            self.store(source, &records);
        }
        debug!("Read {} records from {}", records.len(), source);
        Ok(records)
    }

    /// Transform, check and write records to `target`. Parent directories are
    /// created as needed.
    pub async fn write_data(&self, records: &[Value], target: impl AsRef<Path>, config: &DataConfig) -> Result<(), DataError> {
        let target = target.as_ref();
        let key = target.to_string_lossy().into_owned();
        let format = resolve_format(&key, config)?;

        let records = apply_transformations(records.to_vec(), &config.transformations);
        if let Some(schema) = &config.schema {
            validate_schema(&records, schema)?;
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, render_records(&records, format)?).await?;

        if config.cache_ttl_secs.is_some() {
            self.store(&key, &records);
        } else {
            self.cache.lock().unwrap_or_else(|e| e.into_inner()).remove(&key);
        }
        info!("Wrote {} records to {}", records.len(), target.display());
        Ok(())
    }

    /// Apply cleaning rules, then the schema check.
    pub fn validate_data(&self, records: Vec<Value>, config: &DataConfig) -> Result<Vec<Value>, DataError> {
        let records = apply_validation_rules(records, &config.validation_rules);
        if let Some(schema) = &config.schema {
            validate_schema(&records, schema)?;
        }
        Ok(records)
    }

    pub fn transform_data(&self, records: Vec<Value>, config: &DataConfig) -> Vec<Value> {
        apply_transformations(records, &config.transformations)
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, DataError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    /// Copy files under `src` whose name matches any of `patterns` (all files
    /// when empty) into `dst`, keeping relative paths. Files already in `dst`
    /// that are at least as new are skipped. Returns the number copied.
    pub async fn sync_folders(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>, patterns: &[String]) -> Result<usize, DataError> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let mut copied = 0;
        let mut pending = vec![src.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let name = entry.file_name().to_string_lossy().into_owned();
                if !patterns.is_empty() && !patterns.iter().any(|p| matches_pattern(&name, p)) {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(src) else {
                    continue;
                };
                let target = dst.join(relative);
                if let (Some(s), Some(d)) = (modified_at(&path).await, modified_at(&target).await) {
                    if d >= s {
                        continue;
                    }
                }
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&path, &target).await?;
                copied += 1;
            }
        }

        info!("Synced {} files from {} to {}", copied, src.display(), dst.display());
        Ok(copied)
    }

    /// Poll `path` every `interval` and send a [`FileChange`] whenever its
    /// modification time moves. Watching the same path again replaces the
    /// earlier watcher.
    pub fn watch_file(&self, path: impl Into<PathBuf>, interval: Duration) -> mpsc::Receiver<FileChange> {
        let path = path.into();
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL);
        let token = CancellationToken::new();

        if let Some(previous) = self
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone(), token.clone())
        {
            previous.cancel();
        }

        // Baseline taken before returning so writes after this call are seen.
        let mut last = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        info!("Watching {} every {:?}", path.display(), interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let current = modified_at(&path).await;
                if current.is_some() && current != last {
                    last = current;
                    let modified: DateTime<Utc> = current.map(DateTime::from).unwrap_or_else(Utc::now);
                    let change = FileChange { path: path.clone(), modified };
                    if tx.send(change).await.is_err() {
                        break;
                    }
                }
            }
            debug!("Stopped watching {}", path.display());
        });

        rx
    }

    pub fn stop_watching(&self, path: impl AsRef<Path>) -> bool {
        let token = self
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path.as_ref());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => {
                warn!("No watcher for {}", path.as_ref().display());
                false
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub async fn cleanup(&self) {
        let tokens: Vec<CancellationToken> = self
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, t)| t)
            .collect();
        for token in tokens {
            token.cancel();
        }
        self.clear_cache();
        info!("Data manager cleaned up");
    }
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager").finish_non_exhaustive()
    }
}
