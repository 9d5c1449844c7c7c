use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};

use crate::{
    api::price_source::{FetchError, PriceSource},
    core::{backoff::Backoff, series::PriceSeries},
    prelude::*,
};

/// Consistent view of the cache, published as a whole.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub series: Arc<PriceSeries>,

    /// Time of the last successful fetch.
    pub fetched_at: Option<DateTime<Local>>,

    /// Error of the last refresh, cleared by a successful one.
    pub last_error: Option<FetchError>,

    /// Number of completed refreshes, successful or not.
    generation: u64,
}

impl Snapshot {
    #[must_use]
    pub fn is_stale(&self, max_age: TimeDelta, now: DateTime<Local>) -> bool {
        self.fetched_at.is_none_or(|fetched_at| now - fetched_at > max_age)
    }
}

/// Most recently fetched prices.
///
/// At most one refresh is in flight. Readers never wait for it and keep seeing
/// the previous snapshot until the refresh completes.
pub struct PriceCache {
    source: Box<dyn PriceSource>,
    backoff: Backoff,
    snapshot: watch::Sender<Snapshot>,
    refresh_lock: Mutex<()>,
    path: Option<PathBuf>,
}

impl PriceCache {
    pub fn new(source: impl PriceSource + 'static, backoff: Backoff) -> Self {
        Self {
            source: Box::new(source),
            backoff,
            snapshot: watch::Sender::new(Snapshot::default()),
            refresh_lock: Mutex::new(()),
            path: None,
        }
    }

    /// Persist successful refreshes to the file and start with its contents, if any.
    #[must_use]
    pub fn with_path(self, path: PathBuf) -> Self {
        if let Some(file) = CacheFile::read_from(&path) {
            info!(len = file.series.len(), fetched_at = %file.fetched_at, "restored the prices");
            self.snapshot.send_replace(Snapshot {
                series: Arc::new(file.series),
                fetched_at: Some(file.fetched_at),
                last_error: None,
                generation: 0,
            });
        }
        Self { path: Some(path), ..self }
    }

    /// Cached series without fetching, empty before the first successful fetch.
    #[must_use]
    pub fn current(&self) -> Arc<PriceSeries> {
        Arc::clone(&self.snapshot.borrow().series)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn fetched_at(&self) -> Option<DateTime<Local>> {
        self.snapshot.borrow().fetched_at
    }

    /// Notifies on every completed refresh.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Fetch new prices when the cached ones are older than `max_age` or missing.
    ///
    /// On failure, the previous series stays in place and the error is recorded.
    /// Callers that arrive while another refresh is running get its outcome.
    #[instrument(skip_all, fields(max_age = %max_age))]
    pub async fn refresh_if_stale(
        &self,
        max_age: TimeDelta,
        now: DateTime<Local>,
    ) -> Result<Arc<PriceSeries>, FetchError> {
        let observed = self.snapshot();
        if !observed.is_stale(max_age, now) {
            debug!(fetched_at = ?observed.fetched_at, "fresh");
            return Ok(observed.series);
        }

        let _guard = self.refresh_lock.lock().await;
        let latest = self.snapshot();
        if latest.generation != observed.generation {
            debug!("coalesced with a concurrent refresh");
            return latest.last_error.map_or(Ok(latest.series), Err);
        }

        match self.backoff.retry(self.source.as_ref()).await {
            Ok(series) => {
                info!(len = series.len(), "refreshed");
                let series = Arc::new(series);
                self.snapshot.send_modify(|snapshot| {
                    *snapshot = Snapshot {
                        series: Arc::clone(&series),
                        fetched_at: Some(now),
                        last_error: None,
                        generation: snapshot.generation + 1,
                    };
                });
                if let Some(path) = self.path.clone() {
                    let file = CacheFile { fetched_at: now, series: PriceSeries::clone(&series) };
                    if let Err(error) =
                        tokio::task::spawn_blocking(move || file.write_to(&path)).await
                    {
                        warn!("the cache writer did not finish: {error:#}");
                    }
                }
                Ok(series)
            }
            Err(error) => {
                error!(
                    fetched_at = ?latest.fetched_at,
                    len = latest.series.len(),
                    "failed to refresh, keeping the previous prices: {error}",
                );
                self.snapshot.send_modify(|snapshot| {
                    snapshot.last_error = Some(error.clone());
                    snapshot.generation += 1;
                });
                Err(error)
            }
        }
    }
}

#[derive(Deserialize, Serialize)]
struct CacheFile {
    fetched_at: DateTime<Local>,

    #[serde(rename = "points")]
    series: PriceSeries,
}

impl CacheFile {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn read_from(path: &Path) -> Option<Self> {
        match Self::read_fallibly_from(path) {
            Ok(file) => file,
            Err(error) => {
                warn!("failed to read the cache: {error:#}");
                None
            }
        }
    }

    fn read_fallibly_from(path: &Path) -> Result<Option<Self>> {
        if path.is_file() {
            Ok(Some(toml::from_str(&fs::read_to_string(path)?).context("malformed cache file")?))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn write_to(&self, path: &Path) {
        if let Err(error) = self.write_fallibly_to(path) {
            warn!("failed to write the cache: {error:#}");
        }
    }

    fn write_fallibly_to(&self, path: &Path) -> Result {
        fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use chrono::TimeZone;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        api::awattar,
        core::{backoff::tests::{ScriptedSource, instant}, series::PricePoint},
        quantity::rate::MegawattHourRate,
    };

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 11, hour, minute, 0).unwrap()
    }

    fn series(price: f64) -> PriceSeries {
        (0..24).map(|hour| PricePoint::new(at(hour, 0), MegawattHourRate(price))).collect()
    }

    fn server_error() -> FetchError {
        FetchError::HttpStatus { status: StatusCode::INTERNAL_SERVER_ERROR }
    }

    #[test]
    fn test_empty_before_first_fetch() {
        let cache = PriceCache::new(ScriptedSource::new([]), instant());
        assert!(cache.current().is_empty());
        assert!(cache.fetched_at().is_none());
        assert!(cache.snapshot().is_stale(TimeDelta::hours(1), at(0, 0)));
    }

    #[tokio::test]
    async fn test_first_refresh() {
        let cache = PriceCache::new(ScriptedSource::new([Ok(series(1.0))]), instant());
        let refreshed = cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await;
        assert_eq!(refreshed.as_deref(), Ok(&series(1.0)));
        assert_eq!(*cache.current(), series(1.0));
        assert_eq!(cache.fetched_at(), Some(at(8, 0)));
        assert!(cache.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_fresh_cache_does_not_fetch() {
        let source = Arc::new(ScriptedSource::new([Ok(series(1.0)), Ok(series(2.0))]));
        let cache = PriceCache::new(Arc::clone(&source), instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();
        cache.refresh_if_stale(TimeDelta::hours(1), at(9, 0)).await.unwrap();
        assert_eq!(source.n_calls(), 1);
        assert_eq!(*cache.current(), series(1.0));

        cache.refresh_if_stale(TimeDelta::hours(1), at(9, 1)).await.unwrap();
        assert_eq!(source.n_calls(), 2);
        assert_eq!(*cache.current(), series(2.0));
        assert_eq!(cache.fetched_at(), Some(at(9, 1)));
    }

    #[tokio::test]
    async fn test_missing_data_keeps_previous_series() {
        let source = Arc::new(ScriptedSource::new([
            Ok(series(1.0)),
            Err(FetchError::Parse("missing field `data`".into())),
        ]));
        let cache = PriceCache::new(Arc::clone(&source), instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let refreshed = cache.refresh_if_stale(TimeDelta::hours(1), at(10, 0)).await;
        assert!(matches!(refreshed, Err(FetchError::Parse(_))));
        assert_eq!(source.n_calls(), 2, "parse errors are not retried");
        assert_eq!(*cache.current(), series(1.0));
        assert_eq!(cache.fetched_at(), Some(at(8, 0)));
        assert!(matches!(cache.snapshot().last_error, Some(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_response_keeps_previous_series() {
        let source = ScriptedSource::new([Ok(series(1.0)), awattar::parse(br#"{"data": []}"#)]);
        let cache = PriceCache::new(source, instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let refreshed = cache.refresh_if_stale(TimeDelta::hours(1), at(10, 0)).await;
        assert_eq!(refreshed, Err(FetchError::NoData));
        assert_eq!(*cache.current(), series(1.0));
        assert_eq!(cache.fetched_at(), Some(at(8, 0)));
        assert_eq!(cache.snapshot().last_error, Some(FetchError::NoData));
        assert!(cache.snapshot().is_stale(TimeDelta::hours(1), at(10, 0)));
    }

    #[tokio::test]
    async fn test_server_errors_serve_stale_series() {
        let source = Arc::new(ScriptedSource::new([
            Ok(series(1.0)),
            Err(server_error()),
            Err(server_error()),
            Err(server_error()),
        ]));
        let cache = PriceCache::new(Arc::clone(&source), instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let refreshed = cache.refresh_if_stale(TimeDelta::hours(1), at(10, 0)).await;
        assert_eq!(refreshed, Err(server_error()));
        assert_eq!(source.n_calls(), 4);
        assert_eq!(cache.snapshot().last_error, Some(server_error()));
        assert_eq!(*cache.current(), series(1.0));
    }

    #[tokio::test]
    async fn test_success_clears_last_error() {
        let source = ScriptedSource::new([Err(FetchError::Parse("oops".into())), Ok(series(3.0))]);
        let cache = PriceCache::new(source, instant());
        assert!(cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.is_err());
        assert!(cache.current().is_empty());
        assert!(cache.snapshot().last_error.is_some());

        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 5)).await.unwrap();
        assert!(cache.snapshot().last_error.is_none());
        assert_eq!(*cache.current(), series(3.0));
    }

    /// Takes a while to respond, so that concurrent refreshes overlap.
    struct SlowSource(Arc<ScriptedSource>);

    #[async_trait::async_trait]
    impl PriceSource for SlowSource {
        async fn fetch(&self) -> Result<PriceSeries, FetchError> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.0.fetch().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_coalesced() {
        let source = Arc::new(ScriptedSource::new([Ok(series(1.0)), Ok(series(2.0))]));
        let cache = PriceCache::new(SlowSource(Arc::clone(&source)), instant());
        let (lhs, rhs) = tokio::join!(
            cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)),
            cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)),
        );
        assert_eq!(lhs.as_deref(), Ok(&series(1.0)));
        assert_eq!(rhs.as_deref(), Ok(&series(1.0)));
        assert_eq!(source.n_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_coalesced() {
        let source = Arc::new(ScriptedSource::new([Err(FetchError::Parse("oops".into()))]));
        let cache = PriceCache::new(SlowSource(Arc::clone(&source)), instant());
        let (lhs, rhs) = tokio::join!(
            cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)),
            cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)),
        );
        assert!(matches!(lhs, Err(FetchError::Parse(_))));
        assert!(matches!(rhs, Err(FetchError::Parse(_))));
        assert_eq!(source.n_calls(), 1);
    }

    #[tokio::test]
    async fn test_readers_see_previous_series_during_refresh() {
        let source = Arc::new(ScriptedSource::new([Ok(series(1.0)), Ok(series(2.0))]));
        let cache = PriceCache::new(SlowSource(Arc::clone(&source)), instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let refresh = cache.refresh_if_stale(TimeDelta::hours(1), at(10, 0));
        let read = async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            cache.current()
        };
        let (refreshed, during) = tokio::join!(refresh, read);
        assert_eq!(*during, series(1.0));
        assert_eq!(refreshed.as_deref(), Ok(&series(2.0)));
        assert_eq!(*cache.current(), series(2.0));
    }

    #[tokio::test]
    async fn test_cancelled_refresh_keeps_cache() {
        let source = Arc::new(ScriptedSource::new([Ok(series(1.0)), Ok(series(2.0))]));
        let cache = PriceCache::new(SlowSource(Arc::clone(&source)), instant());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            cache.refresh_if_stale(TimeDelta::hours(1), at(10, 0)),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(*cache.current(), series(1.0));
        assert_eq!(cache.fetched_at(), Some(at(8, 0)));
        assert!(cache.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let cache = PriceCache::new(ScriptedSource::new([Ok(series(1.0))]), instant());
        let mut receiver = cache.subscribe();
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update().series, series(1.0));
    }

    #[tokio::test]
    async fn test_persisted_series_survives_restart() {
        let path = env::temp_dir().join(format!("lynx-cache-{}.toml", process::id()));
        let _ = fs::remove_file(&path);

        let cache =
            PriceCache::new(ScriptedSource::new([Ok(series(-2.5))]), instant()).with_path(path.clone());
        cache.refresh_if_stale(TimeDelta::hours(1), at(8, 0)).await.unwrap();

        let restarted = PriceCache::new(ScriptedSource::new([]), instant()).with_path(path.clone());
        assert_eq!(*restarted.current(), series(-2.5));
        assert_eq!(restarted.fetched_at(), Some(at(8, 0)));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_cache_file_is_ignored() {
        let path = env::temp_dir().join(format!("lynx-malformed-{}.toml", process::id()));
        fs::write(&path, "definitely = [not a cache").unwrap();
        let cache = PriceCache::new(ScriptedSource::new([]), instant()).with_path(path.clone());
        assert!(cache.current().is_empty());
        let _ = fs::remove_file(&path);
    }
}
