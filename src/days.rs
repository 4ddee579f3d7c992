use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;
use crate::engine::Engine;
use crate::limits::*;
use crate::model::Service;
use crate::notify::NotifyHub;
use crate::ticker;

/// How days are keyed and ticked.
#[derive(Debug, Clone, Copy)]
pub struct DaySettings {
    /// Shop-local offset used to turn "today" into a date.
    pub utc_offset: FixedOffset,
    pub tick_every: Duration,
    pub stale_after: chrono::Duration,
}

impl Default for DaySettings {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            tick_every: Duration::from_secs(30),
            stale_after: chrono::Duration::minutes(30),
        }
    }
}

struct LoadedDay {
    engine: Arc<Engine>,
    ticker: JoinHandle<()>,
}

/// Manages per-day engines. Each operating day gets its own Engine + snapshot + ticker.
/// Day = database name from the pgwire connection.
///
/// Past days are unloaded once the cap is reached and they have gone idle; their
/// snapshots stay on disk and reopen on the next connection. Today is always admitted.
pub struct DayManager {
    engines: DashMap<String, LoadedDay>,
    data_dir: PathBuf,
    catalog: Vec<Service>,
    clock: Arc<dyn Clock>,
    settings: DaySettings,
}

impl DayManager {
    pub fn new(
        data_dir: PathBuf,
        catalog: Vec<Service>,
        clock: Arc<dyn Clock>,
        settings: DaySettings,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            catalog,
            clock,
            settings,
        }
    }

    /// Map a database name to a day key. `today`, `default` and the empty name
    /// mean the current shop-local date.
    pub fn resolve(&self, name: &str) -> io::Result<String> {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("today") || name.eq_ignore_ascii_case("default") {
            return Ok(self.today());
        }
        if name.len() > MAX_DAY_KEY_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "day name too long"));
        }

        // Sanitize to prevent path traversal
        let safe_name: String = name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty day name"));
        }
        Ok(safe_name)
    }

    fn today(&self) -> String {
        let local = self.clock.now().with_timezone(&self.settings.utc_offset);
        local.format("%Y-%m-%d").to_string()
    }

    /// Get or lazily open the engine for the given day.
    pub fn get_or_create(&self, name: &str) -> io::Result<Arc<Engine>> {
        let key = self.resolve(name)?;
        if let Some(day) = self.engines.get(&key) {
            return Ok(day.engine.clone());
        }
        if self.engines.len() >= MAX_DAYS_LOADED {
            let today = self.today();
            self.unload_idle(&today);
            if self.engines.len() >= MAX_DAYS_LOADED && key != today {
                return Err(io::Error::other("too many days loaded"));
            }
        }

        let engine = self
            .engines
            .entry(key.clone())
            .or_try_insert_with(|| self.open_day(&key))?
            .engine
            .clone();
        metrics::gauge!(crate::observability::DAYS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    fn open_day(&self, key: &str) -> io::Result<LoadedDay> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(format!("{key}.json"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::open(
            key,
            &path,
            self.catalog.clone(),
            self.clock.clone(),
            notify,
        )?);

        let ticker = tokio::spawn(ticker::run_ticker(
            engine.clone(),
            self.settings.tick_every,
            self.settings.stale_after,
        ));
        info!("day {key} opened ({})", path.display());
        Ok(LoadedDay { engine, ticker })
    }

    /// Unload every day other than `today` that is idle and referenced only by the
    /// map and its ticker.
    fn unload_idle(&self, today: &str) {
        let unused = |day: &LoadedDay| Arc::strong_count(&day.engine) <= 2 && day.engine.is_idle();
        let candidates: Vec<String> = self
            .engines
            .iter()
            .filter(|e| e.key() != today && unused(e.value()))
            .map(|e| e.key().clone())
            .collect();

        for key in candidates {
            if let Some((_, day)) = self.engines.remove_if(&key, |_, day| unused(day)) {
                day.ticker.abort();
                info!("day {key} unloaded");
            }
        }
        metrics::gauge!(crate::observability::DAYS_ACTIVE).set(self.engines.len() as f64);
    }

    pub fn settings(&self) -> &DaySettings {
        &self.settings
    }

    /// Keys of every day with a loaded engine, sorted.
    pub fn loaded_days(&self) -> Vec<String> {
        let mut days: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        days.sort();
        days
    }
}

impl Drop for DayManager {
    fn drop(&mut self) {
        for day in self.engines.iter() {
            day.ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::*;
    use crate::snapshot;
    use chrono::TimeZone;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("rota_test_days").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf, utc_offset_hours: i32) -> DayManager {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap(),
        ));
        let settings = DaySettings {
            utc_offset: FixedOffset::east_opt(utc_offset_hours * 3600).unwrap(),
            ..DaySettings::default()
        };
        DayManager::new(dir, snapshot::default_catalog(), clock, settings)
    }

    #[tokio::test]
    async fn day_isolation() {
        let dir = test_data_dir("isolation");
        let dm = manager(dir, 0);

        let monday = dm.get_or_create("2026-10-19").unwrap();
        let tuesday = dm.get_or_create("2026-10-20").unwrap();

        monday.check_in("Iris", None, SkillTier::Full).await.unwrap();
        monday.register("NS (30 mins)", None, 1).await.unwrap();

        assert_eq!(monday.bookings().await.len(), 1);
        assert!(tuesday.bookings().await.is_empty());
        assert!(tuesday.technicians().await.is_empty());

        let reg = tuesday.register("NS (30 mins)", None, 1).await.unwrap();
        assert!(reg.assigned.is_empty());
        assert_eq!(reg.waiting.map(|w| w.count), Some(1));
    }

    #[test]
    fn today_uses_shop_offset() {
        let dir = test_data_dir("offset");
        // 14:00 UTC is already the next morning at +11:00
        assert_eq!(manager(dir.clone(), 11).resolve("today").unwrap(), "2026-10-20");
        assert_eq!(manager(dir.clone(), 0).resolve("default").unwrap(), "2026-10-19");
        assert_eq!(manager(dir, -5).resolve("").unwrap(), "2026-10-19");
    }

    #[tokio::test]
    async fn today_and_its_date_share_an_engine() {
        let dir = test_data_dir("alias");
        let dm = manager(dir, 0);

        let a = dm.get_or_create("today").unwrap();
        let b = dm.get_or_create("2026-10-19").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.day(), "2026-10-19");
        assert_eq!(dm.loaded_days(), vec!["2026-10-19".to_string()]);
    }

    #[tokio::test]
    async fn day_lazy_creation() {
        let dir = test_data_dir("lazy");
        let dm = manager(dir.clone(), 0);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        // Opening a day writes nothing until the first mutation
        let eng = dm.get_or_create("2026-10-19").unwrap();
        assert!(!dir.join("2026-10-19.json").exists());

        eng.check_in("Pan", None, SkillTier::JuniorBasic).await.unwrap();
        assert!(dir.join("2026-10-19.json").exists());
    }

    #[tokio::test]
    async fn day_reopens_from_snapshot() {
        let dir = test_data_dir("reopen");
        {
            let dm = manager(dir.clone(), 0);
            let eng = dm.get_or_create("2026-10-19").unwrap();
            eng.check_in("Iris", None, SkillTier::Full).await.unwrap();
            eng.register("NSHe (45 mins)", None, 1).await.unwrap();
        }

        let dm = manager(dir, 0);
        let eng = dm.get_or_create("2026-10-19").unwrap();
        let bookings = eng.bookings().await;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].technician, "Iris");
        assert_eq!(eng.rotation().await[0].served_count, 1);
    }

    #[tokio::test]
    async fn day_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let dm = manager(dir.clone(), 0);

        let eng = dm.get_or_create("../evil").unwrap();
        assert_eq!(eng.day(), "evil");
        eng.check_in("Pan", None, SkillTier::Full).await.unwrap();
        assert!(dir.join("evil.json").exists());

        let result = dm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn day_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let dm = manager(dir, 0);

        let long_name = "x".repeat(MAX_DAY_KEY_LEN + 1);
        let err = dm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("day name too long"));
    }

    #[tokio::test]
    async fn day_count_limit() {
        let dir = test_data_dir("count_limit");
        let dm = manager(dir, 0);

        // Held by a caller, so none of them can be unloaded
        let held: Vec<_> = (0..MAX_DAYS_LOADED)
            .map(|i| dm.get_or_create(&format!("d{i}")).unwrap())
            .collect();
        let err = dm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many days loaded"));

        // Today is admitted regardless
        let today = dm.get_or_create("today").unwrap();
        assert_eq!(today.day(), "2026-10-19");
        assert_eq!(dm.loaded_days().len(), held.len() + 1);
    }

    #[tokio::test]
    async fn idle_past_days_are_unloaded_on_rollover() {
        let dir = test_data_dir("rollover");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
        ));
        let dm = DayManager::new(dir.clone(), snapshot::default_catalog(), clock.clone(), DaySettings::default());

        // The first day keeps a customer waiting, so it must stay loaded
        let first = dm.get_or_create("today").unwrap();
        first.register("NS (30 mins)", None, 1).await.unwrap();
        drop(first);

        for _ in 0..MAX_DAYS_LOADED + 10 {
            clock.advance(chrono::Duration::days(1));
            let today = dm.get_or_create("today").unwrap();
            today.check_in("Iris", None, SkillTier::Full).await.unwrap();
        }

        let loaded = dm.loaded_days();
        assert!(loaded.len() <= MAX_DAYS_LOADED);
        assert!(loaded.contains(&"2026-01-01".to_string()));
        assert!(loaded.contains(&dm.resolve("today").unwrap()));

        // An unloaded day comes back from its snapshot
        let early = dm.get_or_create("2026-01-02").unwrap();
        assert_eq!(early.technicians().await.len(), 1);
    }
}
