//! Anti-detection profiles.
//!
//! Every download job gets a freshly randomized client identity: user agent,
//! header set, sleep window and throttle, plus the session cookies if any were
//! imported at startup. Profiles are never reused across jobs.

mod user_agents;

pub use user_agents::{ACCEPT_LANGUAGES, USER_AGENTS};

use crate::config::AntiDetectionSettings;
use crate::cookies::CookieJar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client identity and pacing for one download job.
#[derive(Debug, Clone)]
pub struct AntiDetectionProfile {
    pub user_agent: String,
    pub extra_headers: BTreeMap<String, String>,
    /// Inclusive (min, max) sleep between requests, in seconds.
    pub sleep_interval_secs: (u64, u64),
    pub max_sleep_interval_secs: u64,
    pub throttle_bytes_per_sec: u64,
    pub cookie_jar: Option<Arc<CookieJar>>,
}

/// Builds [`AntiDetectionProfile`]s from an injectable randomness source.
pub struct ProfileProvider {
    settings: AntiDetectionSettings,
    cookies: Arc<CookieJar>,
    rng: Mutex<StdRng>,
}

impl ProfileProvider {
    /// Create a provider seeded from OS entropy.
    pub fn new(settings: AntiDetectionSettings, cookies: Arc<CookieJar>) -> Self {
        Self::with_rng(settings, cookies, StdRng::from_entropy())
    }

    /// Create a provider with a fixed seed, for reproducible profiles.
    pub fn with_seed(settings: AntiDetectionSettings, cookies: Arc<CookieJar>, seed: u64) -> Self {
        Self::with_rng(settings, cookies, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(settings: AntiDetectionSettings, cookies: Arc<CookieJar>, rng: StdRng) -> Self {
        Self {
            settings,
            cookies,
            rng: Mutex::new(rng),
        }
    }

    /// Produce a fresh profile. Never fails.
    pub fn new_profile(&self) -> AntiDetectionProfile {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let s = &self.settings;

        let user_agent = USER_AGENTS
            .choose(&mut *rng)
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();
        let language = ACCEPT_LANGUAGES
            .choose(&mut *rng)
            .copied()
            .unwrap_or(ACCEPT_LANGUAGES[0]);

        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("Accept-Language".to_string(), language.to_string());
        extra_headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        );

        let cap = s.max_sleep_interval_secs;
        let low_bound = s.sleep_min_secs.min(cap);
        let high_bound = s.sleep_max_secs.min(cap).max(low_bound);
        let low = rng.gen_range(low_bound..=high_bound);
        let high = rng.gen_range(low..=high_bound);

        let cookie_jar = if self.cookies.is_empty() {
            None
        } else {
            Some(self.cookies.clone())
        };

        AntiDetectionProfile {
            user_agent,
            extra_headers,
            sleep_interval_secs: (low, high),
            max_sleep_interval_secs: cap,
            throttle_bytes_per_sec: s.throttle_bytes_per_sec,
            cookie_jar,
        }
    }

    /// Short randomized pause taken before the first remote request of a job.
    pub fn pre_request_delay(&self) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let ms = rng.gen_range(self.settings.jitter_min_ms..=self.settings.jitter_max_ms.max(self.settings.jitter_min_ms));
        Duration::from_millis(ms)
    }
}
