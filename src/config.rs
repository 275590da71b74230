use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aucell::AucParams;
use crate::binarize::BinarizeParams;
use crate::db::QueryMode;
use crate::error::{CtxError, Result};
use crate::table::{DEFAULT_CACHE_CAPACITY, HandleCache};

pub const THREADS_ENV: &str = "KIRA_CTXCORE_THREADS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub num_workers: usize,
    pub handle_cache_capacity: usize,
    pub query_mode: QueryMode,
    pub auc: Option<AucParams>,
    pub binarize: Option<BinarizeParams>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            handle_cache_capacity: DEFAULT_CACHE_CAPACITY,
            query_mode: QueryMode::default(),
            auc: None,
            binarize: None,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CtxError::Parse(format!("config: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| CtxError::Parse(format!("{}: {e}", path.display())))
    }

    /// Applies `KIRA_CTXCORE_THREADS` to every worker count.
    pub fn apply_env(&mut self) {
        let value = std::env::var(THREADS_ENV).ok();
        self.apply_threads(threads_from_env_value(value.as_deref()));
    }

    pub fn apply_threads(&mut self, threads: Option<usize>) {
        let Some(threads) = threads else {
            return;
        };
        debug!(threads, "worker count override");
        self.num_workers = threads;
        if let Some(auc) = self.auc.as_mut() {
            auc.num_workers = threads;
        }
        if let Some(binarize) = self.binarize.as_mut() {
            binarize.num_workers = threads;
        }
    }

    pub fn handle_cache(&self) -> HandleCache {
        HandleCache::new(self.handle_cache_capacity)
    }
}

/// Non-numeric values are ignored; anything below 1 becomes 1.
pub fn threads_from_env_value(value: Option<&str>) -> Option<usize> {
    let n: i64 = value?.trim().parse().ok()?;
    Some(n.max(1) as usize)
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
