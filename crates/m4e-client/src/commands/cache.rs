//! Document cache commands.

use m4e_docs::DocumentStore;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Delete records not fetched for `days` (or the configured expiration).
pub fn purge(config: &ClientConfig, days: Option<u64>) -> ClientResult<()> {
    let days = days.unwrap_or(config.cache.expiration_days);
    let mut store = DocumentStore::new(config.cache_config());
    let report = store.purge(days);
    if !store.is_available() {
        return Err(unavailable(config));
    }

    println!(
        "purged {} record(s) older than {} day(s), kept {}, skipped {}",
        report.removed, days, report.kept, report.skipped
    );
    Ok(())
}

/// Delete the whole cache directory.
pub fn clear(config: &ClientConfig) -> ClientResult<()> {
    let mut store = DocumentStore::new(config.cache_config());
    if !store.clear() {
        return Err(unavailable(config));
    }
    println!("cleared {}", config.cache_config().cache_dir().display());
    Ok(())
}

/// Show the cache directory.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("cache: {}", config.cache_config().cache_dir().display());
    Ok(())
}

fn unavailable(config: &ClientConfig) -> ClientError {
    ClientError::Config(format!(
        "document cache at {} is not usable",
        config.cache_config().cache_dir().display()
    ))
}
