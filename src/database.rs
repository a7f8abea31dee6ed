use std::sync::Arc;

use crate::buffer_pool::{BufferPool, DEFAULT_PAGES, PAGE_SIZE};
use crate::catalog::Catalog;
use crate::log::{LogFile, NullLogFile};

/// Tunables that would otherwise be scattered module constants,
/// collected so a test or embedder can vary them without touching
/// source.
#[derive(Debug, Clone)]
pub struct Config {
    pub page_size: usize,
    pub buffer_pool_capacity: usize,
    pub tuple_bag_min_size: usize,
    pub tuple_bag_max_size: usize,
    pub tuple_bag_max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: PAGE_SIZE,
            buffer_pool_capacity: DEFAULT_PAGES,
            tuple_bag_min_size: 64,
            tuple_bag_max_size: 1024,
            tuple_bag_max_ms: 100,
        }
    }
}

/// Replaces the once-global `Database` singleton: an explicit, owned
/// bundle of the catalog, buffer pool, and log collaborator, threaded
/// through operator and transaction-driver constructors instead of
/// looked up from a `lazy_static`.
pub struct DbContext {
    config: Config,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    log: Arc<dyn LogFile>,
}

impl DbContext {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(Catalog::new());
        let log: Arc<dyn LogFile> = Arc::new(NullLogFile);
        let buffer_pool = BufferPool::with_capacity_and_log(
            Arc::clone(&catalog),
            config.buffer_pool_capacity,
            Arc::clone(&log),
        );
        DbContext {
            config,
            catalog,
            buffer_pool,
            log,
        }
    }

    pub fn get_buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn get_catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn get_log(&self) -> &dyn LogFile {
        self.log.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for DbContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_storage_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.page_size, PAGE_SIZE);
        assert_eq!(cfg.buffer_pool_capacity, DEFAULT_PAGES);
    }

    #[test]
    fn context_wires_catalog_and_buffer_pool_together() {
        let ctx = DbContext::default();
        assert_eq!(ctx.get_buffer_pool().get_num_pages(), DEFAULT_PAGES);
        assert!(ctx.get_catalog().get_table_from_name("missing").is_none());
    }
}
