pub mod handlers;

pub use handlers::{
    cache_cleanup, cache_stats, compare_all, compare_extra_items, compare_main,
    compare_subtables, extract, health_check, AppState,
};
