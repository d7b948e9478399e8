//! Integration tests for the metadata cache and its use by the
//! analysis context.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use ahkmeta::{AnalysisContext, CachedAnalysis, DocumentVersion, MetadataCache};

const SCRIPT: &str = "Add(a, b) {\n    return a + b\n}\n";

fn cached(version: i32) -> CachedAnalysis {
    let ctx = AnalysisContext::uncached();
    CachedAnalysis {
        version: DocumentVersion(version),
        fingerprint: 1,
        functions: ctx.analyze("x.ahk", SCRIPT, DocumentVersion(version)),
    }
}

#[test]
fn test_set_then_get_returns_value_and_list() {
    let cache = MetadataCache::new();
    cache.set("scripts/Main.ahk", cached(4));

    let hit = cache.get("main.ahk").expect("entry should be fresh");
    assert_eq!(hit.version, DocumentVersion(4));
    assert_eq!(hit.functions.len(), 1);
    assert_eq!(hit.functions[0].name, "Add");
}

#[test]
fn test_key_normalization() {
    let cache = MetadataCache::new();
    cache.set("C:\\X\\Lib.AHK2", cached(1));
    assert!(cache.has("lib.ahk"));
    assert!(cache.get("/other/dir/LIB.ahk").is_some());
    assert!(cache.delete("lib.AHK"));
    assert!(cache.is_empty());
}

#[test]
fn test_expired_entries_are_absent_until_cleared() {
    let cache = MetadataCache::with_ttl(Duration::from_millis(50));
    cache.set("a.ahk", cached(1));
    sleep(Duration::from_millis(120));

    assert!(cache.get("a.ahk").is_none());
    assert!(cache.has("a.ahk"));

    assert_eq!(cache.clear_expired(), 1);
    assert!(!cache.has("a.ahk"));
}

#[test]
fn test_clear_expired_keeps_fresh_entries() {
    let cache = MetadataCache::with_ttl(Duration::from_millis(300));
    cache.set("old.ahk", cached(1));
    sleep(Duration::from_millis(400));
    cache.set("new.ahk", cached(1));

    assert_eq!(cache.clear_expired(), 1);
    assert!(cache.has("new.ahk"));
    assert!(cache.get("new.ahk").is_some());
    assert!(!cache.has("old.ahk"));
}

#[test]
fn test_stats_track_insertion_times() {
    let cache = MetadataCache::new();
    cache.set("a.ahk", cached(1));
    sleep(Duration::from_millis(5));
    cache.set("b.ahk", cached(1));

    let stats = cache.stats();
    assert_eq!(stats.size, 2);
    let oldest = stats.oldest_entry_timestamp.unwrap();
    let newest = stats.newest_entry_timestamp.unwrap();
    assert!(oldest < newest);

    cache.clear();
    assert_eq!(cache.stats().size, 0);
    assert_eq!(cache.stats().oldest_entry_timestamp, None);
}

#[test]
fn test_context_reuses_entry_until_version_changes() {
    let cache = Arc::new(MetadataCache::new());
    let ctx = AnalysisContext::new(Arc::clone(&cache));

    let v1 = ctx.analyze("main.ahk", SCRIPT, DocumentVersion(1));
    let again = ctx.analyze("main.ahk", SCRIPT, DocumentVersion(1));
    assert!(Arc::ptr_eq(&v1, &again));

    let edited = format!("{}Sub(a, b) => a - b\n", SCRIPT);
    let v2 = ctx.analyze("main.ahk", &edited, DocumentVersion(2));
    assert_eq!(v2.len(), 2);
    assert_eq!(cache.get("main.ahk").unwrap().version, DocumentVersion(2));
}

#[test]
fn test_context_with_expired_cache_recomputes() {
    let cache = Arc::new(MetadataCache::with_ttl(Duration::ZERO));
    let ctx = AnalysisContext::new(Arc::clone(&cache));

    let first = ctx.analyze("main.ahk", SCRIPT, DocumentVersion(1));
    let second = ctx.analyze("main.ahk", SCRIPT, DocumentVersion(1));
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
}

#[test]
fn test_shared_cache_across_threads() {
    let cache = Arc::new(MetadataCache::new());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ctx = AnalysisContext::new(Arc::clone(&cache));
            std::thread::spawn(move || {
                let name = format!("file{}.ahk", i);
                ctx.analyze(&name, SCRIPT, DocumentVersion(i)).len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(cache.len(), 4);
}
