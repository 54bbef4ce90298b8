//! Per-tenant TTL cache of query results.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SEP: char = '\u{1f}';

#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Value,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Key layout: `tenant_db SEP query_name SEP k=v&k=v`, variables sorted by name and form-encoded
/// so a value containing `&` or `=` cannot pose as extra variables
pub fn cache_key(tenant_db: &str, query_name: &str, vars: &BTreeMap<String, String>) -> String {
    let vars = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(vars.iter())
        .finish();
    format!("{}{SEP}{}{SEP}{}", tenant_db, query_name, vars)
}

fn query_prefix(tenant_db: &str, query_name: &str) -> String {
    format!("{}{SEP}{}{SEP}", tenant_db, query_name)
}

pub struct QueryCache {
    cache: Cache<String, CachedValue>,
}

impl QueryCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        let hit = self.cache.get(key).await;
        if hit.is_some() {
            debug!("Query cache hit");
        }
        hit
    }

    pub async fn insert(&self, key: String, value: CachedValue) {
        if value.ttl.is_zero() {
            return;
        }
        self.cache.insert(key, value).await;
    }

    /// Drops every cached result of one query in one tenant
    pub fn invalidate_query(&self, tenant_db: &str, query_name: &str) {
        let prefix = query_prefix(tenant_db, query_name);
        if let Err(e) = self.cache.invalidate_entries_if(move |key, _| key.starts_with(&prefix)) {
            warn!("Failed to invalidate cached results for {}: {}", query_name, e);
        }
    }

    #[cfg(test)]
    async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn entry(ttl: Duration) -> CachedValue {
        CachedValue { value: Value::from(5), fetched_at: Utc::now(), ttl }
    }

    #[test]
    fn key_is_independent_of_insertion_order() {
        let a = cache_key("tenant_a", "open_tickets", &vars(&[("project", "SOC"), ("since", "7d")]));
        let b = cache_key("tenant_a", "open_tickets", &vars(&[("since", "7d"), ("project", "SOC")]));
        assert_eq!(a, b);
        assert_ne!(a, cache_key("tenant_b", "open_tickets", &vars(&[("project", "SOC"), ("since", "7d")])));
    }

    #[test]
    fn separators_inside_values_do_not_collide() {
        let packed = cache_key("tenant_a", "open_tickets", &vars(&[("project", "SOC&since=2020")]));
        let split = cache_key("tenant_a", "open_tickets", &vars(&[("project", "SOC"), ("since", "2020")]));
        assert_ne!(packed, split);

        let in_key = cache_key("tenant_a", "open_tickets", &vars(&[("a=b", "c")]));
        let in_value = cache_key("tenant_a", "open_tickets", &vars(&[("a", "b=c")]));
        assert_ne!(in_key, in_value);
    }

    #[tokio::test]
    async fn lookup_misses_for_a_different_context() {
        let cache = QueryCache::new(100);
        let packed = cache_key("tenant_a", "open_tickets", &vars(&[("project", "SOC&since=2020")]));
        cache.insert(packed, entry(Duration::from_secs(60))).await;

        let split = cache_key("tenant_a", "open_tickets", &vars(&[("project", "SOC"), ("since", "2020")]));
        assert!(cache.get(&split).await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = QueryCache::new(100);
        cache.insert("k".to_string(), entry(Duration::from_millis(50))).await;
        assert!(cache.get("k").await.is_some());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let cache = QueryCache::new(100);
        cache.insert("k".to_string(), entry(Duration::ZERO)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_tenant_and_query() {
        let cache = QueryCache::new(100);
        let mine = cache_key("tenant_a", "sla", &vars(&[("p", "1")]));
        let other_query = cache_key("tenant_a", "sla_breaches", &vars(&[("p", "1")]));
        let other_tenant = cache_key("tenant_b", "sla", &vars(&[("p", "1")]));
        for key in [&mine, &other_query, &other_tenant] {
            cache.insert(key.clone(), entry(Duration::from_secs(60))).await;
        }

        cache.invalidate_query("tenant_a", "sla");
        cache.sync().await;

        assert!(cache.get(&mine).await.is_none());
        assert!(cache.get(&other_query).await.is_some());
        assert!(cache.get(&other_tenant).await.is_some());
    }
}
