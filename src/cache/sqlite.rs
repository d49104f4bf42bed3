use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::{ArtifactCache, ArtifactKey, CacheStats, CachedArtifacts};
use crate::error::{RecipeEngineError, Result};
use crate::features::{DenseMatrix, FlavorMatrix, LatentFactorization, MatrixStats};

/// SQLite-based artifact cache
///
/// One row per (input fingerprint, k). Matrices are stored as
/// little-endian BLOBs, build statistics as JSON:
/// ```sql
/// CREATE TABLE latent_cache (
///     cache_key TEXT PRIMARY KEY,
///     fingerprint TEXT NOT NULL,
///     latent_dims INTEGER NOT NULL,
///     flavor_matrix BLOB NOT NULL,
///     matrix_stats TEXT NOT NULL,
///     latent BLOB NOT NULL,
///     singular_values BLOB NOT NULL,
///     loadings BLOB NOT NULL,
///     hit_count INTEGER DEFAULT 0,
///     cached_at TEXT NOT NULL
/// );
/// ```
pub struct SqliteArtifactCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArtifactCache {
    /// Open (or create) the cache database; `":memory:"` gives a private in-memory cache
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS latent_cache (
                cache_key TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                latent_dims INTEGER NOT NULL,
                flavor_matrix BLOB NOT NULL,
                matrix_stats TEXT NOT NULL,
                latent BLOB NOT NULL,
                singular_values BLOB NOT NULL,
                loadings BLOB NOT NULL,
                hit_count INTEGER DEFAULT 0,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_latent_cached_at ON latent_cache(cached_at)",
            [],
        )?;

        tracing::debug!("Opened artifact cache at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RecipeEngineError::Cache("cache connection lock poisoned".to_string()))
    }
}

/// Fixed-width UTC timestamps so TEXT comparison orders chronologically
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Raw column values of one cache row
struct StoredRow {
    flavor_matrix: Vec<u8>,
    matrix_stats: String,
    latent: Vec<u8>,
    singular_values: Vec<u8>,
    loadings: Vec<u8>,
    hit_count: i32,
    cached_at: String,
}

impl StoredRow {
    fn decode(self, key: &ArtifactKey) -> Result<CachedArtifacts> {
        let stats: MatrixStats = serde_json::from_str(&self.matrix_stats)?;
        let matrix = FlavorMatrix::from_parts(DenseMatrix::from_bytes(&self.flavor_matrix)?, stats);

        let singular_values = DenseMatrix::from_bytes(&self.singular_values)?;
        if singular_values.rows() != 1 {
            return Err(RecipeEngineError::Cache(format!(
                "singular values stored as {:?}, expected a single row",
                singular_values.shape()
            )));
        }
        let factorization = LatentFactorization::from_parts(
            DenseMatrix::from_bytes(&self.latent)?,
            singular_values.row(0).to_vec(),
            DenseMatrix::from_bytes(&self.loadings)?,
        )?;

        if factorization.dimensions() > key.latent_dims {
            return Err(RecipeEngineError::Cache(format!(
                "cached entry has {} dimensions, key allows at most {}",
                factorization.dimensions(),
                key.latent_dims
            )));
        }

        Ok(CachedArtifacts {
            key: key.clone(),
            matrix,
            factorization,
            hit_count: self.hit_count,
            cached_at: parse_timestamp(&self.cached_at).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl ArtifactCache for SqliteArtifactCache {
    async fn get(&self, key: &ArtifactKey) -> Result<Option<CachedArtifacts>> {
        let stored = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT flavor_matrix, matrix_stats, latent, singular_values, loadings, hit_count, cached_at
                 FROM latent_cache
                 WHERE cache_key = ?",
                params![key.as_key()],
                |row| {
                    Ok(StoredRow {
                        flavor_matrix: row.get(0)?,
                        matrix_stats: row.get(1)?,
                        latent: row.get(2)?,
                        singular_values: row.get(3)?,
                        loadings: row.get(4)?,
                        hit_count: row.get(5)?,
                        cached_at: row.get(6)?,
                    })
                },
            )
            .optional()?
        };

        stored.map(|row| row.decode(key)).transpose()
    }

    async fn save(
        &self,
        key: &ArtifactKey,
        matrix: &FlavorMatrix,
        factorization: &LatentFactorization,
    ) -> Result<()> {
        let stats_json = serde_json::to_string(matrix.stats())?;
        let sv = factorization.singular_values();
        let singular_values = DenseMatrix::from_row_major(1, sv.len(), sv.to_vec())?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO latent_cache
                (cache_key, fingerprint, latent_dims, flavor_matrix, matrix_stats,
                 latent, singular_values, loadings, hit_count, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                 COALESCE((SELECT hit_count FROM latent_cache WHERE cache_key = ?1), 0), ?9)",
            params![
                key.as_key(),
                key.fingerprint,
                key.latent_dims as i64,
                matrix.matrix().to_bytes(),
                stats_json,
                factorization.latent().to_bytes(),
                singular_values.to_bytes(),
                factorization.loadings().to_bytes(),
                timestamp(Utc::now()),
            ],
        )?;

        tracing::debug!("Cached latent artifacts under {}", key.as_key());
        Ok(())
    }

    async fn increment_hit(&self, key: &ArtifactKey) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE latent_cache SET hit_count = hit_count + 1 WHERE cache_key = ?",
            params![key.as_key()],
        )?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;

        let (total_entries, total_hits, oldest, newest): (u64, u64, Option<String>, Option<String>) =
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(hit_count), 0), MIN(cached_at), MAX(cached_at)
                 FROM latent_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let avg_hit_count = if total_entries > 0 {
            total_hits as f64 / total_entries as f64
        } else {
            0.0
        };

        Ok(CacheStats {
            total_entries,
            total_hits,
            avg_hit_count,
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
        })
    }

    async fn cleanup(&self, max_age_days: i64) -> Result<u64> {
        let conn = self.lock()?;

        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let deleted = conn.execute(
            "DELETE FROM latent_cache WHERE cached_at < ?",
            params![timestamp(cutoff)],
        )?;

        if deleted > 0 {
            tracing::info!("Removed {} cached builds older than {} days", deleted, max_age_days);
        }
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts() -> (FlavorMatrix, LatentFactorization) {
        let data = vec![2.0, 1.0, 0.0, 0.0, 1.0, 3.0, 1.0, 1.0, 1.0];
        let dense = DenseMatrix::from_row_major(3, 3, data).unwrap();
        let stats = MatrixStats {
            dishes: 3,
            flavors: 3,
            matched_ingredients: 5,
            unmatched_ingredients: 1,
            top_unmatched: vec![("saffron".to_string(), 1)],
            ..MatrixStats::default()
        };
        let factorization = LatentFactorization::fit(&dense, 2).unwrap();
        (FlavorMatrix::from_parts(dense, stats), factorization)
    }

    #[tokio::test]
    async fn test_cache_create() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 0);
        assert!(stats.oldest_entry.is_none());
    }

    #[tokio::test]
    async fn test_cache_save_and_get() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let (matrix, factorization) = artifacts();
        let key = ArtifactKey::new("abc", 2);

        cache.save(&key, &matrix, &factorization).await.unwrap();

        let cached = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(cached.matrix.matrix(), matrix.matrix());
        assert_eq!(cached.matrix.stats(), matrix.stats());
        assert_eq!(cached.factorization, factorization);
        assert_eq!(cached.hit_count, 0);
    }

    #[tokio::test]
    async fn test_cache_miss_on_other_k() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let (matrix, factorization) = artifacts();
        cache
            .save(&ArtifactKey::new("abc", 2), &matrix, &factorization)
            .await
            .unwrap();

        assert!(cache.get(&ArtifactKey::new("abc", 3)).await.unwrap().is_none());
        assert!(cache.get(&ArtifactKey::new("xyz", 2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_increment_hit_survives_resave() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let (matrix, factorization) = artifacts();
        let key = ArtifactKey::new("abc", 2);

        cache.save(&key, &matrix, &factorization).await.unwrap();
        cache.increment_hit(&key).await.unwrap();
        cache.increment_hit(&key).await.unwrap();
        cache.save(&key, &matrix, &factorization).await.unwrap();

        let cached = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(cached.hit_count, 2);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let (matrix, factorization) = artifacts();
        let first = ArtifactKey::new("one", 2);
        let second = ArtifactKey::new("two", 2);

        cache.save(&first, &matrix, &factorization).await.unwrap();
        cache.save(&second, &matrix, &factorization).await.unwrap();

        cache.increment_hit(&first).await.unwrap();
        cache.increment_hit(&first).await.unwrap();
        cache.increment_hit(&second).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_hits, 3);
        assert_eq!(stats.avg_hit_count, 1.5);
        assert!(stats.oldest_entry.is_some());
        assert!(stats.newest_entry.is_some());
    }

    #[tokio::test]
    async fn test_cache_cleanup() {
        let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
        let (matrix, factorization) = artifacts();
        let key = ArtifactKey::new("old", 2);
        cache.save(&key, &matrix, &factorization).await.unwrap();

        assert_eq!(cache.cleanup(30).await.unwrap(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Cleanup entries older than 0 days (should delete all)
        let deleted = cache.cleanup(0).await.unwrap();
        assert_eq!(deleted, 1);

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 0);
    }
}
