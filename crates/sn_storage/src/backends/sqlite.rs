use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sn_core::{
    Article, ArticleStorage, EnrichmentStatus, Error, Result, RunRecord, RunStatus, UpsertOutcome,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        fingerprint TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        published_at TEXT NOT NULL,
        body_excerpt TEXT NOT NULL,
        summary TEXT,
        category TEXT,
        entities TEXT NOT NULL DEFAULT '[]',
        relevance_score INTEGER,
        ingested_at TEXT NOT NULL,
        enriched_at TEXT,
        enrichment_status TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source_id, published_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (enrichment_status, ingested_at)",
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        run_id TEXT PRIMARY KEY,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        status TEXT,
        sources_attempted INTEGER NOT NULL,
        sources_failed INTEGER NOT NULL,
        articles_new INTEGER NOT NULL,
        articles_enrichment_failed INTEGER NOT NULL
    )
    "#,
    // Add future migrations here
];

/// Keeps `IN (...)` lookups under SQLite's bound-parameter limit.
const LOOKUP_CHUNK: usize = 500;

// Fixed-width timestamps so TEXT ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date {:?}: {}", value, e)))
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!(path = %db_path.display(), migrations = MIGRATIONS.len(), "SQLite schema ready");

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    fn article_from_row(row: &SqliteRow) -> Result<Article> {
        let entities: String = row.get("entities");
        let status: String = row.get("enrichment_status");
        let score: Option<i64> = row.get("relevance_score");
        let enriched_at: Option<String> = row.get("enriched_at");

        Ok(Article {
            fingerprint: row.get("fingerprint"),
            source_id: row.get("source_id"),
            url: row.get("url"),
            title: row.get("title"),
            published_at: parse_timestamp(&row.get::<String, _>("published_at"))?,
            body_excerpt: row.get("body_excerpt"),
            summary: row.get("summary"),
            category: row.get("category"),
            entities: serde_json::from_str(&entities)?,
            relevance_score: score.and_then(|s| u8::try_from(s).ok()),
            ingested_at: parse_timestamp(&row.get::<String, _>("ingested_at"))?,
            enriched_at: enriched_at.as_deref().map(parse_timestamp).transpose()?,
            enrichment_status: status.parse()?,
        })
    }

    fn run_from_row(row: &SqliteRow) -> Result<RunRecord> {
        let finished_at: Option<String> = row.get("finished_at");
        let status: Option<String> = row.get("status");
        let status = match status.as_deref() {
            None => None,
            Some("success") => Some(RunStatus::Success),
            Some("partial_failure") => Some(RunStatus::PartialFailure),
            Some("failed") => Some(RunStatus::Failed),
            Some(other) => return Err(Error::Database(format!("Unknown run status: {}", other))),
        };

        Ok(RunRecord {
            run_id: row.get("run_id"),
            started_at: parse_timestamp(&row.get::<String, _>("started_at"))?,
            finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
            status,
            sources_attempted: row.get::<i64, _>("sources_attempted") as usize,
            sources_failed: row.get::<i64, _>("sources_failed") as usize,
            articles_new: row.get::<i64, _>("articles_new") as usize,
            articles_enrichment_failed: row.get::<i64, _>("articles_enrichment_failed") as usize,
        })
    }

    fn articles_from_rows(rows: &[SqliteRow]) -> Result<Vec<Article>> {
        rows.iter().map(Self::article_from_row).collect()
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn existing_fingerprints(&self, fingerprints: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for chunk in fingerprints.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT fingerprint FROM articles WHERE fingerprint IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for fingerprint in chunk {
                query = query.bind(fingerprint);
            }
            let rows = query
                .fetch_all(&*self.pool)
                .await
                .map_err(db_error("Failed to look up fingerprints"))?;
            found.extend(rows.iter().map(|row| row.get::<String, _>("fingerprint")));
        }
        Ok(found)
    }

    async fn upsert_article(&self, article: &Article) -> Result<UpsertOutcome> {
        let entities = serde_json::to_string(&article.entities)?;
        let score = article.relevance_score.map(i64::from);
        let enriched_at = article.enriched_at.as_ref().map(timestamp);
        let status = article.enrichment_status.as_str();

        let inserted = sqlx::query(
            r#"
            INSERT INTO articles
            (fingerprint, source_id, url, title, published_at, body_excerpt, summary,
             category, entities, relevance_score, ingested_at, enriched_at, enrichment_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
        )
        .bind(&article.fingerprint)
        .bind(&article.source_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(timestamp(&article.published_at))
        .bind(&article.body_excerpt)
        .bind(article.summary.as_deref())
        .bind(article.category.as_deref())
        .bind(&entities)
        .bind(score)
        .bind(timestamp(&article.ingested_at))
        .bind(enriched_at.as_deref())
        .bind(status)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to insert article"))?;

        if inserted.rows_affected() == 1 {
            return Ok(UpsertOutcome::Inserted);
        }

        // Only enrichment fields are ever rewritten; the guards mirror
        // `should_overwrite` and skip writes that would change nothing.
        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET summary = ?1, category = ?2, entities = ?3, relevance_score = ?4,
                enriched_at = ?5, enrichment_status = ?6
            WHERE fingerprint = ?7
              AND (enrichment_status != 'enriched' OR ?6 = 'enriched')
              AND NOT (enrichment_status = 'failed' AND ?6 = 'pending')
              AND NOT (enrichment_status = ?6
                       AND summary IS ?1
                       AND category IS ?2
                       AND entities IS ?3
                       AND relevance_score IS ?4)
            "#,
        )
        .bind(article.summary.as_deref())
        .bind(article.category.as_deref())
        .bind(&entities)
        .bind(score)
        .bind(enriched_at.as_deref())
        .bind(status)
        .bind(&article.fingerprint)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to update article"))?;

        Ok(if updated.rows_affected() == 1 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        })
    }

    async fn get_article(&self, fingerprint: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("Failed to get article"))?;
        row.as_ref().map(Self::article_from_row).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            ORDER BY published_at DESC, fingerprint ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to list recent articles"))?;
        Self::articles_from_rows(&rows)
    }

    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE source_id = ?
            ORDER BY published_at DESC, fingerprint ASC
            "#,
        )
        .bind(source_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to get articles by source"))?;
        Self::articles_from_rows(&rows)
    }

    async fn list_by_status(&self, status: EnrichmentStatus, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE enrichment_status = ?
            ORDER BY ingested_at ASC, fingerprint ASC
            LIMIT ?
            "#,
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to list articles by status"))?;
        Self::articles_from_rows(&rows)
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (run_id, started_at, finished_at, status, sources_attempted, sources_failed,
             articles_new, articles_enrichment_failed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(timestamp(&run.started_at))
        .bind(run.finished_at.as_ref().map(timestamp))
        .bind(run.status.map(|s| s.as_str()))
        .bind(run.sources_attempted as i64)
        .bind(run.sources_failed as i64)
        .bind(run.articles_new as i64)
        .bind(run.articles_enrichment_failed as i64)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to record run"))?;
        Ok(())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query("SELECT * FROM runs ORDER BY started_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(db_error("Failed to list runs"))?;
        rows.iter().map(Self::run_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use sn_core::{ArticleDraft, Enrichment, RunSummary};
    use tempfile::tempdir;

    fn article(fingerprint: &str, source: &str, age_days: i64) -> Article {
        let now = Utc::now();
        Article::pending(ArticleDraft {
            fingerprint: fingerprint.to_string(),
            source_id: source.to_string(),
            url: format!("https://{}.example/{}", source, fingerprint),
            title: format!("Article {}", fingerprint),
            published_at: now - ChronoDuration::days(age_days),
            body_excerpt: "excerpt".to_string(),
            ingested_at: now - ChronoDuration::days(age_days),
        })
    }

    fn enrichment() -> Enrichment {
        Enrichment {
            summary: "台灣新創完成募資".to_string(),
            category: "Funding".to_string(),
            entities: vec!["AppWorks".to_string(), "Acme".to_string()],
            relevance_score: Some(8),
        }
    }

    #[tokio::test]
    async fn test_sqlite_upsert_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut a = article("fp1", "appworks", 0);
        a.apply_enrichment(enrichment(), Utc::now());
        assert_eq!(storage.upsert_article(&a).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(storage.upsert_article(&a).await.unwrap(), UpsertOutcome::Unchanged);

        let stored = storage.get_article("fp1").await.unwrap().unwrap();
        assert_eq!(stored.entities, vec!["AppWorks".to_string(), "Acme".to_string()]);
        assert_eq!(stored.relevance_score, Some(8));
        assert_eq!(stored.enrichment_status, EnrichmentStatus::Enriched);
        assert_eq!(stored.published_at.timestamp_micros(), a.published_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_sqlite_failed_then_enriched() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut a = article("fp1", "appworks", 0);
        a.mark_failed();
        assert_eq!(storage.upsert_article(&a).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(storage.upsert_article(&article("fp1", "appworks", 0)).await.unwrap(), UpsertOutcome::Unchanged);

        a.apply_enrichment(enrichment(), Utc::now());
        assert_eq!(storage.upsert_article(&a).await.unwrap(), UpsertOutcome::Updated);

        let mut downgrade = article("fp1", "appworks", 0);
        downgrade.mark_failed();
        assert_eq!(storage.upsert_article(&downgrade).await.unwrap(), UpsertOutcome::Unchanged);

        let stored = storage.get_article("fp1").await.unwrap().unwrap();
        assert_eq!(stored.enrichment_status, EnrichmentStatus::Enriched);
        assert!(stored.enriched_at.is_some());
    }

    #[tokio::test]
    async fn test_sqlite_queries_and_persistence() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        {
            let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
            storage.upsert_article(&article("new", "appworks", 0)).await.unwrap();
            storage.upsert_article(&article("old", "500-global", 3)).await.unwrap();
            let mut failed = article("mid", "appworks", 1);
            failed.mark_failed();
            storage.upsert_article(&failed).await.unwrap();
        }

        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        assert_eq!(storage.get_db_path(), db_path.as_path());

        let existing = storage
            .existing_fingerprints(&["new".to_string(), "old".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(existing.len(), 2);
        assert!(!existing.contains("missing"));
        assert!(storage.existing_fingerprints(&[]).await.unwrap().is_empty());

        let recent = storage.list_recent(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|a| a.fingerprint.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        assert_eq!(storage.get_by_source("appworks").await.unwrap().len(), 2);
        let failed = storage.list_by_status(EnrichmentStatus::Failed, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].fingerprint, "mid");
    }

    #[tokio::test]
    async fn test_sqlite_run_records() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let mut summary = RunSummary::new(Utc::now());
        storage.record_run(&summary.to_record()).await.unwrap();
        let started = storage.list_runs(10).await.unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].status, None);

        summary.sources_attempted = 5;
        summary.sources_failed = 5;
        summary.finish(Utc::now());
        storage.record_run(&summary.to_record()).await.unwrap();

        let runs = storage.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, Some(RunStatus::Failed));
        assert_eq!(runs[0].sources_failed, 5);
    }
}
