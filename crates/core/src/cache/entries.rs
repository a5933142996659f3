//! Cached entry storage and lookup.
//!
//! Entries are keyed by `(generation, request key)`. Storing an entry for a
//! key that already exists replaces it, so a lookup always returns the most
//! recently stored snapshot.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::http::{CachedRequest, CachedResponse, VaryRecord};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Transaction};

/// Row shape handed to the connection thread.
struct EntryRow {
    key: String,
    method: String,
    url: String,
    vary_json: Option<String>,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &CachedRequest, response: &CachedResponse) -> Result<Self, Error> {
        let vary_json = VaryRecord::capture(request, response)
            .map(|v| serde_json::to_string(&v))
            .transpose()?;

        Ok(Self {
            key: compute_entry_key(&request.method, &request.url),
            method: request.method.clone(),
            url: request.url.clone(),
            vary_json,
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

fn upsert(tx: &Transaction<'_>, generation: &str, row: &EntryRow, stored_at: &str) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO entries (generation, key, method, url, vary_json, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(generation, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            vary_json = excluded.vary_json,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            &row.key,
            &row.method,
            &row.url,
            &row.vary_json,
            row.status,
            &row.headers_json,
            &row.body,
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store one response under the request's key in `generation`.
    ///
    /// The generation is created if it does not exist yet.
    pub async fn put_entry(
        &self, generation: &str, request: &CachedRequest, response: &CachedResponse,
    ) -> Result<(), Error> {
        self.put_entries(generation, &[(request.clone(), response.clone())])
            .await
    }

    /// Store a batch of responses in one transaction: either all rows land
    /// or none do.
    pub async fn put_entries(
        &self, generation: &str, entries: &[(CachedRequest, CachedResponse)],
    ) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let generation = generation.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![&generation, &stored_at],
                )?;
                for row in &rows {
                    upsert(&tx, &generation, row, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the snapshot stored for `request` in `generation`.
    ///
    /// Returns `None` for non-`GET` requests, unknown keys, and entries whose
    /// recorded `Vary` headers do not match the request.
    pub async fn match_entry(
        &self, generation: &str, request: &CachedRequest,
    ) -> Result<Option<CachedResponse>, Error> {
        if !request.is_cacheable() {
            return Ok(None);
        }

        let key = compute_entry_key(&request.method, &request.url);
        let generation = generation.to_string();

        let row = self
            .conn
            .call(move |conn| -> Result<Option<(Option<String>, u16, String, Vec<u8>)>, Error> {
                let row = conn
                    .query_row(
                        "SELECT vary_json, status, headers_json, body FROM entries WHERE generation = ?1 AND key = ?2",
                        params![generation, key],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        let Some((vary_json, status, headers_json, body)) = row else {
            return Ok(None);
        };

        if let Some(vary_json) = vary_json {
            let vary: VaryRecord = serde_json::from_str(&vary_json)?;
            if !vary.matches(request) {
                tracing::debug!(url = %request.url, "cached entry does not match request vary headers");
                return Ok(None);
            }
        }

        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
        Ok(Some(CachedResponse { status, headers, body: Bytes::from(body) }))
    }

    /// Number of entries in `generation`.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in `generation`, sorted.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(body: &str) -> CachedResponse {
        CachedResponse::new(200, body.to_string()).with_header("content-type", "text/html")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CachedRequest::get("https://app.test/index.html");
        db.put_entry("v1", &request, &html("<h1>hi</h1>")).await.unwrap();

        let hit = db.match_entry("v1", &request).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, Bytes::from_static(b"<h1>hi</h1>"));
        assert_eq!(hit.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db
            .match_entry("v1", &CachedRequest::get("https://app.test/nope"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_snapshot() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CachedRequest::get("https://app.test/script.js");
        db.put_entry("v1", &request, &html("old")).await.unwrap();
        db.put_entry("v1", &request, &html("new")).await.unwrap();

        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
        let hit = db.match_entry("v1", &request).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CachedRequest::get("https://app.test/style.css");
        db.put_entry("v1", &request, &html("v1 css")).await.unwrap();

        assert!(db.match_entry("v2", &request).await.unwrap().is_none());
        assert_eq!(db.entry_urls("v1").await.unwrap(), vec!["https://app.test/style.css".to_string()]);
    }

    #[tokio::test]
    async fn test_non_get_never_matches() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let post = CachedRequest::new("POST", "https://app.test/predict");
        assert!(db.match_entry("v1", &post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vary_mismatch_misses() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let en = CachedRequest::get("https://app.test/").with_header("accept-language", "en");
        let response = html("hello").with_header("vary", "Accept-Language");
        db.put_entry("v1", &en, &response).await.unwrap();

        assert!(db.match_entry("v1", &en).await.unwrap().is_some());
        let fr = CachedRequest::get("https://app.test/").with_header("accept-language", "fr");
        assert!(db.match_entry("v1", &fr).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_entries_batch() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let batch = vec![
            (CachedRequest::get("https://app.test/"), html("root")),
            (CachedRequest::get("https://app.test/index.html"), html("index")),
        ];
        db.put_entries("v1", &batch).await.unwrap();

        assert!(db.has_generation("v1").await.unwrap());
        assert_eq!(db.entry_count("v1").await.unwrap(), 2);
    }
}
