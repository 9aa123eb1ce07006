//! SQLite-backed vector store using the `sqlite-vec` extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{ChunkMetadata, EmbeddedChunk, StoredChunk, VectorBackend};
use crate::types::RagError;

const CHUNK_COLUMNS: &str = "c.id, c.source, c.chapter, c.chunk_index, c.start_page, \
     c.end_page, c.chunk_start_page, c.chunk_end_page, c.content";

/// Chunk store persisting to a single SQLite file.
///
/// Chunk rows live in a `chunks` table; their vectors live in a
/// `chunks_embeddings` `vec0` virtual table joined by rowid. The virtual
/// table is created lazily from the first inserted embedding's dimension.
/// All statements run on one background connection, which serializes writes
/// against concurrent reads.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
}

impl SqliteChunkStore {
    /// Opens (or creates) the store at `path` and prepares the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        conn.call(|conn| -> Result<_, tokio_rusqlite::rusqlite::Error> {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                ?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT NOT NULL UNIQUE,
                    source TEXT NOT NULL,
                    chapter TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    start_page INTEGER NOT NULL,
                    end_page INTEGER NOT NULL,
                    chunk_start_page INTEGER NOT NULL,
                    chunk_end_page INTEGER NOT NULL,
                    content TEXT NOT NULL
                )",
                [],
            )
            ?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
                [],
            )
            ?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn })
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Storage)
    }
}

#[async_trait]
impl VectorBackend for SqliteChunkStore {
    async fn insert_chunks(&self, chunks: Vec<EmbeddedChunk>) -> Result<(), RagError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let dims = chunks[0].embedding.len();
        if dims == 0 {
            return Err(RagError::Storage("cannot index an empty embedding".into()));
        }

        let mut rows = Vec::with_capacity(chunks.len());
        for item in chunks {
            let embedding_json = serde_json::to_string(&item.embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((item.chunk, embedding_json));
        }

        self.conn
            .call(move |conn| -> Result<_, tokio_rusqlite::rusqlite::Error> {
                // Created from the first embedding's dimension; a later insert
                // with a different model/dimension fails loudly instead of
                // storing mismatched vectors.
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings \
                         USING vec0(embedding float[{dims}])"
                    ),
                    [],
                )
                ?;

                let tx = conn.transaction()?;
                for (chunk, embedding_json) in rows {
                    tx.execute(
                        "INSERT INTO chunks (id, source, chapter, chunk_index, start_page, \
                         end_page, chunk_start_page, chunk_end_page, content) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        (
                            &chunk.id,
                            &chunk.metadata.source,
                            &chunk.metadata.chapter,
                            chunk.chunk_index as i64,
                            chunk.metadata.start_page as i64,
                            chunk.metadata.end_page as i64,
                            chunk.metadata.chunk_start_page as i64,
                            chunk.metadata.chunk_end_page as i64,
                            &chunk.content,
                        ),
                    )
                    ?;

                    let rowid = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO chunks_embeddings (rowid, embedding) VALUES (?1, ?2)",
                        (rowid, &embedding_json),
                    )
                    ?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| -> Result<_, tokio_rusqlite::rusqlite::Error> {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {CHUNK_COLUMNS}, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                         FROM chunks c \
                         JOIN chunks_embeddings e ON e.rowid = c.rowid \
                         ORDER BY distance ASC \
                         LIMIT {k}"
                    ))
                    ?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let chunk = StoredChunk {
                            id: row.get(0)?,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                            content: row.get(8)?,
                            metadata: ChunkMetadata {
                                source: row.get(1)?,
                                chapter: row.get(2)?,
                                start_page: row.get::<_, i64>(4)? as u32,
                                end_page: row.get::<_, i64>(5)? as u32,
                                chunk_start_page: row.get::<_, i64>(6)? as u32,
                                chunk_end_page: row.get::<_, i64>(7)? as u32,
                            },
                        };
                        let distance: f32 = row.get(9)?;
                        // Cosine distance to similarity: higher is more similar.
                        Ok((chunk, 1.0 - distance))
                    })
                    ?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| -> Result<_, tokio_rusqlite::rusqlite::Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    ?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn chunks_for_source(&self, source: &str) -> Result<Vec<StoredChunk>, RagError> {
        let source = source.to_string();
        self.conn
            .call(move |conn| -> Result<_, tokio_rusqlite::rusqlite::Error> {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {CHUNK_COLUMNS} FROM chunks c \
                         WHERE c.source = ?1 ORDER BY c.rowid"
                    ))
                    ?;

                let rows = stmt
                    .query_map([&source], |row| {
                        Ok(StoredChunk {
                            id: row.get(0)?,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                            content: row.get(8)?,
                            metadata: ChunkMetadata {
                                source: row.get(1)?,
                                chapter: row.get(2)?,
                                start_page: row.get::<_, i64>(4)? as u32,
                                end_page: row.get::<_, i64>(5)? as u32,
                                chunk_start_page: row.get::<_, i64>(6)? as u32,
                                chunk_end_page: row.get::<_, i64>(7)? as u32,
                            },
                        })
                    })
                    ?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_chunk(id: &str, chapter: &str, content: &str) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: StoredChunk {
                id: id.to_string(),
                chunk_index: 0,
                content: content.to_string(),
                metadata: ChunkMetadata {
                    source: "spec.txt".into(),
                    chapter: chapter.into(),
                    start_page: 0,
                    end_page: 4,
                    chunk_start_page: 0,
                    chunk_end_page: 1,
                },
            },
            embedding: vec![0.1, 0.2, 0.3],
        }
    }

    #[tokio::test]
    async fn insert_then_count_and_fetch_by_source() {
        let dir = tempdir().unwrap();
        let store = SqliteChunkStore::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        store
            .insert_chunks(vec![
                sample_chunk("a", "Intro", "first"),
                sample_chunk("b", "Intro", "second"),
            ])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let chunks = store.chunks_for_source("spec.txt").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "a");
        assert_eq!(chunks[0].metadata.chapter, "Intro");
        assert!(store.chunks_for_source("other.txt").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let dir = tempdir().unwrap();
        let store = SqliteChunkStore::open(dir.path().join("index.sqlite"))
            .await
            .unwrap();

        let mut near = sample_chunk("near", "A", "close match");
        near.embedding = vec![1.0, 0.0, 0.0];
        let mut far = sample_chunk("far", "B", "distant");
        far.embedding = vec![0.0, 1.0, 0.0];
        store.insert_chunks(vec![far, near]).await.unwrap();

        let results = store.search_similar(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "near");
        assert!(results[0].1 > results[1].1);
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.sqlite");

        {
            let store = SqliteChunkStore::open(&path).await.unwrap();
            store
                .insert_chunks(vec![sample_chunk("a", "Intro", "persisted")])
                .await
                .unwrap();
        }

        let reopened = SqliteChunkStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let results = reopened.search_similar(&[0.1, 0.2, 0.3], 1).await.unwrap();
        assert_eq!(results[0].0.content, "persisted");
    }
}
