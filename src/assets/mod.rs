//! Per-user binary assets spread across shard stores.
//!
//! Every call routes on the owner's UUID and runs as exactly one transaction
//! on that owner's shard. Asset rows and their large objects are created and
//! destroyed together, so a failure part-way leaves neither behind.

use std::io::{self, Read};
use std::num::NonZeroUsize;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::shard::ShardRouter;
use crate::store::large_object::{self, LargeObjectReader, LargeObjectWriter, Oid};
use crate::store::{TransactionalStore, is_unique_violation};
use crate::types::Asset;

pub struct AssetRepository {
    shards: Vec<TransactionalStore>,
    router: ShardRouter,
}

impl AssetRepository {
    /// Builds a repository over `shards`, whose order fixes the shard index
    /// of each store.
    pub fn new(shards: Vec<TransactionalStore>) -> Result<Self> {
        let factor = NonZeroUsize::new(shards.len())
            .ok_or_else(|| Error::Config("at least one shard store is required".to_string()))?;
        Ok(Self {
            shards,
            router: ShardRouter::new(factor),
        })
    }

    #[must_use]
    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    #[must_use]
    pub fn shards(&self) -> &[TransactionalStore] {
        &self.shards
    }

    fn shard(&self, owner_uuid: &str) -> &TransactionalStore {
        let idx = self.router.shard_for_key(owner_uuid);
        // `new` sizes the router from the shard list, so idx is in range
        &self.shards[idx]
    }

    /// Stores `content` under `(owner_uuid, name)`. Returns the number of
    /// bytes written.
    pub fn create<R: Read>(&self, name: &str, owner_uuid: &str, mut content: R) -> Result<u64> {
        let store = self.shard(owner_uuid);

        let written = store
            .write("create asset", |tx, deadline| {
                let oid = large_object::create(tx)?;

                tx.execute(
                    "INSERT INTO assets (name, owner_uuid, blob_oid) VALUES (?1, ?2, ?3)",
                    params![name, owner_uuid, oid],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        Error::DuplicateAsset {
                            owner: owner_uuid.to_string(),
                            name: name.to_string(),
                        }
                    } else {
                        e.into()
                    }
                })?;

                let mut writer = LargeObjectWriter::open(tx, oid, *deadline)?;
                io::copy(&mut content, &mut writer)?;
                writer.finish()
            })
            .map_err(|e| e.context("create asset", owner_uuid))?;

        if written == 0 {
            warn!(owner = owner_uuid, name, shard = store.name(), "Stored zero-byte asset");
        }
        info!(owner = owner_uuid, name, shard = store.name(), bytes = written, "Created asset");
        Ok(written)
    }

    /// Opens the asset for reading and hands it to `on_ready`.
    ///
    /// The reader borrows the read-only transaction it was opened in, so the
    /// transaction stays open until `on_ready` returns and is released on
    /// every exit path after that.
    pub fn get<T, F>(&self, name: &str, owner_uuid: &str, on_ready: F) -> Result<T>
    where
        F: FnOnce(&mut LargeObjectReader<'_>) -> Result<T>,
    {
        self.shard(owner_uuid)
            .read("get asset", |tx, deadline| {
                let oid = find_oid(tx, owner_uuid, name)?.ok_or_else(|| Error::NotFoundAsset {
                    owner: owner_uuid.to_string(),
                    name: name.to_string(),
                })?;

                let mut reader = LargeObjectReader::open(tx, oid, *deadline)?;
                debug!(owner = owner_uuid, name, bytes = reader.len(), "Streaming asset");
                on_ready(&mut reader)
            })
            .map_err(|e| e.context("get asset", owner_uuid))
    }

    /// Convenience over [`AssetRepository::get`] that buffers the whole asset.
    pub fn read_to_vec(&self, name: &str, owner_uuid: &str) -> Result<Vec<u8>> {
        self.get(name, owner_uuid, |reader| {
            let mut content = Vec::with_capacity(usize::try_from(reader.len()).unwrap_or(0));
            reader.read_to_end(&mut content)?;
            Ok(content)
        })
    }

    pub fn delete(&self, name: &str, owner_uuid: &str) -> Result<()> {
        let store = self.shard(owner_uuid);

        store
            .write("delete asset", |tx, _| {
                let oid = find_oid(tx, owner_uuid, name)?.ok_or_else(|| Error::NotFoundAsset {
                    owner: owner_uuid.to_string(),
                    name: name.to_string(),
                })?;

                // the row references the object, so it goes first
                tx.execute(
                    "DELETE FROM assets WHERE owner_uuid = ?1 AND name = ?2",
                    params![owner_uuid, name],
                )?;
                large_object::unlink(tx, oid)?;
                Ok(())
            })
            .map_err(|e| e.context("delete asset", owner_uuid))?;

        info!(owner = owner_uuid, name, shard = store.name(), "Deleted asset");
        Ok(())
    }

    /// Names of all assets owned by `owner_uuid`, sorted.
    pub fn list(&self, owner_uuid: &str) -> Result<Vec<String>> {
        self.shard(owner_uuid)
            .read("list assets", |tx, _| {
                let mut stmt = tx.prepare("SELECT name FROM assets WHERE owner_uuid = ?1 ORDER BY name")?;
                let names = stmt
                    .query_map(params![owner_uuid], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .map_err(|e| e.context("list assets", owner_uuid))
    }

    pub fn find(&self, name: &str, owner_uuid: &str) -> Result<Option<Asset>> {
        self.shard(owner_uuid)
            .read("find asset", |tx, _| {
                Ok(find_oid(tx, owner_uuid, name)?.map(|blob_oid| Asset {
                    name: name.to_string(),
                    owner_uuid: owner_uuid.to_string(),
                    blob_oid,
                }))
            })
            .map_err(|e| e.context("find asset", owner_uuid))
    }

    /// Pings every shard, failing on the first that does not answer.
    pub fn ping(&self) -> Result<()> {
        for store in &self.shards {
            store.ping().map_err(|e| e.context("ping shard", store.name()))?;
        }
        Ok(())
    }
}

fn find_oid(conn: &Connection, owner_uuid: &str, name: &str) -> Result<Option<Oid>> {
    let oid = conn
        .query_row(
            "SELECT blob_oid FROM assets WHERE owner_uuid = ?1 AND name = ?2",
            params![owner_uuid, name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{SHARD_SCHEMA, StoreOptions};
    use crate::test_support::with_captured_logs;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    fn setup(shards: usize) -> (TempDir, AssetRepository) {
        let temp = TempDir::new().unwrap();
        let stores = (0..shards)
            .map(|i| {
                let store = TransactionalStore::open(
                    format!("shard-{i}"),
                    temp.path().join(format!("shard-{i}.db")),
                    StoreOptions::default(),
                )
                .unwrap();
                store.initialize(SHARD_SCHEMA).unwrap();
                store
            })
            .collect();
        (temp, AssetRepository::new(stores).unwrap())
    }

    fn count_objects(repo: &AssetRepository) -> i64 {
        repo.shards()
            .iter()
            .map(|store| {
                store
                    .read("count", |tx, _| {
                        Ok(tx.query_row("SELECT COUNT(*) FROM large_objects", [], |row| row.get::<_, i64>(0))?)
                    })
                    .unwrap()
            })
            .sum()
    }

    #[test]
    fn test_requires_a_shard() {
        assert!(matches!(AssetRepository::new(Vec::new()), Err(Error::Config(_))));
    }

    #[test]
    fn test_create_get_list_delete() {
        let (_temp, repo) = setup(2);

        assert_eq!(repo.create("b.txt", "owner-1", &b"bravo"[..]).unwrap(), 5);
        repo.create("a.txt", "owner-1", &b"alpha"[..]).unwrap();
        repo.create("a.txt", "owner-2", &b"other"[..]).unwrap();

        assert_eq!(repo.list("owner-1").unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(repo.read_to_vec("a.txt", "owner-1").unwrap(), b"alpha");
        assert_eq!(repo.read_to_vec("a.txt", "owner-2").unwrap(), b"other");

        repo.delete("a.txt", "owner-1").unwrap();
        assert_eq!(repo.list("owner-1").unwrap(), vec!["b.txt"]);
        assert_eq!(
            repo.read_to_vec("a.txt", "owner-1").unwrap_err().kind(),
            ErrorKind::NotFoundAsset
        );
        assert_eq!(count_objects(&repo), 2);
    }

    #[test]
    fn test_asset_lives_on_routed_shard() {
        let (_temp, repo) = setup(4);
        let owner = "9b2d7c1e-0000-4000-8000-000000000001";
        repo.create("x", owner, &b"x"[..]).unwrap();

        let expected = repo.router().shard_for_key(owner);
        for (idx, store) in repo.shards().iter().enumerate() {
            let rows: i64 = store
                .read("count", |tx, _| {
                    Ok(tx.query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?)
                })
                .unwrap();
            assert_eq!(rows, i64::from(idx == expected));
        }
    }

    #[test]
    fn test_duplicate_leaves_original_content_and_no_orphan() {
        let (_temp, repo) = setup(1);
        repo.create("a.txt", "owner", &b"first"[..]).unwrap();

        let err = repo.create("a.txt", "owner", &b"second"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateAsset);
        assert_eq!(repo.read_to_vec("a.txt", "owner").unwrap(), b"first");
        assert_eq!(count_objects(&repo), 1);
    }

    #[test]
    fn test_failed_stream_rolls_back() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"))
            }
        }

        let (_temp, repo) = setup(1);
        let err = repo.create("a.txt", "owner", Broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(repo.list("owner").unwrap().is_empty());
        assert_eq!(count_objects(&repo), 0);
    }

    #[test]
    fn test_get_hands_out_seekable_reader() {
        let (_temp, repo) = setup(1);
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 256) as u8).collect();
        repo.create("big.bin", "owner", data.as_slice()).unwrap();

        let tail = repo
            .get("big.bin", "owner", |reader| {
                assert_eq!(reader.len(), data.len() as u64);
                reader.seek(SeekFrom::Start(10_000))?;
                let mut tail = Vec::new();
                reader.read_to_end(&mut tail)?;
                Ok(tail)
            })
            .unwrap();
        assert_eq!(tail, &data[10_000..]);
    }

    #[test]
    fn test_callback_error_propagates() {
        let (_temp, repo) = setup(1);
        repo.create("a.txt", "owner", &b"data"[..]).unwrap();

        let result: Result<()> = repo.get("a.txt", "owner", |_| Err(Error::Timeout { op: "serve" }));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);

        // the connection went back to the pool
        assert_eq!(repo.read_to_vec("a.txt", "owner").unwrap(), b"data");
    }

    #[test]
    fn test_delete_missing_asset() {
        let (_temp, repo) = setup(2);
        repo.create("keep", "owner", &b"k"[..]).unwrap();

        let err = repo.delete("missing", "owner").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundAsset);
        assert_eq!(repo.list("owner").unwrap(), vec!["keep"]);
    }

    #[test]
    fn test_find_and_ping() {
        let (_temp, repo) = setup(3);
        repo.create("a", "owner", &b""[..]).unwrap();

        let asset = repo.find("a", "owner").unwrap().unwrap();
        assert_eq!(asset.owner_uuid, "owner");
        assert!(repo.find("b", "owner").unwrap().is_none());
        repo.ping().unwrap();
    }

    #[test]
    fn test_zero_byte_asset_is_stored_with_warning() {
        let (_temp, repo) = setup(2);

        let (written, logs) = with_captured_logs(|| repo.create("empty", "owner-1", io::empty()));
        assert_eq!(written.unwrap(), 0);
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("Stored zero-byte asset"), "logs: {logs}");
        assert!(repo.read_to_vec("empty", "owner-1").unwrap().is_empty());

        let (_, logs) = with_captured_logs(|| repo.create("full", "owner-1", &b"data"[..]).unwrap());
        assert!(!logs.contains("zero-byte"), "logs: {logs}");
    }
}
