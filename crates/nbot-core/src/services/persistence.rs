//! Document persistence: JSON documents addressed by `(collection, key)`.
//!
//! Connection strings:
//! - `memory://` keeps documents in process (development, tests)
//! - `file:///path/to/dir` stores `<dir>/<collection>/<key>.json`

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::{domain::RunMode, errors::Error, logging::ScopedLogger, Result};

/// How much of the query traffic gets logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryLogPolicy {
    /// Failures only.
    Quiet,
    /// Every operation at debug level.
    Verbose,
}

impl QueryLogPolicy {
    pub fn for_mode(mode: RunMode) -> Self {
        if mode.is_production() {
            Self::Quiet
        } else {
            Self::Verbose
        }
    }
}

enum Backend {
    Memory(RwLock<HashMap<(String, String), Value>>),
    File(PathBuf),
}

pub struct PersistenceClient {
    backend: Backend,
    policy: QueryLogPolicy,
    log: ScopedLogger,
}

impl PersistenceClient {
    pub async fn connect(url: &str, policy: QueryLogPolicy, log: ScopedLogger) -> Result<Self> {
        let backend = if let Some(rest) = url.strip_prefix("memory://") {
            if !rest.is_empty() {
                return Err(Error::Config(format!(
                    "memory:// takes no path, got `{url}`"
                )));
            }
            Backend::Memory(RwLock::new(HashMap::new()))
        } else if let Some(dir) = url.strip_prefix("file://") {
            if dir.is_empty() {
                return Err(Error::Config("file:// needs a directory".to_string()));
            }
            let dir = PathBuf::from(dir);
            tokio::fs::create_dir_all(&dir).await?;
            Backend::File(dir)
        } else {
            return Err(Error::Config(format!(
                "unsupported DATABASE_URL scheme: `{}`",
                url.split("://").next().unwrap_or(url)
            )));
        };

        let client = Self {
            backend,
            policy,
            log,
        };
        client.log.info(
            "persistence connected",
            Some(json!({ "backend": client.backend_name(), "policy": format!("{policy:?}") })),
        );
        Ok(client)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            Backend::File(_) => "file",
        }
    }

    pub async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        validate(collection, key)?;
        let out = match &self.backend {
            Backend::Memory(docs) => docs
                .read()
                .await
                .get(&(collection.to_string(), key.to_string()))
                .cloned(),
            Backend::File(dir) => {
                let path = doc_path(dir, collection, key);
                match tokio::fs::read_to_string(&path).await {
                    Ok(txt) => Some(serde_json::from_str(&txt)?),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                    Err(e) => return Err(self.failed("get", collection, key, e.into())),
                }
            }
        };
        self.trace("get", collection, key, Some(out.is_some()));
        Ok(out)
    }

    pub async fn put(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
        validate(collection, key)?;
        match &self.backend {
            Backend::Memory(docs) => {
                docs.write()
                    .await
                    .insert((collection.to_string(), key.to_string()), doc);
            }
            Backend::File(dir) => {
                let path = doc_path(dir, collection, key);
                let txt = serde_json::to_string_pretty(&doc)?;
                let write = async {
                    tokio::fs::create_dir_all(dir.join(collection)).await?;
                    // Write then rename so readers never see a partial document.
                    let tmp = path.with_extension("json.tmp");
                    tokio::fs::write(&tmp, txt).await?;
                    tokio::fs::rename(&tmp, &path).await
                };
                write
                    .await
                    .map_err(|e| self.failed("put", collection, key, e.into()))?;
            }
        }
        self.trace("put", collection, key, None);
        Ok(())
    }

    /// Returns whether a document was deleted.
    pub async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        validate(collection, key)?;
        let existed = match &self.backend {
            Backend::Memory(docs) => docs
                .write()
                .await
                .remove(&(collection.to_string(), key.to_string()))
                .is_some(),
            Backend::File(dir) => match tokio::fs::remove_file(doc_path(dir, collection, key)).await
            {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => return Err(self.failed("delete", collection, key, e.into())),
            },
        };
        self.trace("delete", collection, key, Some(existed));
        Ok(existed)
    }

    fn trace(&self, op: &str, collection: &str, key: &str, found: Option<bool>) {
        if self.policy == QueryLogPolicy::Verbose {
            self.log.debug(
                op,
                Some(json!({ "collection": collection, "key": key, "found": found })),
            );
        }
    }

    fn failed(&self, op: &str, collection: &str, key: &str, err: Error) -> Error {
        self.log.error(
            &format!("{op} failed"),
            Some(json!({ "collection": collection, "key": key, "error": err.to_string() })),
        );
        err
    }
}

fn doc_path(dir: &Path, collection: &str, key: &str) -> PathBuf {
    dir.join(collection).join(format!("{key}.json"))
}

fn validate(collection: &str, key: &str) -> Result<()> {
    for (what, s) in [("collection", collection), ("key", key)] {
        let ok = !s.is_empty()
            && s != "."
            && s != ".."
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !ok {
            return Err(Error::External(format!("invalid document {what}: `{s}`")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::logging::Logger;

    fn log() -> ScopedLogger {
        Logger::new(RunMode::Development).with_scope("db")
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("nbot-{name}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn policy_follows_run_mode() {
        assert_eq!(
            QueryLogPolicy::for_mode(RunMode::Production),
            QueryLogPolicy::Quiet
        );
        assert_eq!(
            QueryLogPolicy::for_mode(RunMode::Development),
            QueryLogPolicy::Verbose
        );
    }

    #[tokio::test]
    async fn memory_backend_roundtrip() {
        let db = PersistenceClient::connect("memory://", QueryLogPolicy::Verbose, log())
            .await
            .unwrap();
        assert_eq!(db.backend_name(), "memory");

        assert_eq!(db.get("chats", "1").await.unwrap(), None);
        db.put("chats", "1", json!({ "title": "x" })).await.unwrap();
        assert_eq!(
            db.get("chats", "1").await.unwrap(),
            Some(json!({ "title": "x" }))
        );
        assert!(db.delete("chats", "1").await.unwrap());
        assert!(!db.delete("chats", "1").await.unwrap());
    }

    #[tokio::test]
    async fn file_backend_persists_across_clients() {
        let dir = scratch_dir("persist");
        let url = format!("file://{}", dir.display());

        let db = PersistenceClient::connect(&url, QueryLogPolicy::Quiet, log())
            .await
            .unwrap();
        db.put("chats", "-100", json!({ "kind": "group" }))
            .await
            .unwrap();
        drop(db);

        let db = PersistenceClient::connect(&url, QueryLogPolicy::Quiet, log())
            .await
            .unwrap();
        assert_eq!(
            db.get("chats", "-100").await.unwrap(),
            Some(json!({ "kind": "group" }))
        );
        assert!(dir.join("chats").join("-100.json").exists());
        assert!(db.delete("chats", "-100").await.unwrap());
        assert_eq!(db.get("chats", "-100").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn rejects_unknown_schemes() {
        let err = PersistenceClient::connect("postgres://x", QueryLogPolicy::Quiet, log())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(
            PersistenceClient::connect("memory://db", QueryLogPolicy::Quiet, log())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let db = PersistenceClient::connect("memory://", QueryLogPolicy::Quiet, log())
            .await
            .unwrap();
        assert!(db.put("chats", "../etc", json!(1)).await.is_err());
        assert!(db.get("a/b", "1").await.is_err());
        assert!(db.get("chats", "").await.is_err());
    }
}
