//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use airdrop_store::MetaStore;

use crate::claim::LmdbClaimStore;
use crate::integrity::{check_integrity, IntegrityReport};
use crate::meta::LmdbMetaStore;
use crate::LmdbError;

/// Current on-disk layout version, stored under the `meta` database.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of named databases the environment creates.
const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    claims_db: Database<Bytes, Bytes>,
    claim_ids_db: Database<Bytes, Bytes>,
    pending_db: Database<Bytes, Bytes>,
    archive_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the service opens each data directory exactly once per process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let claims_db = env.create_database(&mut wtxn, Some("claims"))?;
        let claim_ids_db = env.create_database(&mut wtxn, Some("claim_ids"))?;
        let pending_db = env.create_database(&mut wtxn, Some("pending_claims"))?;
        let archive_db = env.create_database(&mut wtxn, Some("archived_claims"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            claims_db,
            claim_ids_db,
            pending_db,
            archive_db,
            meta_db,
        };

        let meta = environment.meta_store();
        let version = meta
            .get_schema_version()
            .map_err(|e| LmdbError::Heed(e.to_string()))?;
        if version == 0 {
            meta.set_schema_version(SCHEMA_VERSION)
                .map_err(|e| LmdbError::Heed(e.to_string()))?;
            tracing::info!(path = %path.display(), "initialised fresh claim database");
        } else if version != SCHEMA_VERSION {
            return Err(LmdbError::Heed(format!(
                "unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }

        Ok(environment)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn claim_store(&self) -> LmdbClaimStore {
        LmdbClaimStore {
            env: Arc::clone(&self.env),
            claims_db: self.claims_db,
            claim_ids_db: self.claim_ids_db,
            pending_db: self.pending_db,
            archive_db: self.archive_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        check_integrity(&self.env)
    }
}
