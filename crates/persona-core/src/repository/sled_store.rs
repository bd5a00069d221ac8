//! `sled`-backed implementation of every repository trait.
//!
//! One `sled::Tree` per entity holds the JSON-encoded row. A handful of extra
//! trees hold hand-maintained secondary indexes, keyed so that a prefix scan
//! returns a naturally sorted result set (sled trees keep keys in byte-sorted
//! order).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sled::transaction::Transactional;
use uuid::Uuid;

use crate::domain::ids::{PersonaId, ProductId, ResultId, SessionId, UserId};
use crate::domain::{FeedbackResult, FeedbackSession, Persona, Product, User};
use crate::error::CoreError;
use crate::repository::{
    FeedbackQueryRepository, FeedbackResultRepository, FeedbackSessionRepository, PersonaRepository,
    ProductRepository, ResultCounts, UserRepository,
};

const TREE_USERS: &str = "users";
const TREE_USERS_BY_EMAIL: &str = "users_by_email";
const TREE_PRODUCTS: &str = "products";
const TREE_PRODUCTS_BY_OWNER: &str = "products_by_owner";
const TREE_PERSONAS: &str = "personas";
const TREE_PERSONAS_BY_OWNER: &str = "personas_by_owner";
const TREE_PERSONAS_BY_HASH: &str = "personas_by_hash";
const TREE_SESSIONS: &str = "feedback_sessions";
const TREE_RESULTS: &str = "feedback_results";
const TREE_RESULTS_BY_SESSION: &str = "feedback_results_by_session";
const TREE_RESULTS_UNIQ: &str = "feedback_results_uniq";

/// Shared handle to the sled database backing every repository in this crate.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn open_temp() -> Result<Self, CoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db) })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, CoreError> {
        Ok(self.db.open_tree(name)?)
    }

    /// Exposes the underlying handle so callers can open their own trees
    /// (the lock module keeps its `locks` tree in the same database).
    pub fn db(&self) -> Arc<sled::Db> {
        self.db.clone()
    }

    fn put_json<T: serde::Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key, bytes)?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        tree: &sled::Tree,
        key: &[u8],
    ) -> Result<Option<T>, CoreError> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix_ids(tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<Uuid>, CoreError> {
        let mut out = Vec::new();
        for item in tree.scan_prefix(prefix) {
            let (key, _) = item?;
            if let Some(id_str) = key
                .strip_prefix(prefix)
                .and_then(|b| std::str::from_utf8(b).ok())
            {
                if let Ok(id) = Uuid::parse_str(id_str) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl UserRepository for SledStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, CoreError> {
        let tree = self.tree(TREE_USERS)?;
        Self::get_json(&tree, id.to_string().as_bytes())
    }

    async fn put(&self, user: &User) -> Result<(), CoreError> {
        let tree = self.tree(TREE_USERS)?;
        Self::put_json(&tree, user.id.to_string().as_bytes(), user)?;
        let idx = self.tree(TREE_USERS_BY_EMAIL)?;
        idx.insert(user.email.to_lowercase().as_bytes(), user.id.to_string().as_bytes())?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let idx = self.tree(TREE_USERS_BY_EMAIL)?;
        let Some(id_bytes) = idx.get(email.to_lowercase().as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::parse_str(std::str::from_utf8(&id_bytes).unwrap_or_default())
            .map_err(|e| CoreError::Internal(format!("corrupt user email index: {e}")))?;
        self.get(id).await
    }
}

#[async_trait]
impl ProductRepository for SledStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, CoreError> {
        let tree = self.tree(TREE_PRODUCTS)?;
        Self::get_json(&tree, id.to_string().as_bytes())
    }

    async fn put(&self, product: &Product) -> Result<(), CoreError> {
        let tree = self.tree(TREE_PRODUCTS)?;
        Self::put_json(&tree, product.id.to_string().as_bytes(), product)?;
        let idx = self.tree(TREE_PRODUCTS_BY_OWNER)?;
        let key = format!("{}/{}", product.owner_user_id, product.id);
        idx.insert(key.as_bytes(), &[])?;
        Ok(())
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Product>, CoreError> {
        let idx = self.tree(TREE_PRODUCTS_BY_OWNER)?;
        let prefix = format!("{owner}/");
        let ids = Self::scan_prefix_ids(&idx, prefix.as_bytes())?;
        let tree = self.tree(TREE_PRODUCTS)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = Self::get_json::<Product>(&tree, id.to_string().as_bytes())? {
                out.push(p);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl PersonaRepository for SledStore {
    async fn get(&self, id: PersonaId) -> Result<Option<Persona>, CoreError> {
        let tree = self.tree(TREE_PERSONAS)?;
        Self::get_json(&tree, id.to_string().as_bytes())
    }

    async fn put(&self, persona: &Persona) -> Result<(), CoreError> {
        let tree = self.tree(TREE_PERSONAS)?;
        Self::put_json(&tree, persona.id.to_string().as_bytes(), persona)?;

        let by_owner = self.tree(TREE_PERSONAS_BY_OWNER)?;
        by_owner.insert(
            format!("{}/{}", persona.owner_user_id, persona.id).as_bytes(),
            &[],
        )?;

        let by_hash = self.tree(TREE_PERSONAS_BY_HASH)?;
        by_hash.insert(
            format!("{}/{}", persona.characteristics_hash, persona.id).as_bytes(),
            &[],
        )?;
        Ok(())
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Persona>, CoreError> {
        let idx = self.tree(TREE_PERSONAS_BY_OWNER)?;
        let prefix = format!("{owner}/");
        let ids = Self::scan_prefix_ids(&idx, prefix.as_bytes())?;
        let tree = self.tree(TREE_PERSONAS)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = Self::get_json::<Persona>(&tree, id.to_string().as_bytes())? {
                out.push(p);
            }
        }
        Ok(out)
    }

    async fn find_by_characteristics_hash(&self, hash: &str) -> Result<Vec<Persona>, CoreError> {
        let idx = self.tree(TREE_PERSONAS_BY_HASH)?;
        let prefix = format!("{hash}/");
        let ids = Self::scan_prefix_ids(&idx, prefix.as_bytes())?;
        let tree = self.tree(TREE_PERSONAS)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = Self::get_json::<Persona>(&tree, id.to_string().as_bytes())? {
                out.push(p);
            }
        }
        Ok(out)
    }

    async fn try_claim(&self, id: PersonaId, expected_version: u64) -> Result<Option<Persona>, CoreError> {
        let tree = self.tree(TREE_PERSONAS)?;
        let key = id.to_string();
        let Some(current_bytes) = tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let mut persona: Persona = serde_json::from_slice(&current_bytes)?;
        if persona.try_claim_generation(expected_version).is_err() {
            return Ok(None);
        }
        let new_bytes = serde_json::to_vec(&persona)?;
        let swapped = tree.compare_and_swap(
            key.as_bytes(),
            Some(current_bytes.as_ref()),
            Some(new_bytes.as_slice()),
        )?;
        match swapped {
            Ok(()) => Ok(Some(persona)),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl FeedbackSessionRepository for SledStore {
    async fn get(&self, id: SessionId) -> Result<Option<FeedbackSession>, CoreError> {
        let tree = self.tree(TREE_SESSIONS)?;
        Self::get_json(&tree, id.to_string().as_bytes())
    }

    async fn put(&self, session: &FeedbackSession) -> Result<(), CoreError> {
        let tree = self.tree(TREE_SESSIONS)?;
        Self::put_json(&tree, session.id.to_string().as_bytes(), session)
    }
}

#[async_trait]
impl FeedbackResultRepository for SledStore {
    async fn get(&self, id: ResultId) -> Result<Option<FeedbackResult>, CoreError> {
        let tree = self.tree(TREE_RESULTS)?;
        Self::get_json(&tree, id.to_string().as_bytes())
    }

    async fn put(&self, result: &FeedbackResult) -> Result<(), CoreError> {
        let tree = self.tree(TREE_RESULTS)?;
        Self::put_json(&tree, result.id.to_string().as_bytes(), result)
    }

    async fn create_unique(&self, result: &FeedbackResult) -> Result<(), CoreError> {
        let uniq = self.tree(TREE_RESULTS_UNIQ)?;
        let uniq_key = format!(
            "{}/{}/{}",
            result.session_id, result.product_id, result.persona_id
        );
        let swapped = uniq.compare_and_swap(
            uniq_key.as_bytes(),
            None as Option<&[u8]>,
            Some(result.id.to_string().as_bytes()),
        )?;
        if swapped.is_err() {
            return Err(CoreError::Internal(format!(
                "duplicate FeedbackResult for (session, product, persona) = ({}, {}, {})",
                result.session_id, result.product_id, result.persona_id
            )));
        }

        let by_session = self.tree(TREE_RESULTS_BY_SESSION)?;
        let order_key = format!(
            "{}/{:020}/{}",
            result.session_id,
            result.created_at.timestamp_millis().max(0),
            result.id
        );
        by_session.insert(order_key.as_bytes(), result.id.to_string().as_bytes())?;

        self.put(result).await
    }

    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<FeedbackResult>, CoreError> {
        let by_session = self.tree(TREE_RESULTS_BY_SESSION)?;
        let prefix = format!("{session_id}/");
        let mut ids = Vec::new();
        for item in by_session.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            if let Ok(id) = Uuid::parse_str(std::str::from_utf8(&value).unwrap_or_default()) {
                ids.push(id);
            }
        }
        let tree = self.tree(TREE_RESULTS)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = Self::get_json::<FeedbackResult>(&tree, id.to_string().as_bytes())? {
                out.push(r);
            }
        }
        Ok(out)
    }

    async fn page_by_session(
        &self,
        session_id: SessionId,
        page_number: u32,
        page_size: u32,
    ) -> Result<(Vec<FeedbackResult>, u64), CoreError> {
        let all = self.list_by_session(session_id).await?;
        let total = all.len() as u64;
        let start = (page_number as usize).saturating_mul(page_size as usize);
        let end = start.saturating_add(page_size as usize).min(all.len());
        let page = if start >= all.len() {
            Vec::new()
        } else {
            all[start..end].to_vec()
        };
        Ok((page, total))
    }

    async fn counts_for_session(&self, session_id: SessionId) -> Result<ResultCounts, CoreError> {
        let all = self.list_by_session(session_id).await?;
        let mut completed = 0u64;
        let mut failed = 0u64;
        for r in &all {
            match r.status {
                crate::domain::feedback_result::FeedbackResultStatus::Completed => completed += 1,
                crate::domain::feedback_result::FeedbackResultStatus::Failed => failed += 1,
                _ => {}
            }
        }
        Ok(ResultCounts {
            completed,
            failed,
            total: all.len() as u64,
        })
    }
}

#[async_trait]
impl FeedbackQueryRepository for SledStore {
    /// §4.7: the session row and a page of its results, read inside one
    /// `sled` transaction over `TREE_SESSIONS` and `TREE_RESULTS` so a
    /// `TerminationDetector` finalize landing between the two reads can't be
    /// observed half-applied.
    ///
    /// Result ids for a session are assigned once at dispatch time and never
    /// added afterward, so resolving the ordered id list via the
    /// `TREE_RESULTS_BY_SESSION` prefix scan ahead of the transaction is
    /// safe — sled's transactional trees support point `get`/`insert` but not
    /// range scans, so the scan has to happen outside. Only each row's
    /// *contents* can still change concurrently, and the transaction below
    /// pins those reads, together with the session row, to one instant.
    async fn get_session_with_page(
        &self,
        session_id: SessionId,
        page_number: u32,
        page_size: u32,
    ) -> Result<Option<(FeedbackSession, Vec<FeedbackResult>, u64)>, CoreError> {
        let sessions = self.tree(TREE_SESSIONS)?;
        let results = self.tree(TREE_RESULTS)?;
        let by_session = self.tree(TREE_RESULTS_BY_SESSION)?;

        let prefix = format!("{session_id}/");
        let mut ids = Vec::new();
        for item in by_session.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            if let Ok(id) = Uuid::parse_str(std::str::from_utf8(&value).unwrap_or_default()) {
                ids.push(id);
            }
        }

        let outcome: sled::transaction::TransactionResult<_, String> =
            (&sessions, &results).transaction(|(sessions_tx, results_tx)| {
                let Some(session_bytes) = sessions_tx.get(session_id.to_string().as_bytes())? else {
                    return Ok(None);
                };
                let session: FeedbackSession = serde_json::from_slice(&session_bytes).map_err(|e| {
                    sled::transaction::ConflictableTransactionError::Abort(e.to_string())
                })?;

                let mut all = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(bytes) = results_tx.get(id.to_string().as_bytes())? {
                        let result: FeedbackResult = serde_json::from_slice(&bytes).map_err(|e| {
                            sled::transaction::ConflictableTransactionError::Abort(e.to_string())
                        })?;
                        all.push(result);
                    }
                }
                Ok(Some((session, all)))
            });

        let Some((session, all)) = outcome
            .map_err(|e| CoreError::Internal(format!("transactional session read failed: {e}")))?
        else {
            return Ok(None);
        };

        let total = all.len() as u64;
        let start = (page_number as usize).saturating_mul(page_size as usize);
        let end = start.saturating_add(page_size as usize).min(all.len());
        let page = if start >= all.len() {
            Vec::new()
        } else {
            all[start..end].to_vec()
        };

        Ok(Some((session, page, total)))
    }
}
