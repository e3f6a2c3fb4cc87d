use crate::error::{MeshError, Result};
use crate::storage::filters::{EdgeFilter, InventoryFilter, StoreStats};
use crate::storage::traits::Store;
use crate::types::{
    AnchorUsage, BlacklistEntry, DomainScore, InventoryPage, LedgerAccount, LinkEdge, LinkId,
    PageId, PairKey, Transaction, UserId,
};
use chrono::{DateTime, Utc};
use redb::{
    Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Table definitions
const PAGES: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("pages");
const ACCOUNTS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("accounts");
const TRANSACTIONS: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("transactions");
const EDGES: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("edges");
const ANCHOR_USAGE: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("anchor_usage");
const DOMAIN_SCORES: TableDefinition<&str, &[u8]> = TableDefinition::new("domain_scores");
const BLACKLIST: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("blacklist");

// Secondary indexes
const PAGES_BY_OWNER: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("pages_by_owner");
const PAGE_BY_OWNER_URL: TableDefinition<(&[u8; 16], &str), &[u8; 16]> =
    TableDefinition::new("page_by_owner_url");
const TXNS_BY_USER: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("txns_by_user");
const EDGES_BY_SOURCE: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("edges_by_source");
const EDGES_BY_TARGET: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("edges_by_target");
const EDGES_BY_PAIR: MultimapTableDefinition<&[u8; 32], &[u8; 16]> =
    MultimapTableDefinition::new("edges_by_pair");
const ANCHORS_BY_USER: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("anchors_by_user");

// Metadata table
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-based storage implementation
pub struct RedbStore {
    db: Arc<Database>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl RedbStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MeshError::Validation(format!("Failed to create directory: {}", e)))?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PAGES)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(EDGES)?;
            let _ = write_txn.open_table(ANCHOR_USAGE)?;
            let _ = write_txn.open_table(DOMAIN_SCORES)?;
            let _ = write_txn.open_table(BLACKLIST)?;
            let _ = write_txn.open_multimap_table(PAGES_BY_OWNER)?;
            let _ = write_txn.open_table(PAGE_BY_OWNER_URL)?;
            let _ = write_txn.open_multimap_table(TXNS_BY_USER)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_SOURCE)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_TARGET)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_PAIR)?;
            let _ = write_txn.open_multimap_table(ANCHORS_BY_USER)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(
                    SCHEMA_VERSION_KEY,
                    CURRENT_SCHEMA_VERSION.to_string().as_bytes(),
                )?;
            }
        }
        write_txn.commit()?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Check schema version. Returns error on mismatch.
    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                        std::str::from_utf8(v.value())
                            .ok()
                            .and_then(|s| s.parse::<u32>().ok())
                    })
                })
                .unwrap_or(CURRENT_SCHEMA_VERSION)
        };

        if version != CURRENT_SCHEMA_VERSION {
            return Err(MeshError::Validation(format!(
                "Database schema v{} does not match this binary's v{}",
                version, CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn uuid_bytes(id: &uuid::Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(MeshError::from)
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(MeshError::from)
    }
}

impl Store for RedbStore {
    fn put_page(&self, page: &InventoryPage) -> Result<()> {
        let bytes = Self::encode(page)?;
        let id_bytes = Self::uuid_bytes(&page.id);
        let owner_bytes = Self::uuid_bytes(&page.owner);

        let write_txn = self.db.begin_write()?;
        {
            let old: Option<InventoryPage> = {
                let table = write_txn.open_table(PAGES)?;
                match table.get(&id_bytes)? {
                    Some(v) => Some(Self::decode(v.value())?),
                    None => None,
                }
            };

            let mut pages = write_txn.open_table(PAGES)?;
            pages.insert(&id_bytes, bytes.as_slice())?;

            let mut by_owner = write_txn.open_multimap_table(PAGES_BY_OWNER)?;
            by_owner.insert(&owner_bytes, &id_bytes)?;

            let mut by_owner_url = write_txn.open_table(PAGE_BY_OWNER_URL)?;
            if let Some(old) = old {
                if old.page_url != page.page_url {
                    by_owner_url
                        .remove((&Self::uuid_bytes(&old.owner), old.page_url.as_str()))?;
                }
            }
            by_owner_url.insert((&owner_bytes, page.page_url.as_str()), &id_bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_page(&self, id: PageId) -> Result<Option<InventoryPage>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAGES)?;
        match table.get(&Self::uuid_bytes(&id))? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn page_by_owner_url(&self, owner: UserId, url: &str) -> Result<Option<InventoryPage>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PAGE_BY_OWNER_URL)?;
        let id_bytes = match index.get((&Self::uuid_bytes(&owner), url))? {
            Some(v) => *v.value(),
            None => return Ok(None),
        };
        let pages = read_txn.open_table(PAGES)?;
        match pages.get(&id_bytes)? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn list_pages(&self, filter: InventoryFilter) -> Result<Vec<InventoryPage>> {
        let read_txn = self.db.begin_read()?;
        let pages = read_txn.open_table(PAGES)?;
        let mut out = Vec::new();

        // Owner filter takes the index fast path.
        if let Some(owner) = filter.owner {
            let by_owner = read_txn.open_multimap_table(PAGES_BY_OWNER)?;
            let mut ids: Vec<[u8; 16]> = Vec::new();
            for id in by_owner.get(&Self::uuid_bytes(&owner))? {
                ids.push(*id?.value());
            }
            ids.sort_unstable();
            for id in ids {
                if let Some(v) = pages.get(&id)? {
                    let page: InventoryPage = Self::decode(v.value())?;
                    if filter.matches(&page) {
                        out.push(page);
                        if filter.limit.map(|l| out.len() >= l).unwrap_or(false) {
                            break;
                        }
                    }
                }
            }
            return Ok(out);
        }

        for entry in pages.iter()? {
            let (_, v) = entry?;
            let page: InventoryPage = Self::decode(v.value())?;
            if filter.matches(&page) {
                out.push(page);
                if filter.limit.map(|l| out.len() >= l).unwrap_or(false) {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn reserve_outbound_slot(&self, id: PageId) -> Result<bool> {
        let id_bytes = Self::uuid_bytes(&id);
        let write_txn = self.db.begin_write()?;
        let reserved = {
            let mut pages = write_txn.open_table(PAGES)?;
            let mut page: InventoryPage = match pages.get(&id_bytes)? {
                Some(v) => Self::decode(v.value())?,
                None => {
                    drop(pages);
                    write_txn.abort()?;
                    return Err(MeshError::PageNotFound(id));
                }
            };
            if page.current_outbound >= page.max_outbound {
                false
            } else {
                page.current_outbound += 1;
                page.updated_at = Utc::now();
                let bytes = Self::encode(&page)?;
                pages.insert(&id_bytes, bytes.as_slice())?;
                true
            }
        };
        if reserved {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(reserved)
    }

    fn release_outbound_slot(&self, id: PageId) -> Result<()> {
        let id_bytes = Self::uuid_bytes(&id);
        let write_txn = self.db.begin_write()?;
        {
            let mut pages = write_txn.open_table(PAGES)?;
            let mut page: InventoryPage = match pages.get(&id_bytes)? {
                Some(v) => Self::decode(v.value())?,
                None => {
                    drop(pages);
                    write_txn.abort()?;
                    return Err(MeshError::PageNotFound(id));
                }
            };
            page.current_outbound = page.current_outbound.saturating_sub(1);
            page.updated_at = Utc::now();
            let bytes = Self::encode(&page)?;
            pages.insert(&id_bytes, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_account(&self, user: UserId) -> Result<Option<LedgerAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(&Self::uuid_bytes(&user))? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn list_accounts(&self) -> Result<Vec<LedgerAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            out.push(Self::decode(v.value())?);
        }
        Ok(out)
    }

    fn commit_ledger(
        &self,
        expected_version: u64,
        account: &LedgerAccount,
        txn: &Transaction,
    ) -> Result<()> {
        let user_bytes = Self::uuid_bytes(&account.user);
        let write_txn = self.db.begin_write()?;
        {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let stored_version = match accounts.get(&user_bytes)? {
                Some(v) => Self::decode::<LedgerAccount>(v.value())?.version,
                None => 0,
            };
            if stored_version != expected_version {
                drop(accounts);
                write_txn.abort()?;
                return Err(MeshError::VersionConflict(account.user));
            }

            let account_bytes = Self::encode(account)?;
            accounts.insert(&user_bytes, account_bytes.as_slice())?;

            let txn_bytes = Self::encode(txn)?;
            let txn_id = Self::uuid_bytes(&txn.id);
            let mut txns = write_txn.open_table(TRANSACTIONS)?;
            txns.insert(&txn_id, txn_bytes.as_slice())?;

            let mut by_user = write_txn.open_multimap_table(TXNS_BY_USER)?;
            by_user.insert(&Self::uuid_bytes(&txn.user), &txn_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn transactions_for(&self, user: UserId) -> Result<Vec<Transaction>> {
        let read_txn = self.db.begin_read()?;
        let by_user = read_txn.open_multimap_table(TXNS_BY_USER)?;
        let mut ids: Vec<[u8; 16]> = Vec::new();
        for id in by_user.get(&Self::uuid_bytes(&user))? {
            ids.push(*id?.value());
        }
        // UUIDv7 byte order is creation order.
        ids.sort_unstable();

        let txns = read_txn.open_table(TRANSACTIONS)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = txns.get(&id)? {
                out.push(Self::decode(v.value())?);
            }
        }
        Ok(out)
    }

    fn put_edge(&self, edge: &LinkEdge) -> Result<()> {
        let bytes = Self::encode(edge)?;
        let id_bytes = Self::uuid_bytes(&edge.id);
        let pair = PairKey::new(edge.source, edge.target);

        let write_txn = self.db.begin_write()?;
        {
            let mut edges = write_txn.open_table(EDGES)?;
            edges.insert(&id_bytes, bytes.as_slice())?;

            // Multimap inserts are idempotent, so updates can re-index.
            let mut by_source = write_txn.open_multimap_table(EDGES_BY_SOURCE)?;
            by_source.insert(&Self::uuid_bytes(&edge.source), &id_bytes)?;

            let mut by_target = write_txn.open_multimap_table(EDGES_BY_TARGET)?;
            by_target.insert(&Self::uuid_bytes(&edge.target), &id_bytes)?;

            let mut by_pair = write_txn.open_multimap_table(EDGES_BY_PAIR)?;
            by_pair.insert(&pair.as_bytes(), &id_bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_edge(&self, id: LinkId) -> Result<Option<LinkEdge>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EDGES)?;
        match table.get(&Self::uuid_bytes(&id))? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn edges_from(&self, user: UserId) -> Result<Vec<LinkEdge>> {
        let read_txn = self.db.begin_read()?;
        let by_source = read_txn.open_multimap_table(EDGES_BY_SOURCE)?;
        let mut ids: Vec<[u8; 16]> = Vec::new();
        for id in by_source.get(&Self::uuid_bytes(&user))? {
            ids.push(*id?.value());
        }
        ids.sort_unstable();
        let edges = read_txn.open_table(EDGES)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = edges.get(&id)? {
                out.push(Self::decode(v.value())?);
            }
        }
        Ok(out)
    }

    fn edges_to(&self, user: UserId) -> Result<Vec<LinkEdge>> {
        let read_txn = self.db.begin_read()?;
        let by_target = read_txn.open_multimap_table(EDGES_BY_TARGET)?;
        let mut ids: Vec<[u8; 16]> = Vec::new();
        for id in by_target.get(&Self::uuid_bytes(&user))? {
            ids.push(*id?.value());
        }
        ids.sort_unstable();
        let edges = read_txn.open_table(EDGES)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = edges.get(&id)? {
                out.push(Self::decode(v.value())?);
            }
        }
        Ok(out)
    }

    fn edges_between(&self, pair: PairKey) -> Result<Vec<LinkEdge>> {
        let read_txn = self.db.begin_read()?;
        let by_pair = read_txn.open_multimap_table(EDGES_BY_PAIR)?;
        let mut ids: Vec<[u8; 16]> = Vec::new();
        for id in by_pair.get(&pair.as_bytes())? {
            ids.push(*id?.value());
        }
        ids.sort_unstable();
        let edges = read_txn.open_table(EDGES)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = edges.get(&id)? {
                out.push(Self::decode(v.value())?);
            }
        }
        Ok(out)
    }

    fn list_edges(&self, filter: EdgeFilter) -> Result<Vec<LinkEdge>> {
        let read_txn = self.db.begin_read()?;
        let edges = read_txn.open_table(EDGES)?;
        let mut out = Vec::new();
        for entry in edges.iter()? {
            let (_, v) = entry?;
            let edge: LinkEdge = Self::decode(v.value())?;
            if filter.matches(&edge) {
                out.push(edge);
                if filter.limit.map(|l| out.len() >= l).unwrap_or(false) {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn append_anchor_usage(&self, usage: &AnchorUsage) -> Result<()> {
        let bytes = Self::encode(usage)?;
        let id_bytes = Self::uuid_bytes(&usage.id);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ANCHOR_USAGE)?;
            table.insert(&id_bytes, bytes.as_slice())?;

            let mut by_user = write_txn.open_multimap_table(ANCHORS_BY_USER)?;
            by_user.insert(&Self::uuid_bytes(&usage.user), &id_bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn anchor_usage_for(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AnchorUsage>> {
        let read_txn = self.db.begin_read()?;
        let by_user = read_txn.open_multimap_table(ANCHORS_BY_USER)?;
        let mut ids: Vec<[u8; 16]> = Vec::new();
        for id in by_user.get(&Self::uuid_bytes(&user))? {
            ids.push(*id?.value());
        }
        ids.sort_unstable();

        let table = read_txn.open_table(ANCHOR_USAGE)?;
        let mut out = Vec::new();
        for id in ids {
            if let Some(v) = table.get(&id)? {
                let usage: AnchorUsage = Self::decode(v.value())?;
                if since.map(|s| usage.created_at >= s).unwrap_or(true) {
                    out.push(usage);
                }
            }
        }
        Ok(out)
    }

    fn put_domain_score(&self, score: &DomainScore) -> Result<()> {
        let bytes = Self::encode(score)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOMAIN_SCORES)?;
            table.insert(score.domain.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_domain_score(&self, domain: &str) -> Result<Option<DomainScore>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOMAIN_SCORES)?;
        match table.get(domain)? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn put_blacklist(&self, entry: &BlacklistEntry) -> Result<()> {
        let bytes = Self::encode(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLACKLIST)?;
            table.insert(&entry.pair.as_bytes(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_blacklist(&self, pair: PairKey) -> Result<Option<BlacklistEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLACKLIST)?;
        match table.get(&pair.as_bytes())? {
            Some(v) => Ok(Some(Self::decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLACKLIST)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            out.push(Self::decode(v.value())?);
        }
        Ok(out)
    }

    fn remove_blacklist(&self, pair: PairKey) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLACKLIST)?;
            table.remove(&pair.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let read_txn = self.db.begin_read()?;
        Ok(StoreStats {
            page_count: read_txn.open_table(PAGES)?.len()?,
            account_count: read_txn.open_table(ACCOUNTS)?.len()?,
            transaction_count: read_txn.open_table(TRANSACTIONS)?.len()?,
            edge_count: read_txn.open_table(EDGES)?.len()?,
            anchor_usage_count: read_txn.open_table(ANCHOR_USAGE)?.len()?,
            domain_score_count: read_txn.open_table(DOMAIN_SCORES)?.len()?,
            blacklist_count: read_txn.open_table(BLACKLIST)?.len()?,
        })
    }
}
