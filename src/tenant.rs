use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::observability::TENANTS_ACTIVE;
use crate::storage::Store;

/// One club network's data: its store and the engine over it.
pub struct Tenant {
    pub engine: Engine,
    pub store: Arc<Store>,
}

/// Lazily opened tenants, keyed by the database name a client connects to.
/// Each tenant has its own log file and compactor task.
pub struct TenantManager {
    tenants: DashMap<String, Arc<Tenant>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

/// Longest file stem a tenant may map to.
const MAX_FILE_STEM_LEN: usize = 200;

/// File stem for a tenant's log. Lowercase ASCII letters, digits, `_` and `-`
/// are kept; every other byte is written as `.XX` hex. Distinct names always
/// map to distinct stems, also on case-insensitive file systems.
fn file_stem(tenant: &str) -> io::Result<String> {
    if tenant.len() > MAX_TENANT_NAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "tenant name too long"));
    }
    if tenant.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty tenant name"));
    }
    let mut stem = String::with_capacity(tenant.len());
    for b in tenant.bytes() {
        if b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-' {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!(".{b:02x}"));
        }
    }
    if stem.len() > MAX_FILE_STEM_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "tenant name too long"));
    }
    Ok(stem)
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            tenants: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    pub fn get_or_create(&self, tenant: &str) -> io::Result<Arc<Tenant>> {
        if let Some(existing) = self.tenants.get(tenant) {
            return Ok(existing.value().clone());
        }
        let stem = file_stem(tenant)?;
        let count = self.tenants.len();

        let opened = match self.tenants.entry(tenant.to_string()) {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(e) => {
                if count >= MAX_TENANTS {
                    return Err(io::Error::other("too many tenants"));
                }
                let path = self.data_dir.join(format!("{stem}.wal"));
                let store = Arc::new(Store::open(&path)?);
                let engine = Engine::with_store(store.clone(), Arc::new(NotifyHub::new()));
                let opened = Arc::new(Tenant { engine, store });
                e.insert(opened.clone());
                opened
            }
        };

        tokio::spawn(compactor::run_compactor(opened.store.clone(), self.compact_threshold));
        metrics::gauge!(TENANTS_ACTIVE).set(self.tenants.len() as f64);
        info!("tenant {tenant:?} opened");
        Ok(opened)
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
