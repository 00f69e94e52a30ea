//! Organizational unit path resolution.
//!
//! Paths are `/`-joined unit names starting at the root name, e.g.
//! `Root/Engineering/Platform`. The id-to-path index is built once per
//! resolver by a breadth-first walk and reused afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::ports::{OrgDirectory, ParentKind, ServiceResult};

/// Path reported when a unit cannot be located.
pub const UNKNOWN_PATH: &str = "unknown";

/// Map from unit id (root included) to its full path.
#[derive(Debug, Clone, Default)]
pub struct OrgUnitIndex {
    root_name: Option<String>,
    paths: HashMap<String, String>,
}

impl OrgUnitIndex {
    /// Path of a root or unit id.
    #[must_use]
    pub fn path(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        self.root_name.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Resolves unit ids and account placements to paths.
pub struct OrgUnitResolver {
    directory: Arc<dyn OrgDirectory>,
    index: RwLock<Option<Arc<OrgUnitIndex>>>,
}

impl OrgUnitResolver {
    pub fn new(directory: Arc<dyn OrgDirectory>) -> Self {
        Self {
            directory,
            index: RwLock::new(None),
        }
    }

    /// The cached index, building it on first use. An empty index (no root)
    /// is returned but not cached.
    pub async fn index(&self) -> ServiceResult<Arc<OrgUnitIndex>> {
        {
            let cached = self.index.read().await;
            if let Some(index) = cached.as_ref() {
                return Ok(Arc::clone(index));
            }
        }

        let mut cached = self.index.write().await;
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(self.build_index().await?);
        if !index.is_empty() {
            *cached = Some(Arc::clone(&index));
        }
        Ok(index)
    }

    /// Drop the cached index so the next lookup rebuilds it.
    pub async fn invalidate(&self) {
        *self.index.write().await = None;
    }

    #[instrument(skip(self))]
    async fn build_index(&self) -> ServiceResult<OrgUnitIndex> {
        let roots = self.directory.list_roots().await?;
        let Some(root) = roots.into_iter().next() else {
            warn!("Organization has no root");
            return Ok(OrgUnitIndex::default());
        };

        let mut paths = HashMap::new();
        paths.insert(root.id.clone(), root.name.clone());

        let mut queue = VecDeque::from([(root.id, root.name.clone())]);
        while let Some((parent_id, parent_path)) = queue.pop_front() {
            for unit in self.directory.list_organizational_units(&parent_id).await? {
                let path = format!("{parent_path}/{}", unit.name);
                paths.insert(unit.id.clone(), path.clone());
                queue.push_back((unit.id, path));
            }
        }

        info!(units = paths.len(), "Built organizational unit index");
        Ok(OrgUnitIndex {
            root_name: Some(root.name),
            paths,
        })
    }

    /// Path of a unit id; [`UNKNOWN_PATH`] when it cannot be found.
    pub async fn resolve(&self, unit_id: &str) -> String {
        match self.index().await {
            Ok(index) => index.path(unit_id).unwrap_or(UNKNOWN_PATH).to_string(),
            Err(e) => {
                warn!(unit_id = %unit_id, error = %e, "Failed to build unit index");
                UNKNOWN_PATH.to_string()
            }
        }
    }

    /// Path of the unit an account lives in.
    ///
    /// Accounts directly under the root resolve to the root name. A failed
    /// parent lookup also falls back to the root name.
    #[instrument(skip(self))]
    pub async fn resolve_for_account(&self, account_id: &str) -> String {
        let index = match self.index().await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Failed to build unit index");
                return UNKNOWN_PATH.to_string();
            }
        };
        let fallback = index.root_name().unwrap_or(UNKNOWN_PATH).to_string();

        match self.directory.list_parents(account_id).await {
            Ok(parents) => match parents.first() {
                None => fallback,
                Some(parent) if parent.kind == ParentKind::Root => {
                    index.path(&parent.id).map_or(fallback, str::to_string)
                }
                Some(parent) => index.path(&parent.id).unwrap_or(UNKNOWN_PATH).to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to look up account parent");
                fallback
            }
        }
    }

    /// Whether `path` names an existing unit, walking from the root and
    /// matching each segment case-insensitively. The first segment is the
    /// root name itself when it matches, so `Root/Eng` and `Eng` both work.
    #[instrument(skip(self))]
    pub async fn path_exists(&self, path: &str) -> bool {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let root = match self.directory.list_roots().await {
            Ok(roots) => match roots.into_iter().next() {
                Some(root) => root,
                None => return false,
            },
            Err(e) => {
                warn!(error = %e, "Failed to list organization roots");
                return false;
            }
        };

        let mut segments = segments.as_slice();
        if let Some((first, rest)) = segments.split_first() {
            if first.to_lowercase() == root.name.to_lowercase() {
                segments = rest;
            }
        }

        let mut current = root.id;
        for segment in segments {
            let wanted = segment.to_lowercase();
            let units = match self.directory.list_organizational_units(&current).await {
                Ok(units) => units,
                Err(e) => {
                    warn!(error = %e, "Failed to list organizational units");
                    return false;
                }
            };
            match units.into_iter().find(|u| u.name.to_lowercase() == wanted) {
                Some(unit) => current = unit.id,
                None => {
                    debug!(segment = %segment, "Unit path segment not found");
                    return false;
                }
            }
        }
        true
    }
}
