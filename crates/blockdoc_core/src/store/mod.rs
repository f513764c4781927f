#![doc = include_str!(concat!(env!("OUT_DIR"), "/store_README.md"))]

mod block;
mod id;
mod memory_storage;
mod storage;

pub use block::BlockNode;
pub use id::{AutoIncrementIdGenerator, IdGenerator, UuidIdGenerator};
pub use memory_storage::MemoryStorage;
pub use storage::{CrdtStorage, UpdateOrigin, UpdateRecord};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Array, Doc, Map, MapRef, Out, ReadTxn, StateVector, Transact, TransactionMut, Update};

use self::block::{
    KEY_CHILDREN, block_ref, has_prop, insert_block, read_block, read_children, read_flavour,
    write_prop,
};
use crate::error::{BlockDocError, Result};
use crate::props::{Props, is_reserved_key};
use crate::schema::{BlockSchema, SchemaRegistry};
use crate::snapshot::{BlockSnapshot, BlockSource};

/// The name of the Y.Map containing every block.
const BLOCKS_MAP_NAME: &str = "blocks";

/// The document name used for storage.
const DEFAULT_DOC_NAME: &str = "page";

/// Options for [`BlockStore::import_snapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Assign fresh ids instead of keeping the snapshot's ids (paste).
    pub regenerate_ids: bool,
}

/// The replicated block document.
///
/// Wraps a yrs [`Doc`]. Every mutation validates structure and schema first,
/// then applies inside a single transaction and appends the resulting update
/// to storage, so a failed call leaves the document untouched.
pub struct BlockStore {
    /// The underlying yrs document
    doc: Doc,

    /// Reference to the blocks map (cached for efficiency)
    blocks: MapRef,

    /// Flavour schemas, read-only after startup
    registry: Arc<SchemaRegistry>,

    /// Storage backend for persistence
    storage: Arc<dyn CrdtStorage>,

    /// Source of ids for `create_node`
    ids: Arc<dyn IdGenerator>,

    /// Document name for storage operations
    doc_name: String,
}

impl BlockStore {
    /// Create a new empty store.
    pub fn new(registry: Arc<SchemaRegistry>, storage: Arc<dyn CrdtStorage>) -> Self {
        Self::with_name(registry, storage, DEFAULT_DOC_NAME.to_string())
    }

    /// Create a new empty store with a custom document name.
    pub fn with_name(
        registry: Arc<SchemaRegistry>,
        storage: Arc<dyn CrdtStorage>,
        doc_name: String,
    ) -> Self {
        let doc = block::new_doc();
        let blocks = doc.get_or_insert_map(BLOCKS_MAP_NAME);

        Self {
            doc,
            blocks,
            registry,
            storage,
            ids: Arc::new(UuidIdGenerator),
            doc_name,
        }
    }

    /// Load a store from storage.
    ///
    /// Applies the saved snapshot (if any) and then every logged update.
    pub fn load(registry: Arc<SchemaRegistry>, storage: Arc<dyn CrdtStorage>) -> Result<Self> {
        Self::load_with_name(registry, storage, DEFAULT_DOC_NAME.to_string())
    }

    /// Load a store with a custom document name from storage.
    pub fn load_with_name(
        registry: Arc<SchemaRegistry>,
        storage: Arc<dyn CrdtStorage>,
        doc_name: String,
    ) -> Result<Self> {
        let doc = block::new_doc();

        {
            let mut txn = doc.transact_mut();

            if let Some(state) = storage.load_state(&doc_name)? {
                let update = Update::decode_v1(&state).map_err(|e| {
                    BlockDocError::Crdt(format!("Failed to decode stored state: {}", e))
                })?;
                txn.apply_update(update)
                    .map_err(|e| BlockDocError::Crdt(format!("Failed to apply snapshot: {}", e)))?;
            }

            for record in storage.updates(&doc_name)? {
                match Update::decode_v1(&record.data) {
                    Ok(update) => {
                        if let Err(e) = txn.apply_update(update) {
                            log::warn!(
                                "Failed to apply stored update {} of {}: {}",
                                record.seq,
                                doc_name,
                                e
                            );
                        }
                    }
                    Err(e) => log::warn!(
                        "Skipping undecodable update {} of {}: {}",
                        record.seq,
                        doc_name,
                        e
                    ),
                }
            }
        }

        let blocks = doc.get_or_insert_map(BLOCKS_MAP_NAME);

        Ok(Self {
            doc,
            blocks,
            registry,
            storage,
            ids: Arc::new(UuidIdGenerator),
            doc_name,
        })
    }

    /// Use a different id generator for `create_node` and imports.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Get the underlying yrs document.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Get the document name used for storage.
    pub fn doc_name(&self) -> &str {
        &self.doc_name
    }

    /// The schema registry this store validates against.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    // ==================== Reads ====================

    /// Read a block.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::NodeNotFound`] if no block has this id.
    pub fn get(&self, id: &str) -> Result<BlockNode> {
        let txn = self.doc.transact();
        block_ref(&txn, &self.blocks, id)
            .and_then(|block| read_block(&txn, id, &block))
            .ok_or_else(|| BlockDocError::NodeNotFound(id.to_string()))
    }

    /// Whether a block with this id exists.
    pub fn has(&self, id: &str) -> bool {
        let txn = self.doc.transact();
        self.blocks.contains_key(&txn, id)
    }

    /// Ordered child ids of a block.
    pub fn children(&self, id: &str) -> Result<Vec<String>> {
        let txn = self.doc.transact();
        let block = block_ref(&txn, &self.blocks, id)
            .ok_or_else(|| BlockDocError::NodeNotFound(id.to_string()))?;
        Ok(read_children(&txn, &block))
    }

    /// The block that lists `id` among its children, if any.
    pub fn parent_of(&self, id: &str) -> Option<String> {
        let txn = self.doc.transact();
        self.find_parent(&txn, id)
    }

    /// Every block id, sorted.
    pub fn ids(&self) -> Vec<String> {
        let txn = self.doc.transact();
        let mut ids: Vec<String> = self.blocks.keys(&txn).map(String::from).collect();
        ids.sort();
        ids
    }

    /// Number of blocks in the document.
    pub fn node_count(&self) -> usize {
        let txn = self.doc.transact();
        self.blocks.len(&txn) as usize
    }

    /// Blocks without a parent, sorted by id.
    pub fn roots(&self) -> Vec<String> {
        let txn = self.doc.transact();
        let referenced: HashSet<String> = self
            .blocks
            .iter(&txn)
            .filter_map(|(_, value)| match value {
                Out::YMap(block) => Some(read_children(&txn, &block)),
                _ => None,
            })
            .flatten()
            .collect();
        let mut roots: Vec<String> = self
            .blocks
            .keys(&txn)
            .filter(|id| !referenced.contains(*id))
            .map(String::from)
            .collect();
        roots.sort();
        roots
    }

    fn find_parent<T: ReadTxn>(&self, txn: &T, id: &str) -> Option<String> {
        self.blocks.iter(txn).find_map(|(parent, value)| match value {
            Out::YMap(block) if read_children(txn, &block).iter().any(|c| c == id) => {
                Some(parent.to_string())
            }
            _ => None,
        })
    }

    fn is_ancestor<T: ReadTxn>(&self, txn: &T, ancestor: &str, id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.find_parent(txn, id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent.clone()) {
                return false;
            }
            current = self.find_parent(txn, &parent);
        }
        false
    }

    // ==================== Mutations ====================

    /// Create a block with a generated id and return the id.
    ///
    /// Explicit props are applied first (reserved keys are ignored), then every
    /// schema default the caller did not supply is filled in. Children that are
    /// attached elsewhere are moved under the new block.
    ///
    /// # Errors
    ///
    /// - [`BlockDocError::InvalidChildReference`] if a child id is unknown
    /// - [`BlockDocError::UnknownFlavour`] if the flavour is not registered
    /// - [`BlockDocError::InvalidProps`] if the resulting props fail validation
    pub fn create_node(&self, flavour: &str, props: Props, children: &[String]) -> Result<String> {
        let id = self.ids.next_id();
        self.create_node_with_id(&id, flavour, props, children)?;
        Ok(id)
    }

    /// Create a block with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Same as [`create_node`](Self::create_node), plus
    /// [`BlockDocError::DuplicateId`] if the id is taken.
    pub fn create_node_with_id(
        &self,
        id: &str,
        flavour: &str,
        props: Props,
        children: &[String],
    ) -> Result<()> {
        {
            let txn = self.doc.transact();
            let mut seen = HashSet::new();
            for child in children {
                if child == id || !seen.insert(child) || !self.blocks.contains_key(&txn, child) {
                    return Err(BlockDocError::InvalidChildReference {
                        parent: id.to_string(),
                        child: child.clone(),
                    });
                }
            }
            if self.blocks.contains_key(&txn, id) {
                return Err(BlockDocError::DuplicateId(id.to_string()));
            }
        }
        let schema = self.registry.lookup(flavour)?;
        let props = sync_props(schema, &Props::new(), &props);
        schema.validate(&props)?;

        log::debug!("Creating block {} ({})", id, flavour);
        self.mutate(|txn| {
            for child in children {
                self.unlink(txn, child);
            }
            let block = insert_block(txn, &self.blocks, id, flavour, children);
            for (key, value) in &props {
                write_prop(txn, &block, key, value);
            }
        })
    }

    /// Overwrite some props of a block in place.
    ///
    /// Same rules as creation: reserved keys are ignored, missing schema
    /// defaults are filled in and the result must validate.
    ///
    /// # Errors
    ///
    /// - [`BlockDocError::NodeNotFound`] if the block does not exist
    /// - [`BlockDocError::InvalidProps`] if the resulting props fail validation
    pub fn update_props(&self, id: &str, partial: Props) -> Result<()> {
        let node = self.get(id)?;
        let schema = self.registry.lookup(&node.flavour)?;
        let props = sync_props(schema, &node.props, &partial);
        schema.validate(&props)?;

        self.mutate(|txn| {
            let Some(block) = block_ref(&*txn, &self.blocks, id) else {
                return;
            };
            for (key, value) in &props {
                let supplied = partial.contains_key(key) && !is_reserved_key(key);
                if supplied || !has_prop(&*txn, &block, key) {
                    write_prop(txn, &block, key, value);
                }
            }
        })
    }

    /// Insert `child` into `parent`'s children at `index` (clamped to the
    /// list length). A child attached elsewhere is moved.
    ///
    /// # Errors
    ///
    /// - [`BlockDocError::NodeNotFound`] if either block does not exist
    /// - [`BlockDocError::InvalidChildReference`] if the move would create a cycle
    pub fn attach(&self, parent: &str, child: &str, index: usize) -> Result<()> {
        {
            let txn = self.doc.transact();
            for id in [parent, child] {
                if !self.blocks.contains_key(&txn, id) {
                    return Err(BlockDocError::NodeNotFound(id.to_string()));
                }
            }
            if parent == child || self.is_ancestor(&txn, child, parent) {
                return Err(BlockDocError::InvalidChildReference {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
        }

        self.mutate(|txn| {
            self.unlink(txn, child);
            if let Some(Out::YArray(list)) = block_ref(&*txn, &self.blocks, parent)
                .and_then(|block| block.get(&*txn, KEY_CHILDREN))
            {
                let index = u32::try_from(index).unwrap_or(u32::MAX).min(list.len(&*txn));
                list.insert(txn, index, child.to_string());
            }
        })
    }

    /// Remove `child` from `parent`'s children. The child stays in the store.
    ///
    /// # Errors
    ///
    /// - [`BlockDocError::NodeNotFound`] if either block does not exist
    /// - [`BlockDocError::InvalidChildReference`] if `child` is not a child of `parent`
    pub fn detach(&self, parent: &str, child: &str) -> Result<()> {
        let siblings = self.children(parent)?;
        if !self.has(child) {
            return Err(BlockDocError::NodeNotFound(child.to_string()));
        }
        let Some(index) = siblings.iter().position(|c| c == child) else {
            return Err(BlockDocError::InvalidChildReference {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        };

        self.mutate(|txn| {
            if let Some(Out::YArray(list)) = block_ref(&*txn, &self.blocks, parent)
                .and_then(|block| block.get(&*txn, KEY_CHILDREN))
            {
                list.remove(txn, index as u32);
            }
        })
    }

    /// Delete a block and its whole subtree, detaching it from its parent.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDocError::NodeNotFound`] if the block does not exist.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        if !self.has(id) {
            return Err(BlockDocError::NodeNotFound(id.to_string()));
        }

        let mut doomed = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(self.children(&current).unwrap_or_default());
            doomed.push(current);
        }

        log::debug!("Deleting block {} ({} blocks)", id, doomed.len());
        self.mutate(|txn| {
            self.unlink(txn, id);
            for block in &doomed {
                self.blocks.remove(txn, block);
            }
        })
    }

    /// Apply a snapshot tree as new blocks, optionally under `parent` at an index.
    ///
    /// The whole tree is validated before anything is written; on failure the
    /// store is unchanged. Returns the id of the imported root.
    ///
    /// # Errors
    ///
    /// - [`BlockDocError::MalformedSnapshot`] if the tree fails validation or
    ///   (when keeping ids) an id already exists in the store
    /// - [`BlockDocError::NodeNotFound`] if `parent` does not exist
    pub fn import_snapshot(
        &self,
        snapshot: &BlockSnapshot,
        parent: Option<(&str, usize)>,
        options: ImportOptions,
    ) -> Result<String> {
        snapshot.validate(&self.registry)?;
        if let Some((parent_id, _)) = parent
            && !self.has(parent_id)
        {
            return Err(BlockDocError::NodeNotFound(parent_id.to_string()));
        }

        let mut plan = Vec::with_capacity(snapshot.node_count());
        let root_id = self.plan_import(snapshot, options, &mut plan)?;

        log::debug!("Importing {} blocks under {:?}", plan.len(), parent);
        self.mutate(|txn| {
            for (id, node, children) in &plan {
                let block = insert_block(txn, &self.blocks, id, &node.flavour, children);
                for (key, value) in &node.props {
                    write_prop(txn, &block, key, value);
                }
            }
            if let Some((parent_id, index)) = parent
                && let Some(Out::YArray(list)) = block_ref(&*txn, &self.blocks, parent_id)
                    .and_then(|block| block.get(&*txn, KEY_CHILDREN))
            {
                let index = u32::try_from(index).unwrap_or(u32::MAX).min(list.len(&*txn));
                list.insert(txn, index, root_id.clone());
            }
        })?;
        Ok(root_id)
    }

    /// Assign ids and resolve props for every node of an import, children first
    /// so parents can reference them.
    fn plan_import<'a>(
        &self,
        node: &'a BlockSnapshot,
        options: ImportOptions,
        plan: &mut Vec<(String, PlannedBlock<'a>, Vec<String>)>,
    ) -> Result<String> {
        let id = if options.regenerate_ids {
            self.ids.next_id()
        } else if self.has(&node.id) {
            return Err(BlockDocError::MalformedSnapshot(format!(
                "block id '{}' already exists",
                node.id
            )));
        } else {
            node.id.clone()
        };

        let children = node
            .children
            .iter()
            .map(|child| self.plan_import(child, options, plan))
            .collect::<Result<Vec<_>>>()?;

        let schema = self.registry.lookup(&node.flavour)?;
        let props = sync_props(schema, &Props::new(), &node.props);
        plan.push((
            id.clone(),
            PlannedBlock {
                flavour: &node.flavour,
                props,
            },
            children,
        ));
        Ok(id)
    }

    /// Remove `child` from whichever block lists it.
    fn unlink(&self, txn: &mut TransactionMut, child: &str) {
        let Some(parent) = self.find_parent(&*txn, child) else {
            return;
        };
        if let Some(Out::YArray(list)) =
            block_ref(&*txn, &self.blocks, &parent).and_then(|block| block.get(&*txn, KEY_CHILDREN))
        {
            let position = list
                .iter(&*txn)
                .position(|out| matches!(out, Out::Any(yrs::Any::String(s)) if &*s == child));
            if let Some(position) = position {
                list.remove(txn, position as u32);
            }
        }
    }

    /// Run a mutation in one transaction and log the resulting update.
    fn mutate<R>(&self, f: impl FnOnce(&mut TransactionMut) -> R) -> Result<R> {
        let sv_before = {
            let txn = self.doc.transact();
            txn.state_vector()
        };

        let out = {
            let mut txn = self.doc.transact_mut();
            f(&mut txn)
        };

        self.record_update(&sv_before)?;
        Ok(out)
    }

    /// Helper to record an update in storage after a mutation.
    fn record_update(&self, sv_before: &StateVector) -> Result<()> {
        let update = {
            let txn = self.doc.transact();
            txn.encode_state_as_update_v1(sv_before)
        };

        if !update.is_empty() {
            self.storage
                .append_update(&self.doc_name, &update, UpdateOrigin::Local)?;
        }
        Ok(())
    }

    // ==================== Sync Operations ====================

    /// Encode the current state vector for sync handshake.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state as an update.
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode only the updates that the remote peer is missing.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| BlockDocError::Crdt(format!("Failed to decode state vector: {}", e)))?;

        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update from a remote peer, then repair structure.
    ///
    /// Concurrent edits can leave a child id pointing at a block another actor
    /// deleted, or a block listed by two parents. Both are repaired right after
    /// the merge. Returns the sequence number of the logged update.
    pub fn apply_update(&self, update: &[u8], origin: UpdateOrigin) -> Result<u64> {
        let decoded = Update::decode_v1(update)
            .map_err(|e| BlockDocError::Crdt(format!("Failed to decode update: {}", e)))?;

        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(decoded)
                .map_err(|e| BlockDocError::Crdt(format!("Failed to apply update: {}", e)))?;
        }

        let seq = self.storage.append_update(&self.doc_name, update, origin)?;
        self.repair_structure()?;
        Ok(seq)
    }

    /// Drop dangling and duplicate child references, then break cycles.
    ///
    /// Parents are visited in id order and the first listing of a child wins.
    /// Concurrent opposite moves can still close a loop; each loop loses the
    /// edge into its smallest id. Both rules depend only on the merged state,
    /// so every replica repairs the same way.
    fn repair_structure(&self) -> Result<usize> {
        let repairs = {
            let txn = self.doc.transact();
            let existing: HashSet<String> = self.blocks.keys(&txn).map(String::from).collect();
            let mut parents: Vec<(String, MapRef)> = self
                .blocks
                .iter(&txn)
                .filter_map(|(id, value)| match value {
                    Out::YMap(block) => Some((id.to_string(), block)),
                    _ => None,
                })
                .collect();
            parents.sort_by(|a, b| a.0.cmp(&b.0));

            let mut claimed = HashSet::new();
            let mut parent_of: HashMap<String, (String, u32)> = HashMap::new();
            let mut doomed: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            let mut refs: HashMap<String, MapRef> = HashMap::new();
            for (parent, block) in parents {
                if read_flavour(&txn, &block).is_none_or(|f| !self.registry.contains(&f)) {
                    log::warn!("Block {} has no registered flavour", parent);
                }
                for (index, child) in read_children(&txn, &block).into_iter().enumerate() {
                    let index = index as u32;
                    if child == parent || !existing.contains(&child) || !claimed.insert(child.clone())
                    {
                        doomed.entry(parent.clone()).or_default().push(index);
                    } else {
                        parent_of.insert(child, (parent.clone(), index));
                    }
                }
                refs.insert(parent, block);
            }

            for (parent, index) in cycle_cuts(&parent_of) {
                log::warn!("Breaking child cycle at block {} after merge", parent);
                doomed.entry(parent).or_default().push(index);
            }

            doomed
                .into_iter()
                .filter_map(|(parent, mut indices)| {
                    indices.sort_unstable();
                    indices.dedup();
                    log::warn!(
                        "Repairing {} child reference(s) of block {} after merge",
                        indices.len(),
                        parent
                    );
                    refs.remove(&parent).map(|block| (block, indices))
                })
                .collect::<Vec<_>>()
        };

        if repairs.is_empty() {
            return Ok(0);
        }
        let count = repairs.iter().map(|(_, doomed)| doomed.len()).sum();
        self.mutate(|txn| {
            for (block, doomed) in &repairs {
                if let Some(Out::YArray(list)) = block.get(&*txn, KEY_CHILDREN) {
                    for index in doomed.iter().rev() {
                        list.remove(txn, *index);
                    }
                }
            }
        })?;
        Ok(count)
    }

    // ==================== Persistence ====================

    /// Save the full state, which compacts the update log.
    pub fn save(&self) -> Result<()> {
        let state = self.encode_state_as_update();
        self.storage.save_state(&self.doc_name, &state)
    }

    /// Updates logged since the last [`save`](Self::save).
    pub fn get_history(&self) -> Result<Vec<UpdateRecord>> {
        self.storage.updates(&self.doc_name)
    }

    // ==================== Observers ====================

    /// Subscribe to document updates.
    ///
    /// The callback receives the binary update whenever the document changes,
    /// ready to be forwarded to peers. Dropping the subscription unsubscribes.
    pub fn observe_updates<F>(&self, callback: F) -> Result<yrs::Subscription>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.doc
            .observe_update_v1(move |_txn, event| {
                callback(&event.update);
            })
            .map_err(|e| BlockDocError::Crdt(format!("Failed to observe updates: {}", e)))
    }
}

/// The `(parent, index)` edges to remove so that following parents from any
/// block ends at a root. Each loop is cut at the edge into its smallest id.
fn cycle_cuts(parent_of: &HashMap<String, (String, u32)>) -> Vec<(String, u32)> {
    let mut starts: Vec<&str> = parent_of.keys().map(String::as_str).collect();
    starts.sort_unstable();

    let mut settled: HashSet<&str> = HashSet::new();
    let mut cuts = Vec::new();
    for start in starts {
        let mut path: Vec<&str> = Vec::new();
        let mut current = start;
        loop {
            if settled.contains(current) {
                break;
            }
            if let Some(pos) = path.iter().position(|id| *id == current) {
                if let Some(smallest) = path[pos..].iter().copied().min()
                    && let Some((parent, index)) = parent_of.get(smallest)
                {
                    cuts.push((parent.clone(), *index));
                }
                break;
            }
            path.push(current);
            match parent_of.get(current) {
                Some((parent, _)) => current = parent.as_str(),
                None => break,
            }
        }
        settled.extend(path);
    }
    cuts
}

impl BlockSource for BlockStore {
    fn block(&self, id: &str) -> Result<BlockNode> {
        self.get(id)
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("doc_name", &self.doc_name)
            .field("node_count", &self.node_count())
            .finish()
    }
}

/// A block of an import, resolved but not yet written.
struct PlannedBlock<'a> {
    flavour: &'a str,
    props: Props,
}

/// Apply explicit props over `current`, skipping reserved keys, then fill
/// every schema default that is still missing.
fn sync_props(schema: &BlockSchema, current: &Props, explicit: &Props) -> Props {
    let mut props = current.clone();
    for (key, value) in explicit {
        if is_reserved_key(key) {
            log::warn!(
                "Ignoring reserved prop '{}' on {}",
                key,
                schema.flavour()
            );
            continue;
        }
        props.insert(key.clone(), value.clone());
    }
    for (key, value) in schema.defaults() {
        props.entry(key).or_insert(value);
    }
    props
}
