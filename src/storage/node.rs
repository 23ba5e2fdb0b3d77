//! Node codec: interprets a raw page buffer as a leaf or internal B+Tree
//! node. All accessors are pure functions over the buffer plus the offset
//! constants below; no interior pointers ever cross this boundary.

use crate::types::{
    INVALID_PAGE_NUM, Key, PAGE_SIZE, PageNumber,
    error::{DatabaseError, Result},
    row::ROW_SIZE,
};

pub type PageBuffer = [u8; PAGE_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            _ => Err(DatabaseError::InvalidNodeType(value)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            NodeType::Internal => 0,
            NodeType::Leaf => 1,
        }
    }
}

/*
 * Common Node Header
 * node_type(1) | is_root(1) | parent_pointer(4)
 */
pub const NODE_TYPE_SIZE: usize = 1;
pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_SIZE: usize = 1;
pub const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const PARENT_POINTER_SIZE: usize = size_of::<PageNumber>();
pub const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

/*
 * Leaf Node Header
 * common header | num_cells(4) | next_leaf(4)
 * Body: sorted (key, serialized row) cells, no gaps.
 */
pub const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NEXT_LEAF_SIZE: usize = size_of::<PageNumber>();
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

pub const LEAF_NODE_KEY_SIZE: usize = size_of::<Key>();
pub const LEAF_NODE_KEY_OFFSET: usize = 0;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_VALUE_OFFSET: usize = LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

// Split point policy: the right half, rounded up, goes to the new leaf.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    LEAF_NODE_MAX_CELLS + 1 - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Minimum occupancy thresholds checked on delete. Falling below them would
// require merging, which is detected but not implemented.
pub const LEAF_NODE_MIN_CELLS: usize = (LEAF_NODE_MAX_CELLS + 1) / 2 - 1;
pub const LEAF_NODE_ROOT_MIN_CELLS: usize = 1;

/*
 * Internal Node Header
 * common header | num_keys(4) | right_child(4)
 * Body: sorted (child page number, key) cells; the key is the max key of
 * that child's subtree. The rightmost subtree hangs off the distinguished
 * right_child pointer, not a cell.
 */
pub const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = size_of::<PageNumber>();
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

pub const INTERNAL_NODE_CHILD_SIZE: usize = size_of::<PageNumber>();
pub const INTERNAL_NODE_KEY_SIZE: usize = size_of::<Key>();
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

// Kept far below what the page could hold so internal splits are exercised
// early; the integration tests assume this value.
pub const INTERNAL_NODE_MAX_CELLS: usize = 3;

fn read_u32(node: &PageBuffer, offset: usize) -> u32 {
    u32::from_le_bytes(
        node[offset..offset + 4]
            .try_into()
            .expect("offset within page"),
    )
}

fn write_u32(node: &mut PageBuffer, offset: usize, value: u32) {
    node[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn node_type(node: &PageBuffer) -> Result<NodeType> {
    NodeType::from_u8(node[NODE_TYPE_OFFSET])
}

pub fn set_node_type(node: &mut PageBuffer, node_type: NodeType) {
    node[NODE_TYPE_OFFSET] = node_type.as_u8();
}

pub fn is_root(node: &PageBuffer) -> bool {
    node[IS_ROOT_OFFSET] != 0
}

pub fn set_root(node: &mut PageBuffer, is_root: bool) {
    node[IS_ROOT_OFFSET] = is_root as u8;
}

pub fn parent(node: &PageBuffer) -> PageNumber {
    read_u32(node, PARENT_POINTER_OFFSET)
}

pub fn set_parent(node: &mut PageBuffer, parent: PageNumber) {
    write_u32(node, PARENT_POINTER_OFFSET, parent);
}

pub fn initialize_leaf(node: &mut PageBuffer) {
    set_node_type(node, NodeType::Leaf);
    set_root(node, false);
    set_leaf_num_cells(node, 0);
    set_leaf_next_leaf(node, 0);
}

pub fn leaf_num_cells(node: &PageBuffer) -> usize {
    read_u32(node, LEAF_NODE_NUM_CELLS_OFFSET) as usize
}

pub fn set_leaf_num_cells(node: &mut PageBuffer, num_cells: usize) {
    write_u32(node, LEAF_NODE_NUM_CELLS_OFFSET, num_cells as u32);
}

/// Page number of the next leaf in key order; 0 means end of the chain.
/// Page 0 is always the root, so no leaf chain can legitimately continue
/// into it.
pub fn leaf_next_leaf(node: &PageBuffer) -> PageNumber {
    read_u32(node, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_next_leaf(node: &mut PageBuffer, next: PageNumber) {
    write_u32(node, LEAF_NODE_NEXT_LEAF_OFFSET, next);
}

pub fn leaf_cell_offset(cell_num: usize) -> usize {
    LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
}

pub fn leaf_key(node: &PageBuffer, cell_num: usize) -> Key {
    read_u32(node, leaf_cell_offset(cell_num))
}

pub fn set_leaf_key(node: &mut PageBuffer, cell_num: usize, key: Key) {
    write_u32(node, leaf_cell_offset(cell_num), key);
}

pub fn leaf_value(node: &PageBuffer, cell_num: usize) -> &[u8] {
    let start = leaf_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
    &node[start..start + LEAF_NODE_VALUE_SIZE]
}

pub fn leaf_value_mut(node: &mut PageBuffer, cell_num: usize) -> &mut [u8] {
    let start = leaf_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
    &mut node[start..start + LEAF_NODE_VALUE_SIZE]
}

/// Copies one whole leaf cell within a node.
pub fn copy_leaf_cell(node: &mut PageBuffer, from: usize, to: usize) {
    let src = leaf_cell_offset(from);
    node.copy_within(src..src + LEAF_NODE_CELL_SIZE, leaf_cell_offset(to));
}

/// Copies a leaf cell out of a snapshot of another (or the same) node.
pub fn copy_leaf_cell_from(node: &mut PageBuffer, source: &PageBuffer, from: usize, to: usize) {
    let src = leaf_cell_offset(from);
    let dst = leaf_cell_offset(to);
    node[dst..dst + LEAF_NODE_CELL_SIZE].copy_from_slice(&source[src..src + LEAF_NODE_CELL_SIZE]);
}

/// Binary search for the first cell whose key is >= `key`; an exact match
/// returns immediately at that index. The result is either the matching
/// slot or the insertion point (possibly one past the last cell).
pub fn leaf_find_slot(node: &PageBuffer, key: Key) -> usize {
    let mut min_index = 0;
    let mut one_past_max_index = leaf_num_cells(node);
    while one_past_max_index != min_index {
        let index = (min_index + one_past_max_index) / 2;
        let key_at_index = leaf_key(node, index);
        if key == key_at_index {
            return index;
        }
        if key < key_at_index {
            one_past_max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

pub fn initialize_internal(node: &mut PageBuffer) {
    set_node_type(node, NodeType::Internal);
    set_root(node, false);
    set_internal_num_keys(node, 0);
    // The right child must start out unassigned, not 0: page 0 is the root,
    // and a zero-initialized right child would make this node its parent.
    write_u32(node, INTERNAL_NODE_RIGHT_CHILD_OFFSET, INVALID_PAGE_NUM);
}

pub fn internal_num_keys(node: &PageBuffer) -> usize {
    read_u32(node, INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
}

pub fn set_internal_num_keys(node: &mut PageBuffer, num_keys: usize) {
    write_u32(node, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys as u32);
}

pub fn internal_right_child(node: &PageBuffer) -> Option<PageNumber> {
    let raw = read_u32(node, INTERNAL_NODE_RIGHT_CHILD_OFFSET);
    if raw == INVALID_PAGE_NUM { None } else { Some(raw) }
}

pub fn set_internal_right_child(node: &mut PageBuffer, child: Option<PageNumber>) {
    write_u32(
        node,
        INTERNAL_NODE_RIGHT_CHILD_OFFSET,
        child.unwrap_or(INVALID_PAGE_NUM),
    );
}

pub fn internal_cell_offset(cell_num: usize) -> usize {
    INTERNAL_NODE_HEADER_SIZE + cell_num * INTERNAL_NODE_CELL_SIZE
}

pub fn internal_key(node: &PageBuffer, key_num: usize) -> Key {
    read_u32(node, internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE)
}

pub fn set_internal_key(node: &mut PageBuffer, key_num: usize, key: Key) {
    write_u32(
        node,
        internal_cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE,
        key,
    );
}

/// Child page number at `child_num` of the node held in page `page`. Slot
/// `num_keys` resolves to the distinguished right child; beyond that is a
/// structural error, as is dereferencing an unassigned pointer.
pub fn internal_child(node: &PageBuffer, page: PageNumber, child_num: usize) -> Result<PageNumber> {
    let num_keys = internal_num_keys(node);
    if child_num > num_keys {
        return Err(DatabaseError::ChildOutOfBounds {
            child: child_num,
            num_keys,
        });
    }
    let raw = if child_num == num_keys {
        read_u32(node, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    } else {
        read_u32(node, internal_cell_offset(child_num))
    };
    if raw == INVALID_PAGE_NUM {
        return Err(DatabaseError::MissingRightChild { page });
    }
    Ok(raw)
}

pub fn set_internal_child(node: &mut PageBuffer, child_num: usize, child: PageNumber) {
    write_u32(node, internal_cell_offset(child_num), child);
}

pub fn copy_internal_cell(node: &mut PageBuffer, from: usize, to: usize) {
    let src = internal_cell_offset(from);
    node.copy_within(src..src + INTERNAL_NODE_CELL_SIZE, internal_cell_offset(to));
}

/// Binary search over cell keys for the first index whose key is >= `key`.
/// Ties and keys greater than every cell key both route to the rightmost
/// child (index == num_keys).
pub fn internal_find_child_slot(node: &PageBuffer, key: Key) -> usize {
    let num_keys = internal_num_keys(node);
    let mut min_index = 0;
    let mut max_index = num_keys;
    while min_index != max_index {
        let index = (min_index + max_index) / 2;
        if internal_key(node, index) >= key {
            max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

/// Replaces the separator key currently routing `old_key` with `new_key`.
/// When `old_key` routed to the rightmost child there is no cell key to
/// rewrite and this is a no-op.
pub fn update_internal_key(node: &mut PageBuffer, old_key: Key, new_key: Key) {
    let old_child_index = internal_find_child_slot(node, old_key);
    if old_child_index < internal_num_keys(node) {
        set_internal_key(node, old_child_index, new_key);
    }
}

/// Key of the node's last cell. For an internal node this ignores the
/// rightmost subtree, whose maximum is not tracked by any cell; the engine
/// fetches it recursively when the true maximum is needed.
pub fn max_key(node: &PageBuffer, page: PageNumber) -> Result<Key> {
    match node_type(node)? {
        NodeType::Leaf => {
            let num_cells = leaf_num_cells(node);
            if num_cells == 0 {
                return Err(DatabaseError::EmptyNode { page });
            }
            Ok(leaf_key(node, num_cells - 1))
        }
        NodeType::Internal => {
            let num_keys = internal_num_keys(node);
            if num_keys == 0 {
                return Err(DatabaseError::EmptyNode { page });
            }
            Ok(internal_key(node, num_keys - 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_layout_constants() {
        assert_eq!(COMMON_NODE_HEADER_SIZE, 6);
        assert_eq!(LEAF_NODE_HEADER_SIZE, 14);
        assert_eq!(LEAF_NODE_CELL_SIZE, 295);
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(
            LEAF_NODE_LEFT_SPLIT_COUNT + LEAF_NODE_RIGHT_SPLIT_COUNT,
            LEAF_NODE_MAX_CELLS + 1
        );
        assert_eq!(INTERNAL_NODE_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_NODE_CELL_SIZE, 8);
    }

    #[test]
    fn leaf_initialization_and_accessors() {
        let mut node = [0u8; PAGE_SIZE];
        initialize_leaf(&mut node);
        assert_eq!(node_type(&node).unwrap(), NodeType::Leaf);
        assert!(!is_root(&node));
        assert_eq!(leaf_num_cells(&node), 0);
        assert_eq!(leaf_next_leaf(&node), 0);

        set_leaf_num_cells(&mut node, 2);
        set_leaf_key(&mut node, 0, 7);
        set_leaf_key(&mut node, 1, 11);
        assert_eq!(leaf_key(&node, 0), 7);
        assert_eq!(leaf_key(&node, 1), 11);
        assert_eq!(max_key(&node, 0).unwrap(), 11);
    }

    #[test]
    fn internal_right_child_starts_unassigned() {
        let mut node = [0u8; PAGE_SIZE];
        initialize_internal(&mut node);
        assert_eq!(internal_right_child(&node), None);
        assert!(internal_child(&node, 5, 0).is_err());

        set_internal_right_child(&mut node, Some(0));
        assert_eq!(internal_right_child(&node), Some(0));
        assert_eq!(internal_child(&node, 5, 0).unwrap(), 0);
    }

    #[test]
    fn leaf_find_slot_returns_insertion_point() {
        let mut node = [0u8; PAGE_SIZE];
        initialize_leaf(&mut node);
        set_leaf_num_cells(&mut node, 3);
        for (i, key) in [10, 20, 30].into_iter().enumerate() {
            set_leaf_key(&mut node, i, key);
        }
        assert_eq!(leaf_find_slot(&node, 10), 0);
        assert_eq!(leaf_find_slot(&node, 20), 1);
        assert_eq!(leaf_find_slot(&node, 15), 1);
        assert_eq!(leaf_find_slot(&node, 5), 0);
        assert_eq!(leaf_find_slot(&node, 31), 3);
    }

    #[test]
    fn internal_find_child_slot_routes_ties_right() {
        let mut node = [0u8; PAGE_SIZE];
        initialize_internal(&mut node);
        set_internal_num_keys(&mut node, 2);
        set_internal_child(&mut node, 0, 1);
        set_internal_key(&mut node, 0, 10);
        set_internal_child(&mut node, 1, 2);
        set_internal_key(&mut node, 1, 20);
        set_internal_right_child(&mut node, Some(3));

        assert_eq!(internal_find_child_slot(&node, 5), 0);
        assert_eq!(internal_find_child_slot(&node, 10), 0);
        assert_eq!(internal_find_child_slot(&node, 15), 1);
        assert_eq!(internal_find_child_slot(&node, 25), 2);
        assert_eq!(internal_child(&node, 5, 2).unwrap(), 3);
    }
}
