//! B+Tree engine: recursive descent search, leaf insertion with
//! overflow-driven splitting, internal-node insertion and splitting, and
//! root promotion. All functions reference pages by number through the
//! pager; every page borrow is scoped to a single step so no two live
//! borrows alias the same buffer.

use std::fmt;

use log::debug;

use crate::{
    storage::{node, node::NodeType, pager::Pager},
    types::{
        Key, PageNumber,
        error::{DatabaseError, Result},
        row::{ROW_SIZE, Row},
    },
};

/// A position in the tree: a page plus a slot within it. Denotes either an
/// existing cell (`cell_num < num_cells`) or a valid insertion point. A
/// cursor does not own any buffer, so it is invalidated by any structural
/// mutation of the page it points into.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub page_num: PageNumber,
    pub cell_num: usize,
    pub end_of_table: bool,
}

/// Returns the position of `key`, or the position where it should be
/// inserted.
pub fn find(pager: &mut Pager, root_page_num: PageNumber, key: Key) -> Result<Cursor> {
    let root = pager.page(root_page_num)?;
    match node::node_type(root)? {
        NodeType::Leaf => leaf_find(pager, root_page_num, key),
        NodeType::Internal => internal_find(pager, root_page_num, key),
    }
}

fn leaf_find(pager: &mut Pager, page_num: PageNumber, key: Key) -> Result<Cursor> {
    let node = pager.page(page_num)?;
    Ok(Cursor {
        page_num,
        cell_num: node::leaf_find_slot(node, key),
        end_of_table: false,
    })
}

fn internal_find(pager: &mut Pager, page_num: PageNumber, key: Key) -> Result<Cursor> {
    let node = pager.page(page_num)?;
    let child_index = node::internal_find_child_slot(node, key);
    let child_num = node::internal_child(node, page_num, child_index)?;
    let child = pager.page(child_num)?;
    match node::node_type(child)? {
        NodeType::Leaf => leaf_find(pager, child_num, key),
        NodeType::Internal => internal_find(pager, child_num, key),
    }
}

/// True maximum key reachable under `page_num`. The codec-level `max_key`
/// only sees a node's last cell; an internal node's real maximum lives in
/// the subtree behind its rightmost child and has to be chased down here.
pub fn max_key_through(pager: &mut Pager, page_num: PageNumber) -> Result<Key> {
    let node = pager.page(page_num)?;
    match node::node_type(node)? {
        NodeType::Leaf => node::max_key(node, page_num),
        NodeType::Internal => match node::internal_right_child(node) {
            Some(right_child) => max_key_through(pager, right_child),
            // Mid-split an internal node temporarily has no right child;
            // its last cell key is then the maximum it knows about.
            None => node::max_key(node, page_num),
        },
    }
}

/// Inserts `(key, row)` at the cursor's slot, splitting the leaf when full.
pub fn leaf_insert(
    pager: &mut Pager,
    root_page_num: PageNumber,
    cursor: Cursor,
    key: Key,
    row: &Row,
) -> Result<()> {
    let num_cells = node::leaf_num_cells(pager.page(cursor.page_num)?);
    if num_cells >= node::LEAF_NODE_MAX_CELLS {
        return leaf_split_and_insert(pager, root_page_num, cursor, key, row);
    }

    let leaf = pager.page_mut(cursor.page_num)?;
    if cursor.cell_num < num_cells {
        // Make room for the new cell
        for i in (cursor.cell_num + 1..=num_cells).rev() {
            node::copy_leaf_cell(leaf, i - 1, i);
        }
    }
    node::set_leaf_num_cells(leaf, num_cells + 1);
    node::set_leaf_key(leaf, cursor.cell_num, key);
    row.serialize_into(node::leaf_value_mut(leaf, cursor.cell_num));
    Ok(())
}

/// Fresh pages the split cascade starting at `page_num` will allocate: one
/// sibling per node that overflows up the parent chain, plus one left child
/// when the cascade reaches the root and promotes a new one.
fn split_pages_needed(pager: &mut Pager, page_num: PageNumber) -> Result<u32> {
    let mut needed = 1;
    let mut page_num = page_num;
    loop {
        let node = pager.page(page_num)?;
        if node::is_root(node) {
            return Ok(needed + 1);
        }
        let parent_page_num = node::parent(node);
        let parent = pager.page(parent_page_num)?;
        if node::internal_num_keys(parent) < node::INTERNAL_NODE_MAX_CELLS {
            return Ok(needed);
        }
        needed += 1;
        page_num = parent_page_num;
    }
}

/// Splits a full leaf: allocates a new right sibling, links it into the
/// leaf chain, and redistributes all existing cells plus the new one evenly
/// (right half rounded up goes to the new leaf). The split then either
/// promotes a new root or propagates into the parent.
fn leaf_split_and_insert(
    pager: &mut Pager,
    root_page_num: PageNumber,
    cursor: Cursor,
    key: Key,
    row: &Row,
) -> Result<()> {
    let old_page_num = cursor.page_num;
    // Every page the whole cascade will allocate must fit under the limit
    // before anything is written; a refused insert leaves the tree as it
    // was.
    let needed = split_pages_needed(pager, old_page_num)?;
    pager.reserve(needed)?;
    let old_max = max_key_through(pager, old_page_num)?;
    let new_page_num = pager.unused_page_num()?;
    debug!("splitting leaf {old_page_num}, new leaf {new_page_num}");

    // Snapshot the overflowing leaf; the redistribution below overwrites
    // its cells while still reading the pre-split positions.
    let old_image = *pager.page(old_page_num)?;

    {
        let new_leaf = pager.page_mut(new_page_num)?;
        node::initialize_leaf(new_leaf);
        node::set_parent(new_leaf, node::parent(&old_image));
        node::set_leaf_next_leaf(new_leaf, node::leaf_next_leaf(&old_image));
    }
    {
        let old_leaf = pager.page_mut(old_page_num)?;
        node::set_leaf_next_leaf(old_leaf, new_page_num);
    }

    // Every existing cell plus the new one, highest index first, moves to
    // its post-split node and slot.
    for i in (0..=node::LEAF_NODE_MAX_CELLS).rev() {
        let destination_page = if i >= node::LEAF_NODE_LEFT_SPLIT_COUNT {
            new_page_num
        } else {
            old_page_num
        };
        let index_within_node = i % node::LEAF_NODE_LEFT_SPLIT_COUNT;
        let destination = pager.page_mut(destination_page)?;
        if i == cursor.cell_num {
            node::set_leaf_key(destination, index_within_node, key);
            row.serialize_into(node::leaf_value_mut(destination, index_within_node));
        } else if i > cursor.cell_num {
            node::copy_leaf_cell_from(destination, &old_image, i - 1, index_within_node);
        } else {
            node::copy_leaf_cell_from(destination, &old_image, i, index_within_node);
        }
    }

    node::set_leaf_num_cells(pager.page_mut(old_page_num)?, node::LEAF_NODE_LEFT_SPLIT_COUNT);
    node::set_leaf_num_cells(pager.page_mut(new_page_num)?, node::LEAF_NODE_RIGHT_SPLIT_COUNT);

    if node::is_root(&old_image) {
        create_new_root(pager, root_page_num, new_page_num)
    } else {
        let parent_page_num = node::parent(&old_image);
        let new_max = max_key_through(pager, old_page_num)?;
        let parent = pager.page_mut(parent_page_num)?;
        node::update_internal_key(parent, old_max, new_max);
        internal_insert(pager, root_page_num, parent_page_num, new_page_num)
    }
}

/// Grows the tree one level: the current root's page image moves to a
/// freshly allocated left child, and the root page is reinitialized in
/// place as an internal node over the two children. The root's page number
/// never changes.
fn create_new_root(
    pager: &mut Pager,
    root_page_num: PageNumber,
    right_child_page_num: PageNumber,
) -> Result<()> {
    let root_image = *pager.page(root_page_num)?;
    let root_was_internal = node::node_type(&root_image)? == NodeType::Internal;
    if root_was_internal {
        // An internal root split hands us the right child as a raw page;
        // both halves of the old root must come up as internal nodes.
        node::initialize_internal(pager.page_mut(right_child_page_num)?);
    } else {
        // The right child must be registered with the pager before the
        // left child is allocated, or the two would share a page number.
        pager.page(right_child_page_num)?;
    }
    let left_child_page_num = pager.unused_page_num()?;
    debug!("promoting new root over left {left_child_page_num}, right {right_child_page_num}");
    {
        let left_child = pager.page_mut(left_child_page_num)?;
        *left_child = root_image;
        node::set_root(left_child, false);
        node::set_parent(left_child, root_page_num);
    }
    if root_was_internal {
        // The moved root image's children still point at the root page;
        // re-target them at the left child.
        let num_keys = node::internal_num_keys(&root_image);
        for i in 0..=num_keys {
            let child = node::internal_child(&root_image, left_child_page_num, i)?;
            node::set_parent(pager.page_mut(child)?, left_child_page_num);
        }
    }
    let left_child_max_key = max_key_through(pager, left_child_page_num)?;
    {
        let root = pager.page_mut(root_page_num)?;
        node::initialize_internal(root);
        node::set_root(root, true);
        node::set_internal_num_keys(root, 1);
        node::set_internal_child(root, 0, left_child_page_num);
        node::set_internal_key(root, 0, left_child_max_key);
        node::set_internal_right_child(root, Some(right_child_page_num));
    }
    node::set_parent(pager.page_mut(right_child_page_num)?, root_page_num);
    Ok(())
}

/// Adds a new child/key pair to `parent_page_num` for `child_page_num`,
/// keeping the invariant that the distinguished right child always holds
/// the maximum subtree.
fn internal_insert(
    pager: &mut Pager,
    root_page_num: PageNumber,
    parent_page_num: PageNumber,
    child_page_num: PageNumber,
) -> Result<()> {
    let child_max_key = max_key_through(pager, child_page_num)?;
    let parent = pager.page(parent_page_num)?;
    let index = node::internal_find_child_slot(parent, child_max_key);
    let original_num_keys = node::internal_num_keys(parent);
    if original_num_keys >= node::INTERNAL_NODE_MAX_CELLS {
        return internal_split_and_insert(pager, root_page_num, parent_page_num, child_page_num);
    }

    let Some(right_child_page_num) = node::internal_right_child(parent) else {
        // An internal node without a right child is empty; the new child
        // becomes the right child.
        let parent = pager.page_mut(parent_page_num)?;
        node::set_internal_right_child(parent, Some(child_page_num));
        return Ok(());
    };

    let right_child_max_key = max_key_through(pager, right_child_page_num)?;
    let parent = pager.page_mut(parent_page_num)?;
    node::set_internal_num_keys(parent, original_num_keys + 1);
    if child_max_key > right_child_max_key {
        // Demote the old right child into the cell array and promote the
        // new child to rightmost.
        node::set_internal_child(parent, original_num_keys, right_child_page_num);
        node::set_internal_key(parent, original_num_keys, right_child_max_key);
        node::set_internal_right_child(parent, Some(child_page_num));
    } else {
        // Make room for the new cell
        for i in (index + 1..=original_num_keys).rev() {
            node::copy_internal_cell(parent, i - 1, i);
        }
        node::set_internal_child(parent, index, child_page_num);
        node::set_internal_key(parent, index, child_max_key);
    }
    Ok(())
}

/// Splits a full internal node: the old node's right child and its top half
/// of cells move to a new sibling (fixing each moved child's parent link),
/// the new child lands in whichever half now covers its key range, and the
/// split recurses upward through the same promote-or-insert logic as leaf
/// splits.
fn internal_split_and_insert(
    pager: &mut Pager,
    root_page_num: PageNumber,
    parent_page_num: PageNumber,
    child_page_num: PageNumber,
) -> Result<()> {
    let mut old_page_num = parent_page_num;
    let old_max = max_key_through(pager, old_page_num)?;
    let child_max = max_key_through(pager, child_page_num)?;
    let new_page_num = pager.unused_page_num()?;
    debug!("splitting internal node {old_page_num}, new node {new_page_num}");

    // When the split node is the root, promotion happens first and the new
    // sibling is inserted while building the new root; otherwise the
    // sibling must be inserted into the existing parent afterwards, which
    // only works because that parent already has keys to position against.
    let splitting_root = node::is_root(pager.page(old_page_num)?);

    let grandparent_page_num;
    if splitting_root {
        create_new_root(pager, root_page_num, new_page_num)?;
        grandparent_page_num = root_page_num;
        // The node being split is now the new root's left child.
        let root = pager.page(root_page_num)?;
        old_page_num = node::internal_child(root, root_page_num, 0)?;
    } else {
        grandparent_page_num = node::parent(pager.page(old_page_num)?);
        let new_node = pager.page_mut(new_page_num)?;
        node::initialize_internal(new_node);
    }

    // First move the old node's right child over and leave the old node
    // temporarily without one.
    let old_node = pager.page(old_page_num)?;
    let cur_page_num = node::internal_right_child(old_node)
        .ok_or(DatabaseError::MissingRightChild { page: old_page_num })?;
    internal_insert(pager, root_page_num, new_page_num, cur_page_num)?;
    node::set_parent(pager.page_mut(cur_page_num)?, new_page_num);
    node::set_internal_right_child(pager.page_mut(old_page_num)?, None);

    // Move cells above the middle key to the new node, highest first.
    for i in ((node::INTERNAL_NODE_MAX_CELLS / 2 + 1)..node::INTERNAL_NODE_MAX_CELLS).rev() {
        let old_node = pager.page(old_page_num)?;
        let cur_page_num = node::internal_child(old_node, old_page_num, i)?;
        internal_insert(pager, root_page_num, new_page_num, cur_page_num)?;
        node::set_parent(pager.page_mut(cur_page_num)?, new_page_num);
        let old_node = pager.page_mut(old_page_num)?;
        node::set_internal_num_keys(old_node, node::internal_num_keys(old_node) - 1);
    }

    // The child just below the middle key becomes the old node's new right
    // child.
    {
        let old_node = pager.page(old_page_num)?;
        let num_keys = node::internal_num_keys(old_node);
        let new_right = node::internal_child(old_node, old_page_num, num_keys - 1)?;
        let old_node = pager.page_mut(old_page_num)?;
        node::set_internal_right_child(old_node, Some(new_right));
        node::set_internal_num_keys(old_node, num_keys - 1);
    }

    // Insert the pending child into whichever half now covers its keys.
    let max_after_split = max_key_through(pager, old_page_num)?;
    let destination_page_num = if child_max < max_after_split {
        old_page_num
    } else {
        new_page_num
    };
    internal_insert(pager, root_page_num, destination_page_num, child_page_num)?;
    node::set_parent(pager.page_mut(child_page_num)?, destination_page_num);

    let new_old_max = max_key_through(pager, old_page_num)?;
    node::update_internal_key(pager.page_mut(grandparent_page_num)?, old_max, new_old_max);

    if !splitting_root {
        internal_insert(pager, root_page_num, grandparent_page_num, new_page_num)?;
        node::set_parent(pager.page_mut(new_page_num)?, grandparent_page_num);
    }
    Ok(())
}

/// Removes the cell at the cursor by shifting subsequent cells left. A node
/// at its minimum occupancy refuses the deletion instead of merging with a
/// sibling; merge-on-underflow is detected but not implemented.
pub fn leaf_delete(pager: &mut Pager, cursor: Cursor) -> Result<()> {
    let leaf = pager.page(cursor.page_num)?;
    let num_cells = node::leaf_num_cells(leaf);
    let min_cells = if node::is_root(leaf) {
        node::LEAF_NODE_ROOT_MIN_CELLS
    } else {
        node::LEAF_NODE_MIN_CELLS
    };
    if num_cells < min_cells {
        return Err(DatabaseError::WouldUnderflow {
            page: cursor.page_num,
        });
    }

    let leaf = pager.page_mut(cursor.page_num)?;
    for i in cursor.cell_num..num_cells - 1 {
        node::copy_leaf_cell(leaf, i + 1, i);
    }
    node::set_leaf_num_cells(leaf, num_cells - 1);
    Ok(())
}

/// In-place overwrite of the cell at the cursor. No resizing or reordering;
/// the key stays the row's id.
pub fn leaf_update(pager: &mut Pager, cursor: Cursor, key: Key, row: &Row) -> Result<()> {
    let leaf = pager.page_mut(cursor.page_num)?;
    node::set_leaf_key(leaf, cursor.cell_num, key);
    row.serialize_into(node::leaf_value_mut(leaf, cursor.cell_num));
    Ok(())
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Renders the subtree under `page_num`: kind and cell/key counts per node,
/// indented by depth. Read-only with respect to page contents.
pub fn print_tree(
    pager: &mut Pager,
    page_num: PageNumber,
    indentation_level: usize,
    out: &mut String,
) -> Result<()> {
    let node = *pager.page(page_num)?;
    match node::node_type(&node)? {
        NodeType::Leaf => {
            let num_cells = node::leaf_num_cells(&node);
            indent(out, indentation_level);
            out.push_str(&format!("- leaf (size {num_cells})\n"));
            for i in 0..num_cells {
                indent(out, indentation_level + 1);
                out.push_str(&format!("- {}\n", node::leaf_key(&node, i)));
            }
        }
        NodeType::Internal => {
            let num_keys = node::internal_num_keys(&node);
            indent(out, indentation_level);
            out.push_str(&format!("- internal (size {num_keys})\n"));
            if num_keys > 0 {
                for i in 0..num_keys {
                    let child = node::internal_child(&node, page_num, i)?;
                    print_tree(pager, child, indentation_level + 1, out)?;
                    indent(out, indentation_level + 1);
                    out.push_str(&format!("- key {}\n", node::internal_key(&node, i)));
                }
                let right_child = node::internal_child(&node, page_num, num_keys)?;
                print_tree(pager, right_child, indentation_level + 1, out)?;
            }
        }
    }
    Ok(())
}

/// The derived layout constants, for the `.constants` meta command.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeConstants;

impl fmt::Display for TreeConstants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ROW_SIZE: {ROW_SIZE}")?;
        writeln!(
            f,
            "COMMON_NODE_HEADER_SIZE: {}",
            node::COMMON_NODE_HEADER_SIZE
        )?;
        writeln!(f, "LEAF_NODE_HEADER_SIZE: {}", node::LEAF_NODE_HEADER_SIZE)?;
        writeln!(f, "LEAF_NODE_CELL_SIZE: {}", node::LEAF_NODE_CELL_SIZE)?;
        writeln!(
            f,
            "LEAF_NODE_SPACE_FOR_CELLS: {}",
            node::LEAF_NODE_SPACE_FOR_CELLS
        )?;
        write!(f, "LEAF_NODE_MAX_CELLS: {}", node::LEAF_NODE_MAX_CELLS)
    }
}
