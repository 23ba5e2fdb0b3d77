//! Table: the pager plus the page number acting as tree root, with the
//! statement-facing operations (insert, select, update, delete) and cursor
//! iteration layered over the tree engine.

use std::path::Path;

use log::error;

use crate::{
    storage::{
        btree::{self, Cursor},
        node,
        node::NodeType,
        pager::Pager,
    },
    types::{
        Key, PageNumber,
        error::{DatabaseError, Result},
        row::Row,
    },
};

pub struct Table {
    pager: Pager,
    root_page_num: PageNumber,
}

impl Table {
    /// Opens or creates the single-table database at `path`. A fresh file
    /// gets page 0 initialized as an empty root leaf; that page number is
    /// the root for the lifetime of the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pager = Pager::open(path)?;
        Self::from_pager(pager)
    }

    pub fn open_with_limit<P: AsRef<Path>>(path: P, max_pages: u32) -> Result<Self> {
        let pager = Pager::open_with_limit(path, max_pages)?;
        Self::from_pager(pager)
    }

    fn from_pager(mut pager: Pager) -> Result<Self> {
        if pager.num_pages() == 0 {
            let root = pager.page_mut(0)?;
            node::initialize_leaf(root);
            node::set_root(root, true);
        }
        Ok(Self {
            pager,
            root_page_num: 0,
        })
    }

    pub fn root_page_num(&self) -> PageNumber {
        self.root_page_num
    }

    /// Flushes every cached page and consumes the table.
    pub fn close(mut self) -> Result<()> {
        self.pager.flush_all()
    }

    /// Returns the position of `key`, or the position where it should be
    /// inserted.
    pub fn find(&mut self, key: Key) -> Result<Cursor> {
        btree::find(&mut self.pager, self.root_page_num, key)
    }

    /// Cursor at the leftmost leaf's first slot; flags end-of-table when
    /// the table is empty.
    pub fn start(&mut self) -> Result<Cursor> {
        let mut cursor = self.find(0)?;
        let node = self.pager.page(cursor.page_num)?;
        cursor.end_of_table = node::leaf_num_cells(node) == 0;
        Ok(cursor)
    }

    /// Advances to the next slot, following the leaf chain; a next-leaf of
    /// 0 marks the end of the table.
    pub fn advance(&mut self, cursor: &mut Cursor) -> Result<()> {
        let node = self.pager.page(cursor.page_num)?;
        cursor.cell_num += 1;
        if cursor.cell_num >= node::leaf_num_cells(node) {
            let next_page_num = node::leaf_next_leaf(node);
            if next_page_num == 0 {
                cursor.end_of_table = true;
            } else {
                cursor.page_num = next_page_num;
                cursor.cell_num = 0;
            }
        }
        Ok(())
    }

    /// Deserializes the row at the cursor's slot.
    pub fn row_at(&mut self, cursor: &Cursor) -> Result<Row> {
        let node = self.pager.page(cursor.page_num)?;
        Ok(Row::deserialize(node::leaf_value(node, cursor.cell_num)))
    }

    /// True when `cursor` sits on an existing cell whose key is `key`.
    fn cursor_matches(&mut self, cursor: &Cursor, key: Key) -> Result<bool> {
        let node = self.pager.page(cursor.page_num)?;
        Ok(cursor.cell_num < node::leaf_num_cells(node)
            && node::leaf_key(node, cursor.cell_num) == key)
    }

    /// Inserts `row`, keyed by its id. Duplicate ids are rejected and leave
    /// the tree untouched.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let key = row.id;
        let cursor = self.find(key)?;
        if self.cursor_matches(&cursor, key)? {
            return Err(DatabaseError::DuplicateKey { key });
        }
        btree::leaf_insert(&mut self.pager, self.root_page_num, cursor, key, row)
    }

    /// Ordered scan of the whole table; with a key given, only matching
    /// rows are kept.
    pub fn select(&mut self, key: Option<Key>) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut cursor = self.start()?;
        while !cursor.end_of_table {
            let row = self.row_at(&cursor)?;
            if key.is_none_or(|k| k == row.id) {
                rows.push(row);
            }
            self.advance(&mut cursor)?;
        }
        Ok(rows)
    }

    /// In-place overwrite of the row stored under `key`.
    pub fn update(&mut self, key: Key, row: &Row) -> Result<()> {
        let cursor = self.find(key)?;
        if !self.cursor_matches(&cursor, key)? {
            return Err(DatabaseError::KeyNotFound { key });
        }
        btree::leaf_update(&mut self.pager, cursor, key, row)
    }

    /// Deletes the row stored under `key`, refusing when the leaf would
    /// underflow (merging is not implemented).
    pub fn delete(&mut self, key: Key) -> Result<()> {
        let root = self.pager.page(self.root_page_num)?;
        if node::node_type(root)? == NodeType::Leaf && node::leaf_num_cells(root) == 0 {
            return Err(DatabaseError::TableEmpty);
        }
        let cursor = self.find(key)?;
        if !self.cursor_matches(&cursor, key)? {
            return Err(DatabaseError::KeyNotFound { key });
        }
        btree::leaf_delete(&mut self.pager, cursor)
    }

    /// Renders the tree structure for the `.btree` meta command.
    pub fn tree_display(&mut self) -> Result<String> {
        let mut out = String::new();
        btree::print_tree(&mut self.pager, self.root_page_num, 0, &mut out)?;
        Ok(out)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        // Best effort: close() already flushed if the caller used it, and
        // re-flushing identical buffers is harmless.
        if let Err(err) = self.pager.flush_all() {
            error!("failed to flush table on drop: {err}");
        }
    }
}
