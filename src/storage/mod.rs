pub mod btree;
pub mod node;
pub mod pager;
pub mod table;
