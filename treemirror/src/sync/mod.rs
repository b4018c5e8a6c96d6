pub mod detector;
pub mod paths;
pub mod pruner;
pub mod scanner;
pub mod stamp;
pub mod store;
pub mod tracker;
pub mod trie;
