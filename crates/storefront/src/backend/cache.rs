//! Cache types for catalog reads.

use crate::backend::types::{Category, Product};

/// Cached value types.
///
/// Keys are [`Query::cache_key`](crate::backend::Query::cache_key) strings
/// prefixed with the value kind.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
    Categories(Vec<Category>),
}
