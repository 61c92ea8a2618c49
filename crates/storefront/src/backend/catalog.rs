//! Products, categories and reviews.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use zeaver_core::ProductId;

use crate::backend::cache::CacheValue;
use crate::backend::client::{Auth, BackendClient};
use crate::backend::query::{Direction, Query, sanitize_search};
use crate::backend::types::{Category, NewReview, Product, Review};
use crate::backend::BackendError;

/// Maximum number of search results.
pub const SEARCH_LIMIT: u32 = 20;

/// Catalog sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Featured first, then newest.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl ProductSort {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Newest => "newest",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Featured => "Featured",
            Self::PriceAsc => "Price: Low to High",
            Self::PriceDesc => "Price: High to Low",
            Self::Newest => "Newest",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Featured, Self::PriceAsc, Self::PriceDesc, Self::Newest]
    }

    fn apply(self, query: Query) -> Query {
        match self {
            Self::Featured => query
                .order("is_featured", Direction::Desc)
                .order("created_at", Direction::Desc),
            Self::PriceAsc => query.order("price", Direction::Asc),
            Self::PriceDesc => query.order("price", Direction::Desc),
            Self::Newest => query.order("created_at", Direction::Desc),
        }
    }
}

/// Filters for [`BackendClient::get_products`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductFilter {
    fn to_query(&self) -> Query {
        let mut query = Query::table("products")
            .select("*")
            .eq("is_active", true);
        if let Some(category) = &self.category {
            query = query.eq("category", category);
        }
        if let Some(featured) = self.featured {
            query = query.eq("is_featured", featured);
        }
        if let Some(min) = self.min_price {
            query = query.gte("price", min);
        }
        if let Some(max) = self.max_price {
            query = query.lte("price", max);
        }
        query = self.sort.apply(query);
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        query
    }
}

impl BackendClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List active products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError> {
        let query = filter.to_query();
        let cache_key = format!("products:{}", query.cache_key());

        if let Some(CacheValue::Products(products)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self.fetch_all(&query, Auth::Anon).await?;

        self.cache()
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Get an active product by id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the product doesn't exist or is inactive.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, BackendError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let query = Query::table("products")
            .select("*")
            .eq("id", id)
            .eq("is_active", true);
        let product: Product = self
            .fetch_one(&query, Auth::Anon)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(_) => BackendError::NotFound(format!("Product not found: {id}")),
                other => other,
            })?;

        self.cache()
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Featured products, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_featured_products(&self, limit: u32) -> Result<Vec<Product>, BackendError> {
        self.get_products(&ProductFilter {
            featured: Some(true),
            sort: ProductSort::Newest,
            limit: Some(limit),
            ..ProductFilter::default()
        })
        .await
    }

    /// Other products from the same category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, BackendError> {
        let Some(category) = &product.category else {
            return Ok(Vec::new());
        };
        // One extra so the product itself can be dropped
        let mut related = self
            .get_products(&ProductFilter {
                category: Some(category.clone()),
                limit: Some(limit + 1),
                ..ProductFilter::default()
            })
            .await?;
        related.retain(|p| p.id != product.id);
        related.truncate(limit as usize);
        Ok(related)
    }

    /// Case-insensitive search over name and description. Never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_products(&self, raw: &str) -> Result<Vec<Product>, BackendError> {
        let needle = sanitize_search(raw);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("products")
            .select("*")
            .eq("is_active", true)
            .ilike_any(&["name", "description"], &needle)
            .limit(SEARCH_LIMIT);
        self.fetch_all(&query, Auth::Anon).await
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, BackendError> {
        let query = Query::table("categories")
            .select("*")
            .eq("is_active", true)
            .order("display_order", Direction::Asc);
        let cache_key = format!("categories:{}", query.cache_key());

        if let Some(CacheValue::Categories(categories)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.fetch_all(&query, Auth::Anon).await?;

        self.cache()
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// An active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no active category has this slug.
    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Category, BackendError> {
        self.get_categories()
            .await?
            .into_iter()
            .find(|c| c.slug == slug)
            .ok_or_else(|| BackendError::NotFound(format!("Category not found: {slug}")))
    }

    // =========================================================================
    // Review Methods
    // =========================================================================

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, BackendError> {
        let query = Query::table("reviews")
            .select("*")
            .eq("product_id", product_id)
            .eq("is_approved", true)
            .order("created_at", Direction::Desc);
        self.fetch_all(&query, Auth::Anon).await
    }

    /// Submit a review as the signed-in shopper.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, access_token, review), fields(product_id = %review.product_id))]
    pub async fn add_review(&self, access_token: &str, review: &NewReview) -> Result<Review, BackendError> {
        self.insert("reviews", review, Auth::User(access_token)).await
    }
}
