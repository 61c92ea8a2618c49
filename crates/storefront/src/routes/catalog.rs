//! Catalog listing with category, price and sort filters.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::backend::{ProductFilter, ProductSort};
use crate::filters;
use crate::middleware::PageContext;
use crate::routes::home::CategoryView;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

/// Products per catalog page.
pub const PAGE_SIZE: u32 = 12;

/// Highest page number honored; larger requests show this page.
pub const MAX_PAGE: u32 = 10_000;

/// Catalog query parameters, as submitted by the filter form.
///
/// Everything arrives as text so blank inputs don't reject the request.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

/// Validated catalog parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogParams {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub page: u32,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_price(value: Option<&String>) -> Option<Decimal> {
    non_blank(value)
        .and_then(|s| s.parse::<Decimal>().ok())
        .filter(|d| *d >= Decimal::ZERO)
}

impl From<&CatalogQuery> for CatalogParams {
    fn from(query: &CatalogQuery) -> Self {
        let sort = non_blank(query.sort.as_ref())
            .and_then(|s| ProductSort::all().into_iter().find(|o| o.as_str() == s))
            .unwrap_or_default();
        let (min_price, max_price) = match (
            parse_price(query.min_price.as_ref()),
            parse_price(query.max_price.as_ref()),
        ) {
            (Some(min), Some(max)) if min > max => (Some(max), Some(min)),
            range => range,
        };
        Self {
            category: non_blank(query.category.as_ref()).map(String::from),
            min_price,
            max_price,
            sort,
            page: query.page.unwrap_or(1).clamp(1, MAX_PAGE),
        }
    }
}

impl CatalogParams {
    /// Backend filter for this page, with one extra row to detect a next page.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category.clone(),
            featured: None,
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
            limit: Some(PAGE_SIZE + 1),
            offset: Some((self.page - 1) * PAGE_SIZE),
        }
    }

    /// Catalog URL for these filters at `page`.
    #[must_use]
    pub fn url_for_page(&self, page: u32) -> String {
        let mut pairs = url::form_urlencoded::Serializer::new(String::new());
        if let Some(category) = &self.category {
            pairs.append_pair("category", category);
        }
        if let Some(min) = self.min_price {
            pairs.append_pair("min_price", &min.to_string());
        }
        if let Some(max) = self.max_price {
            pairs.append_pair("max_price", &max.to_string());
        }
        if self.sort != ProductSort::default() {
            pairs.append_pair("sort", self.sort.as_str());
        }
        if page > 1 {
            pairs.append_pair("page", &page.to_string());
        }
        let query = pairs.finish();
        if query.is_empty() {
            "/catalog".to_string()
        } else {
            format!("/catalog?{query}")
        }
    }
}

/// Sort dropdown option.
#[derive(Debug, Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Category sidebar entry.
#[derive(Debug, Clone)]
pub struct CategoryLink {
    pub category: CategoryView,
    pub active: bool,
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/index.html")]
pub struct CatalogTemplate {
    pub ctx: PageContext,
    pub heading: String,
    pub products: Vec<ProductCardView>,
    pub categories: Vec<CategoryLink>,
    pub sort_options: Vec<SortOption>,
    pub category: String,
    pub min_price: String,
    pub max_price: String,
    pub page: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub load_failed: bool,
}

/// Display the catalog.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<CatalogQuery>,
) -> impl IntoResponse {
    let params = CatalogParams::from(&query);
    let backend = state.backend();
    let filter = params.to_filter();
    let (products, categories) = tokio::join!(backend.get_products(&filter), backend.get_categories());

    let (mut products, load_failed) = match products {
        Ok(products) => (products, false),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load catalog");
            (Vec::new(), true)
        }
    };
    let categories = categories.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load categories");
        Vec::new()
    });

    let has_next = products.len() > PAGE_SIZE as usize;
    products.truncate(PAGE_SIZE as usize);

    let heading = params
        .category
        .as_deref()
        .and_then(|slug| categories.iter().find(|c| c.slug == slug))
        .map_or_else(|| "All Jewelry".to_string(), |c| c.name.clone());

    CatalogTemplate {
        ctx,
        heading,
        products: ProductCardView::list(&products, &state.config().pricing),
        categories: categories
            .iter()
            .map(|c| CategoryLink {
                active: params.category.as_deref() == Some(c.slug.as_str()),
                category: CategoryView::from(c),
            })
            .collect(),
        sort_options: ProductSort::all()
            .into_iter()
            .map(|o| SortOption {
                value: o.as_str(),
                label: o.label(),
                selected: o == params.sort,
            })
            .collect(),
        category: params.category.clone().unwrap_or_default(),
        min_price: params.min_price.map(|d| d.to_string()).unwrap_or_default(),
        max_price: params.max_price.map(|d| d.to_string()).unwrap_or_default(),
        page: params.page,
        prev_url: (params.page > 1).then(|| params.url_for_page(params.page - 1)),
        next_url: has_next.then(|| params.url_for_page(params.page + 1)),
        load_failed,
    }
}
