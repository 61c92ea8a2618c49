//! Product search.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::filters;
use crate::middleware::PageContext;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Search results page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub ctx: PageContext,
    pub query: String,
    /// `None` until a query has been entered.
    pub results: Option<Vec<ProductCardView>>,
    pub load_failed: bool,
}

/// Search products by name or description.
///
/// An empty query shows the search prompt without calling the backend.
#[instrument(skip(state, ctx), fields(q = %query.q))]
pub async fn search(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let q = query.q.trim().to_string();
    if q.is_empty() {
        return SearchTemplate {
            ctx,
            query: q,
            results: None,
            load_failed: false,
        };
    }

    let (products, load_failed) = match state.backend().search_products(&q).await {
        Ok(products) => (products, false),
        Err(e) => {
            tracing::error!(error = %e, "Search failed");
            (Vec::new(), true)
        }
    };

    SearchTemplate {
        ctx,
        results: Some(ProductCardView::list(&products, &state.config().pricing)),
        query: q,
        load_failed,
    }
}
