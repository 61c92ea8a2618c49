//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::backend::Category;
use crate::filters;
use crate::middleware::PageContext;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

/// Featured pieces on the home page.
const FEATURED_LIMIT: u32 = 3;

/// Category tile display data.
#[derive(Debug, Clone)]
pub struct CategoryView {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
            image_url: category.image_url.clone(),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub featured: Vec<ProductCardView>,
    pub categories: Vec<CategoryView>,
}

/// Display the home page.
///
/// Backend failures degrade to empty sections rather than an error page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> impl IntoResponse {
    let backend = state.backend();
    let (featured, categories) = tokio::join!(
        backend.get_featured_products(FEATURED_LIMIT),
        backend.get_categories(),
    );

    let featured = featured.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load featured products");
        Vec::new()
    });
    let categories = categories.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load categories");
        Vec::new()
    });

    HomeTemplate {
        ctx,
        featured: ProductCardView::list(&featured, &state.config().pricing),
        categories: categories.iter().map(CategoryView::from).collect(),
    }
}
