//! Static content page route handlers.
//!
//! Serves the markdown pages loaded at startup: `/about` and the policy pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::instrument;

use crate::content::POLICY_SLUGS;
use crate::error::AppError;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct ContentPageTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

fn serve_content_page(state: &AppState, ctx: PageContext, slug: &str) -> Result<ContentPageTemplate, AppError> {
    let page = state
        .content()
        .get_page(slug)
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    Ok(ContentPageTemplate {
        ctx,
        title: page.meta.title.clone(),
        description: page.meta.description.clone().unwrap_or_default(),
        updated_at: page.meta.updated_at,
        content_html: page.content_html.clone(),
    })
}

/// Display the About page.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, ctx))]
pub async fn about(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse, AppError> {
    serve_content_page(&state, ctx, "about")
}

/// Display a policy page.
///
/// # Errors
///
/// Returns 404 for anything but the known policy slugs.
#[instrument(skip(state, ctx))]
pub async fn policy(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !POLICY_SLUGS.contains(&slug.as_str()) {
        return Err(AppError::NotFound(format!("policy {slug}")));
    }
    serve_content_page(&state, ctx, &slug)
}
