//! Account route handlers (require auth).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::{ProfileUpdate, UserProfile};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::session::set_flash;
use crate::models::{Flash, session_keys};
use crate::routes::orders::OrderView;
use crate::routes::products::ProductCardView;
use crate::services::AuthService;
use crate::state::AppState;

/// Orders shown on the overview tab.
const RECENT_ORDERS: usize = 3;

/// Account page tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountTab {
    #[default]
    Overview,
    Orders,
    Profile,
    Wishlist,
    Settings,
}

impl AccountTab {
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Overview,
            Self::Orders,
            Self::Profile,
            Self::Wishlist,
            Self::Settings,
        ]
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Orders => "orders",
            Self::Profile => "profile",
            Self::Wishlist => "wishlist",
            Self::Settings => "settings",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Orders => "Orders",
            Self::Profile => "Profile",
            Self::Wishlist => "Wishlist",
            Self::Settings => "Settings",
        }
    }

    /// Unknown or missing tab names fall back to the overview.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        Self::all()
            .into_iter()
            .find(|tab| Some(tab.as_str()) == value)
            .unwrap_or_default()
    }
}

/// Tab link display data.
#[derive(Debug, Clone)]
pub struct TabView {
    pub slug: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Profile form display data.
#[derive(Debug, Clone, Default)]
pub struct ProfileView {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub avatar_url: Option<String>,
    pub member_since: Option<String>,
}

impl ProfileView {
    fn new(profile: Option<&UserProfile>, fallback_name: &str, email: &str) -> Self {
        Self {
            full_name: profile
                .and_then(|p| p.full_name.clone())
                .unwrap_or_else(|| fallback_name.to_string()),
            email: profile
                .and_then(|p| p.email.clone())
                .unwrap_or_else(|| email.to_string()),
            phone: profile.and_then(|p| p.phone.clone()).unwrap_or_default(),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            member_since: profile
                .and_then(|p| p.created_at)
                .map(|at| at.format("%B %Y").to_string()),
        }
    }
}

/// Account page query parameters.
#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    pub tab: Option<String>,
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub tab: &'static str,
    pub tabs: Vec<TabView>,
    pub profile: ProfileView,
    pub is_admin: bool,
    pub orders: Vec<OrderView>,
    pub recent_orders: Vec<OrderView>,
    pub wishlist: Vec<ProductCardView>,
    pub load_failed: bool,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileForm {
    fn to_update(&self) -> Result<ProfileUpdate, &'static str> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err("Please enter your name.");
        }
        let phone = self.phone.trim();
        if !phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        {
            return Err("Please enter a valid phone number.");
        }
        Ok(ProfileUpdate {
            full_name: Some(full_name.to_string()),
            phone: Some(phone.to_string()),
            avatar_url: None,
        })
    }
}

/// Change password form data.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub password_confirm: String,
}

fn tab_url(tab: AccountTab) -> String {
    format!("/account?tab={}", tab.as_str())
}

/// Display the account page.
#[instrument(skip(state, user, ctx))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
    Query(query): Query<AccountQuery>,
) -> impl IntoResponse {
    let tab = AccountTab::parse(query.tab.as_deref());
    let backend = state.backend();
    let token = user.access_token.as_str();

    let (orders, wishlist, profile, is_admin) = tokio::join!(
        backend.get_orders(token, user.id),
        backend.get_wishlist(token, user.id),
        backend.get_user_profile(token, user.id),
        backend.is_admin(token, user.id),
    );

    let mut load_failed = false;
    let orders = orders.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load orders");
        load_failed = true;
        Vec::new()
    });
    let wishlist = wishlist.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load wishlist");
        load_failed = true;
        Vec::new()
    });
    let profile = profile
        .inspect_err(|e| tracing::warn!(error = %e, "Failed to load profile"))
        .ok();

    let pricing = &state.config().pricing;
    let orders: Vec<OrderView> = orders.iter().map(|o| OrderView::new(o, pricing)).collect();
    let saved: Vec<_> = wishlist.into_iter().filter_map(|entry| entry.product).collect();

    AccountTemplate {
        ctx,
        tab: tab.as_str(),
        tabs: AccountTab::all()
            .into_iter()
            .map(|t| TabView {
                slug: t.as_str(),
                label: t.label(),
                active: t == tab,
            })
            .collect(),
        profile: ProfileView::new(profile.as_ref(), &user.name, &user.email),
        is_admin,
        recent_orders: orders.iter().take(RECENT_ORDERS).cloned().collect(),
        orders,
        wishlist: ProductCardView::list(&saved, pricing),
        load_failed,
    }
}

/// Update the profile.
#[instrument(skip(state, session, user, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Response {
    let back = tab_url(AccountTab::Profile);
    let update = match form.to_update() {
        Ok(update) => update,
        Err(message) => {
            set_flash(&session, Flash::error(message)).await;
            return Redirect::to(&back).into_response();
        }
    };

    let flash = match state
        .backend()
        .update_user_profile(&user.access_token, user.id, &update)
        .await
    {
        Ok(profile) => {
            if let Some(name) = profile.full_name {
                user.name = name;
                if let Err(e) = session.insert(session_keys::CURRENT_USER, &user).await {
                    tracing::warn!(error = %e, "Failed to refresh session name");
                }
            }
            Flash::success("Profile updated.")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to update profile");
            Flash::error("We couldn't update your profile. Please try again.")
        }
    };

    set_flash(&session, flash).await;
    Redirect::to(&back).into_response()
}

/// Change the password.
#[instrument(skip(state, session, user, form))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PasswordForm>,
) -> Response {
    let result = AuthService::new(state.backend())
        .change_password(&user.access_token, &form.password, &form.password_confirm)
        .await;

    let flash = match result {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "Password changed");
            Flash::success("Password updated.")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Password change failed");
            Flash::error(e.user_message())
        }
    };

    set_flash(&session, flash).await;
    Redirect::to(&tab_url(AccountTab::Settings)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_parsing() {
        assert_eq!(AccountTab::parse(None), AccountTab::Overview);
        assert_eq!(AccountTab::parse(Some("orders")), AccountTab::Orders);
        assert_eq!(AccountTab::parse(Some("wishlist")), AccountTab::Wishlist);
        assert_eq!(AccountTab::parse(Some("admin")), AccountTab::Overview);
    }

    #[test]
    fn test_profile_form() {
        let form = ProfileForm {
            full_name: "  Anika Rao ".into(),
            phone: "+91 98450 12345".into(),
        };
        let update = form.to_update().unwrap_or_default();
        assert_eq!(update.full_name.as_deref(), Some("Anika Rao"));
        assert_eq!(update.phone.as_deref(), Some("+91 98450 12345"));

        let blank = ProfileForm {
            full_name: " ".into(),
            phone: String::new(),
        };
        assert!(blank.to_update().is_err());

        let bad_phone = ProfileForm {
            full_name: "Anika".into(),
            phone: "call me".into(),
        };
        assert!(bad_phone.to_update().is_err());
    }

    #[test]
    fn test_profile_view_falls_back_to_session() {
        let view = ProfileView::new(None, "Anika Rao", "anika@example.com");
        assert_eq!(view.full_name, "Anika Rao");
        assert_eq!(view.email, "anika@example.com");
        assert_eq!(view.member_since, None);
    }
}
