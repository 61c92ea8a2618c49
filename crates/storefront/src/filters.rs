//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Fingerprint of the bundled CSS and JS, for cache busting.
///
/// Usage in templates: `<link href="/static/css/main.css?v={{ ""|asset_version }}">`
#[askama::filter_fn]
pub fn asset_version(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("ASSET_VERSION"))
}

/// Filled and empty stars for a 1-5 rating.
///
/// Usage in templates: `{{ review.rating|stars }}`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[askama::filter_fn]
pub fn stars(rating: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let filled = rating
        .to_string()
        .parse::<f64>()
        .map_or(0, |r| r.round().clamp(0.0, 5.0) as usize);
    Ok(format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled)))
}
