use scraper::{Html, Selector};

use crate::workflows::applications::AuthToken;

const TOKEN_SELECTOR: &str = r#"meta[name="csrf-token"]"#;

/// Read the anti-forgery token from `<meta name="csrf-token" content="...">`.
pub(crate) fn extract_token(html: &str) -> Option<AuthToken> {
    let selector = Selector::parse(TOKEN_SELECTOR).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(AuthToken::new)
}
