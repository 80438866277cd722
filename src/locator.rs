//! Armory URL construction.

use reqwest::Url;

use crate::error::ArmoryError;

/// Armory host for a region. US pages are served from `www`.
pub fn armory_base(location: &str) -> String {
    let location = location.trim().to_ascii_lowercase();
    let host = if location == "us" { "www" } else { location.as_str() };
    format!("http://{}.wowarmory.com/", host)
}

/// URL of `file` for the character `name` on `realm` in region `location`.
///
/// ```
/// use armory_scrape::build_url;
///
/// let url = build_url("eu", "Aszune", "Adries", "character-sheet.xml").unwrap();
/// assert_eq!(url, "http://eu.wowarmory.com/character-sheet.xml?r=Aszune&n=Adries");
/// ```
pub fn build_url(
    location: &str,
    realm: &str,
    name: &str,
    file: &str,
) -> Result<String, ArmoryError> {
    build_url_with_base(&armory_base(location), realm, name, file)
}

/// Like [`build_url`] but against an explicit base, e.g. a local mirror.
pub fn build_url_with_base(
    base: &str,
    realm: &str,
    name: &str,
    file: &str,
) -> Result<String, ArmoryError> {
    let mut base = base.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let invalid = |reason: String| ArmoryError::InvalidUrl {
        url: format!("{}{}", base, file),
        reason,
    };

    let mut url = Url::parse(&base)
        .and_then(|base| base.join(file))
        .map_err(|e| invalid(e.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }

    url.query_pairs_mut()
        .append_pair("r", realm)
        .append_pair("n", name);

    Ok(url.into())
}
