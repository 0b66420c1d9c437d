/// Build a link that opens asset `id` outside the client.
///
/// The id is percent-encoded as a single path segment; a non-empty `token`
/// is appended as the `token` query parameter.
///
/// ```
/// use core_catalog::build_shareable_link;
///
/// let base = "https://share.example.com";
/// assert_eq!(build_shareable_link(base, "xyz", None), "https://share.example.com/Audio/xyz");
/// assert_eq!(
///     build_shareable_link(base, "a b/c", Some("t&k")),
///     "https://share.example.com/Audio/a%20b%2Fc?token=t%26k"
/// );
/// ```
pub fn build_shareable_link(share_base_url: &str, id: &str, token: Option<&str>) -> String {
    let mut link = format!(
        "{}/Audio/{}",
        share_base_url.trim_end_matches('/'),
        urlencoding::encode(id)
    );

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        link.push_str("?token=");
        link.push_str(&urlencoding::encode(token));
    }

    link
}
