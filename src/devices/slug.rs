/// Derives a node id from its display name.
///
/// Lowercases the name, collapses every run of characters outside
/// `[a-z0-9]` into a single hyphen and trims hyphens from both ends.
///
/// # Examples
///
/// ```
/// use waveslab_sim::devices::slugify;
///
/// assert_eq!(slugify("Kitchen Faucet"), "kitchen-faucet");
/// assert_eq!(slugify("  Living-room / Light #2 "), "living-room-light-2");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
