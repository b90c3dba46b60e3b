use url::Url;

/// `base` with `path` appended below whatever path `base` already carries.
pub fn append_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(joined.trim_end_matches('/'));
    url
}

/// Full request address: `base` + `path`, with every query value percent-encoded in the
/// order given. No `?` is emitted when `params` is empty.
pub fn build_request_url<K, V>(base: &Url, path: &str, params: impl IntoIterator<Item = (K, V)>) -> Url
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = append_path(base, path);
    url.set_query(None);

    let params: Vec<(K, V)> = params.into_iter().collect();
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &params {
            query.append_pair(key.as_ref(), value.as_ref());
        }
    }
    url
}
