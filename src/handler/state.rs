#[derive(Clone)]
pub(crate) struct ProxyState {
    pub(crate) http_client: reqwest::Client,
}

// One outbound call per inbound request: redirects go back to the caller.
// No default User-Agent: the caller's own is forwarded.
pub(crate) fn http_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder().redirect(reqwest::redirect::Policy::none())
}
