/// Joins an adapter base URL and an endpoint path into a request URL.
///
/// # Examples
///
/// ```rust
/// use onasis_rs::utils::path::join_url;
///
/// let url = join_url("https://api.paystack.co", "/transaction/initialize");
/// assert_eq!(url, "https://api.paystack.co/transaction/initialize");
///
/// let url = join_url("https://api.ngrok.com/", "tunnels");
/// assert_eq!(url, "https://api.ngrok.com/tunnels");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
