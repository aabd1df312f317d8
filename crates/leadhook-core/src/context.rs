/// Who and where a request is being handled for. Threaded explicitly through
/// handlers instead of being read from ambient globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub site: String,
    pub user: String,
    pub remote_addr: Option<String>,
}

pub const GUEST_USER: &str = "Guest";

impl RequestContext {
    pub fn guest(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            user: GUEST_USER.to_string(),
            remote_addr: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }
}
