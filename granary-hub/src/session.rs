use url::Url;

/// Authentication material the hub hands back on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAuth {
    pub session_key: String,
    pub session_id: i64,
}

/// Hub endpoint plus optional login state.
///
/// Logged out, calls go to the bare server URL. Logged in, every call goes
/// to the URL decorated with the session's key and id as query parameters.
/// `open` is the only way forward, `close` the only way back; an instance
/// belongs to one logical operation and is never shared across workers.
#[derive(Debug, Clone)]
pub struct Session {
    base: Url,
    auth: Option<SessionAuth>,
}

impl Session {
    pub fn new(base: Url) -> Self {
        Self { base, auth: None }
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_some()
    }

    pub fn server_url(&self) -> &Url {
        &self.base
    }

    /// URL all RPC calls are issued against in the current state.
    pub fn endpoint(&self) -> Url {
        match &self.auth {
            None => self.base.clone(),
            Some(auth) => {
                let mut url = self.base.clone();
                url.query_pairs_mut()
                    .append_pair("session-key", &auth.session_key)
                    .append_pair("session-id", &auth.session_id.to_string());
                url
            }
        }
    }

    pub(crate) fn open(&mut self, auth: SessionAuth) {
        self.auth = Some(auth);
    }

    pub(crate) fn close(&mut self) {
        self.auth = None;
    }
}
