//! Browser-held chat state.
//!
//! The browser keeps two pieces of state between requests: the current
//! session identifier and the selected backend chat endpoint. Both live in
//! cookies. Handlers never touch the cookie jar directly; they go through
//! the [`ClientStateStore`] capability so the state can be faked in tests
//! with [`MemoryStateStore`], and [`ClientState`] layers the typed accessors
//! on top.

use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, CookieJar};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Cookie holding the current session identifier.
pub const SESSION_COOKIE: &str = "chatdku_session_id";

/// Cookie holding the selected backend chat endpoint.
pub const ENDPOINT_COOKIE: &str = "chatdku_api_endpoint";

/// Cookie marking that the terms page has been accepted.
pub const TERMS_COOKIE: &str = "terms_accepted";

/// Days a session cookie written on a creation path stays valid.
pub const SESSION_COOKIE_DAYS: i64 = 1;

/// Days the endpoint selection and terms cookies stay valid.
pub const PREFERENCE_COOKIE_DAYS: i64 = 365;

/// Characters escaped in cookie names and values.
///
/// Mirrors `encodeURIComponent`: everything but alphanumerics and
/// `- _ . ! ~ * ' ( )` is percent-encoded.
const COOKIE_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, COOKIE_COMPONENT).to_string()
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Capability for reading and writing named client-state values.
pub trait ClientStateStore {
    /// Read a value by key.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value with no explicit expiry.
    fn set(&mut self, key: &str, value: &str);

    /// Write a value that stays valid for `days`.
    fn persist(&mut self, key: &str, value: &str, days: i64);

    /// Delete a value.
    fn remove(&mut self, key: &str);
}

/// Cookie-jar-backed store used by request handlers.
///
/// Names and values are URL-encoded on the wire. Removal goes through
/// [`CookieJar::remove`], which emits an epoch-expiry cookie.
#[derive(Debug)]
pub struct CookieStateStore {
    jar: CookieJar,
}

impl CookieStateStore {
    #[must_use]
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    /// Recover the jar so the handler can return the updated cookies.
    #[must_use]
    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn base_cookie(key: &str, value: &str) -> Cookie<'static> {
        let mut cookie = Cookie::new(encode(key), encode(value));
        cookie.set_path("/");
        cookie
    }
}

impl ClientStateStore for CookieStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.jar.get(&encode(key)).map(|c| decode(c.value()))
    }

    fn set(&mut self, key: &str, value: &str) {
        self.jar = self.jar.clone().add(Self::base_cookie(key, value));
    }

    fn persist(&mut self, key: &str, value: &str, days: i64) {
        let mut persisted = Self::base_cookie(key, value);
        persisted.set_max_age(cookie::time::Duration::days(days));
        self.jar = self.jar.clone().add(persisted);
    }

    fn remove(&mut self, key: &str) {
        let mut removal = Cookie::from(encode(key));
        removal.set_path("/");
        self.jar = self.jar.clone().remove(removal);
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: HashMap<String, String>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn persist(&mut self, key: &str, value: &str, _days: i64) {
        self.set(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Typed accessors over a [`ClientStateStore`].
///
/// At most one current session id is tracked at a time; writes are
/// last-writer-wins, matching plain cookie semantics.
#[derive(Debug)]
pub struct ClientState<S> {
    store: S,
    default_endpoint: String,
}

impl<S: ClientStateStore> ClientState<S> {
    pub fn new(store: S, default_endpoint: impl Into<String>) -> Self {
        Self {
            store,
            default_endpoint: default_endpoint.into(),
        }
    }

    /// The current session id, if one is stored.
    pub fn session_id(&self) -> Option<String> {
        self.store.get(SESSION_COOKIE)
    }

    /// Overwrite the current session id.
    pub fn set_session_id(&mut self, id: &str) {
        self.store.set(SESSION_COOKIE, id);
    }

    /// Store a freshly created session id with the creation-path expiry.
    pub fn store_created_session(&mut self, id: &str) {
        self.store.persist(SESSION_COOKIE, id, SESSION_COOKIE_DAYS);
    }

    pub fn clear_session_id(&mut self) {
        self.store.remove(SESSION_COOKIE);
    }

    /// The selected chat endpoint, falling back to the configured default.
    pub fn endpoint(&self) -> String {
        self.store
            .get(ENDPOINT_COOKIE)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.default_endpoint.clone())
    }

    pub fn set_endpoint(&mut self, endpoint: &str) {
        self.store
            .persist(ENDPOINT_COOKIE, endpoint, PREFERENCE_COOKIE_DAYS);
    }

    pub fn clear_endpoint(&mut self) {
        self.store.remove(ENDPOINT_COOKIE);
    }

    pub fn terms_accepted(&self) -> bool {
        self.store.get(TERMS_COOKIE).is_some()
    }

    pub fn accept_terms(&mut self) {
        self.store
            .persist(TERMS_COOKIE, "true", PREFERENCE_COOKIE_DAYS);
    }

    /// Hand the underlying store back to the caller.
    pub fn into_store(self) -> S {
        self.store
    }
}
