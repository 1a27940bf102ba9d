use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A parsed inbound HTTP request.
///
/// The head (request line and headers) is filled in by
/// [`Connection::read_request`](crate::connection::Connection::read_request).
/// The body is read separately by the dispatcher, which sets `body` and
/// `body_read` once it has decided the request is worth reading.
#[derive(Debug)]
pub(crate) struct Request {
    pub method: String,
    /// The request target exactly as sent, e.g. `/test/query?q=1`.
    pub target: String,
    /// Header names are stored lowercased; HTTP header names are
    /// case-insensitive.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub body_read: bool,
    form: OnceCell<BTreeMap<String, String>>,
    json: OnceCell<HashMap<String, serde_json::Value>>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: String::new(),
            target: String::new(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            body_read: false,
            form: OnceCell::new(),
            json: OnceCell::new(),
        }
    }
}

impl Request {
    /// The table lookup key: the target with one leading `/` removed.
    ///
    /// The query string stays part of the key, so `a?x=1` and `a` are
    /// distinct routes, as are two orderings of the same query string.
    pub fn route_key(&self) -> &str {
        self.target.strip_prefix('/').unwrap_or(&self.target)
    }

    /// Returns the value of the request header `name` (lowercase), if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Declared body length. Absent or unparseable Content-Length is
    /// treated as "no body".
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Body bytes the dispatcher has not consumed yet.
    pub fn unread_body_len(&self) -> usize {
        if self.body_read {
            0
        } else {
            self.content_length()
        }
    }

    fn is_form_encoded(&self) -> bool {
        self.header("content-type")
            .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE))
    }

    fn parse_form(&self) -> BTreeMap<String, String> {
        let mut form = BTreeMap::new();

        let query = self.target.split_once('?').map(|(_, q)| q).unwrap_or("");
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            form.insert(k.to_string(), v.to_string());
        }

        // Body values shadow query values of the same name, the standard
        // form-value precedence.
        if self.is_form_encoded() {
            for (k, v) in form_urlencoded::parse(&self.body) {
                form.insert(k.to_string(), v.to_string());
            }
        }

        form
    }

    /// Returns `key` from the form source: the query string plus, for
    /// form-encoded requests, the urlencoded body.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        let map = self.form.get_or_init(|| self.parse_form());
        map.get(key).map(String::as_str)
    }

    /// Returns `key` from the body decoded as a flat JSON object, if the
    /// body decoded and the value is a string.
    ///
    /// Decode failures are not errors: the body is simply treated as an
    /// empty map.
    pub fn json_value(&self, key: &str) -> Option<&str> {
        let map = self
            .json
            .get_or_init(|| serde_json::from_slice(&self.body).unwrap_or_default());
        map.get(key).and_then(serde_json::Value::as_str)
    }

    /// Two-source parameter lookup: form/query first, JSON body second.
    /// The first source that has the key at all wins.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.form_value(key).or_else(|| self.json_value(key))
    }
}
