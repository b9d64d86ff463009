use crate::{Condition, SourceId};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Headers added to every request forwarded to a target.
pub type Headers = BTreeMap<String, HeaderValue>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

/// A fully resolved, routable target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledTarget {
    /// Uniquely identifies the target within its source.
    pub key: String,

    /// The object that defined this target. Many targets may share one source, e.g. when a
    /// config map holds several targets.
    pub source: SourceId,

    /// Where HTTP traffic is forwarded.
    pub target_url: Url,

    /// Where websocket traffic is forwarded.
    pub ws_target_url: Url,

    /// Traffic is forwarded here if the request's host header is, or starts with, this value.
    pub host: String,

    /// A user must satisfy these conditions to be granted access.
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

// === impl HeaderValue ===

impl HeaderValue {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multiple(vs) => vs,
        };
        values.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

// === impl CompiledTarget ===

impl CompiledTarget {
    /// Adds a header value. Repeated contributions to the same header accumulate in order.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        use std::collections::btree_map::Entry;

        let value = value.into();
        let headers = self.headers.get_or_insert_with(Headers::new);
        match headers.entry(name.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(HeaderValue::Single(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceKind;

    fn mk_target() -> CompiledTarget {
        CompiledTarget {
            key: "service/ns-0/web".to_string(),
            source: SourceId::new(SourceKind::Service, "ns-0", "web"),
            target_url: "http://web.ns-0:80".parse().unwrap(),
            ws_target_url: "ws://web.ns-0:80".parse().unwrap(),
            host: "web.example.com".to_string(),
            conditions: vec![],
            headers: None,
        }
    }

    #[test]
    fn headers_accumulate_in_order() {
        let mut target = mk_target();
        target.add_header("authorization", "Bearer t0k3n");
        assert_eq!(
            target.headers.as_ref().unwrap()["authorization"],
            HeaderValue::Single("Bearer t0k3n".to_string())
        );

        target.add_header("authorization", "Basic dTpw");
        target.add_header("authorization", "Basic eDp5");
        target.add_header("x-forwarded-user", "jane");
        let headers = target.headers.unwrap();
        assert_eq!(
            headers["authorization"].values().collect::<Vec<_>>(),
            vec!["Bearer t0k3n", "Basic dTpw", "Basic eDp5"]
        );
        assert_eq!(
            headers["x-forwarded-user"],
            HeaderValue::Single("jane".to_string())
        );
    }
}
