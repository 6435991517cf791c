use crate::{Error, Result};

/// An SSH `name-list`: comma-joined ASCII names inside a `string`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    /// Decode a `name-list` from the body of a `string`.
    ///
    /// The empty string decodes to the empty list; non-ASCII bytes
    /// are a [`Error::MalformedField`].
    pub fn decode(body: &[u8]) -> Result<Self> {
        if !body.is_ascii() {
            return Err(Error::MalformedField);
        }

        let body = std::str::from_utf8(body).map_err(|_| Error::MalformedField)?;

        Ok(Self::from_iter(body.split(',').filter(|name| !name.is_empty())))
    }

    /// The names in proposal order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether the list contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|entry| entry == name)
    }

    /// The first of _our_ names that also appears in `other`,
    /// which is the RFC 4253 §7.1 negotiation rule when `self`
    /// is the client's proposal.
    pub fn preferred_in(&self, other: &NameList) -> Option<&str> {
        self.names().find(|name| other.contains(name))
    }

    /// Comma-join the names back into their wire form.
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        self.0.join(",")
    }
}

impl<T: AsRef<str>> FromIterator<T> for NameList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|name| name.as_ref().to_owned())
                .collect(),
        )
    }
}
