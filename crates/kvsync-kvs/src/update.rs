/// One change of a key/value pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    /// The changed key.
    pub key: String,
    /// The new value, or `None` if the pair was deleted.
    pub value: Option<String>,
    /// The previous value, or `None` if the pair was created.
    pub previous: Option<String>,
}

impl Update {
    pub fn created(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            previous: None,
        }
    }

    pub fn deleted(key: impl Into<String>, previous: Option<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            previous,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.value.is_none()
    }
}
