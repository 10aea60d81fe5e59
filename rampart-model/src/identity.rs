/// Identity a scan runs as, supplied by the identity/session subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    pub id: u32,
    pub name: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub context_id: Option<u32>,
}

impl Identity {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            context_id: None,
        }
    }

    pub fn in_context(mut self, context_id: u32) -> Self {
        self.context_id = Some(context_id);
        self
    }
}

/// Minimal description of a loaded session, carried by session-change signals.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionInfo {
    pub name: String,
}

impl SessionInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
