/// A node of the session's site tree, as supplied by the scope subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteNode {
    /// Hierarchic node name, e.g. `https://example.com/app/login`.
    pub path: String,
    /// Whether the node is currently included in the session scope.
    pub in_scope: bool,
}

impl SiteNode {
    pub fn new(path: impl Into<String>, in_scope: bool) -> Self {
        Self {
            path: path.into(),
            in_scope,
        }
    }

    pub fn in_scope(path: impl Into<String>) -> Self {
        Self::new(path, true)
    }

    pub fn out_of_scope(path: impl Into<String>) -> Self {
        Self::new(path, false)
    }
}

/// Reference to a session context a target may be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextRef {
    pub id: u32,
    pub name: String,
}

/// Immutable description of where a scan starts and how far it may reach.
///
/// There are deliberately no setters: once handed to the orchestrator a
/// target is owned by exactly one scan job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Target {
    start: Option<SiteNode>,
    context: Option<ContextRef>,
    recurse: bool,
    in_scope_only: bool,
}

impl Target {
    /// Target rooted at `node`, optionally descending into its children.
    pub fn new(node: SiteNode, recurse: bool) -> Self {
        Self {
            start: Some(node),
            context: None,
            recurse,
            in_scope_only: false,
        }
    }

    /// Fully specified target.
    pub fn with_options(
        start: Option<SiteNode>,
        context: Option<ContextRef>,
        recurse: bool,
        in_scope_only: bool,
    ) -> Self {
        Self {
            start,
            context,
            recurse,
            in_scope_only,
        }
    }

    /// Target covering a whole session context.
    pub fn for_context(context: ContextRef, recurse: bool) -> Self {
        Self {
            start: None,
            context: Some(context),
            recurse,
            in_scope_only: false,
        }
    }

    /// Everything currently in scope, starting from the site tree root.
    pub fn all_in_scope() -> Self {
        Self {
            start: None,
            context: None,
            recurse: true,
            in_scope_only: true,
        }
    }

    pub fn start(&self) -> Option<&SiteNode> {
        self.start.as_ref()
    }

    pub fn context(&self) -> Option<&ContextRef> {
        self.context.as_ref()
    }

    pub fn recurse(&self) -> bool {
        self.recurse
    }

    pub fn in_scope_only(&self) -> bool {
        self.in_scope_only
    }

    /// Human readable label used as the default scan name.
    pub fn display_name(&self) -> String {
        if let Some(node) = &self.start {
            return node.path.clone();
        }
        if let Some(context) = &self.context {
            return format!("Context: {}", context.name);
        }
        "All in scope".to_string()
    }
}
