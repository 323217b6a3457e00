//! Tag definitions and satisfaction predicates.
//!
//! A tag is satisfied either by membership in the executor's satisfied set
//! (flags) or by a live check of the context (buffers, artifacts, custom
//! predicates). Evaluation never mutates anything.

use crate::context::MapContext;
use indexmap::{IndexMap, IndexSet};
use mapgen_core::{CoreError, CoreResult, DependencyTag, TagSet};
use mapgen_schema::BufferKind;
use std::sync::Arc;

/// Live context check
pub type ContextPredicate = Arc<dyn Fn(&MapContext) -> bool + Send + Sync>;

/// How a tag is satisfied
#[derive(Clone)]
pub enum TagPredicate {
    /// In the satisfied set
    Flag,
    /// A field buffer is present and sized to the map
    Buffer {
        /// Field name
        field: String,
        /// Required element type, if any
        kind: Option<BufferKind>,
    },
    /// The artifact store holds a valid payload
    Artifact {
        /// Artifact id
        id: String,
    },
    /// Arbitrary check against the context
    Custom(ContextPredicate),
}

impl TagPredicate {
    /// Short name of the predicate kind
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Buffer { .. } => "buffer",
            Self::Artifact { .. } => "artifact",
            Self::Custom(_) => "custom",
        }
    }

    /// Evaluate against a context and the satisfied set
    #[must_use]
    pub fn holds(&self, tag: &DependencyTag, ctx: &MapContext, satisfied: &TagSet) -> bool {
        match self {
            Self::Flag => satisfied.contains(tag),
            Self::Buffer { field, kind } => {
                ctx.fields().is_present(field, *kind, ctx.dimensions().area())
            }
            Self::Artifact { id } => ctx.artifacts().holds_valid(id, ctx.dimensions()),
            Self::Custom(check) => check(ctx),
        }
    }
}

impl std::fmt::Debug for TagPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag => write!(f, "Flag"),
            Self::Buffer { field, kind } => f
                .debug_struct("Buffer")
                .field("field", field)
                .field("kind", kind)
                .finish(),
            Self::Artifact { id } => f.debug_struct("Artifact").field("id", id).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Declared namespaces plus per-tag predicates
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    namespaces: IndexSet<String>,
    definitions: IndexMap<DependencyTag, TagPredicate>,
}

static FLAG: TagPredicate = TagPredicate::Flag;

impl TagRegistry {
    /// Create a registry allowing the given namespaces
    #[must_use]
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            definitions: IndexMap::new(),
        }
    }

    /// Check a namespace is declared
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Declared namespaces, in declaration order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Define a tag
    ///
    /// # Errors
    ///
    /// Returns error if the tag is malformed, its namespace is undeclared,
    /// or it is already defined
    pub fn define(&mut self, tag: &str, predicate: TagPredicate) -> CoreResult<()> {
        let parsed = DependencyTag::parse(tag)?;
        if !self.has_namespace(parsed.namespace()) {
            return Err(CoreError::InvalidTag {
                tag: tag.to_string(),
                reason: format!("namespace '{}' is not declared", parsed.namespace()),
            });
        }
        if self.definitions.contains_key(&parsed) {
            return Err(CoreError::AlreadyExists {
                kind: "tag".to_string(),
                id: tag.to_string(),
            });
        }
        self.definitions.insert(parsed, predicate);
        Ok(())
    }

    /// Define a set-membership tag
    ///
    /// # Errors
    ///
    /// See [`TagRegistry::define`]
    pub fn define_flag(&mut self, tag: &str) -> CoreResult<()> {
        self.define(tag, TagPredicate::Flag)
    }

    /// Define a buffer-presence tag
    ///
    /// # Errors
    ///
    /// See [`TagRegistry::define`]
    pub fn define_buffer(
        &mut self,
        tag: &str,
        field: impl Into<String>,
        kind: Option<BufferKind>,
    ) -> CoreResult<()> {
        self.define(
            tag,
            TagPredicate::Buffer {
                field: field.into(),
                kind,
            },
        )
    }

    /// Define an artifact tag
    ///
    /// # Errors
    ///
    /// See [`TagRegistry::define`]
    pub fn define_artifact(&mut self, tag: &str, artifact_id: impl Into<String>) -> CoreResult<()> {
        self.define(tag, TagPredicate::Artifact { id: artifact_id.into() })
    }

    /// Define a tag checked by a custom predicate
    ///
    /// # Errors
    ///
    /// See [`TagRegistry::define`]
    pub fn define_custom<F>(&mut self, tag: &str, check: F) -> CoreResult<()>
    where
        F: Fn(&MapContext) -> bool + Send + Sync + 'static,
    {
        self.define(tag, TagPredicate::Custom(Arc::new(check)))
    }

    /// Predicate for a tag; undefined tags are flags
    #[must_use]
    pub fn predicate(&self, tag: &DependencyTag) -> &TagPredicate {
        self.definitions.get(tag).unwrap_or(&FLAG)
    }

    /// Evaluate one tag
    #[must_use]
    pub fn is_satisfied(&self, tag: &DependencyTag, ctx: &MapContext, satisfied: &TagSet) -> bool {
        self.predicate(tag).holds(tag, ctx, satisfied)
    }

    /// Tags among `tags` that do not currently hold, in input order
    #[must_use]
    pub fn unmet<'a>(
        &self,
        tags: &'a [DependencyTag],
        ctx: &MapContext,
        satisfied: &TagSet,
    ) -> Vec<&'a DependencyTag> {
        tags.iter()
            .filter(|tag| !self.is_satisfied(tag, ctx, satisfied))
            .collect()
    }

    /// Defined tags with their predicates, in definition order
    pub fn definitions(&self) -> impl Iterator<Item = (&DependencyTag, &TagPredicate)> {
        self.definitions.iter()
    }
}
