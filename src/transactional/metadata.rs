//! Constructor metadata: the per-type descriptor the rebinder walks.
//!
//! A descriptor holds three independent pieces, indexed by constructor
//! position: the design-time types, the declared dependency tokens and the
//! optional-parameter set. Any of them may be sparse.

use crate::di::{Token, base_type_name, first_type_argument};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Suffix that marks repository types and repository tokens.
pub const REPOSITORY_SUFFIX: &str = "Repository";

/// Design-time type of a constructor parameter.
#[derive(Clone, Debug)]
pub enum DesignType {
    /// A concrete type, usable as a resolution token.
    Class {
        token: Token,
        type_name: &'static str,
        repository: bool,
    },
    /// A type known only by name (interface, primitive). It cannot be used to
    /// resolve the parameter on its own.
    Opaque(&'static str),
}

impl DesignType {
    pub fn class<T: ?Sized + 'static>() -> Self {
        DesignType::Class {
            token: Token::of::<T>(),
            type_name: std::any::type_name::<T>(),
            repository: false,
        }
    }

    /// A type explicitly tagged as a transaction-bindable repository.
    pub fn repository<T: ?Sized + 'static>() -> Self {
        DesignType::Class {
            token: Token::of::<T>(),
            type_name: std::any::type_name::<T>(),
            repository: true,
        }
    }

    pub fn opaque(name: &'static str) -> Self {
        DesignType::Opaque(name)
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            DesignType::Class { token, .. } => Some(token),
            DesignType::Opaque(_) => None,
        }
    }

    /// Repository-like: tagged as a repository, or its base type name ends
    /// with `suffix` (`Repository<User>`, `UserRepository`).
    pub fn is_repository_like(&self, suffix: &str) -> bool {
        match self {
            DesignType::Class {
                repository: true, ..
            } => true,
            DesignType::Class { type_name, .. } => base_type_name(type_name).ends_with(suffix),
            DesignType::Opaque(_) => false,
        }
    }
}

impl fmt::Display for DesignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignType::Class { type_name, .. } => f.write_str(type_name),
            DesignType::Opaque(name) => f.write_str(name),
        }
    }
}

/// A token recorded explicitly for a parameter.
#[derive(Clone)]
pub enum DeclaredToken {
    Token(Token),
    /// Forward reference: evaluated only when the parameter is resolved.
    Forward(Arc<dyn Fn() -> Token + Send + Sync>),
}

impl DeclaredToken {
    pub fn named(name: &'static str) -> Self {
        DeclaredToken::Token(Token::named(name))
    }

    pub fn forward<F>(thunk: F) -> Self
    where
        F: Fn() -> Token + Send + Sync + 'static,
    {
        DeclaredToken::Forward(Arc::new(thunk))
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, DeclaredToken::Forward(_))
    }

    /// The concrete token, invoking a forward reference if needed.
    pub fn resolve(&self) -> Token {
        match self {
            DeclaredToken::Token(token) => token.clone(),
            DeclaredToken::Forward(thunk) => thunk(),
        }
    }

    /// Entity name for a repository token: `"UserRepository"` and the type
    /// token of `Repository<User>` both give `"User"`. Tokens without the
    /// suffix are used as they are.
    pub fn entity_name(&self, suffix: &str) -> String {
        let token = self.resolve();
        let name = match &token {
            Token::Named(name) => name.as_ref(),
            Token::Type { name, .. } => match first_type_argument(name) {
                Some(entity) if base_type_name(name) == suffix => {
                    return base_type_name(entity).to_string();
                }
                _ => base_type_name(name),
            },
        };
        match name.strip_suffix(suffix) {
            Some(entity) if !entity.is_empty() => entity.to_string(),
            _ => name.to_string(),
        }
    }
}

impl From<Token> for DeclaredToken {
    fn from(token: Token) -> Self {
        DeclaredToken::Token(token)
    }
}

impl fmt::Debug for DeclaredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredToken::Token(token) => write!(f, "{:?}", token),
            DeclaredToken::Forward(_) => f.write_str("Forward(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeclaredDependency {
    pub index: usize,
    pub token: DeclaredToken,
}

/// Constructor descriptor of one type.
#[derive(Clone, Debug)]
pub struct ConstructorMetadata {
    owner: &'static str,
    param_types: Vec<Option<DesignType>>,
    declared: Vec<DeclaredDependency>,
    optional: BTreeSet<usize>,
}

impl ConstructorMetadata {
    pub fn builder(owner: &'static str) -> ConstructorMetadataBuilder {
        ConstructorMetadataBuilder {
            metadata: ConstructorMetadata {
                owner,
                param_types: Vec::new(),
                declared: Vec::new(),
                optional: BTreeSet::new(),
            },
        }
    }

    /// Type name of the described type.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn param_types(&self) -> &[Option<DesignType>] {
        &self.param_types
    }

    pub fn declared(&self) -> &[DeclaredDependency] {
        &self.declared
    }

    pub fn declared_at(&self, index: usize) -> Option<&DeclaredToken> {
        self.declared
            .iter()
            .find(|d| d.index == index)
            .map(|d| &d.token)
    }

    pub fn is_optional(&self, index: usize) -> bool {
        self.optional.contains(&index)
    }

    /// Number of constructor parameters.
    pub fn len(&self) -> usize {
        self.param_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.param_types.is_empty()
    }
}

pub struct ConstructorMetadataBuilder {
    metadata: ConstructorMetadata,
}

impl ConstructorMetadataBuilder {
    /// Append the next parameter with its design-time type.
    pub fn param(mut self, design_type: DesignType) -> Self {
        self.metadata.param_types.push(Some(design_type));
        self
    }

    /// Append a parameter whose design-time type is unknown.
    pub fn untyped_param(mut self) -> Self {
        self.metadata.param_types.push(None);
        self
    }

    pub fn declare(mut self, index: usize, token: impl Into<DeclaredToken>) -> Self {
        self.metadata.declared.push(DeclaredDependency {
            index,
            token: token.into(),
        });
        self
    }

    pub fn optional(mut self, index: usize) -> Self {
        self.metadata.optional.insert(index);
        self
    }

    pub fn build(self) -> ConstructorMetadata {
        self.metadata
    }
}
