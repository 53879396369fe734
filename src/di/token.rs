use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key under which a provider is registered in a [`Container`](crate::Container).
///
/// Type tokens are what a constructor parameter resolves to by default (its
/// design-time type). Named tokens are custom string tokens, used for values,
/// factories and repositories.
#[derive(Clone)]
pub enum Token {
    Type { id: TypeId, name: &'static str },
    Named(Cow<'static, str>),
}

impl Token {
    /// Token of a (possibly unsized) type, e.g. `Token::of::<dyn Mailer>()`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Token::Named(name.into())
    }

    /// Human readable name: the string of a named token, or the short type
    /// name (last path segment, generics kept) of a type token.
    pub fn name(&self) -> &str {
        match self {
            Token::Type { name, .. } => short_type_name(name),
            Token::Named(name) => name,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
            (Token::Named(a), Token::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Token::Type { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Token::Named(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => write!(f, "Type({})", name),
            Token::Named(name) => write!(f, "Named({:?})", name),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type { name, .. } => f.write_str(name),
            Token::Named(name) => f.write_str(name),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::Named(Cow::Borrowed(name))
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Named(Cow::Owned(name))
    }
}

/// Strips the module path from a full type name while keeping generic
/// arguments: `app::repo::Repository<app::User>` becomes `Repository<app::User>`.
pub(crate) fn short_type_name(name: &str) -> &str {
    let base_end = name.find('<').unwrap_or(name.len());
    let start = name[..base_end].rfind("::").map(|i| i + 2).unwrap_or(0);
    &name[start..]
}

/// Like [`short_type_name`] but without generic arguments.
pub(crate) fn base_type_name(name: &str) -> &str {
    let short = short_type_name(name);
    short.split('<').next().unwrap_or(short)
}

/// First generic argument of a type name: `Repository<app::User>` gives `app::User`.
pub(crate) fn first_type_argument(name: &str) -> Option<&str> {
    let open = name.find('<')?;
    let inner = name[open + 1..].strip_suffix('>')?;
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(inner[..i].trim()),
            _ => {}
        }
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Hoge;

    #[test]
    fn test_type_tokens_compare_by_type_id() {
        assert_eq!(Token::of::<Hoge>(), Token::of::<Hoge>());
        assert_ne!(Token::of::<Hoge>(), Token::of::<String>());
        assert_ne!(Token::of::<Hoge>(), Token::named("Hoge"));
    }

    #[test]
    fn test_named_tokens_hash_by_name() {
        let mut set = HashSet::new();
        set.insert(Token::from("MyObject"));
        set.insert(Token::from("MyObject".to_string()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_token_name() {
        assert_eq!(Token::of::<Hoge>().name(), "Hoge");
        assert_eq!(Token::named("UserRepository").name(), "UserRepository");
    }

    #[test]
    fn test_short_and_base_type_names() {
        let name = "app::persistence::Repository<app::entities::User>";
        assert_eq!(short_type_name(name), "Repository<app::entities::User>");
        assert_eq!(base_type_name(name), "Repository");
        assert_eq!(base_type_name("UserRepository"), "UserRepository");
        assert_eq!(base_type_name("dyn app::Mailer"), "Mailer");
    }

    #[test]
    fn test_first_type_argument() {
        assert_eq!(
            first_type_argument("app::Repository<app::entities::User>"),
            Some("app::entities::User")
        );
        assert_eq!(
            first_type_argument("app::Pair<app::Wrap<A, B>, C>"),
            Some("app::Wrap<A, B>")
        );
        assert_eq!(first_type_argument("app::UserRepository"), None);
    }
}
