use serde::Serialize;
use serde::de::DeserializeOwned;

/// A persisted record type.
///
/// Rows are stored as JSON objects. The `id` field is generated on insert
/// when it is missing or `null`, so entities usually declare it as
/// `Option<i64>`.
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Option<i64>,
///     pub name: String,
/// }
///
/// impl Entity for User {
///     const NAME: &'static str = "User";
///     const TABLE: &'static str = "users";
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity name, used to look repositories up inside a transaction.
    const NAME: &'static str;
    /// Table the rows live in.
    const TABLE: &'static str;
}

/// Name under which the ambient repository of `E` is registered.
pub fn repository_token_name<E: Entity>() -> String {
    format!("{}Repository", E::NAME)
}
