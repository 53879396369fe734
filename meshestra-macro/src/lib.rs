use proc_macro::TokenStream;

mod injectable;
mod module;

/// Derive macro for services built by the container and rebindable to a transaction
///
/// Every named field is one constructor parameter, in declaration order.
///
/// | Field type            | Resolved as                                        |
/// |-----------------------|----------------------------------------------------|
/// | `Arc<T>`              | instance registered for `T`                        |
/// | `Arc<dyn Trait>`      | trait binding for `dyn Trait`                      |
/// | `Option<Arc<T>>`      | optional instance, `None` when not registered      |
/// | `Lazy<T>`             | forward reference, resolved on first use           |
/// | `ModuleRef`, others   | value registered for the field type, cloned        |
///
/// Field options: `#[inject(token = "...")]`, `#[inject(optional)]`,
/// `#[inject(forward_ref)]` and `#[inject(repository = "Entity")]`.
/// A struct with a `ModuleRef` field also gets `Transactional`.
///
/// # Example
/// ```ignore
/// use meshestra_transactional::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     module_ref: ModuleRef,
///     mailer: Arc<dyn Mailer>,
///     #[inject(repository = "User")]
///     users: Repository<User>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro for defining a module with imports, providers and trait bindings
///
/// Imported modules become child modules of the annotated one.
///
/// # Example
/// ```ignore
/// use meshestra_transactional::module;
///
/// #[module(
///     imports = [UsersModule],
///     providers = [BillingService, SmtpMailer],
///     bindings = [(dyn Mailer => SmtpMailer)],
/// )]
/// pub struct BillingModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}
