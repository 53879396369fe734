use crate::config::ConfigService;
use crate::di::{Container, ModuleRef, ResolveOptions};
use crate::error::{MeshestraError, Result};
use crate::transactional::metadata::{ConstructorMetadata, REPOSITORY_SUFFIX};
use crate::transactional::{Argument, ConstructorArgs, Rebindable, TransactionHandle};
use strum_macros::Display;

/// Environment key for [`RebindOptions::strict_lookup`].
pub const STRICT_LOOKUP_KEY: &str = "MESHESTRA_TX_STRICT_LOOKUP";
/// Environment key for [`RebindOptions::repository_suffix`].
pub const REPOSITORY_SUFFIX_KEY: &str = "MESHESTRA_TX_REPOSITORY_SUFFIX";

/// Settings of the rebinder.
///
/// Register an instance in the container to change them for every
/// [`Transactional::with_transaction`](crate::Transactional::with_transaction) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebindOptions {
    /// Resolve ambient parameters only from the service's own module.
    pub strict_lookup: bool,
    /// Type-name and token suffix identifying repositories.
    pub repository_suffix: String,
}

impl Default for RebindOptions {
    fn default() -> Self {
        Self {
            strict_lookup: false,
            repository_suffix: REPOSITORY_SUFFIX.to_string(),
        }
    }
}

impl RebindOptions {
    pub fn from_config(config: &ConfigService) -> Self {
        let defaults = Self::default();
        Self {
            strict_lookup: config
                .get_bool(STRICT_LOOKUP_KEY)
                .unwrap_or(defaults.strict_lookup),
            repository_suffix: config
                .get(REPOSITORY_SUFFIX_KEY)
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.repository_suffix),
        }
    }

    pub fn from_env() -> Self {
        Self::from_config(&ConfigService::new())
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            strict: self.strict_lookup,
        }
    }
}

/// Where a parameter's argument came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum ResolutionPath {
    #[strum(serialize = "transaction")]
    Transaction,
    #[strum(serialize = "container")]
    Container,
    #[strum(serialize = "absent")]
    Absent,
    #[strum(serialize = "deferred")]
    Deferred,
}

/// How repository parameters and forward references are treated.
#[derive(Clone, Copy)]
enum Binding<'a> {
    /// First construction by the container.
    Ambient,
    Transaction(&'a dyn TransactionHandle),
}

/// Rebuilds services with their repositories bound to a transaction.
///
/// Every other constructor parameter is resolved from the ambient container
/// exactly as it was when the service was first built.
#[derive(Clone)]
pub struct Rebinder {
    module: ModuleRef,
    options: Option<RebindOptions>,
}

impl Rebinder {
    /// Rebinder resolving ambient dependencies through `module`.
    ///
    /// Options are taken from a [`RebindOptions`] registered in the container,
    /// or the defaults.
    pub fn new(module: ModuleRef) -> Self {
        Self {
            module,
            options: None,
        }
    }

    pub fn with_options(mut self, options: RebindOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Returns a new `T` whose repository parameters come from `tx`.
    ///
    /// `instance` is left untouched and keeps its ambient dependencies.
    ///
    /// # Errors
    /// * [`MeshestraError::DependencyNotFound`] for an unregistered, non-optional token.
    /// * [`MeshestraError::UnexpectedParameter`] when a parameter has neither a
    ///   declared token nor a usable design-time type.
    /// * any error of [`TransactionHandle::get_repository`].
    pub fn bind_to_transaction<T: Rebindable>(
        &self,
        _instance: &T,
        tx: &dyn TransactionHandle,
    ) -> Result<T> {
        let metadata = T::constructor_metadata();
        let args = self.rebuild_constructor_args(&metadata, tx)?;
        T::rebuild(args)
    }

    /// Resolve the constructor arguments described by `metadata`, binding
    /// repository parameters to `tx`.
    pub fn rebuild_constructor_args(
        &self,
        metadata: &ConstructorMetadata,
        tx: &dyn TransactionHandle,
    ) -> Result<ConstructorArgs> {
        let container = self.module.container()?;
        let options = self.options(&container);
        tracing::debug!(
            "Rebinding {} ({} parameters) to transaction",
            metadata.owner(),
            metadata.len()
        );
        resolve_arguments(
            &container,
            &self.module,
            metadata,
            Binding::Transaction(tx),
            &options,
        )
    }

    fn options(&self, container: &Container) -> RebindOptions {
        match &self.options {
            Some(options) => options.clone(),
            None => container
                .resolve::<RebindOptions>()
                .map(|o| o.as_ref().clone())
                .unwrap_or_default(),
        }
    }
}

/// Build `T` from the container using its constructor metadata.
///
/// Used by `#[derive(Injectable)]`. Forward references become unresolved
/// [`Lazy`](crate::Lazy) values, so types that reference each other can be built.
pub fn inject_rebindable<T: Rebindable>(container: &Container) -> Result<T> {
    let metadata = T::constructor_metadata();
    let options = container
        .resolve::<RebindOptions>()
        .map(|o| o.as_ref().clone())
        .unwrap_or_default();
    let args = resolve_arguments(
        container,
        &container.module_ref(),
        &metadata,
        Binding::Ambient,
        &options,
    )?;
    T::rebuild(args)
}

fn resolve_arguments(
    container: &Container,
    module: &ModuleRef,
    metadata: &ConstructorMetadata,
    binding: Binding<'_>,
    options: &RebindOptions,
) -> Result<ConstructorArgs> {
    let mut arguments = Vec::with_capacity(metadata.len());

    for (index, design_type) in metadata.param_types().iter().enumerate() {
        let declared = metadata.declared_at(index);

        if let (Binding::Transaction(tx), Some(declared), Some(design_type)) =
            (binding, declared, design_type)
        {
            if design_type.is_repository_like(&options.repository_suffix) {
                let entity = declared.entity_name(&options.repository_suffix);
                let repository = tx.get_repository(&entity)?;
                trace_parameter(metadata, index, ResolutionPath::Transaction, &entity);
                arguments.push(Argument::Instance(repository));
                continue;
            }
        }

        let token = match (declared, design_type) {
            (Some(declared), _) if declared.is_forward() && matches!(binding, Binding::Ambient) => {
                let token = declared.resolve();
                trace_parameter(metadata, index, ResolutionPath::Deferred, &token);
                arguments.push(Argument::Deferred {
                    module: module.clone(),
                    token,
                });
                continue;
            }
            (Some(declared), _) => declared.resolve(),
            (None, Some(design_type)) => match design_type.token() {
                Some(token) => token.clone(),
                None => return Err(unexpected_parameter(metadata, index, &design_type.to_string())),
            },
            (None, None) => return Err(unexpected_parameter(metadata, index, "undefined")),
        };

        match container.resolve_token(&token, options.resolve_options()) {
            Ok(instance) => {
                trace_parameter(metadata, index, ResolutionPath::Container, &token);
                arguments.push(Argument::Instance(instance));
            }
            // absent only when the parameter's own token is unregistered
            Err(MeshestraError::DependencyNotFound { token: missing })
                if metadata.is_optional(index) && missing == token.to_string() =>
            {
                trace_parameter(metadata, index, ResolutionPath::Absent, &token);
                arguments.push(Argument::Absent);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to resolve parameter {} of {}: {}",
                    index,
                    metadata.owner(),
                    e
                );
                return Err(e);
            }
        }
    }

    Ok(ConstructorArgs::new(metadata.owner(), arguments))
}

fn trace_parameter(
    metadata: &ConstructorMetadata,
    index: usize,
    path: ResolutionPath,
    what: &dyn std::fmt::Display,
) {
    tracing::debug!(
        "{}[{}] <- {} ({})",
        metadata.owner(),
        index,
        what,
        path
    );
}

fn unexpected_parameter(metadata: &ConstructorMetadata, index: usize, found: &str) -> MeshestraError {
    tracing::error!(
        "Unexpected constructor parameter type {} at index {} of {}",
        found,
        index,
        metadata.owner()
    );
    MeshestraError::UnexpectedParameter {
        owner: metadata.owner().to_string(),
        index,
        found: found.to_string(),
    }
}
