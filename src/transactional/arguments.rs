use crate::di::{Instance, Lazy, ModuleRef, Token};
use crate::error::{MeshestraError, Result};
use std::fmt;
use std::sync::Arc;

/// One resolved constructor argument.
#[derive(Clone)]
pub enum Argument {
    Instance(Instance),
    /// Optional parameter whose token is not registered.
    Absent,
    /// Forward reference left for a [`Lazy`] to resolve later.
    Deferred { module: ModuleRef, token: Token },
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Instance(_) => f.write_str("Instance(..)"),
            Argument::Absent => f.write_str("Absent"),
            Argument::Deferred { token, .. } => write!(f, "Deferred({})", token),
        }
    }
}

/// Positional arguments handed to [`Rebindable::rebuild`](crate::Rebindable::rebuild).
///
/// Each accessor takes the argument out of its slot, so every index is
/// consumed exactly once.
#[derive(Debug)]
pub struct ConstructorArgs {
    owner: &'static str,
    slots: Vec<Option<Argument>>,
}

impl ConstructorArgs {
    pub fn new(owner: &'static str, arguments: Vec<Argument>) -> Self {
        Self {
            owner,
            slots: arguments.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Peek at an argument without consuming it.
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn take(&mut self, index: usize) -> Result<Argument> {
        self.slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| MeshestraError::MissingArgument {
                owner: self.owner.to_string(),
                index,
            })
    }

    /// A required service, shared as `Arc<T>`.
    pub fn instance<T: 'static + Send + Sync>(&mut self, index: usize) -> Result<Arc<T>> {
        match self.take(index)? {
            Argument::Instance(instance) => downcast::<T>(instance),
            other => Err(self.unexpected::<T>(index, &other)),
        }
    }

    /// A service that may be absent.
    pub fn optional<T: 'static + Send + Sync>(&mut self, index: usize) -> Result<Option<Arc<T>>> {
        match self.take(index)? {
            Argument::Instance(instance) => downcast::<T>(instance).map(Some),
            Argument::Absent => Ok(None),
            other => Err(self.unexpected::<T>(index, &other)),
        }
    }

    /// A value cloned out of the registered instance (custom-token values,
    /// factory results, `Arc<dyn Trait>` bindings, repositories).
    pub fn value<V: Clone + 'static + Send + Sync>(&mut self, index: usize) -> Result<V> {
        self.instance::<V>(index).map(|v| v.as_ref().clone())
    }

    pub fn optional_value<V: Clone + 'static + Send + Sync>(
        &mut self,
        index: usize,
    ) -> Result<Option<V>> {
        self.optional::<V>(index)
            .map(|v| v.map(|v| v.as_ref().clone()))
    }

    /// A lazily resolved service; already resolved unless the argument was deferred.
    pub fn lazy<T: 'static + Send + Sync>(&mut self, index: usize) -> Result<Lazy<T>> {
        match self.take(index)? {
            Argument::Instance(instance) => downcast::<T>(instance).map(Lazy::resolved),
            Argument::Deferred { module, token } => Ok(Lazy::deferred(module, token)),
            Argument::Absent => Err(self.unexpected::<T>(index, &Argument::Absent)),
        }
    }

    fn unexpected<T>(&self, index: usize, argument: &Argument) -> MeshestraError {
        MeshestraError::UnexpectedParameter {
            owner: self.owner.to_string(),
            index,
            found: format!("{:?} for {}", argument, std::any::type_name::<T>()),
        }
    }
}

fn downcast<T: 'static + Send + Sync>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| MeshestraError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Hoge(u8);

    #[test]
    fn test_each_slot_is_taken_once() {
        let mut args = ConstructorArgs::new("Sample", vec![Argument::Instance(Arc::new(Hoge(1)))]);
        assert_eq!(args.len(), 1);
        assert!(matches!(args.get(0), Some(Argument::Instance(_))));
        assert_eq!(args.instance::<Hoge>(0).unwrap().0, 1);
        assert!(args.get(0).is_none());
        assert!(matches!(
            args.instance::<Hoge>(0),
            Err(MeshestraError::MissingArgument { index: 0, .. })
        ));
        assert!(matches!(
            args.take(5),
            Err(MeshestraError::MissingArgument { index: 5, .. })
        ));
    }

    #[test]
    fn test_optional_and_value() {
        let mut args = ConstructorArgs::new(
            "Sample",
            vec![
                Argument::Absent,
                Argument::Instance(Arc::new(Hoge(2))),
                Argument::Instance(Arc::new("myString".to_string())),
            ],
        );
        assert!(args.optional::<Hoge>(0).unwrap().is_none());
        assert_eq!(args.optional_value::<Hoge>(1).unwrap(), Some(Hoge(2)));
        assert_eq!(args.value::<String>(2).unwrap(), "myString");
    }

    #[test]
    fn test_absent_required_argument_is_rejected() {
        let mut args = ConstructorArgs::new("Sample", vec![Argument::Absent]);
        let err = args.instance::<Hoge>(0).err().unwrap();
        assert!(matches!(err, MeshestraError::UnexpectedParameter { index: 0, .. }));
    }

    #[test]
    fn test_wrong_type_is_a_downcast_failure() {
        let mut args = ConstructorArgs::new("Sample", vec![Argument::Instance(Arc::new(3u32))]);
        assert!(matches!(
            args.value::<String>(0),
            Err(MeshestraError::DowncastFailed { .. })
        ));
    }

    #[test]
    fn test_lazy_from_instance() {
        let mut args = ConstructorArgs::new("Sample", vec![Argument::Instance(Arc::new(Hoge(4)))]);
        let lazy = args.lazy::<Hoge>(0).unwrap();
        assert!(lazy.is_resolved());
        assert_eq!(lazy.0, 4);
    }
}
