//! Native instance lifecycle shared by finders, receivers and senders.
//!
//! A [`NativeHandle`] is `Live` from construction until the first destroy,
//! then `Destroyed` for good. Every native call goes through [`NativeHandle::live`],
//! which holds a read lock for the duration of the call; destroy takes the
//! write lock, so it waits for in-flight calls and never frees an instance
//! that is still in use.

use std::{
    marker::PhantomData,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use tracing::{debug, warn};

use crate::{
    native::{Instance, NativeLib},
    Error, Result,
};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::FinderKind {}
    impl Sealed for super::ReceiverKind {}
    impl Sealed for super::SenderKind {}
}

/// Which native destroy call a handle owns.
pub(crate) trait HandleKind: sealed::Sealed + 'static {
    /// Shown in errors, e.g. "Sender has been destroyed".
    const NAME: &'static str;

    /// # Safety
    ///
    /// `instance` must come from this kind's create call and be destroyed once.
    unsafe fn destroy(lib: &dyn NativeLib, instance: Instance);
}

pub(crate) struct FinderKind;

impl HandleKind for FinderKind {
    const NAME: &'static str = "Finder";

    unsafe fn destroy(lib: &dyn NativeLib, instance: Instance) {
        lib.find_destroy(instance);
    }
}

pub(crate) struct ReceiverKind;

impl HandleKind for ReceiverKind {
    const NAME: &'static str = "Receiver";

    unsafe fn destroy(lib: &dyn NativeLib, instance: Instance) {
        lib.recv_destroy(instance);
    }
}

pub(crate) struct SenderKind;

impl HandleKind for SenderKind {
    const NAME: &'static str = "Sender";

    unsafe fn destroy(lib: &dyn NativeLib, instance: Instance) {
        lib.send_destroy(instance);
    }
}

/// One native instance plus the library that owns it.
pub(crate) struct NativeHandle<K: HandleKind> {
    lib: Arc<dyn NativeLib>,
    /// `None` once destroyed.
    instance: RwLock<Option<Instance>>,
    _kind: PhantomData<fn() -> K>,
}

/// Read access to a live instance. Destroy blocks while this is held.
pub(crate) struct Live<'h> {
    pub(crate) lib: &'h dyn NativeLib,
    pub(crate) instance: Instance,
    _guard: RwLockReadGuard<'h, Option<Instance>>,
}

impl<K: HandleKind> NativeHandle<K> {
    /// Takes ownership of the result of a native create call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailed`] when `instance` is `None`.
    pub(crate) fn new(lib: Arc<dyn NativeLib>, instance: Option<Instance>) -> Result<Self> {
        match instance {
            Some(instance) => {
                debug!(kind = K::NAME, "created handle");
                Ok(Self {
                    lib,
                    instance: RwLock::new(Some(instance)),
                    _kind: PhantomData,
                })
            }
            None => {
                warn!(kind = K::NAME, "native create returned null");
                Err(Error::InitializationFailed(format!(
                    "Failed to create NDI {} instance",
                    K::NAME.to_lowercase()
                )))
            }
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.instance
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// # Errors
    ///
    /// Returns [`Error::Destroyed`] once the handle has been destroyed.
    pub(crate) fn live(&self) -> Result<Live<'_>> {
        let guard = self.instance.read().unwrap_or_else(PoisonError::into_inner);
        let instance = (*guard).ok_or(Error::Destroyed(K::NAME))?;
        Ok(Live {
            lib: &*self.lib,
            instance,
            _guard: guard,
        })
    }

    /// Destroys the instance once, running `before` on it first. Later calls do
    /// nothing and return `false`.
    pub(crate) fn destroy_with(&self, before: impl FnOnce(&dyn NativeLib, Instance)) -> bool {
        let mut guard = self.instance.write().unwrap_or_else(PoisonError::into_inner);
        let Some(instance) = guard.take() else {
            return false;
        };

        before(&*self.lib, instance);
        // SAFETY: `take` hands out the instance exactly once.
        unsafe { K::destroy(&*self.lib, instance) };
        debug!(kind = K::NAME, "destroyed handle");
        true
    }

    pub(crate) fn destroy(&self) -> bool {
        self.destroy_with(|_, _| {})
    }
}

impl<K: HandleKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        self.destroy();
    }
}
