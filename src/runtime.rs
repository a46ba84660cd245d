//! NDI runtime management and initialization.

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::{frames::copy_c_str, native::NativeLib, Error, Result};

/// State of the NDI runtime lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Runtime has not been initialized yet, or was torn down.
    Uninitialized,
    /// Runtime is currently being initialized by another thread.
    Initializing,
    Initialized,
    /// Runtime is currently being destroyed by another thread.
    Destroying,
}

/// Serializes native initialize/destroy so that concurrent callers observe a
/// single transition and never call into the library at the same time.
struct RuntimeManager {
    state: Mutex<State>,
    cv: Condvar,
}

impl RuntimeManager {
    const fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, state: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.cv.wait(state).unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self, lib: &dyn NativeLib) -> bool {
        let mut state = self.lock();

        loop {
            match *state {
                State::Uninitialized => {
                    *state = State::Initializing;
                    drop(state); // Release lock before calling FFI

                    let init_succeeded = lib.initialize();

                    state = self.lock();
                    *state = if init_succeeded {
                        State::Initialized
                    } else {
                        State::Uninitialized
                    };
                    self.cv.notify_all();

                    if init_succeeded {
                        debug!("NDI runtime initialized");
                    } else {
                        warn!("native NDI initialize failed");
                    }
                    return init_succeeded;
                }
                State::Initializing | State::Destroying => {
                    state = self.wait(state);
                }
                State::Initialized => return true,
            }
        }
    }

    fn destroy(&self, lib: &dyn NativeLib) {
        let mut state = self.lock();

        loop {
            match *state {
                State::Initialized => {
                    *state = State::Destroying;
                    drop(state);

                    lib.destroy();

                    state = self.lock();
                    *state = State::Uninitialized;
                    self.cv.notify_all();
                    debug!("NDI runtime destroyed");
                    return;
                }
                State::Initializing | State::Destroying => {
                    state = self.wait(state);
                }
                State::Uninitialized => return,
            }
        }
    }

    fn is_running(&self) -> bool {
        *self.lock() == State::Initialized
    }
}

/// A runtime context over one native library.
///
/// Handles are created from an `NDI` and require it to be initialized. The
/// process-wide context is reached through [`NDI::global`] and the module-level
/// [`initialize`], [`destroy`], [`is_initialized`] and [`version`] functions;
/// [`NDI::with_lib`] builds an independent context, which is what tests and
/// embedders with their own backend use.
///
/// Destroying the runtime does not touch outstanding handles. Destroy them
/// first.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> Result<(), ndi_bridge::Error> {
/// if ndi_bridge::initialize() {
///     println!("NDI {}", ndi_bridge::version().unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
pub struct NDI {
    lib: Arc<dyn NativeLib>,
    runtime: RuntimeManager,
}

static GLOBAL: OnceCell<NDI> = OnceCell::new();

impl NDI {
    /// Creates an uninitialized runtime context over `lib`.
    pub fn with_lib(lib: Arc<dyn NativeLib>) -> Self {
        Self {
            lib,
            runtime: RuntimeManager::new(),
        }
    }

    /// The process-wide runtime context.
    ///
    /// With the `ndi-sdk` feature this falls back to the NDI SDK when nothing was
    /// [`install`]ed. Without it, `None` until a library is installed.
    pub fn global() -> Option<&'static NDI> {
        #[cfg(feature = "ndi-sdk")]
        let ndi = Some(GLOBAL.get_or_init(|| NDI::with_lib(Arc::new(crate::sdk::SdkLib))));
        #[cfg(not(feature = "ndi-sdk"))]
        let ndi = GLOBAL.get();
        ndi
    }

    /// Initializes the native library. Returns `true` if it is up afterwards.
    ///
    /// Idempotent: once initialized, further calls return `true` without a
    /// native call.
    pub fn initialize(&self) -> bool {
        self.runtime.initialize(&*self.lib)
    }

    /// Tears the native library down. A no-op when not initialized.
    pub fn destroy(&self) {
        self.runtime.destroy(&*self.lib)
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// The native library's version string, copied out lossily.
    pub fn version(&self) -> Option<String> {
        // SAFETY: the library returns null or a static NUL-terminated string.
        unsafe { copy_c_str(self.lib.version()) }
    }

    /// The library handles are created against, once the runtime is up.
    pub(crate) fn running_lib(&self) -> Result<Arc<dyn NativeLib>> {
        if self.is_running() {
            Ok(Arc::clone(&self.lib))
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl fmt::Debug for NDI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NDI")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Chooses the process-wide native library.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if a library was already installed,
/// or (with `ndi-sdk`) the SDK default was already taken by [`NDI::global`].
pub fn install(lib: Arc<dyn NativeLib>) -> Result<&'static NDI> {
    GLOBAL.try_insert(NDI::with_lib(lib)).map_err(|_| {
        Error::InvalidConfiguration("a native NDI library is already installed".into())
    })
}

/// Initializes the process-wide runtime. See [`NDI::initialize`].
///
/// Returns `false` when no native library is available.
pub fn initialize() -> bool {
    match NDI::global() {
        Some(ndi) => ndi.initialize(),
        None => {
            warn!("no native NDI library is installed; call install() first");
            false
        }
    }
}

/// Tears down the process-wide runtime. See [`NDI::destroy`].
pub fn destroy() {
    if let Some(ndi) = NDI::global() {
        ndi.destroy();
    }
}

pub fn is_initialized() -> bool {
    NDI::global().is_some_and(NDI::is_running)
}

/// The native library's version string, if a library is available.
pub fn version() -> Option<String> {
    NDI::global().and_then(NDI::version)
}
