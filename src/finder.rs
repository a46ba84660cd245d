//! NDI source discovery.

use std::{
    ffi::CString,
    fmt::{self, Display, Formatter},
    ptr,
    sync::Arc,
};

use crate::{
    frames::copy_c_str,
    handle::{FinderKind, NativeHandle},
    native::{RawFindCreate, RawSource},
    offload::{self, BlockingTask},
    Result, NDI,
};

/// Default timeout for [`Finder::wait_for_sources`], in milliseconds.
pub const DEFAULT_WAIT_TIMEOUT_MS: u32 = 1000;

/// Configuration for an NDI source finder.
///
/// # Examples
///
/// ```
/// use ndi_bridge::FinderOptions;
///
/// // Only search specific groups
/// let options = FinderOptions::builder()
///     .groups("Public,Studio")
///     .build();
///
/// // Find sources on specific network segments
/// let options = FinderOptions::builder()
///     .extra_ips("192.168.1.0/24,10.0.0.0/24")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// Whether to include local sources in discovery.
    pub show_local_sources: bool,
    /// Comma-separated list of groups to search (e.g., "Public,Private").
    pub groups: Option<String>,
    /// Additional IP addresses or ranges to search.
    pub extra_ips: Option<String>,
}

impl FinderOptions {
    /// Create a builder for configuring find options
    pub fn builder() -> FinderOptionsBuilder {
        FinderOptionsBuilder::new()
    }
}

impl Default for FinderOptions {
    fn default() -> Self {
        FinderOptionsBuilder::new().build()
    }
}

/// Builder for configuring FinderOptions with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct FinderOptionsBuilder {
    show_local_sources: Option<bool>,
    groups: Option<String>,
    extra_ips: Option<String>,
}

impl FinderOptionsBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - `show_local_sources`: `true`
    /// - `groups`: `None` (search all groups)
    /// - `extra_ips`: `None` (no additional IPs)
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether to show local sources
    #[must_use]
    pub fn show_local_sources(mut self, show: bool) -> Self {
        self.show_local_sources = Some(show);
        self
    }

    /// Set the groups to search
    #[must_use]
    pub fn groups<S: Into<String>>(mut self, groups: S) -> Self {
        self.groups = Some(groups.into());
        self
    }

    /// Set extra IPs to search
    #[must_use]
    pub fn extra_ips<S: Into<String>>(mut self, ips: S) -> Self {
        self.extra_ips = Some(ips.into());
        self
    }

    #[must_use]
    pub fn build(self) -> FinderOptions {
        FinderOptions {
            show_local_sources: self.show_local_sources.unwrap_or(true),
            groups: self.groups,
            extra_ips: self.extra_ips,
        }
    }
}

/// An NDI source as discovered on the network.
///
/// Either string may be missing. A missing native string is `None`; an empty
/// one is `Some("")`, and the two are kept apart in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Source {
    pub name: Option<String>,
    pub url_address: Option<String>,
}

impl Source {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            url_address: None,
        }
    }

    #[must_use]
    pub fn with_url<S: Into<String>>(mut self, url_address: S) -> Self {
        self.url_address = Some(url_address.into());
        self
    }

    /// # Safety
    ///
    /// Both pointers in `raw` must be null or NUL-terminated strings.
    pub(crate) unsafe fn from_raw(raw: &RawSource) -> Self {
        Source {
            name: copy_c_str(raw.p_ndi_name),
            url_address: copy_c_str(raw.p_url_address),
        }
    }

    /// Copies the strings into a native descriptor that owns them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCString`] if either string contains a null byte.
    pub fn to_owned_raw(&self) -> Result<OwnedSource> {
        let name = self.name.as_deref().map(CString::new).transpose()?;
        let url_address = self.url_address.as_deref().map(CString::new).transpose()?;

        let raw = RawSource {
            p_ndi_name: name.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            p_url_address: url_address.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
        };

        Ok(OwnedSource {
            raw,
            _name: name,
            _url_address: url_address,
        })
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.url_address) {
            (Some(name), Some(url)) => write!(f, "{} ({})", name, url),
            (Some(name), None) => write!(f, "{}", name),
            (None, Some(url)) => write!(f, "({})", url),
            (None, None) => write!(f, "<unnamed source>"),
        }
    }
}

/// A native source descriptor that owns its strings.
#[derive(Debug)]
pub struct OwnedSource {
    raw: RawSource,
    _name: Option<CString>,
    _url_address: Option<CString>,
}

impl OwnedSource {
    pub(crate) fn raw(&self) -> &RawSource {
        &self.raw
    }
}

// SAFETY: the raw pointers only point into the CStrings this value owns.
unsafe impl Send for OwnedSource {}
unsafe impl Sync for OwnedSource {}

/// Result of [`Finder::wait_for_sources_async`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUpdate {
    /// Whether the source list changed before the timeout.
    pub changed: bool,
    /// Snapshot taken right after the wait.
    pub sources: Vec<Source>,
}

/// Discovers NDI sources on the network.
///
/// Discovery runs in the background inside the native library from the moment
/// the finder is created. Cloning a `Finder` shares the same native instance.
///
/// # Examples
///
/// ```no_run
/// # use ndi_bridge::{NDI, FinderOptions, Finder};
/// # fn main() -> Result<(), ndi_bridge::Error> {
/// let ndi = NDI::global().expect("a native library is installed");
/// ndi.initialize();
/// let finder = Finder::new(ndi, &FinderOptions::default())?;
///
/// // Wait for initial discovery
/// if finder.wait_for_sources(5000)? {
///     for source in finder.get_sources()? {
///         println!("Found: {}", source);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Finder {
    handle: Arc<NativeHandle<FinderKind>>,
}

impl Finder {
    /// Creates a new source finder with the specified settings.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotInitialized`] if `ndi` is not initialized
    /// - [`crate::Error::InvalidCString`] if groups or extra IPs contain a null byte
    /// - [`crate::Error::InitializationFailed`] if the native finder cannot be created
    pub fn new(ndi: &NDI, options: &FinderOptions) -> Result<Self> {
        let lib = ndi.running_lib()?;
        let groups = options.groups.as_deref().map(CString::new).transpose()?;
        let extra_ips = options.extra_ips.as_deref().map(CString::new).transpose()?;

        let settings = RawFindCreate {
            show_local_sources: options.show_local_sources,
            p_groups: groups.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            p_extra_ips: extra_ips.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
        };

        // SAFETY: the settings strings outlive the call; the library copies them.
        let instance = unsafe { lib.find_create(&settings) };
        let handle = NativeHandle::new(lib, instance)?;
        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Waits until the source list changes or `timeout_ms` elapses.
    ///
    /// Returns `true` if the list changed, `false` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Destroyed`] after [`Finder::destroy`].
    pub fn wait_for_sources(&self, timeout_ms: u32) -> Result<bool> {
        wait_for_sources(&self.handle, timeout_ms)
    }

    /// Offloaded [`Finder::wait_for_sources`] that also returns a fresh snapshot.
    ///
    /// If the finder is destroyed before the worker runs, the task resolves with
    /// an unchanged, empty update.
    pub fn wait_for_sources_async(&self, timeout_ms: u32) -> Result<BlockingTask<SourceUpdate>> {
        self.handle.live()?;
        let handle = Arc::clone(&self.handle);
        offload::spawn(move || SourceUpdate {
            changed: wait_for_sources(&handle, timeout_ms).unwrap_or(false),
            sources: current_sources(&handle).unwrap_or_default(),
        })
    }

    /// The sources discovered so far. Never blocks.
    pub fn get_sources(&self) -> Result<Vec<Source>> {
        current_sources(&self.handle)
    }

    /// Offloaded [`Finder::get_sources`].
    pub fn get_sources_async(&self) -> Result<BlockingTask<Vec<Source>>> {
        self.handle.live()?;
        let handle = Arc::clone(&self.handle);
        offload::spawn(move || current_sources(&handle).unwrap_or_default())
    }

    /// Destroys the native finder. Later calls are no-ops.
    ///
    /// Blocks until any in-flight call on this finder returns, including an
    /// offloaded `wait_for_sources_async` still inside its timeout. Avoid calling
    /// it from an async task while such a call is pending.
    pub fn destroy(&self) {
        self.handle.destroy();
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_live()
    }
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn wait_for_sources(handle: &NativeHandle<FinderKind>, timeout_ms: u32) -> Result<bool> {
    let live = handle.live()?;
    // SAFETY: `live` keeps the instance from being destroyed during the call.
    Ok(unsafe { live.lib.find_wait_for_sources(live.instance, timeout_ms) })
}

fn current_sources(handle: &NativeHandle<FinderKind>) -> Result<Vec<Source>> {
    let live = handle.live()?;
    // SAFETY: the descriptors are owned by the finder and copied out before
    // the read lock is released.
    let sources = unsafe {
        live.lib
            .find_get_current_sources(live.instance)
            .iter()
            .map(|raw| Source::from_raw(raw))
            .collect()
    };
    Ok(sources)
}
