//! Runtime lifecycle tests. Only the last one touches the process-wide
//! runtime, which is why they get their own test binary.

mod common;

use std::{sync::Arc, thread};

use common::{runtime, FakeLib};
use ndi_bridge::{Error, Finder, FinderOptions, NDI};

#[test]
fn test_context_initialize_and_destroy_are_idempotent() {
    let lib = Arc::new(FakeLib::default());
    let ndi = NDI::with_lib(lib.clone());
    assert!(!ndi.is_running());

    ndi.destroy();
    assert_eq!(lib.count("destroy"), 0);

    assert!(ndi.initialize());
    assert!(ndi.initialize());
    assert!(ndi.is_running());
    assert_eq!(lib.count("initialize"), 1);

    ndi.destroy();
    ndi.destroy();
    assert!(!ndi.is_running());
    assert_eq!(lib.count("destroy"), 1);

    assert!(ndi.initialize());
    assert_eq!(lib.count("initialize"), 2);
}

#[test]
fn test_concurrent_initialize_calls_the_library_once() {
    let lib = Arc::new(FakeLib::default());
    let ndi = Arc::new(NDI::with_lib(lib.clone()));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let ndi = Arc::clone(&ndi);
            thread::spawn(move || ndi.initialize())
        })
        .collect();
    for handle in threads {
        assert!(handle.join().unwrap());
    }
    assert_eq!(lib.count("initialize"), 1);
}

#[test]
fn test_failed_initialize_leaves_the_runtime_down() {
    let lib = Arc::new(FakeLib::default());
    lib.set_init_ok(false);
    let ndi = NDI::with_lib(lib.clone());

    assert!(!ndi.initialize());
    assert!(!ndi.is_running());
    assert!(matches!(
        Finder::new(&ndi, &FinderOptions::default()),
        Err(Error::NotInitialized)
    ));

    lib.set_init_ok(true);
    assert!(ndi.initialize());
    assert_eq!(lib.count("initialize"), 2);
}

#[test]
fn test_handles_created_before_destroy_stay_usable_until_destroyed() {
    let (lib, ndi) = runtime();
    let finder = Finder::new(&ndi, &FinderOptions::default()).unwrap();
    ndi.destroy();

    assert!(finder.is_valid());
    finder.destroy();
    assert_eq!(lib.count("find_destroy"), 1);
}

#[test]
fn test_version_is_copied_out() {
    let (_lib, ndi) = runtime();
    assert_eq!(ndi.version().as_deref(), Some("6.1.0 (fake)"));
}

#[test]
#[cfg(not(feature = "ndi-sdk"))]
fn test_module_level_functions_use_the_installed_library() {
    let lib = Arc::new(FakeLib::default());

    // Nothing installed yet in this binary.
    assert!(!ndi_bridge::is_initialized());
    assert!(!ndi_bridge::initialize());
    assert_eq!(ndi_bridge::version(), None);
    ndi_bridge::destroy();

    let installed = ndi_bridge::install(lib.clone()).unwrap();
    assert!(matches!(
        ndi_bridge::install(Arc::new(FakeLib::default())),
        Err(Error::InvalidConfiguration(_))
    ));
    assert!(std::ptr::eq(installed, NDI::global().unwrap()));

    assert!(ndi_bridge::initialize());
    assert!(ndi_bridge::initialize());
    assert!(ndi_bridge::is_initialized());
    assert_eq!(lib.count("initialize"), 1);
    assert_eq!(ndi_bridge::version().as_deref(), Some("6.1.0 (fake)"));

    ndi_bridge::destroy();
    ndi_bridge::destroy();
    assert!(!ndi_bridge::is_initialized());
    assert_eq!(lib.count("destroy"), 1);
}
