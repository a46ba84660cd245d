fn main() {
    println!("cargo:rerun-if-env-changed=NDI_SDK_DIR");

    #[cfg(feature = "ndi-sdk")]
    sdk::generate();
}

#[cfg(feature = "ndi-sdk")]
mod sdk {
    use std::env;
    use std::path::{Path, PathBuf};

    pub fn generate() {
        let sdk_dir = env::var("NDI_SDK_DIR").unwrap_or_else(|_| default_sdk_dir());

        // The Advanced SDK ships a differently named library on Unix.
        let is_advanced = cfg!(unix) && sdk_dir.to_lowercase().contains("advanced");

        let include_dir = format!("{}/include", sdk_dir);
        let header = format!("{}/Processing.NDI.Lib.h", include_dir);
        println!("cargo:rerun-if-changed={}", header);

        let target = env::var("TARGET").expect("TARGET environment variable not set");
        let (lib_name, link_type) = if cfg!(windows) {
            let arch = if target.contains("x86_64") { "x64" } else { "x86" };
            println!("cargo:rustc-link-search=native={}\\lib\\{}", sdk_dir, arch);
            (format!("Processing.NDI.Lib.{}", arch), "static")
        } else if is_advanced {
            ("ndi_advanced".to_string(), "dylib")
        } else {
            ("ndi".to_string(), "dylib")
        };
        println!("cargo:rustc-link-lib={}={}", link_type, lib_name);

        let bindings = bindgen::Builder::default()
            .header(header)
            .clang_arg(format!("-I{}", include_dir))
            .derive_default(true)
            .generate()
            .expect("Unable to generate NDI bindings");

        let out_path =
            PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR environment variable not set"));
        bindings
            .write_to_file(out_path.join("ndi_lib.rs"))
            .expect("Couldn't write NDI bindings");
    }

    fn default_sdk_dir() -> String {
        if cfg!(windows) {
            return "C:\\Program Files\\NDI SDK for Windows".to_string();
        }
        if !cfg!(unix) {
            panic!("Unsupported platform, please set NDI_SDK_DIR manually.");
        }
        let advanced = "/usr/share/NDI Advanced SDK for Linux";
        if Path::new(advanced).exists() {
            advanced.to_string()
        } else {
            "/usr/share/NDI SDK for Linux".to_string()
        }
    }
}
