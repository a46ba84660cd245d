#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::all)]

// Generated by build.rs from Processing.NDI.Lib.h when the `ndi-sdk` feature is on.
include!(concat!(env!("OUT_DIR"), "/ndi_lib.rs"));
