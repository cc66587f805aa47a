// Test artifacts for installed commands; the module list is generated by build.rs.
include!(concat!(env!("OUT_DIR"), "/command_tests.rs"));
