//! Cross-module flow tests. These exercise the paths the running app wires
//! together in `lib.rs`, minus the Tauri runtime: redirect URI to credential,
//! and fired key combination to dispatched action.

mod auth_flow_tests;
