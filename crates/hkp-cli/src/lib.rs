// Copyright 2025 HKP Client Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # HKP CLI
//!
//! Command-line keyserver client.
//!
//! The CLI uses `argh` for argument parsing and dispatches to the
//! operations in `hkp-client`. Protocol payloads go to stdout, logs go to
//! stderr.
//!
//! ## Key Commands
//!
//! - `hkp search <pattern>`: list matching keys in machine readable form
//! - `hkp get <keyspec>...`: fetch keys by key id or fingerprint
//! - `hkp put <file|->`: upload binary key material
//! - `hkp hosts <name>...`: select hosts and print the host table as JSON
//! - `hkp schemes [uri]`: describe the handled URL schemes

pub mod args;
pub mod commands;


/// Environment variable consulted when `--keyserver` is not given.
pub const KEYSERVER_ENV: &str = "HKP_KEYSERVER";

/// Keyserver used when neither the flag nor the environment names one.
pub const DEFAULT_KEYSERVER: &str = "hkp://localhost";
