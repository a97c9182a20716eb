//! Stackyard - order and resolve infrastructure stacks.
//!
//! A stack manifest declares deployable units, the environments they run in, the
//! units they depend on, and parameters whose values embed `${classification:content}`
//! placeholders. Stackyard answers two questions for an environment: in which order
//! the units deploy, and what every parameter resolves to.
//!
//! # Architecture Overview
//!
//! ```text
//!  manifest source ──► Manifest ──┬──► VariableStore ──► resolved parameters
//!  (path/http/git)     (YAML)     │    (variables)
//!                                 └──► Items ──────────► deployment order
//!                                      (graph)
//! ```
//!
//! # Core Modules
//!
//! ## Engines
//! - [`variables`] - Variables, snippet extraction and the recursive resolution engine
//! - [`functions`] - Function registry behind `${func:...}` snippets
//! - [`graph`] - Scoped item graph and parents-before-children ordering
//!
//! ## Orchestration
//! - [`manifest`] - YAML manifest model and its conversion into variables and items
//! - [`planner`] - Loads a manifest for one environment, plans and validates it
//! - [`source`] - Fetching manifests from files, HTTP and git repositories
//! - [`git`] - System git wrapper used by `git+` sources
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - Global configuration (`~/.stackyard/config.toml`)
//! - [`core`] - Error types and user-facing error reporting
//! - [`constants`] - Limits, timeouts and well-known names
//! - [`utils`] - Platform helpers
//!
//! # Snippets
//!
//! | Snippet                            | Value                                         |
//! |------------------------------------|-----------------------------------------------|
//! | `${build-variable:region}`         | raw value of build variable `region`          |
//! | `${exports:vpc_id}`                | raw value of export `vpc_id`                  |
//! | `${ref:prefix}`                    | resolved value of build variable `prefix`     |
//! | `${env:STAGE}`                     | `$STAGE`, else the `default_value` parameter  |
//! | `${shell:git rev-parse HEAD}`      | command stdout                                |
//! | `${func:join(items=['a','b'])}`    | result of a registered function               |
//!
//! Placeholders nest and inner ones are substituted first. Nesting (including
//! `ref` hops) is limited to three levels.
//!
//! # Example
//!
//! ```bash
//! stackyard plan --manifest stack.yaml --env prod
//! stackyard plan --manifest 'git+https://github.com/acme/stacks.git//web.yaml?ref=v2' --env dev --format json
//! stackyard validate --manifest stack.yaml --env prod
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod functions;
pub mod git;
pub mod graph;
pub mod manifest;
pub mod planner;
pub mod source;
pub mod utils;
pub mod variables;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
