//! 📡 edgescan samples, probes and ranks entry points of an anycast edge network.
//!
//! Large edge networks accept connections for any hosted virtual host on every
//! address of their published allocations, but the path quality differs a lot
//! from one address to another. edgescan runs a single bounded sampling pass:
//!
//! | step | module |
//! |-|-|
//! | pick a known allocation | [`range`] |
//! | synthesize a plausible address within it | [`candidate`] |
//! | attempt a TLS + WebSocket upgrade pinned to the virtual host | [`probe`] |
//! | run a fixed number of such trials, a few at a time | [`scan`] |
//! | classify and rank the reachable candidates | [`rank`] |
//! | point a connection descriptor at the winner | [`descriptor`] |
//!
//! ```no_run
//! use edgescan::{
//!     descriptor::ConnectionDescriptor,
//!     probe::UpgradeProbe,
//!     scan::Scanner,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), edgescan::error::BoxError> {
//! let descriptor: ConnectionDescriptor =
//!     "vless://uuid@old.example.com:443?sni=real.host.net&path=%2Fws".parse()?;
//!
//! let scanner = Scanner::new(UpgradeProbe::try_new()?);
//! let report = scanner
//!     .run(&descriptor.probe_target(), (), CancellationToken::new())
//!     .await;
//!
//! if let Some(winner) = report.winner() {
//!     println!("{}", descriptor.rewrite(winner.address));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::all,
    clippy::dbg_macro,
    clippy::todo,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::await_holding_lock,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    clippy::str_to_string,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_debug_implementations,
    missing_docs
)]
#![deny(unreachable_pub)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(clippy::float_cmp))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod error;

pub mod candidate;
pub mod descriptor;
pub mod probe;
pub mod range;
pub mod rank;
pub mod scan;
