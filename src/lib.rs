//! A minimal bootstrap runtime for a Lisp-like language.
//!
//! This crate provides the hard engineering underneath a future
//! reader/writer/compiler: a tagged-pointer [`value`] encoding, a two-space
//! copying [`heap`] with a non-recursive collector, and a stack-free
//! [`eval`]uator whose call stack lives entirely on the managed heap so that
//! arbitrarily deep user programs never grow the host call stack.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unused_must_use)]

extern crate alloc;

pub mod consts;
pub mod constructors;
pub mod error;
pub mod eval;
pub mod heap;
pub mod value;

pub mod prelude {
    //! Commonly used re-exports.
    pub use crate::{
        constructors::Builtins,
        error::{Error, Result},
        eval::{Evaluator, Opcode},
        heap::{Heap, HeapConfig, RootGuard},
        value::Value,
    };
}
