//! emoface-classifiers: facial-expression recognition building blocks.
//!
//! This crate loads labeled face datasets (CK+48, fer2013), splits them,
//! projects images onto eigenfaces or fisherfaces subspaces and trains one of
//! four classifier families (CNN, SVM, AdaBoost, MLP) on the result. The
//! `pipeline` module wires these stages into a comparison run and into
//! single-photo recognition on top of a face locator.
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod face_locator;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod split;

pub use error::{EmofaceError, Result};
